use crate::gui_bridge::model::DisplayModel;
use crate::session::{LinkSource, SharedSession, StationConfig};
use anyhow::{anyhow, Context, Result};
use groundcore::reader::available_ports;
use groundcore::telemetry::LinkMetrics;
use log::{error, info};
use serde::Deserialize;
use serde_json::json;
use std::{
    net::SocketAddr,
    sync::{mpsc, Arc, RwLock},
    thread,
};
use tokio::runtime::Builder;
use warp::{http::StatusCode, Filter};

/// Body of `POST /connect`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectRequest {
    pub port: String,
    #[serde(default)]
    pub baud_rate: Option<u32>,
}

/// HTTP endpoint the visualizer polls for display state and uses to pick ports.
pub struct GuiBridge {
    address: SocketAddr,
    state: Arc<RwLock<DisplayModel>>,
    metrics: Arc<LinkMetrics>,
}

impl GuiBridge {
    pub fn start(
        config: &StationConfig,
        state: Arc<RwLock<DisplayModel>>,
        session: SharedSession,
        metrics: Arc<LinkMetrics>,
    ) -> Result<Self> {
        let state_for_filter = state.clone();
        let state_filter = warp::any().map(move || state_for_filter.clone());
        let metrics_for_filter = metrics.clone();
        let metrics_filter = warp::any().map(move || metrics_for_filter.clone());
        let session_filter = warp::any().map(move || session.clone());
        let defaults = config.clone();
        let config_filter = warp::any().map(move || defaults.clone());

        let state_route = warp::path("state")
            .and(warp::get())
            .and(state_filter)
            .and(metrics_filter)
            .map(
                |state: Arc<RwLock<DisplayModel>>, metrics: Arc<LinkMetrics>| {
                    match snapshot(&state, &metrics) {
                        Ok(model) => {
                            warp::reply::with_status(warp::reply::json(&model), StatusCode::OK)
                        }
                        Err(err) => error_reply(StatusCode::INTERNAL_SERVER_ERROR, &err),
                    }
                },
            );

        let ports_route = warp::path("ports").and(warp::get()).map(|| {
            match available_ports() {
                Ok(ports) => warp::reply::with_status(
                    warp::reply::json(&json!({ "ports": ports })),
                    StatusCode::OK,
                ),
                Err(err) => error_reply(StatusCode::INTERNAL_SERVER_ERROR, &anyhow!(err)),
            }
        });

        let connect_route = warp::path("connect")
            .and(warp::post())
            .and(warp::body::json())
            .and(session_filter.clone())
            .and(config_filter)
            .and_then(
                |request: ConnectRequest, session: SharedSession, config: StationConfig| async move {
                    let source = LinkSource::Serial(
                        config.reader_config_for(&request.port, request.baud_rate),
                    );
                    let outcome = tokio::task::spawn_blocking(move || {
                        let mut session = session
                            .lock()
                            .map_err(|_| anyhow!("session lock poisoned"))?;
                        session.connect(source)
                    })
                    .await;
                    let reply = match outcome {
                        Ok(Ok(endpoint)) => warp::reply::with_status(
                            warp::reply::json(&json!({ "status": "ok", "endpoint": endpoint })),
                            StatusCode::OK,
                        ),
                        Ok(Err(err)) => {
                            error!("connect error: {:#}", err);
                            error_reply(StatusCode::SERVICE_UNAVAILABLE, &err)
                        }
                        Err(err) => error_reply(StatusCode::INTERNAL_SERVER_ERROR, &anyhow!(err)),
                    };
                    Ok::<_, warp::Rejection>(reply)
                },
            );

        let disconnect_route = warp::path("disconnect")
            .and(warp::post())
            .and(session_filter)
            .and_then(|session: SharedSession| async move {
                let outcome = tokio::task::spawn_blocking(move || {
                    let mut session = session
                        .lock()
                        .map_err(|_| anyhow!("session lock poisoned"))?;
                    Ok::<_, anyhow::Error>(session.disconnect())
                })
                .await;
                let reply = match outcome {
                    Ok(Ok(was_running)) => warp::reply::with_status(
                        warp::reply::json(&json!({ "status": "ok", "was_running": was_running })),
                        StatusCode::OK,
                    ),
                    Ok(Err(err)) => error_reply(StatusCode::INTERNAL_SERVER_ERROR, &err),
                    Err(err) => error_reply(StatusCode::INTERNAL_SERVER_ERROR, &anyhow!(err)),
                };
                Ok::<_, warp::Rejection>(reply)
            });

        let routes = state_route
            .or(ports_route)
            .or(connect_route)
            .or(disconnect_route);

        let bind = config.bind;
        let (bound_tx, bound_rx) = mpsc::channel();
        thread::Builder::new()
            .name("gui-bridge".into())
            .spawn(move || {
                let runtime = match Builder::new_current_thread().enable_all().build() {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        let _ = bound_tx.send(Err(anyhow!(err).context("building bridge runtime")));
                        return;
                    }
                };
                runtime.block_on(async move {
                    match warp::serve(routes).try_bind_ephemeral(bind) {
                        Ok((address, server)) => {
                            let _ = bound_tx.send(Ok(address));
                            server.await;
                        }
                        Err(err) => {
                            let _ = bound_tx
                                .send(Err(anyhow!(err).context(format!("binding bridge to {}", bind))));
                        }
                    }
                });
            })
            .context("spawning bridge thread")?;

        let address = bound_rx
            .recv()
            .context("bridge thread exited before binding")??;
        info!("GUI bridge listening on http://{}", address);

        Ok(Self {
            address,
            state,
            metrics,
        })
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn publish_status(&self, message: &str) {
        info!("[GUI] {}", message);
        if let Ok(mut guard) = self.state.write() {
            guard.push_console(format!("[station] {}", message));
        }
    }

    pub fn snapshot(&self) -> Result<DisplayModel> {
        snapshot(&self.state, &self.metrics)
    }
}

fn snapshot(state: &RwLock<DisplayModel>, metrics: &LinkMetrics) -> Result<DisplayModel> {
    let mut model = state
        .read()
        .map_err(|_| anyhow!("display state poisoned"))?
        .clone();
    model.stats = metrics.snapshot();
    Ok(model)
}

fn error_reply(
    status: StatusCode,
    err: &anyhow::Error,
) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(
        warp::reply::json(&json!({ "status": "error", "message": format!("{:#}", err) })),
        status,
    )
}
