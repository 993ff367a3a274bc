use anyhow::{anyhow, Context};
use clap::Parser;
use groundcore::prelude::TelemetrySink;
use groundcore::reader::{available_ports, DEFAULT_BAUD_RATE};
use groundcore::telemetry::{DiagnosticLog, LinkMetrics};
use gui_bridge::{DisplayModel, DisplaySink, GuiBridge};
use log::{error, info, warn};
use relay::WebhookRelay;
use session::{LinkSource, Session, StationConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;

mod generator;
mod gui_bridge;
mod relay;
mod session;

#[derive(Parser)]
#[command(author, version, about = "CANSAT ground-station downlink driver")]
struct Args {
    /// Load station settings from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Serial device to open at startup (e.g. /dev/ttyUSB0 or COM7)
    #[arg(long)]
    port: Option<String>,
    #[arg(long)]
    baud: Option<u32>,
    /// Collector URL receiving one JSON POST per packet
    #[arg(long)]
    webhook: Option<String>,
    /// Do not relay packets even if the config names a webhook
    #[arg(long, default_value_t = false)]
    no_relay: bool,
    /// Replay a captured downlink file instead of opening a port
    #[arg(long, conflicts_with_all = ["port", "simulate"])]
    replay: Option<PathBuf>,
    /// Feed the station from the built-in flight simulator
    #[arg(long, default_value_t = false, conflicts_with = "port")]
    simulate: bool,
    /// Print the serial ports present on this machine and exit
    #[arg(long, default_value_t = false)]
    list_ports: bool,
    /// Address for the visualizer bridge
    #[arg(long)]
    bind: Option<SocketAddr>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.list_ports {
        let ports = available_ports()?;
        if ports.is_empty() {
            println!("No serial ports found.");
        }
        for port in ports {
            println!("{}", port);
        }
        return Ok(());
    }

    let mut config = if let Some(path) = &args.config {
        StationConfig::load(path)?
    } else {
        StationConfig::from_args(
            args.port.clone(),
            args.baud.unwrap_or(DEFAULT_BAUD_RATE),
            args.webhook.clone(),
        )
    };
    config.apply_overrides(args.port.clone(), args.baud, args.webhook.clone(), args.bind);
    if args.no_relay {
        config.webhook_url = None;
    }

    let metrics = Arc::new(LinkMetrics::new());
    let display = Arc::new(RwLock::new(DisplayModel::with_limits(
        config.history_limit,
        config.console_limit,
    )));

    let mut sinks: Vec<Box<dyn TelemetrySink>> = vec![
        Box::new(DisplaySink::new(display.clone())),
        Box::new(DiagnosticLog::new()),
    ];
    match &config.webhook_url {
        Some(url) => {
            let relay = WebhookRelay::new(url.clone(), config.relay_timeout(), config.relay_queue)?;
            info!("relaying packets to {}", relay.url());
            sinks.push(Box::new(relay));
        }
        None => warn!("no webhook configured, relay disabled"),
    }

    let session = Arc::new(Mutex::new(Session::new(sinks, metrics.clone())?));
    let gui_bridge = GuiBridge::start(&config, display, session.clone(), metrics)?;

    let initial = if let Some(path) = args.replay {
        Some(LinkSource::Replay(path))
    } else if args.simulate {
        Some(LinkSource::Simulated(config.simulation.clone()))
    } else {
        config.reader_config().map(LinkSource::Serial)
    };

    if let Some(source) = initial {
        let outcome = session
            .lock()
            .map_err(|_| anyhow!("session lock poisoned"))?
            .connect(source);
        match outcome {
            Ok(endpoint) => gui_bridge.publish_status(&format!("Downlink on {}", endpoint)),
            // The operator can still pick another port from the visualizer.
            Err(err) => {
                error!("{:#}", err);
                gui_bridge.publish_status(&format!("Connection failed: {:#}", err));
            }
        }
    } else {
        gui_bridge.publish_status("No port configured; waiting for a connect request.");
    }

    gui_bridge.publish_status(&format!(
        "HTTP bridge running on {} (Ctrl+C to stop)...",
        gui_bridge.address()
    ));
    let runtime = TokioBuilder::new_current_thread()
        .enable_all()
        .build()
        .context("creating runtime for signal handling")?;
    runtime.block_on(async {
        signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
        Ok::<(), anyhow::Error>(())
    })?;

    {
        let mut session = session
            .lock()
            .map_err(|_| anyhow!("session lock poisoned"))?;
        if let Some(endpoint) = session.active_endpoint() {
            info!("closing downlink on {}", endpoint);
        }
        session.shutdown();
    }
    let stats = gui_bridge.snapshot()?.stats;
    println!(
        "Session summary -> lines {}, packets {}, rejected {}, deliveries {}, failed deliveries {}, dropped {}",
        stats.lines, stats.packets, stats.rejected, stats.delivered, stats.failed, stats.dropped
    );

    Ok(())
}
