use groundcore::packet::TelemetryRecord;
use groundcore::telemetry::LinkStats;
use iced::{
    mouse, time,
    widget::{
        button,
        canvas::{self, Canvas, Frame, Geometry, Path, Stroke},
        column, row, scrollable, text, text_input, Column, Container,
    },
    Alignment, Color, Element, Length, Point, Rectangle, Renderer, Subscription, Task, Theme,
};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const DEFAULT_STATION_URL: &str = "http://127.0.0.1:9000";

fn main() -> iced::Result {
    iced::application(Visualizer::boot, Visualizer::update, Visualizer::view)
        .title(application_title)
        .subscription(application_subscription)
        .theme(application_theme)
        .run()
}

fn application_title(_: &Visualizer) -> String {
    "NIGHTRAPTOR - Ground Station".into()
}

fn application_subscription(_: &Visualizer) -> Subscription<Message> {
    time::every(Duration::from_secs(1)).map(|_| Message::Tick)
}

fn application_theme(_: &Visualizer) -> Theme {
    Theme::Dark
}

fn station_url() -> String {
    std::env::var("CANSAT_STATION_URL").unwrap_or_else(|_| DEFAULT_STATION_URL.into())
}

#[derive(Debug)]
struct Visualizer {
    form: PortForm,
    station: Option<StationState>,
    ports: Vec<String>,
    status: String,
    history: Vec<String>,
}

#[derive(Debug, Clone)]
enum Message {
    Tick,
    StateFetched(Result<StationState, String>),
    PortChanged(String),
    BaudChanged(String),
    PortPicked(String),
    RefreshPorts,
    PortsFetched(Result<Vec<String>, String>),
    Connect,
    Disconnect,
    CommandDone(Result<String, String>),
}

impl Visualizer {
    fn boot() -> (Self, Task<Message>) {
        (
            Visualizer {
                form: PortForm::default(),
                station: None,
                ports: Vec::new(),
                status: "Waiting for station...".into(),
                history: Vec::new(),
            },
            Task::batch([
                Task::perform(fetch_state(), Message::StateFetched),
                Task::perform(fetch_ports(), Message::PortsFetched),
            ]),
        )
    }

    fn update(state: &mut Self, message: Message) -> Task<Message> {
        match message {
            Message::Tick => Task::perform(fetch_state(), Message::StateFetched),
            Message::StateFetched(Ok(station)) => {
                state.status = station.connection.describe();
                state.station = Some(station);
                Task::none()
            }
            Message::StateFetched(Err(err)) => {
                state.status = format!("Station unreachable: {err}");
                Task::none()
            }
            Message::PortChanged(value) => {
                state.form.port = value;
                Task::none()
            }
            Message::BaudChanged(value) => {
                state.form.baud_rate = value;
                Task::none()
            }
            Message::PortPicked(port) => {
                state.form.port = port;
                Task::none()
            }
            Message::RefreshPorts => Task::perform(fetch_ports(), Message::PortsFetched),
            Message::PortsFetched(Ok(ports)) => {
                state.push_history(format!("{} port(s) available", ports.len()));
                state.ports = ports;
                Task::none()
            }
            Message::PortsFetched(Err(err)) => {
                state.push_history(format!("Port refresh failed: {err}"));
                Task::none()
            }
            Message::Connect => {
                if state.form.port.trim().is_empty() {
                    state.push_history("Pick a port first".into());
                    return Task::none();
                }
                Task::perform(
                    post_connect(state.form.port.trim().to_string(), state.form.baud()),
                    Message::CommandDone,
                )
            }
            Message::Disconnect => Task::perform(post_disconnect(), Message::CommandDone),
            Message::CommandDone(Ok(message)) => {
                state.push_history(message);
                Task::perform(fetch_state(), Message::StateFetched)
            }
            Message::CommandDone(Err(err)) => {
                state.push_history(format!("Error: {err}"));
                Task::none()
            }
        }
    }

    fn view(state: &Self) -> Element<'_, Message> {
        let port_list = if state.ports.is_empty() {
            Column::new().push(text("No ports listed").size(12))
        } else {
            state
                .ports
                .iter()
                .fold(Column::new().spacing(4), |col, port| {
                    col.push(
                        button(text(port.clone()).size(12))
                            .on_press(Message::PortPicked(port.clone()))
                            .padding(4),
                    )
                })
        };

        let stats = state
            .station
            .as_ref()
            .map(|station| station.stats)
            .unwrap_or_default();

        let history_list = if state.history.is_empty() {
            Column::new().push(text("No activity yet").size(12))
        } else {
            state
                .history
                .iter()
                .rev()
                .fold(Column::new().spacing(4), |col, entry| {
                    col.push(text(entry.clone()).size(12))
                })
        };

        let link_column = column![
            text("Serial Link").size(26),
            text_input("Port (e.g. /dev/ttyUSB0, COM7)", &state.form.port)
                .on_input(Message::PortChanged)
                .padding(6),
            text_input("Baud rate", &state.form.baud_rate)
                .on_input(Message::BaudChanged)
                .padding(6),
            row![
                button("Connect").on_press(Message::Connect).padding(8),
                button("Disconnect").on_press(Message::Disconnect).padding(8),
                button("Refresh").on_press(Message::RefreshPorts).padding(8),
            ]
            .spacing(8),
            text("Available ports").size(16),
            Container::new(scrollable(port_list).height(Length::Fixed(120.0))).padding(6),
            text(&state.status).size(14),
            text(format!(
                "Lines {} | Packets {} | Rejected {}",
                stats.lines, stats.packets, stats.rejected
            ))
            .size(12),
            text(format!(
                "Deliveries {} | Failed {} | Dropped {}",
                stats.delivered, stats.failed, stats.dropped
            ))
            .size(12),
            text("Activity log").size(16),
            Container::new(scrollable(history_list).height(Length::Fixed(120.0))).padding(6),
        ]
        .spacing(10)
        .padding(16)
        .width(Length::Fixed(340.0));

        let latest = state.station.as_ref().and_then(|station| station.latest);
        let history = state
            .station
            .as_ref()
            .map(|station| station.history.clone())
            .unwrap_or_default();
        let track = state
            .station
            .as_ref()
            .map(|station| station.track.clone())
            .unwrap_or_default();
        let console = state
            .station
            .as_ref()
            .map(|station| station.console.clone())
            .unwrap_or_default();

        let console_list = if console.is_empty() {
            Column::new().push(text("No traffic yet").size(12))
        } else {
            console
                .iter()
                .rev()
                .take(60)
                .fold(Column::new().spacing(2), |col, line| {
                    col.push(text(line.clone()).size(12))
                })
        };

        let charts = row![
            chart_panel(
                "Altitude (m)",
                &history,
                |p| p.altitude,
                Color::from_rgb(0.0, 0.92, 1.0)
            ),
            chart_panel(
                "Temperature (°C)",
                &history,
                |p| p.temperature,
                Color::from_rgb(1.0, 0.3, 0.3)
            ),
            chart_panel(
                "Pressure (hPa)",
                &history,
                |p| p.pressure,
                Color::from_rgb(1.0, 0.9, 0.2)
            ),
        ]
        .spacing(12);

        let track_canvas = Canvas::new(TrackMap {
            points: track.iter().map(|p| (p.lng as f32, p.lat as f32)).collect(),
        })
        .width(Length::Fill)
        .height(Length::Fixed(220.0));

        let telemetry_column = column![
            text("Telemetry").size(26),
            text(readout_line(latest.as_ref())).size(16),
            text(parachute_line(latest.as_ref())).size(16),
            text(imu_line(latest.as_ref())).size(16),
            charts,
            row![
                column![
                    text("Position track").size(16),
                    track_canvas,
                    text(orientation_line(latest.as_ref())).size(14),
                ]
                .spacing(6)
                .width(Length::FillPortion(1)),
                column![
                    text("Console").size(16),
                    Container::new(scrollable(console_list).height(Length::Fixed(240.0)))
                        .padding(6),
                ]
                .spacing(6)
                .width(Length::FillPortion(1)),
            ]
            .spacing(12),
        ]
        .spacing(10)
        .padding(16)
        .width(Length::Fill);

        let layout = row![link_column, telemetry_column]
            .spacing(20)
            .align_y(Alignment::Start)
            .padding(20);

        Container::new(layout)
            .width(Length::Fill)
            .height(Length::Fill)
            .center_y(Length::Fill)
            .into()
    }

    fn push_history(&mut self, entry: String) {
        self.history.push(entry);
        if self.history.len() > 20 {
            self.history.remove(0);
        }
    }
}

fn chart_panel<'a>(
    title: &'a str,
    history: &[ChartPoint],
    value: fn(&ChartPoint) -> f64,
    color: Color,
) -> Element<'a, Message> {
    let chart = Canvas::new(LineChart {
        points: history
            .iter()
            .map(|point| (point.sequence as f32, value(point) as f32))
            .collect(),
        color,
    })
    .width(Length::Fill)
    .height(Length::Fixed(180.0));

    column![text(title).size(14), chart]
        .spacing(4)
        .width(Length::FillPortion(1))
        .into()
}

fn readout_line(latest: Option<&TelemetryRecord>) -> String {
    match latest {
        Some(r) => format!(
            "Packet {} | Lat: {} | Lng: {} | Alt: {} m | Pres: {} hPa | Temp: {} °C",
            r.sequence, r.latitude, r.longitude, r.altitude, r.pressure, r.temperature
        ),
        None => "Packet: -- | Lat: -- | Lng: -- | Alt: -- | Pres: -- | Temp: --".into(),
    }
}

fn parachute_line(latest: Option<&TelemetryRecord>) -> String {
    match latest.map(|r| r.parachute_deployed) {
        Some(true) => "Parachute: DEPLOYED".into(),
        Some(false) => "Parachute: STOWED".into(),
        None => "Parachute: ---".into(),
    }
}

fn imu_line(latest: Option<&TelemetryRecord>) -> String {
    match latest {
        Some(r) => format!(
            "Acel: ({}, {}, {}) | Giro: ({}, {}, {}) | Mag: ({}, {}, {})",
            r.acceleration.x,
            r.acceleration.y,
            r.acceleration.z,
            r.angular_rate.x,
            r.angular_rate.y,
            r.angular_rate.z,
            r.magnetic_field.x,
            r.magnetic_field.y,
            r.magnetic_field.z
        ),
        None => "Acel: (0,0,0) | Giro: (0,0,0) | Mag: (0,0,0)".into(),
    }
}

fn orientation_line(latest: Option<&TelemetryRecord>) -> String {
    let (roll, pitch, yaw) = latest
        .map(|r| r.orientation())
        .unwrap_or((0.0, 0.0, 0.0));
    format!("Roll (X)={} | Pitch (Y)={} | Yaw (Z)={}", roll, pitch, yaw)
}

async fn fetch_state() -> Result<StationState, String> {
    let response = reqwest::get(format!("{}/state", station_url()))
        .await
        .map_err(|e| e.to_string())?;
    response
        .json::<StationState>()
        .await
        .map_err(|e| e.to_string())
}

async fn fetch_ports() -> Result<Vec<String>, String> {
    let response = reqwest::get(format!("{}/ports", station_url()))
        .await
        .map_err(|e| e.to_string())?;
    let listing = response
        .json::<PortListing>()
        .await
        .map_err(|e| e.to_string())?;
    Ok(listing.ports)
}

async fn post_connect(port: String, baud_rate: Option<u32>) -> Result<String, String> {
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/connect", station_url()))
        .json(&json!({ "port": port, "baud_rate": baud_rate }))
        .send()
        .await
        .map_err(|e| e.to_string())?;
    command_result(response, format!("Connected to {port}")).await
}

async fn post_disconnect() -> Result<String, String> {
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/disconnect", station_url()))
        .send()
        .await
        .map_err(|e| e.to_string())?;
    command_result(response, "Disconnected".into()).await
}

async fn command_result(response: reqwest::Response, success: String) -> Result<String, String> {
    if response.status().is_success() {
        Ok(success)
    } else {
        let status = response.status();
        let text = response.text().await.unwrap_or_else(|_| "".into());
        Err(format!("{}: {}", status, text))
    }
}

#[derive(Debug, Clone)]
struct PortForm {
    port: String,
    baud_rate: String,
}

impl PortForm {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: "9600".into(),
        }
    }

    fn baud(&self) -> Option<u32> {
        self.baud_rate.trim().parse().ok()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct PortListing {
    #[serde(default)]
    ports: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
enum Connection {
    #[default]
    Disconnected,
    Connected {
        endpoint: String,
    },
    Closed {
        endpoint: String,
        reason: String,
    },
}

impl Connection {
    fn describe(&self) -> String {
        match self {
            Connection::Disconnected => "Status: Disconnected".into(),
            Connection::Connected { endpoint } => format!("Status: Connected to {endpoint}"),
            Connection::Closed { endpoint, reason } => {
                format!("Status: {endpoint} closed ({reason})")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct ChartPoint {
    sequence: u64,
    altitude: f64,
    temperature: f64,
    pressure: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct TrackPoint {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct StationState {
    #[serde(default)]
    connection: Connection,
    #[serde(default)]
    latest: Option<TelemetryRecord>,
    #[serde(default)]
    history: Vec<ChartPoint>,
    #[serde(default)]
    track: Vec<TrackPoint>,
    #[serde(default)]
    console: Vec<String>,
    #[serde(default)]
    stats: LinkStats,
}

/// Scales `points` into `bounds`; x and y ranges never collapse to zero.
fn project(points: &[(f32, f32)], bounds: Rectangle, margin: f32) -> Vec<Point> {
    let (min_x, max_x) = extent(points.iter().map(|p| p.0));
    let (min_y, max_y) = extent(points.iter().map(|p| p.1));
    let span_x = (max_x - min_x).max(f32::EPSILON);
    let span_y = (max_y - min_y).max(f32::EPSILON);
    let width = (bounds.width - 2.0 * margin).max(1.0);
    let height = (bounds.height - 2.0 * margin).max(1.0);
    points
        .iter()
        .map(|(x, y)| {
            Point::new(
                margin + (x - min_x) / span_x * width,
                margin + height - (y - min_y) / span_y * height,
            )
        })
        .collect()
}

fn extent(values: impl Iterator<Item = f32> + Clone) -> (f32, f32) {
    let min = values.clone().fold(f32::INFINITY, f32::min);
    let max = values.fold(f32::NEG_INFINITY, f32::max);
    (min, max)
}

#[derive(Clone)]
struct LineChart {
    points: Vec<(f32, f32)>,
    color: Color,
}

impl canvas::Program<Message> for LineChart {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        frame.fill_rectangle(
            Point::ORIGIN,
            bounds.size(),
            Color::from_rgb(0.05, 0.05, 0.05),
        );

        if self.points.len() > 1 {
            let projected = project(&self.points, bounds, 6.0);
            let path = Path::new(|builder| {
                for (i, point) in projected.iter().enumerate() {
                    if i == 0 {
                        builder.move_to(*point);
                    } else {
                        builder.line_to(*point);
                    }
                }
            });

            frame.stroke(
                &path,
                Stroke::default().with_width(2.0).with_color(self.color),
            );
        }

        vec![frame.into_geometry()]
    }
}

#[derive(Clone)]
struct TrackMap {
    points: Vec<(f32, f32)>,
}

impl canvas::Program<Message> for TrackMap {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        frame.fill_rectangle(
            Point::ORIGIN,
            bounds.size(),
            Color::from_rgb(0.02, 0.02, 0.04),
        );

        if self.points.is_empty() {
            return vec![frame.into_geometry()];
        }

        let projected = project(&self.points, bounds, 12.0);
        if projected.len() > 1 {
            let path = Path::new(|builder| {
                for (i, point) in projected.iter().enumerate() {
                    if i == 0 {
                        builder.move_to(*point);
                    } else {
                        builder.line_to(*point);
                    }
                }
            });
            frame.stroke(
                &path,
                Stroke::default()
                    .with_width(2.0)
                    .with_color(Color::from_rgb(0.95, 0.2, 0.2)),
            );
        }

        if let Some(last) = projected.last() {
            let marker = Path::new(|builder| builder.circle(*last, 5.0));
            frame.fill(&marker, Color::from_rgb(0.95, 0.55, 0.2));
        }

        vec![frame.into_geometry()]
    }
}
