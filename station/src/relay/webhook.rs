use anyhow::Context;
use groundcore::packet::TelemetryRecord;
use groundcore::prelude::{SinkError, SinkResult, TelemetrySink};
use log::debug;
use reqwest::blocking::Client;
use std::time::Duration;

/// Posts every decoded packet to an external collector as JSON.
///
/// Best effort only: each POST is bounded by the client timeout, failures are
/// reported back to the fan-out (which logs them) and never retried.
pub struct WebhookRelay {
    url: String,
    client: Client,
    queue: usize,
}

impl WebhookRelay {
    pub fn new(url: impl Into<String>, timeout: Duration, queue: usize) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .context("building webhook client")?;
        Ok(Self {
            url: url.into(),
            client,
            queue,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl TelemetrySink for WebhookRelay {
    fn name(&self) -> &str {
        "webhook"
    }

    fn on_record(&mut self, record: &TelemetryRecord) -> SinkResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(record)
            .send()
            .map_err(|err| SinkError::Delivery(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Rejected {
                status: status.as_u16(),
            });
        }
        debug!("relayed packet {} ({})", record.sequence, status);
        Ok(())
    }

    fn queue_capacity(&self) -> Option<usize> {
        Some(self.queue.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use groundcore::packet::Vector3;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Instant;

    fn record() -> TelemetryRecord {
        TelemetryRecord {
            sequence: 12,
            latitude: 19.5,
            longitude: -99.1,
            altitude: 305.2,
            pressure: 1002.3,
            temperature: 24.1,
            acceleration: Vector3::new(0.01, 0.02, 9.81),
            angular_rate: Vector3::new(0.1, 0.2, 0.3),
            magnetic_field: Vector3::new(20.1, 5.2, -3.4),
            parachute_deployed: true,
        }
    }

    /// One-shot HTTP collector answering with `status`; hands back the request body.
    fn collector(status: &'static str) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let count = stream.read(&mut buf).unwrap();
                request.extend_from_slice(&buf[..count]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(split) = text.find("\r\n\r\n") {
                    let length = text[..split]
                        .lines()
                        .find_map(|line| {
                            let lower = line.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|value| value.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= split + 4 + length {
                        tx.send(text[split + 4..].to_string()).unwrap();
                        break;
                    }
                }
                if count == 0 {
                    break;
                }
            }
            let reply = format!("HTTP/1.1 {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n", status);
            stream.write_all(reply.as_bytes()).unwrap();
        });
        (url, rx)
    }

    #[test]
    fn posts_record_json_to_collector() {
        let (url, bodies) = collector("200 OK");
        let mut relay = WebhookRelay::new(url, Duration::from_secs(2), 8).unwrap();
        relay.on_record(&record()).unwrap();

        let body = bodies.recv_timeout(Duration::from_secs(2)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["numpaq"], 12);
        assert_eq!(json["alt"], 305.2);
        assert_eq!(json["acel"]["z"], 9.81);
        assert_eq!(json["paracaidas"], true);
    }

    #[test]
    fn non_success_status_is_a_rejection() {
        let (url, _bodies) = collector("500 Internal Server Error");
        let mut relay = WebhookRelay::new(url, Duration::from_secs(2), 8).unwrap();
        assert!(matches!(
            relay.on_record(&record()),
            Err(SinkError::Rejected { status: 500 })
        ));
    }

    #[test]
    fn unreachable_collector_fails_within_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        drop(listener);

        let mut relay = WebhookRelay::new(url, Duration::from_millis(500), 8).unwrap();
        let started = Instant::now();
        assert!(matches!(
            relay.on_record(&record()),
            Err(SinkError::Delivery(_))
        ));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(relay.queue_capacity(), Some(8));
    }
}
