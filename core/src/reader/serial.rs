use super::{ReaderConfig, ReaderError};
use log::info;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

/// Opens the endpoint as 8N1 without flow control, with the configured read
/// timeout so the reader can poll its stop flag between reads.
pub fn open_port(config: &ReaderConfig) -> Result<Box<dyn SerialPort>, ReaderError> {
    let port = serialport::new(config.endpoint.as_str(), config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(config.read_timeout)
        .open()
        .map_err(|source| ReaderError::Open {
            endpoint: config.endpoint.clone(),
            source,
        })?;

    info!(
        "Opened serial port: {} at {} baud",
        config.endpoint, config.baud_rate
    );
    Ok(port)
}

/// Names of the serial devices currently present on this machine.
pub fn available_ports() -> Result<Vec<String>, ReaderError> {
    let ports = serialport::available_ports().map_err(ReaderError::Enumerate)?;
    Ok(ports.into_iter().map(|port| port.port_name).collect())
}
