use std::io::Read;

use pipeline::config::InputConfig;

use crate::error::RunError;

/// Открыть источник строк устройства.
///
/// `-` — stdin. С feature `serial` путь открывается как serial port
/// (8N1, `baud`, `read_timeout_ms`), иначе как обычный файл или FIFO.
pub fn open_input(cfg: &InputConfig) -> Result<Box<dyn Read + Send>, RunError> {
    if cfg.device == "-" {
        tracing::info!("reading from stdin");
        return Ok(Box::new(std::io::stdin()));
    }
    open_device(cfg)
}

#[cfg(feature = "serial")]
fn open_device(cfg: &InputConfig) -> Result<Box<dyn Read + Send>, RunError> {
    let port = serialport::new(&cfg.device, cfg.baud)
        .timeout(std::time::Duration::from_millis(cfg.read_timeout_ms))
        .data_bits(serialport::DataBits::Eight)
        .stop_bits(serialport::StopBits::One)
        .parity(serialport::Parity::None)
        .flow_control(serialport::FlowControl::None)
        .open()
        .map_err(|e| RunError::Input { device: cfg.device.clone(), detail: e.to_string() })?;
    tracing::info!(device = %cfg.device, baud = cfg.baud, "serial port opened");
    Ok(Box::new(port))
}

#[cfg(not(feature = "serial"))]
fn open_device(cfg: &InputConfig) -> Result<Box<dyn Read + Send>, RunError> {
    let file = std::fs::File::open(&cfg.device)
        .map_err(|e| RunError::Input { device: cfg.device.clone(), detail: e.to_string() })?;
    tracing::info!(device = %cfg.device, "device opened");
    Ok(Box::new(file))
}
