use std::path::PathBuf;

use serde::Deserialize;

use relay_api::{OverflowPolicy, TimeMode, Transport};
use transport_tcp_client::TcpClientTransport;
use transport_unix_client::UnixClientTransport;

use crate::PipelineError;

// ═══════════════════════════════════════════════════════════════
//  Input Config
// ═══════════════════════════════════════════════════════════════

/// Источник строк телеметрии.
#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    /// Путь к устройству (serial port, FIFO, файл). "-" = stdin.
    #[serde(default = "default_device")]
    pub device: String,
    /// Скорость порта (используется только с feature `serial`).
    #[serde(default = "default_baud")]
    pub baud: u32,
    /// Максимальная длина строки в байтах (0 = без ограничения).
    /// Более длинные строки пропускаются до следующего '\n'.
    #[serde(default = "default_max_line")]
    pub max_line: usize,
    /// Таймаут чтения serial порта.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            baud: default_baud(),
            max_line: default_max_line(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl InputConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.device.is_empty() {
            return Err("input: 'device' must not be empty".into());
        }
        if self.baud == 0 {
            return Err("input: 'baud' must be > 0".into());
        }
        Ok(())
    }
}

fn default_device() -> String {
    "/dev/serial0".into()
}
fn default_baud() -> u32 {
    115_200
}
fn default_max_line() -> usize {
    64 * 1024
}
fn default_read_timeout_ms() -> u64 {
    500
}

// ═══════════════════════════════════════════════════════════════
//  Log Config
// ═══════════════════════════════════════════════════════════════

/// Durable лог: CSV файл на сессию.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Каталог для файлов сессий.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Период принудительного flush на диск.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// Формат колонки `time`.
    #[serde(default)]
    pub time_mode: TimeMode,
    /// Разделитель CSV.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Размер очереди reader → logger.
    #[serde(default = "default_queue_buffer")]
    pub buffer: usize,
    /// Стратегия переполнения очереди logger'а. По умолчанию reader ждёт
    /// (без потерь); `drop` делает приём неблокирующим ценой потери строк.
    #[serde(default = "default_log_overflow")]
    pub overflow: OverflowPolicy,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            flush_interval_ms: default_flush_interval_ms(),
            time_mode: TimeMode::default(),
            delimiter: default_delimiter(),
            buffer: default_queue_buffer(),
            overflow: default_log_overflow(),
        }
    }
}

impl LogConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.flush_interval_ms == 0 {
            return Err("log: 'flush_interval_ms' must be > 0".into());
        }
        if self.buffer == 0 {
            return Err("log: 'buffer' must be > 0".into());
        }
        codec_csv::parse_delimiter(&self.delimiter).map_err(|e| format!("log: {e}"))?;
        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_flush_interval_ms() -> u64 {
    1000
}
fn default_delimiter() -> String {
    ",".into()
}
fn default_queue_buffer() -> usize {
    1000
}
fn default_log_overflow() -> OverflowPolicy {
    OverflowPolicy::BackPressure
}

// ═══════════════════════════════════════════════════════════════
//  Forward Config
// ═══════════════════════════════════════════════════════════════

/// Downsampling forwarder: 1 из `every` записей каждого topic'а → relay target.
#[derive(Debug, Clone, Deserialize)]
pub struct ForwardConfig {
    /// `unix:/path`, `/path` или `tcp:host:port`.
    #[serde(default = "default_target")]
    pub target: String,
    /// Размер очереди reader → forwarder (drop-on-full).
    #[serde(default = "default_queue_buffer")]
    pub buffer: usize,
    /// Пересылать каждую N-ю запись topic'а.
    #[serde(default = "default_every")]
    pub every: u64,
    /// Фиксированная задержка между попытками подключения.
    #[serde(default = "default_retry_ms")]
    pub retry_ms: u64,
    /// Интервал опроса очереди в состоянии Connected.
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
    /// Сколько ждать дренажа очереди после окончания входного потока.
    #[serde(default = "default_drain_ms")]
    pub drain_ms: u64,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            target: default_target(),
            buffer: default_queue_buffer(),
            every: default_every(),
            retry_ms: default_retry_ms(),
            poll_ms: default_poll_ms(),
            drain_ms: default_drain_ms(),
        }
    }
}

impl ForwardConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.every == 0 {
            return Err("forward: 'every' must be > 0".into());
        }
        if self.buffer == 0 {
            return Err("forward: 'buffer' must be > 0".into());
        }
        if self.retry_ms == 0 || self.poll_ms == 0 {
            return Err("forward: 'retry_ms' and 'poll_ms' must be > 0".into());
        }
        RelayTarget::parse(&self.target).map_err(|e| format!("forward: {e}"))?;
        Ok(())
    }
}

fn default_target() -> String {
    "unix:/tmp/serial.sock".into()
}
fn default_every() -> u64 {
    10
}
fn default_retry_ms() -> u64 {
    10
}
fn default_poll_ms() -> u64 {
    1
}
fn default_drain_ms() -> u64 {
    500
}

// ═══════════════════════════════════════════════════════════════
//  Relay target
// ═══════════════════════════════════════════════════════════════

/// Адрес процесса-получателя downsampled записей.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayTarget {
    Unix(PathBuf),
    Tcp(String),
}

impl RelayTarget {
    pub fn parse(s: &str) -> Result<Self, PipelineError> {
        if let Some(path) = s.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(PipelineError::Config(format!("empty unix socket path in target {s:?}")));
            }
            return Ok(RelayTarget::Unix(PathBuf::from(path)));
        }
        if let Some(addr) = s.strip_prefix("tcp:") {
            return match addr.rsplit_once(':') {
                Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                    Ok(RelayTarget::Tcp(addr.to_string()))
                }
                _ => Err(PipelineError::Config(format!("expected tcp:host:port, got {s:?}"))),
            };
        }
        if s.starts_with('/') || s.starts_with('.') {
            return Ok(RelayTarget::Unix(PathBuf::from(s)));
        }
        Err(PipelineError::Config(format!(
            "unsupported target {s:?} (expected unix:/path or tcp:host:port)"
        )))
    }

    pub fn transport(&self) -> Box<dyn Transport> {
        match self {
            RelayTarget::Unix(path) => Box::new(UnixClientTransport::new(path)),
            RelayTarget::Tcp(addr) => Box::new(TcpClientTransport::new(addr.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_targets() {
        assert_eq!(
            RelayTarget::parse("unix:/tmp/serial.sock").unwrap(),
            RelayTarget::Unix("/tmp/serial.sock".into())
        );
        assert_eq!(RelayTarget::parse("/run/relay.sock").unwrap(), RelayTarget::Unix("/run/relay.sock".into()));
        assert_eq!(RelayTarget::parse("tcp:127.0.0.1:1883").unwrap(), RelayTarget::Tcp("127.0.0.1:1883".into()));
        assert!(RelayTarget::parse("tcp:localhost").is_err());
        assert!(RelayTarget::parse("unix:").is_err());
        assert!(RelayTarget::parse("mqtt://broker").is_err());
    }

    #[test]
    fn transport_reports_target() {
        let t = RelayTarget::parse("unix:/tmp/serial.sock").unwrap().transport();
        assert_eq!(t.target(), "unix:/tmp/serial.sock");
    }

    #[test]
    fn defaults_are_valid() {
        assert!(InputConfig::default().validate().is_ok());
        assert!(LogConfig::default().validate().is_ok());
        assert!(ForwardConfig::default().validate().is_ok());
        assert_eq!(ForwardConfig::default().every, 10);
        assert_eq!(InputConfig::default().max_line, 65536);
        assert_eq!(LogConfig::default().overflow, OverflowPolicy::BackPressure);
    }

    #[test]
    fn rejects_zero_sampling() {
        let cfg = ForwardConfig { every: 0, ..ForwardConfig::default() };
        assert!(cfg.validate().unwrap_err().contains("every"));
    }
}
