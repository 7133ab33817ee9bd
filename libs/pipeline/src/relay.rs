use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use codec_csv::CsvRowWriter;
use codec_json::JsonCodec;
use framing_lines::LinesFraming;
use relay_api::{Codec, Framing, OverflowPolicy, SessionClock, TimeMode, Transport};

use crate::config::{ForwardConfig, LogConfig, RelayTarget};
use crate::forwarder::{Forwarder, ForwarderStats};
use crate::logger::{DurableLogger, LoggerStats};
use crate::reader::{ReaderStats, StreamReader};
use crate::PipelineError;

// ═══════════════════════════════════════════════════════════════
//  Settings / parts
// ═══════════════════════════════════════════════════════════════

/// Разобранные параметры relay (durations, разделитель и т.д.).
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub data_dir: PathBuf,
    pub flush_interval: Duration,
    pub time_mode: TimeMode,
    pub delimiter: char,
    pub log_buffer: usize,
    pub log_overflow: OverflowPolicy,
    pub forward_buffer: usize,
    pub every: u64,
    pub retry: Duration,
    pub poll: Duration,
    pub drain: Duration,
}

impl RelaySettings {
    pub fn from_config(log: &LogConfig, forward: &ForwardConfig) -> Result<Self, PipelineError> {
        let delimiter = codec_csv::parse_delimiter(&log.delimiter)
            .map_err(|e| PipelineError::Config(format!("log.delimiter: {}", e.message())))?;
        Ok(Self {
            data_dir: log.data_dir.clone(),
            flush_interval: Duration::from_millis(log.flush_interval_ms),
            time_mode: log.time_mode,
            delimiter,
            log_buffer: log.buffer,
            log_overflow: log.overflow,
            forward_buffer: forward.buffer,
            every: forward.every,
            retry: Duration::from_millis(forward.retry_ms),
            poll: Duration::from_millis(forward.poll_ms),
            drain: Duration::from_millis(forward.drain_ms),
        })
    }
}

/// Framing + codec + transport одного relay.
pub struct RelayParts {
    pub framing: Arc<dyn Framing>,
    pub codec: Arc<dyn Codec>,
    pub transport: Box<dyn Transport>,
}

impl RelayParts {
    /// Строки JSON на входе и выходе, transport по адресу target.
    pub fn new(max_line: usize, target: &RelayTarget) -> Self {
        Self {
            framing: Arc::new(LinesFraming::new(max_line)),
            codec: Arc::new(JsonCodec),
            transport: target.transport(),
        }
    }
}

/// Итог одного запуска relay.
#[derive(Debug, Clone)]
pub struct RelayReport {
    pub log_path: PathBuf,
    /// `None`, если запуск отменён до конца входного потока.
    pub reader: Option<ReaderStats>,
    pub logger: LoggerStats,
    pub forwarder: ForwarderStats,
}

// ═══════════════════════════════════════════════════════════════
//  run_relay — reader → {logger, forwarder}
// ═══════════════════════════════════════════════════════════════

/// Запустить relay над `input` до конца потока или отмены `token`.
///
/// Файл лога создаётся до запуска задач: ошибка создания возвращается
/// сразу. После EOF logger дописывает очередь, forwarder получает
/// `drain` на отправку остатка и затем отменяется.
pub async fn run_relay<R: Read + Send + 'static>(
    input: R,
    parts: RelayParts,
    settings: RelaySettings,
    token: CancellationToken,
) -> Result<RelayReport, PipelineError> {
    let clock = SessionClock::start(settings.time_mode);
    let logger = DurableLogger::create(&settings.data_dir, &Local::now(), CsvRowWriter::new(settings.delimiter))?;
    let log_path = logger.path().to_path_buf();

    let (log_tx, log_rx) = mpsc::channel(settings.log_buffer);
    let (fwd_tx, fwd_rx) = mpsc::channel(settings.forward_buffer);

    let logger_handle = logger.spawn(log_rx, settings.flush_interval, token.clone());

    let fwd_token = token.child_token();
    let forwarder = Forwarder::new(
        parts.transport,
        parts.codec.clone(),
        parts.framing.clone(),
        settings.every,
        settings.retry,
        settings.poll,
    );
    let mut fwd_handle = tokio::spawn(forwarder.run(fwd_rx, fwd_token.clone()));

    let reader = StreamReader::new(parts.framing, parts.codec, clock, settings.log_overflow);
    let mut reader_handle = tokio::task::spawn_blocking(move || reader.run(input, log_tx, fwd_tx));
    tracing::info!(path = %log_path.display(), "relay started");

    let reader_stats = tokio::select! {
        res = &mut reader_handle => match res.map_err(PipelineError::from).and_then(|r| r) {
            Ok(stats) => Some(stats),
            Err(e) => {
                fwd_token.cancel();
                return Err(e);
            }
        },
        _ = token.cancelled() => {
            // Blocking read не прерывается; поток завершится на следующем read
            tracing::warn!("relay cancelled, abandoning input reader");
            None
        }
    };

    let logger_stats = logger_handle.await?;

    let forwarder_stats = match tokio::time::timeout(settings.drain, &mut fwd_handle).await {
        Ok(res) => res?,
        Err(_) => {
            tracing::debug!("forward drain timed out, cancelling");
            fwd_token.cancel();
            fwd_handle.await?
        }
    };

    Ok(RelayReport { log_path, reader: reader_stats, logger: logger_stats, forwarder: forwarder_stats })
}
