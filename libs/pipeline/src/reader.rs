use std::io::{ErrorKind as IoErrorKind, Read};
use std::sync::Arc;

use tokio::sync::mpsc;

use relay_api::{Codec, Framing, LoggedRecord, OverflowPolicy, RawRecord, SessionClock};

use crate::PipelineError;

// ═══════════════════════════════════════════════════════════════
//  Channel helpers
// ═══════════════════════════════════════════════════════════════

/// Результат отправки в bounded канал.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Queued,
    Dropped,
}

/// Отправить значение из blocking контекста с учётом overflow policy.
/// `Err(())` — получатель закрыт.
fn send_with_overflow<T>(tx: &mpsc::Sender<T>, val: T, overflow: OverflowPolicy) -> Result<Delivery, ()> {
    match overflow {
        OverflowPolicy::Drop => match tx.try_send(val) {
            Ok(()) => Ok(Delivery::Queued),
            Err(mpsc::error::TrySendError::Full(_)) => Ok(Delivery::Dropped),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(()),
        },
        OverflowPolicy::BackPressure => tx.blocking_send(val).map(|()| Delivery::Queued).map_err(|_| ()),
    }
}

// ═══════════════════════════════════════════════════════════════
//  Stream Reader — bytes → framing → codec → {logger, forwarder}
// ═══════════════════════════════════════════════════════════════

/// Счётчики одного прохода reader'а.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Непустые строки.
    pub lines: u64,
    /// Строки, успешно декодированные в RawRecord.
    pub decoded: u64,
    /// Строки, отброшенные framing'ом или codec'ом.
    pub malformed: u64,
    /// Записи, не попавшие в очередь logger'а (только при overflow = drop).
    pub log_dropped: u64,
    /// Записи, не попавшие в очередь forwarder'а.
    pub forward_dropped: u64,
}

/// Единственный производитель записей: читает поток, режет на строки,
/// декодирует и раздаёт каждую запись logger'у и forwarder'у.
///
/// Работает в blocking контексте (`spawn_blocking`), т.к. источник —
/// синхронный `Read` (serial port, FIFO, stdin).
pub struct StreamReader {
    framing: Arc<dyn Framing>,
    codec: Arc<dyn Codec>,
    clock: SessionClock,
    log_overflow: OverflowPolicy,
}

struct Outputs {
    log_tx: mpsc::Sender<LoggedRecord>,
    forward_tx: mpsc::Sender<RawRecord>,
}

impl StreamReader {
    pub fn new(
        framing: Arc<dyn Framing>,
        codec: Arc<dyn Codec>,
        clock: SessionClock,
        log_overflow: OverflowPolicy,
    ) -> Self {
        Self { framing, codec, clock, log_overflow }
    }

    /// Читать `input` до EOF или фатальной ошибки чтения.
    ///
    /// Отправители закрываются при возврате — это сигнал конца потока
    /// для обоих потребителей.
    pub fn run<R: Read>(
        self,
        mut input: R,
        log_tx: mpsc::Sender<LoggedRecord>,
        forward_tx: mpsc::Sender<RawRecord>,
    ) -> Result<ReaderStats, PipelineError> {
        let out = Outputs { log_tx, forward_tx };
        let mut stats = ReaderStats::default();
        let mut buf = Vec::with_capacity(8192);
        let mut tmp = [0u8; 4096];
        // Остаток слишком длинной строки отбрасывается до следующего '\n'
        let mut skipping = false;

        loop {
            loop {
                match self.framing.decode(&buf) {
                    Ok(Some((frame, consumed))) => {
                        buf.drain(..consumed);
                        self.handle_line(&frame, &out, &mut stats)?;
                    }
                    Ok(None) => break,
                    Err(e) => {
                        stats.malformed += 1;
                        tracing::warn!(error = ?e, "bad line, skipping");
                        match buf.iter().position(|&b| b == b'\n') {
                            Some(pos) => {
                                buf.drain(..=pos);
                            }
                            None => {
                                buf.clear();
                                skipping = true;
                                break;
                            }
                        }
                    }
                }
            }

            let n = match input.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if is_transient(e.kind()) => continue,
                Err(e) => {
                    tracing::error!(error = %e, "read error, stopping reader");
                    return Ok(stats);
                }
            };

            let chunk = &tmp[..n];
            if skipping {
                match chunk.iter().position(|&b| b == b'\n') {
                    Some(pos) => {
                        skipping = false;
                        buf.extend_from_slice(&chunk[pos + 1..]);
                    }
                    None => continue,
                }
            } else {
                buf.extend_from_slice(chunk);
            }
        }

        // Последняя строка без '\n' перед EOF
        if !skipping && !buf.is_empty() {
            let line = buf.strip_suffix(b"\r").unwrap_or(&buf[..]);
            self.handle_line(line, &out, &mut stats)?;
        }

        tracing::info!(
            lines = stats.lines,
            decoded = stats.decoded,
            malformed = stats.malformed,
            forward_dropped = stats.forward_dropped,
            "input stream ended"
        );
        Ok(stats)
    }

    fn handle_line(&self, line: &[u8], out: &Outputs, stats: &mut ReaderStats) -> Result<(), PipelineError> {
        if line.is_empty() {
            return Ok(());
        }
        stats.lines += 1;

        let record = match self.codec.decode(line) {
            Ok(record) => record,
            Err(e) => {
                stats.malformed += 1;
                tracing::warn!(error = ?e, line = %String::from_utf8_lossy(line), "bad record, skipping");
                return Ok(());
            }
        };
        stats.decoded += 1;
        tracing::debug!(topic = %record.topic, payload = %record.payload, "received");

        let logged = LoggedRecord { time: self.clock.stamp(), record: record.clone() };
        match send_with_overflow(&out.log_tx, logged, self.log_overflow) {
            Ok(Delivery::Queued) => {}
            Ok(Delivery::Dropped) => {
                stats.log_dropped += 1;
                tracing::warn!(topic = %record.topic, "logger queue full, dropping");
            }
            Err(()) => return Err(PipelineError::LoggerGone),
        }

        // Forwarder никогда не тормозит reader
        match send_with_overflow(&out.forward_tx, record, OverflowPolicy::Drop) {
            Ok(Delivery::Queued) => {}
            Ok(Delivery::Dropped) | Err(()) => {
                stats.forward_dropped += 1;
                tracing::debug!("forward queue full, dropping");
            }
        }
        Ok(())
    }
}

fn is_transient(kind: IoErrorKind) -> bool {
    matches!(kind, IoErrorKind::Interrupted | IoErrorKind::TimedOut | IoErrorKind::WouldBlock)
}
