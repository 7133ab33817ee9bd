use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use codec_csv::CsvRowWriter;
use relay_api::LoggedRecord;

use crate::PipelineError;

const HEADER: [&str; 3] = ["time", "topic", "payload"];

/// Имя файла сессии: `YYYYMMDD_HHMMSS.csv` по локальному времени старта.
pub fn session_file_name(started: &DateTime<Local>) -> String {
    format!("{}.csv", started.format("%Y%m%d_%H%M%S"))
}

enum Event {
    Record(LoggedRecord),
    Flush,
    Closed,
    Cancelled,
}

/// Итог работы logger'а.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoggerStats {
    pub rows: u64,
    pub write_errors: u64,
    pub flushes: u64,
}

// ═══════════════════════════════════════════════════════════════
//  Durable Logger — append-only CSV, flush по таймеру
// ═══════════════════════════════════════════════════════════════

/// Один CSV файл на запуск relay: `time,topic,payload`.
pub struct DurableLogger {
    path: PathBuf,
    writer: BufWriter<File>,
    rows: CsvRowWriter,
    line: String,
}

impl DurableLogger {
    /// Создать каталог и файл сессии, записать заголовок.
    ///
    /// Существующий файл никогда не перезаписывается: при совпадении имени
    /// добавляется суффикс `_1`, `_2`, ...
    pub fn create(data_dir: &Path, started: &DateTime<Local>, rows: CsvRowWriter) -> Result<Self, PipelineError> {
        fs::create_dir_all(data_dir).map_err(|source| PipelineError::LogCreate {
            path: data_dir.to_path_buf(),
            source,
        })?;

        let name = session_file_name(started);
        let stem = name.trim_end_matches(".csv");
        let mut path = data_dir.join(&name);
        let mut attempt = 0u32;
        let file = loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => break file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempt < 100 => {
                    attempt += 1;
                    path = data_dir.join(format!("{stem}_{attempt}.csv"));
                }
                Err(source) => return Err(PipelineError::LogCreate { path, source }),
            }
        };

        let mut logger = Self { path, writer: BufWriter::new(file), rows, line: String::with_capacity(256) };
        logger.rows.write_row(&HEADER, &mut logger.line);
        let header = std::mem::take(&mut logger.line);
        let written = logger.writer.write_all(header.as_bytes()).and_then(|()| logger.flush());
        if let Err(source) = written {
            return Err(PipelineError::LogCreate { path: logger.path, source });
        }

        tracing::info!(path = %logger.path.display(), "durable log created");
        Ok(logger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Запустить [`run`](Self::run) на blocking потоке текущего runtime.
    pub fn spawn(
        self,
        rx: mpsc::Receiver<LoggedRecord>,
        flush_interval: Duration,
        token: CancellationToken,
    ) -> JoinHandle<LoggerStats> {
        let handle = Handle::current();
        tokio::task::spawn_blocking(move || self.run(rx, flush_interval, token, &handle))
    }

    /// Главный цикл: запись каждой полученной строки, flush + fsync по
    /// дедлайну. Блокирующий: диск трогается только с вызывающего потока,
    /// runtime используется лишь для ожидания очереди, таймера и отмены.
    ///
    /// Завершается, когда очередь закрыта (reader закончил) или по отмене;
    /// в обоих случаях уже принятые в очередь записи дописываются и файл
    /// сбрасывается на диск.
    pub fn run(
        mut self,
        mut rx: mpsc::Receiver<LoggedRecord>,
        flush_interval: Duration,
        token: CancellationToken,
        handle: &Handle,
    ) -> LoggerStats {
        let mut stats = LoggerStats::default();
        let mut deadline = Instant::now() + flush_interval;

        loop {
            let event = handle.block_on(async {
                tokio::select! {
                    rec = rx.recv() => rec.map_or(Event::Closed, Event::Record),
                    _ = tokio::time::sleep_until(deadline) => Event::Flush,
                    _ = token.cancelled() => Event::Cancelled,
                }
            });

            match event {
                Event::Record(rec) => self.append(&rec, &mut stats),
                Event::Flush => {
                    self.flush_counted(&mut stats);
                    deadline = Instant::now() + flush_interval;
                }
                Event::Closed => break,
                Event::Cancelled => {
                    while let Ok(rec) = rx.try_recv() {
                        self.append(&rec, &mut stats);
                    }
                    break;
                }
            }
        }

        self.flush_counted(&mut stats);
        tracing::info!(
            path = %self.path.display(),
            rows = stats.rows,
            write_errors = stats.write_errors,
            "durable log closed"
        );
        stats
    }

    fn append(&mut self, rec: &LoggedRecord, stats: &mut LoggerStats) {
        self.line.clear();
        let time = rec.time.to_string();
        self.rows.write_row(
            &[time.as_str(), rec.record.topic.as_str(), rec.record.payload.as_str()],
            &mut self.line,
        );
        match self.writer.write_all(self.line.as_bytes()) {
            Ok(()) => stats.rows += 1,
            Err(e) => {
                stats.write_errors += 1;
                tracing::error!(path = %self.path.display(), error = %e, "write error");
            }
        }
    }

    fn flush_counted(&mut self, stats: &mut LoggerStats) {
        match self.flush() {
            Ok(()) => stats.flushes += 1,
            Err(e) => {
                stats.write_errors += 1;
                tracing::error!(path = %self.path.display(), error = %e, "flush error");
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()
    }
}
