use std::future::Future;
use std::pin::Pin;

use crate::{RawRecord, RelayError};

// ════════════════════════════════════════════════════════════════
//  Pipeline Traits
// ════════════════════════════════════════════════════════════════

/// Framing — определение границ сообщений в потоке байтов.
///
/// Реализации должны быть stateless — всё состояние буферизации хранится
/// у вызывающего.
pub trait Framing: Send + Sync {
    /// Извлечь один фрейм из буфера.
    /// Возвращает (frame_data, bytes_consumed) или None если фрейм неполный.
    fn decode(&self, buf: &[u8]) -> Result<Option<(Vec<u8>, usize)>, RelayError>;

    /// Добавить framed данные в выходной буфер.
    fn encode(&self, data: &[u8], buf: &mut Vec<u8>) -> Result<(), RelayError>;
}

/// Codec — парсер формата записи: bytes ↔ RawRecord.
///
/// Отвечает ТОЛЬКО за разделение topic/payload, payload остаётся непрозрачным.
pub trait Codec: Send + Sync {
    fn decode(&self, data: &[u8]) -> Result<RawRecord, RelayError>;

    fn encode(&self, record: &RawRecord) -> Result<Vec<u8>, RelayError>;
}

/// Исходящий байтовый поток к relay target.
pub trait TransportStream: tokio::io::AsyncWrite + Send + Unpin {
    /// Описание удалённой стороны (для логирования).
    fn peer_info(&self) -> String {
        "unknown".into()
    }
}

impl TransportStream for tokio::net::UnixStream {
    fn peer_info(&self) -> String {
        self.peer_addr()
            .ok()
            .and_then(|a| a.as_pathname().map(|p| p.display().to_string()))
            .unwrap_or_else(|| "?".into())
    }
}

impl TransportStream for tokio::net::TcpStream {
    fn peer_info(&self) -> String {
        self.peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "?".into())
    }
}

/// Transport — клиентская сторона исходящего соединения.
///
/// Каждый вызов `connect` открывает новое соединение; повторные попытки
/// и задержки — ответственность вызывающего.
pub trait Transport: Send + Sync {
    fn connect(&self) -> Pin<Box<dyn Future<Output = Result<Box<dyn TransportStream>, RelayError>> + Send + '_>>;

    /// Адрес цели (для логирования).
    fn target(&self) -> String;
}
