use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ════════════════════════════════════════════════════════════════
//  Overflow Policy
// ════════════════════════════════════════════════════════════════

/// Стратегия поведения при переполнении bounded канала.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// try_send(): если канал полон — пропустить запись.
    Drop,
    /// blocking_send(): ждать пока появится место (back-pressure).
    #[serde(alias = "backpressure")]
    BackPressure,
}

// ════════════════════════════════════════════════════════════════
//  RawRecord
// ════════════════════════════════════════════════════════════════

/// Одна телеметрическая запись с устройства: topic + непрозрачный payload.
///
/// Wire-форма: `{"topic":"water","payload":"{\"t\":1}"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub topic: String,
    #[serde(deserialize_with = "payload_text")]
    pub payload: String,
}

impl RawRecord {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self { topic: topic.into(), payload: payload.into() }
    }
}

/// Payload обычно приходит строкой с экранированным JSON. Если устройство
/// вложило его объектом — сохраняем компактный JSON-текст.
fn payload_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Null => Ok(String::new()),
        other => Ok(other.to_string()),
    }
}

// ════════════════════════════════════════════════════════════════
//  Time stamping
// ════════════════════════════════════════════════════════════════

/// Режим метки времени в durable логе.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeMode {
    /// Абсолютное UTC время (RFC 3339, секунды).
    #[default]
    Absolute,
    /// Миллисекунды с момента старта relay.
    Elapsed,
}

/// Метка времени записи.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordTime {
    Absolute(DateTime<Utc>),
    Elapsed(u64),
}

impl std::fmt::Display for RecordTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordTime::Absolute(ts) => f.write_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true)),
            RecordTime::Elapsed(ms) => write!(f, "{ms}"),
        }
    }
}

/// Часы сессии: режим + момент старта relay.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    mode: TimeMode,
    started: Instant,
}

impl SessionClock {
    pub fn start(mode: TimeMode) -> Self {
        Self { mode, started: Instant::now() }
    }

    pub fn mode(&self) -> TimeMode {
        self.mode
    }

    pub fn stamp(&self) -> RecordTime {
        match self.mode {
            TimeMode::Absolute => RecordTime::Absolute(Utc::now()),
            TimeMode::Elapsed => RecordTime::Elapsed(self.started.elapsed().as_millis() as u64),
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  LoggedRecord
// ════════════════════════════════════════════════════════════════

/// RawRecord + метка времени — то, что попадает в durable лог.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedRecord {
    pub time: RecordTime,
    pub record: RawRecord,
}
