pub mod config;
pub mod error;
mod forwarder;
mod logger;
mod reader;
mod relay;

pub use error::PipelineError;
pub use forwarder::{Forwarder, ForwarderStats, TopicSampler};
pub use logger::{DurableLogger, LoggerStats, session_file_name};
pub use reader::{ReaderStats, StreamReader};
pub use relay::{RelayParts, RelayReport, RelaySettings, run_relay};
