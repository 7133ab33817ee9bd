mod error;
mod pipeline;
mod types;

pub use error::{ErrorKind, RelayError};
pub use pipeline::{Codec, Framing, Transport, TransportStream};
pub use types::{
    LoggedRecord, OverflowPolicy, RawRecord, RecordTime, SessionClock, TimeMode,
};
