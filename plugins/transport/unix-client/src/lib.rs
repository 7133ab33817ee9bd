use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use tokio::net::UnixStream;

use relay_api::{RelayError, Transport, TransportStream};

/// Исходящее соединение через Unix stream socket (по умолчанию `/tmp/serial.sock`).
///
/// Отсутствие сокета на старте — штатная ситуация: ошибка `Io`, forwarder
/// повторит попытку.
pub struct UnixClientTransport {
    path: PathBuf,
}

impl UnixClientTransport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Transport for UnixClientTransport {
    fn connect(&self) -> Pin<Box<dyn Future<Output = Result<Box<dyn TransportStream>, RelayError>> + Send + '_>> {
        Box::pin(async move {
            let stream = UnixStream::connect(&self.path)
                .await
                .map_err(|e| RelayError::io(format!("unix connect to {}: {e}", self.path.display())))?;
            Ok(Box::new(stream) as Box<dyn TransportStream>)
        })
    }

    fn target(&self) -> String {
        format!("unix:{}", self.path.display())
    }
}
