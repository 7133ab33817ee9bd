use std::future::Future;
use std::pin::Pin;

use tokio::net::TcpStream;

use relay_api::{RelayError, Transport, TransportStream};

/// Исходящее TCP соединение к relay target (`host:port`).
pub struct TcpClientTransport {
    addr: String,
}

impl TcpClientTransport {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

impl Transport for TcpClientTransport {
    fn connect(&self) -> Pin<Box<dyn Future<Output = Result<Box<dyn TransportStream>, RelayError>> + Send + '_>> {
        Box::pin(async move {
            let stream = TcpStream::connect(&self.addr)
                .await
                .map_err(|e| RelayError::io(format!("TCP connect to {}: {e}", self.addr)))?;
            stream.set_nodelay(true)?;
            Ok(Box::new(stream) as Box<dyn TransportStream>)
        })
    }

    fn target(&self) -> String {
        format!("tcp:{}", self.addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_api::ErrorKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn connects_and_writes() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let transport = TcpClientTransport::new(addr.clone());
        assert_eq!(transport.target(), format!("tcp:{addr}"));

        let mut stream = transport.connect().await.unwrap();
        let (mut peer, _) = listener.accept().await.unwrap();
        stream.write_all(b"hi\n").await.unwrap();
        drop(stream);

        let mut got = String::new();
        peer.read_to_string(&mut got).await.unwrap();
        assert_eq!(got, "hi\n");
    }

    #[tokio::test]
    async fn refused_is_io_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        let err = TcpClientTransport::new(addr).connect().await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
