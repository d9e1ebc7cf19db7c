//! Transport abstraction (TCP vs Unix socket vs caller-supplied stream)

use crate::Result;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, UnixStream};

/// Any bidirectional byte stream a session can run over.
///
/// Implemented for every `AsyncRead + AsyncWrite + Unpin + Send` type, so
/// in-memory pipes and proxies can back a [`Transport`] too.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

/// Transport layer abstraction
pub enum Transport {
    /// TCP socket
    Tcp(TcpStream),
    /// Unix domain socket
    Unix(UnixStream),
    /// Caller-supplied stream
    Stream(Box<dyn AsyncStream>),
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Tcp(stream) => match stream.peer_addr() {
                Ok(addr) => write!(f, "Transport::Tcp({})", addr),
                Err(_) => f.write_str("Transport::Tcp(TcpStream)"),
            },
            Transport::Unix(_) => f.write_str("Transport::Unix(UnixStream)"),
            Transport::Stream(_) => f.write_str("Transport::Stream(dyn AsyncStream)"),
        }
    }
}

impl Transport {
    /// Connect via TCP
    pub async fn connect_tcp(host: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        Ok(Transport::Tcp(stream))
    }

    /// Connect via Unix socket
    pub async fn connect_unix(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path).await?;
        Ok(Transport::Unix(stream))
    }

    /// Wrap an already-connected stream
    pub fn from_stream(stream: impl AsyncStream + 'static) -> Self {
        Transport::Stream(Box::new(stream))
    }

    /// Write bytes to the transport
    pub async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        match self {
            Transport::Tcp(stream) => stream.write_all(buf).await?,
            Transport::Unix(stream) => stream.write_all(buf).await?,
            Transport::Stream(stream) => stream.write_all(buf).await?,
        }
        Ok(())
    }

    /// Flush the transport
    pub async fn flush(&mut self) -> Result<()> {
        match self {
            Transport::Tcp(stream) => stream.flush().await?,
            Transport::Unix(stream) => stream.flush().await?,
            Transport::Stream(stream) => stream.flush().await?,
        }
        Ok(())
    }

    /// Fill `buf` completely
    ///
    /// A peer that closes mid-frame surfaces as `UnexpectedEof`.
    pub async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        match self {
            Transport::Tcp(stream) => stream.read_exact(buf).await?,
            Transport::Unix(stream) => stream.read_exact(buf).await?,
            Transport::Stream(stream) => stream.read_exact(buf).await?,
        };
        Ok(())
    }

    /// Shutdown the transport
    pub async fn shutdown(&mut self) -> Result<()> {
        match self {
            Transport::Tcp(stream) => stream.shutdown().await?,
            Transport::Unix(stream) => stream.shutdown().await?,
            Transport::Stream(stream) => stream.shutdown().await?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tcp_connect_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = Transport::connect_tcp("127.0.0.1", port).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_stream_round_trip() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut transport = Transport::from_stream(client);

        transport.write_all(b"ping").await.unwrap();
        transport.flush().await.unwrap();

        let mut received = [0u8; 4];
        server.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"ping");

        server.write_all(b"pong").await.unwrap();
        let mut reply = [0u8; 4];
        transport.read_exact(&mut reply).await.unwrap();
        assert_eq!(&reply, b"pong");
    }

    #[tokio::test]
    async fn test_read_exact_reports_eof() {
        let (client, server) = tokio::io::duplex(64);
        drop(server);
        let mut transport = Transport::from_stream(client);

        let mut buf = [0u8; 16];
        let err = transport.read_exact(&mut buf).await.unwrap_err();
        assert!(err.is_transport_failure());
    }
}
