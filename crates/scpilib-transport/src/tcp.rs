//! Raw-socket TCP transport for SCPI instruments.
//!
//! Most LAN instruments expose their SCPI parser on a plain TCP socket,
//! conventionally port 5025 ("SCPI-RAW"). [`TcpTransport`] implements the
//! [`Transport`] trait for that link. Framing is left to the dispatch core.
//!
//! # Example
//!
//! ```no_run
//! use scpilib_transport::TcpTransport;
//! use scpilib_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> scpilib_core::Result<()> {
//! // The port defaults to 5025 when omitted.
//! let mut transport = TcpTransport::connect("192.168.1.50").await?;
//!
//! transport.send(b"*IDN?\n").await?;
//!
//! let mut buf = [0u8; 4096];
//! let n = transport.receive(&mut buf, Duration::from_secs(2)).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use scpilib_core::error::{Error, Result};
use scpilib_core::transport::Transport;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Conventional raw-socket SCPI port.
pub const DEFAULT_SCPI_PORT: u16 = 5025;

/// Default connection timeout (5 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Raw-socket TCP transport.
///
/// The connection is established eagerly via [`connect`](TcpTransport::connect)
/// or [`connect_with_timeout`](TcpTransport::connect_with_timeout).
#[derive(Debug)]
pub struct TcpTransport {
    /// The underlying TCP stream, `None` after `close()` is called.
    stream: Option<TcpStream>,
    /// The `host:port` this transport talks to, for logging.
    addr: String,
}

/// Append [`DEFAULT_SCPI_PORT`] to an address that has no port.
///
/// Bracketed IPv6 literals (`[fe80::1]`) are handled; a bare IPv6 literal
/// is ambiguous and is returned unchanged.
pub fn with_default_port(addr: &str) -> String {
    if let Some(rest) = addr.strip_prefix('[') {
        return match rest.split_once(']') {
            Some((_, "")) => format!("{addr}:{DEFAULT_SCPI_PORT}"),
            _ => addr.to_string(),
        };
    }
    match addr.matches(':').count() {
        0 => format!("{addr}:{DEFAULT_SCPI_PORT}"),
        _ => addr.to_string(),
    }
}

impl TcpTransport {
    /// Connect to an instrument using the default timeout.
    ///
    /// `addr` is `host` or `host:port`; the port defaults to
    /// [`DEFAULT_SCPI_PORT`].
    pub async fn connect(addr: &str) -> Result<Self> {
        Self::connect_with_timeout(addr, DEFAULT_CONNECT_TIMEOUT).await
    }

    /// Connect to an instrument with a specified timeout.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use scpilib_transport::TcpTransport;
    /// # use std::time::Duration;
    /// # async fn example() -> scpilib_core::Result<()> {
    /// let transport = TcpTransport::connect_with_timeout(
    ///     "192.168.1.50:5025",
    ///     Duration::from_secs(10),
    /// ).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect_with_timeout(addr: &str, timeout: Duration) -> Result<Self> {
        let addr = with_default_port(addr);
        tracing::debug!(
            addr = %addr,
            timeout_ms = timeout.as_millis(),
            "Connecting to instrument"
        );

        let stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| {
                tracing::error!(addr = %addr, "TCP connection timed out");
                Error::Timeout
            })?
            .map_err(|e| {
                tracing::error!(addr = %addr, error = %e, "TCP connection failed");
                map_connect_error(e, &addr)
            })?;

        // Commands are short and every exchange waits for its reply.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(
                addr = %addr,
                error = %e,
                "Failed to set TCP_NODELAY (continuing anyway)"
            );
        }

        tracing::info!(addr = %addr, "Instrument connection established");

        Ok(Self {
            stream: Some(stream),
            addr,
        })
    }

    /// Wrap an already-connected `TcpStream`.
    ///
    /// `addr` is only a label for logging.
    pub fn from_stream(stream: TcpStream, addr: String) -> Self {
        tracing::debug!(addr = %addr, "Wrapping existing TCP stream");
        Self {
            stream: Some(stream),
            addr,
        }
    }

    /// The `host:port` this transport was connected to.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        tracing::trace!(addr = %self.addr, bytes = data.len(), "Sending data");

        stream.write_all(data).await.map_err(|e| {
            tracing::error!(addr = %self.addr, error = %e, "Failed to send data");
            map_io_error(e)
        })?;
        stream.flush().await.map_err(|e| {
            tracing::error!(addr = %self.addr, error = %e, "Failed to flush TCP stream");
            map_io_error(e)
        })?;

        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        match tokio::time::timeout(timeout, stream.read(buf)).await {
            Ok(Ok(0)) => {
                // 0 bytes means the instrument closed its end.
                tracing::warn!(addr = %self.addr, "Instrument closed connection");
                Err(Error::ConnectionLost)
            }
            Ok(Ok(n)) => {
                tracing::trace!(addr = %self.addr, bytes = n, "Received data");
                Ok(n)
            }
            Ok(Err(e)) => {
                tracing::error!(addr = %self.addr, error = %e, "Failed to receive data");
                Err(map_io_error(e))
            }
            Err(_) => {
                tracing::trace!(
                    addr = %self.addr,
                    timeout_ms = timeout.as_millis(),
                    "Timeout waiting for data"
                );
                Err(Error::Timeout)
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            tracing::debug!(addr = %self.addr, "Closing instrument connection");
            if let Err(e) = stream.shutdown().await {
                tracing::warn!(
                    addr = %self.addr,
                    error = %e,
                    "Failed to shut down TCP stream (continuing anyway)"
                );
            }
            tracing::info!(addr = %self.addr, "Instrument connection closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

/// Map a connection-time I/O error to the appropriate [`Error`] variant.
fn map_connect_error(e: std::io::Error, addr: &str) -> Error {
    match e.kind() {
        std::io::ErrorKind::ConnectionRefused => {
            Error::Transport(format!("connection refused: {addr}"))
        }
        _ => Error::Io(e),
    }
}

/// Map a data-path I/O error to the appropriate [`Error`] variant.
fn map_io_error(e: std::io::Error) -> Error {
    match e.kind() {
        std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::NotConnected
        | std::io::ErrorKind::ConnectionAborted => Error::ConnectionLost,
        _ => Error::Io(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    /// Bind a listener on a random local port.
    async fn test_listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        (listener, addr)
    }

    #[test]
    fn default_port_appended() {
        assert_eq!(with_default_port("10.0.0.7"), "10.0.0.7:5025");
        assert_eq!(with_default_port("scope.lab"), "scope.lab:5025");
        assert_eq!(with_default_port("10.0.0.7:5555"), "10.0.0.7:5555");
        assert_eq!(with_default_port("[fe80::1]"), "[fe80::1]:5025");
        assert_eq!(with_default_port("[fe80::1]:5025"), "[fe80::1]:5025");
        assert_eq!(with_default_port("fe80::1"), "fe80::1");
    }

    #[tokio::test]
    async fn idn_query_over_socket() {
        let (listener, addr) = test_listener().await;

        // Minimal instrument: answer one *IDN? line.
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            assert_eq!(line, "*IDN?\n");
            reader
                .get_mut()
                .write_all(b"ACME,SA100,1234,1.0\n")
                .await
                .unwrap();
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();
        assert!(transport.is_connected());
        transport.send(b"*IDN?\n").await.unwrap();

        let mut buf = [0u8; 256];
        let n = transport
            .receive(&mut buf, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"ACME,SA100,1234,1.0\n");

        transport.close().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        match TcpTransport::connect(&addr).await {
            Err(Error::Transport(msg)) => assert!(msg.contains("connection refused"), "{msg}"),
            other => panic!("expected Transport error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn receive_timeout() {
        let (listener, addr) = test_listener().await;

        // Accepts but never answers.
        let server = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();
        let mut buf = [0u8; 256];
        let result = transport
            .receive(&mut buf, Duration::from_millis(100))
            .await;
        assert!(matches!(result, Err(Error::Timeout)));

        transport.close().await.unwrap();
        server.abort();
    }

    #[tokio::test]
    async fn peer_close_is_connection_lost() {
        let (listener, addr) = test_listener().await;

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();
        server.await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut buf = [0u8; 256];
        let result = transport.receive(&mut buf, Duration::from_secs(2)).await;
        assert!(
            matches!(result, Err(Error::ConnectionLost)),
            "expected ConnectionLost, got: {result:?}"
        );
    }

    #[tokio::test]
    async fn closed_transport_is_not_connected() {
        let (listener, addr) = test_listener().await;

        let server = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();
        assert_eq!(transport.addr(), addr);
        transport.close().await.unwrap();
        assert!(!transport.is_connected());

        // Closing twice is a no-op.
        transport.close().await.unwrap();

        assert!(matches!(
            transport.send(b"*RST\n").await,
            Err(Error::NotConnected)
        ));
        let mut buf = [0u8; 16];
        assert!(matches!(
            transport.receive(&mut buf, Duration::from_millis(10)).await,
            Err(Error::NotConnected)
        ));

        server.abort();
    }

    #[tokio::test]
    async fn from_stream_wraps_connection() {
        let (listener, addr) = test_listener().await;

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            reader.get_mut().write_all(b"1\n").await.unwrap();
        });

        let raw = TcpStream::connect(&addr).await.unwrap();
        let mut transport = TcpTransport::from_stream(raw, addr.clone());
        transport.send(b"*OPC?\n").await.unwrap();

        let mut buf = [0u8; 16];
        let n = transport
            .receive(&mut buf, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"1\n");

        transport.close().await.unwrap();
        server.await.unwrap();
    }
}
