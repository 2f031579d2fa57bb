//! Scripted TCP instrument for socket-level tests.
//!
//! [`MockTcpServer`] listens on a random localhost port and plays back
//! request/response pairs to a single client, so a real
//! `TcpTransport` can be driven end to end.
//!
//! # Example
//!
//! ```
//! use scpilib_test_harness::MockTcpServer;
//!
//! # async fn example() -> scpilib_core::Result<()> {
//! let mut server = MockTcpServer::new().await?;
//! server.expect(b"*IDN?\n", b"ACME,SA100,1234,1.0\n");
//! let addr = server.addr().to_string();
//! server.start();
//! // ... connect a TcpTransport to `addr` and run the exchange ...
//! server.wait().await.map_err(scpilib_core::Error::Transport)?;
//! # Ok(())
//! # }
//! ```

use scpilib_core::error::{Error, Result};
use std::collections::VecDeque;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
struct TcpExpectation {
    request: Vec<u8>,
    response: Vec<u8>,
}

/// A mock instrument reachable over TCP.
///
/// The listener is bound in [`new`](MockTcpServer::new), so a client may
/// connect as soon as [`start`](MockTcpServer::start) returns. The server
/// accepts one connection and processes expectations in order: it reads
/// exactly the expected request bytes, compares them, then writes the
/// response (nothing for an empty response).
pub struct MockTcpServer {
    addr: String,
    listener: Option<TcpListener>,
    expectations: VecDeque<TcpExpectation>,
    server_handle: Option<JoinHandle<std::result::Result<(), String>>>,
}

impl MockTcpServer {
    /// Bind a new server on a random localhost port.
    pub async fn new() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| Error::Transport(format!("failed to bind mock TCP server: {e}")))?;
        let addr = listener.local_addr()?.to_string();
        Ok(Self {
            addr,
            listener: Some(listener),
            expectations: VecDeque::new(),
            server_handle: None,
        })
    }

    /// Expect `request`, answer with `response`.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        self.expectations.push_back(TcpExpectation {
            request: request.to_vec(),
            response: response.to_vec(),
        });
    }

    /// Expect `request` and send nothing back.
    pub fn expect_write(&mut self, request: &[u8]) {
        self.expect(request, b"");
    }

    /// The `host:port` the server listens on.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Spawn the server task. Calling it twice has no further effect.
    pub fn start(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let expectations: Vec<TcpExpectation> = self.expectations.drain(..).collect();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener
                .accept()
                .await
                .map_err(|e| format!("failed to accept connection: {e}"))?;
            for (i, expectation) in expectations.iter().enumerate() {
                serve_one(&mut stream, i, expectation).await?;
            }
            Ok(())
        });
        self.server_handle = Some(handle);
    }

    /// Wait for the server task and report any mismatch.
    pub async fn wait(self) -> std::result::Result<(), String> {
        match self.server_handle {
            Some(handle) => handle
                .await
                .map_err(|e| format!("server task panicked: {e}"))?,
            None => Ok(()),
        }
    }
}

async fn serve_one(
    stream: &mut TcpStream,
    index: usize,
    expectation: &TcpExpectation,
) -> std::result::Result<(), String> {
    let mut buf = vec![0u8; expectation.request.len()];
    let mut total_read = 0;
    while total_read < buf.len() {
        let n = stream
            .read(&mut buf[total_read..])
            .await
            .map_err(|e| format!("expectation {index}: read error: {e}"))?;
        if n == 0 {
            return Err(format!(
                "expectation {index}: client disconnected after {total_read} of {} bytes",
                buf.len()
            ));
        }
        total_read += n;
    }

    if buf != expectation.request {
        return Err(format!(
            "expectation {index}: expected {:?}, got {:?}",
            String::from_utf8_lossy(&expectation.request),
            String::from_utf8_lossy(&buf)
        ));
    }

    if !expectation.response.is_empty() {
        stream
            .write_all(&expectation.response)
            .await
            .map_err(|e| format!("expectation {index}: write error: {e}"))?;
        stream
            .flush()
            .await
            .map_err(|e| format!("expectation {index}: flush error: {e}"))?;
    }
    Ok(())
}
