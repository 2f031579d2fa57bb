//! Scripted in-memory transport for dispatch tests.
//!
//! [`MockTransport`] implements [`Transport`] with pre-loaded
//! request/response pairs, so command framing and response decoding can be
//! tested without an instrument on the bench.
//!
//! # Example
//!
//! ```
//! use scpilib_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! // When the core sends this command, answer with this line.
//! mock.expect(b"*IDN?\n", b"ACME,SA100,1234,1.0\n");
//! // A write that gets no answer.
//! mock.expect_write(b"*RST\n");
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;

use scpilib_core::error::{Error, Result};
use scpilib_core::transport::Transport;

#[derive(Debug, Clone)]
struct Expectation {
    request: Vec<u8>,
    response: Vec<u8>,
    late: bool,
}

/// A mock [`Transport`] driven by an ordered script.
///
/// Each `send()` must match the next expectation exactly; its response is
/// then handed out by the following `receive()` calls. An empty response
/// (or no pending response at all) makes `receive()` return
/// [`Error::Timeout`], which is how an unanswered query looks on a real
/// link.
#[derive(Debug)]
pub struct MockTransport {
    expectations: VecDeque<Expectation>,
    pending_response: Option<Vec<u8>>,
    /// Bytes of the pending response already handed out.
    response_cursor: usize,
    /// `receive()` calls that time out before the pending response is
    /// handed out.
    held_receives: usize,
    /// Largest chunk a single `receive()` returns.
    chunk_size: usize,
    connected: bool,
    sent_log: Vec<Vec<u8>>,
}

impl MockTransport {
    /// Create a connected mock with an empty script.
    pub fn new() -> Self {
        MockTransport {
            expectations: VecDeque::new(),
            pending_response: None,
            response_cursor: 0,
            held_receives: 0,
            chunk_size: usize::MAX,
            connected: true,
            sent_log: Vec::new(),
        }
    }

    /// Expect `request`, answer with `response`.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        self.expectations.push_back(Expectation {
            request: request.to_vec(),
            response: response.to_vec(),
            late: false,
        });
    }

    /// Expect `request` and answer with `response` only after the first
    /// `receive()` has timed out, the way an instrument answers past the
    /// caller's deadline.
    pub fn expect_late(&mut self, request: &[u8], response: &[u8]) {
        self.expectations.push_back(Expectation {
            request: request.to_vec(),
            response: response.to_vec(),
            late: true,
        });
    }

    /// Expect `request` and send nothing back.
    pub fn expect_write(&mut self, request: &[u8]) {
        self.expect(request, b"");
    }

    /// Deliver responses in chunks of at most `size` bytes, to exercise
    /// reassembly of lines and binary blocks.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Everything passed to `send()`, one element per call.
    pub fn sent_data(&self) -> &[Vec<u8>] {
        &self.sent_log
    }

    /// Number of expectations not yet consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.expectations.len()
    }

    /// Force the connected state. While disconnected, `send()` and
    /// `receive()` return [`Error::NotConnected`].
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        self.sent_log.push(data.to_vec());

        let expectation = self.expectations.pop_front().ok_or_else(|| {
            Error::Transport(format!(
                "mock transport script exhausted, got {:?}",
                String::from_utf8_lossy(data)
            ))
        })?;
        if data != expectation.request.as_slice() {
            return Err(Error::Transport(format!(
                "unexpected send: expected {:?}, got {:?}",
                String::from_utf8_lossy(&expectation.request),
                String::from_utf8_lossy(data)
            )));
        }
        self.pending_response = Some(expectation.response);
        self.response_cursor = 0;
        self.held_receives = usize::from(expectation.late);
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        if self.held_receives > 0 {
            self.held_receives -= 1;
            return Err(Error::Timeout);
        }

        let Some(response) = self.pending_response.as_ref() else {
            return Err(Error::Timeout);
        };
        let remaining = &response[self.response_cursor..];
        if remaining.is_empty() {
            self.pending_response = None;
            self.response_cursor = 0;
            return Err(Error::Timeout);
        }

        let n = remaining.len().min(buf.len()).min(self.chunk_size);
        buf[..n].copy_from_slice(&remaining[..n]);
        self.response_cursor += n;
        if self.response_cursor >= response.len() {
            self.pending_response = None;
            self.response_cursor = 0;
        }
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        self.pending_response = None;
        self.response_cursor = 0;
        self.held_receives = 0;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
