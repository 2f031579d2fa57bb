//! The dispatch core: one owned transport, one request at a time.
//!
//! [`Core`] sends a command, waits for its answer, and hands the answer to
//! the marshalling types of `scpilib-core`. Every operation is a complete
//! send-then-wait round trip; there is no background task and no internal
//! locking. Methods take `&mut self`, so sharing a `Core` between tasks
//! takes an external `tokio::sync::Mutex`.

use std::time::Duration;

use bytes::{Buf, BytesMut};
use tracing::{debug, trace, warn};

use scpilib_core::conversions;
use scpilib_core::enums::EnumTable;
use scpilib_core::error::{Error, Result};
use scpilib_core::structs::{DecodedRecord, StructDescriptor, StructRecord};
use scpilib_core::suppressed::ArgSingleSuppressed;
use scpilib_core::transport::Transport;
use scpilib_core::types::{DataType, FloatOrBool, Value};

use crate::protocol::{self, BinFloatFormat, DecodeResult};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Configuration for the dispatch core.
#[derive(Debug, Clone)]
pub struct IoConfig {
    /// Timeout for a single query response.
    pub command_timeout: Duration,
    /// Operation-complete wait used when a call does not give its own.
    pub opc_timeout: Duration,
    /// Byte appended to every command.
    pub write_terminator: u8,
    /// Byte ending every ASCII response line.
    pub read_terminator: u8,
    /// First byte of a binary block response.
    pub block_marker: u8,
    /// Element format of binary float blocks.
    pub bin_float_format: BinFloatFormat,
    /// Whether to poll the instrument's error queue after each operation.
    pub status_checking: bool,
    /// Query appended to a command to wait for operation complete.
    pub opc_query: String,
    /// How long to wait for a reply owed by an earlier timed-out read
    /// before the next command is sent.
    pub stale_reply_timeout: Duration,
}

impl Default for IoConfig {
    fn default() -> Self {
        IoConfig {
            command_timeout: Duration::from_millis(2000),
            opc_timeout: Duration::from_millis(10_000),
            write_terminator: protocol::DEFAULT_TERMINATOR,
            read_terminator: protocol::DEFAULT_TERMINATOR,
            block_marker: protocol::DEFAULT_BLOCK_MARKER,
            bin_float_format: BinFloatFormat::default(),
            status_checking: false,
            opc_query: "*OPC?".to_string(),
            stale_reply_timeout: Duration::from_millis(500),
        }
    }
}

/// One complete response.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// An ASCII line without its terminator.
    Text(String),
    /// A binary block payload.
    Block(Vec<u8>),
}

/// Status byte bit set while the error queue is non-empty.
const STB_ERROR_QUEUE: i64 = 4;

/// Upper bound on `SYST:ERR?` reads while draining the error queue.
const MAX_ERROR_DRAIN: usize = 100;

/// Maximum buffered response size before the read is abandoned.
///
/// Binary traces of several hundred thousand points fit comfortably.
const MAX_BUF: usize = 16 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Core
// ---------------------------------------------------------------------------

/// The dispatch core. Owns the transport for its whole life.
pub struct Core {
    transport: Box<dyn Transport>,
    config: IoConfig,
    rx: BytesMut,
    /// A definite block was returned before its trailing terminator arrived.
    pending_terminator: bool,
    /// Replies the instrument still owes for reads that timed out.
    stale_replies: usize,
}

impl Core {
    /// Wrap a connected transport.
    pub fn new(transport: Box<dyn Transport>, config: IoConfig) -> Self {
        Core {
            transport,
            config,
            rx: BytesMut::with_capacity(4096),
            pending_terminator: false,
            stale_replies: 0,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &IoConfig {
        &self.config
    }

    /// Enable or disable error-queue checking after each operation.
    pub fn set_status_checking(&mut self, enabled: bool) {
        self.config.status_checking = enabled;
    }

    /// Change the expected binary float element format.
    pub fn set_bin_float_format(&mut self, format: BinFloatFormat) {
        self.config.bin_float_format = format;
    }

    /// Change the query response timeout.
    pub fn set_command_timeout(&mut self, timeout: Duration) {
        self.config.command_timeout = timeout;
    }

    /// Number of replies owed for timed-out reads that have not been
    /// discarded yet.
    pub fn stale_replies(&self) -> usize {
        self.stale_replies
    }

    /// Whether the underlying transport is connected.
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Close the transport. Later operations fail with
    /// [`Error::NotConnected`].
    pub async fn close(&mut self) -> Result<()> {
        debug!("closing instrument session");
        self.rx.clear();
        self.pending_terminator = false;
        self.stale_replies = 0;
        self.transport.close().await
    }

    // -----------------------------------------------------------------------
    // Raw exchange
    // -----------------------------------------------------------------------

    /// Frame and send one command.
    async fn send_cmd(&mut self, cmd: &str) -> Result<()> {
        self.discard_stale_replies().await?;

        if !self.rx.is_empty() {
            // A terminator still owed by the previous block is not stray.
            let owed = self.pending_terminator && self.rx[..] == [self.config.read_terminator];
            if !owed {
                warn!(
                    bytes = self.rx.len(),
                    data = ?&self.rx[..],
                    "discarding unread bytes before next command"
                );
            }
            self.rx.clear();
            self.pending_terminator = false;
        }

        let frame = protocol::encode_command(cmd, self.config.write_terminator);
        trace!(bytes = frame.len(), data = ?&frame[..], "sending command frame");
        self.transport.send(&frame).await
    }

    /// Read and drop the replies owed for earlier timed-out reads, so the
    /// next response belongs to the next command.
    ///
    /// A reply that does not show up within
    /// [`IoConfig::stale_reply_timeout`] is given up on: an instrument that
    /// rejects a query answers nothing at all.
    async fn discard_stale_replies(&mut self) -> Result<()> {
        while self.stale_replies > 0 {
            match self.read_frame(self.config.stale_reply_timeout).await {
                Ok(_) | Err(Error::Decode { .. }) => {
                    self.stale_replies -= 1;
                    debug!(remaining = self.stale_replies, "discarded late reply");
                }
                Err(Error::Timeout) => {
                    warn!(owed = self.stale_replies, "late replies did not arrive, giving up on them");
                    self.stale_replies = 0;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Read one complete response within `timeout`, recording a timed-out
    /// reply as still owed.
    async fn read_response(&mut self, timeout: Duration) -> Result<Response> {
        let result = self.read_frame(timeout).await;
        if matches!(result, Err(Error::Timeout)) {
            self.stale_replies += 1;
        }
        result
    }

    async fn read_frame(&mut self, timeout: Duration) -> Result<Response> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut recv_buf = [0u8; 4096];

        loop {
            if self.pending_terminator && !self.rx.is_empty() {
                if self.rx[0] == self.config.read_terminator {
                    self.rx.advance(1);
                }
                self.pending_terminator = false;
            }

            match protocol::decode_response(
                &self.rx,
                self.config.read_terminator,
                self.config.block_marker,
            ) {
                DecodeResult::Line { text, consumed } => {
                    self.rx.advance(consumed);
                    trace!(text = %text, "received line");
                    return Ok(Response::Text(text));
                }
                DecodeResult::Block {
                    payload,
                    consumed,
                    terminated,
                } => {
                    self.rx.advance(consumed);
                    self.pending_terminator = !terminated;
                    trace!(bytes = payload.len(), "received binary block");
                    return Ok(Response::Block(payload));
                }
                DecodeResult::Invalid { message, consumed } => {
                    let raw = String::from_utf8_lossy(&self.rx[..consumed]).into_owned();
                    self.rx.advance(consumed);
                    return Err(Error::decode(message, raw));
                }
                DecodeResult::Incomplete => {}
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(Error::Timeout);
            }
            let n = self.transport.receive(&mut recv_buf, deadline - now).await?;
            self.rx.extend_from_slice(&recv_buf[..n]);

            // Bounded buffer: prevent unbounded growth from a runaway
            // response or noise on the line.
            if self.rx.len() > MAX_BUF {
                warn!(len = self.rx.len(), "response buffer overflow, clearing");
                self.rx.clear();
                return Err(Error::decode(
                    format!("response exceeds {MAX_BUF} bytes"),
                    String::new(),
                ));
            }
        }
    }

    /// Read one response that must be an ASCII line.
    async fn read_line(&mut self, cmd: &str, timeout: Duration) -> Result<String> {
        match self.read_response(timeout).await? {
            Response::Text(text) => Ok(text),
            Response::Block(payload) => Err(Error::decode(
                format!("expected a text response to {cmd}, got a {}-byte binary block", payload.len()),
                String::from_utf8_lossy(&payload).into_owned(),
            )),
        }
    }

    /// Send `cmd` and return its raw response.
    pub async fn query_raw(&mut self, cmd: &str) -> Result<Response> {
        debug!(cmd = %cmd, "query");
        self.send_cmd(cmd).await?;
        let response = self.read_response(self.config.command_timeout).await?;
        self.check_status(cmd).await?;
        Ok(response)
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Send a command without waiting for anything.
    pub async fn write(&mut self, cmd: &str) -> Result<()> {
        debug!(cmd = %cmd, "write");
        self.send_cmd(cmd).await?;
        self.check_status(cmd).await
    }

    /// Send a command and wait until the instrument reports operation
    /// complete.
    ///
    /// `timeout` defaults to [`IoConfig::opc_timeout`]. On expiry the
    /// result is [`Error::OperationTimeout`] and the instrument state is
    /// unknown.
    pub async fn write_with_opc(&mut self, cmd: &str, timeout: Option<Duration>) -> Result<()> {
        let timeout = timeout.unwrap_or(self.config.opc_timeout);
        debug!(cmd = %cmd, timeout_ms = timeout.as_millis() as u64, "write with OPC");
        let full = format!("{cmd};{}", self.config.opc_query);
        self.send_cmd(&full).await?;
        let reply = self.read_opc_reply(cmd, timeout).await?;
        expect_opc_done(cmd, reply.trim())?;
        self.check_status(cmd).await
    }

    async fn read_opc_reply(&mut self, cmd: &str, timeout: Duration) -> Result<String> {
        match self.read_line(cmd, timeout).await {
            Err(Error::Timeout) => {
                warn!(cmd = %cmd, timeout_ms = timeout.as_millis() as u64, "operation complete wait expired");
                Err(Error::OperationTimeout {
                    cmd: cmd.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
            other => other,
        }
    }

    /// Compose `"<cmd> <params>"` from a record and write it.
    pub async fn write_struct(
        &mut self,
        cmd: &str,
        descriptor: &StructDescriptor,
        record: &DecodedRecord,
    ) -> Result<()> {
        let params = descriptor.encode(record)?;
        self.write(&join_cmd(cmd, &params)).await
    }

    /// [`write_struct`](Self::write_struct) for a typed record.
    pub async fn write_record<T: StructRecord>(&mut self, cmd: &str, value: &T) -> Result<()> {
        let record = value.to_record()?;
        self.write_struct(cmd, T::descriptor(), &record).await
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Send a query and return the response line, whitespace trimmed.
    pub async fn query_str(&mut self, cmd: &str) -> Result<String> {
        debug!(cmd = %cmd, "query");
        self.send_cmd(cmd).await?;
        let text = self.read_line(cmd, self.config.command_timeout).await?;
        self.check_status(cmd).await?;
        Ok(text.trim().to_string())
    }

    /// Send a query combined with the operation-complete query and return
    /// the response part.
    pub async fn query_str_with_opc(&mut self, cmd: &str, timeout: Option<Duration>) -> Result<String> {
        let timeout = timeout.unwrap_or(self.config.opc_timeout);
        debug!(cmd = %cmd, timeout_ms = timeout.as_millis() as u64, "query with OPC");
        let full = format!("{cmd};{}", self.config.opc_query);
        self.send_cmd(&full).await?;
        let reply = self.read_opc_reply(cmd, timeout).await?;
        let (value, done) = reply.rsplit_once(';').ok_or_else(|| {
            Error::decode("response has no operation-complete part", reply.clone())
        })?;
        expect_opc_done(cmd, done.trim())?;
        let value = value.trim().to_string();
        self.check_status(cmd).await?;
        Ok(value)
    }

    /// Query and decode a boolean.
    pub async fn query_bool(&mut self, cmd: &str) -> Result<bool> {
        let text = self.query_str(cmd).await?;
        conversions::string_to_bool(&text)
    }

    /// Query and decode an integer.
    pub async fn query_int(&mut self, cmd: &str) -> Result<i64> {
        let text = self.query_str(cmd).await?;
        conversions::string_to_int(&text)
    }

    /// Query and decode a float.
    pub async fn query_float(&mut self, cmd: &str) -> Result<f64> {
        let text = self.query_str(cmd).await?;
        conversions::string_to_float(&text)
    }

    /// Query and decode a number that may be replaced by `ON`/`OFF`.
    pub async fn query_float_or_bool(&mut self, cmd: &str) -> Result<FloatOrBool> {
        let text = self.query_str(cmd).await?;
        conversions::string_to_float_or_bool(&text)
    }

    /// Query and decode an enum token through `table`.
    pub async fn query_enum<E: Copy + PartialEq>(&mut self, cmd: &str, table: &EnumTable<E>) -> Result<E> {
        let text = self.query_str(cmd).await?;
        conversions::string_to_scalar_enum(&text, table)
    }

    /// Query and decode the response as any [`DataType`].
    pub async fn query_value(&mut self, cmd: &str, data_type: DataType) -> Result<Value> {
        let text = self.query_str(cmd).await?;
        data_type.decode_text(&text)
    }

    /// Query and decode a multi-value response.
    ///
    /// Decode errors carry the raw response text.
    pub async fn query_struct(&mut self, cmd: &str, descriptor: &StructDescriptor) -> Result<DecodedRecord> {
        let text = self.query_str(cmd).await?;
        descriptor.decode(&text)
    }

    /// [`query_struct`](Self::query_struct) combined with the
    /// operation-complete wait.
    pub async fn query_struct_with_opc(
        &mut self,
        cmd: &str,
        descriptor: &StructDescriptor,
        timeout: Option<Duration>,
    ) -> Result<DecodedRecord> {
        let text = self.query_str_with_opc(cmd, timeout).await?;
        descriptor.decode(&text)
    }

    /// [`query_struct`](Self::query_struct) into a typed record.
    pub async fn query_record<T: StructRecord>(&mut self, cmd: &str) -> Result<T> {
        let text = self.query_str(cmd).await?;
        T::decode(&text)
    }

    /// Query a float list sent either as ASCII or as a binary block.
    pub async fn query_bin_or_ascii_float_list(&mut self, cmd: &str) -> Result<Vec<f64>> {
        match self.query_raw(cmd).await? {
            Response::Text(text) => conversions::string_to_float_list(&text),
            Response::Block(payload) => {
                protocol::decode_float_block(&payload, self.config.bin_float_format)
            }
        }
    }

    /// Query a float list sent either as ASCII or as a binary block, then
    /// drop the leading status elements described by `suppressed`.
    pub async fn query_bin_or_ascii_float_list_suppressed(
        &mut self,
        cmd: &str,
        suppressed: &ArgSingleSuppressed,
    ) -> Result<Vec<f64>> {
        match self.query_raw(cmd).await? {
            Response::Text(text) => suppressed.decode_as(&text),
            Response::Block(payload) => {
                let values = protocol::decode_float_block(&payload, self.config.bin_float_format)?;
                suppressed.strip(values)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Status checking
    // -----------------------------------------------------------------------

    /// Poll the status byte and drain the error queue if it is flagged.
    async fn check_status(&mut self, cmd: &str) -> Result<()> {
        if !self.config.status_checking {
            return Ok(());
        }

        self.send_cmd("*STB?").await?;
        let stb_text = self.read_line("*STB?", self.config.command_timeout).await?;
        let stb = conversions::string_to_int(&stb_text)?;
        if stb & STB_ERROR_QUEUE == 0 {
            return Ok(());
        }

        let mut errors = Vec::new();
        for _ in 0..MAX_ERROR_DRAIN {
            self.send_cmd("SYST:ERR?").await?;
            let entry = self.read_line("SYST:ERR?", self.config.command_timeout).await?;
            let entry = entry.trim();
            if is_no_error(entry) {
                break;
            }
            errors.push(entry.to_string());
        }

        if errors.is_empty() {
            return Ok(());
        }
        warn!(cmd = %cmd, count = errors.len(), "instrument reported errors");
        Err(Error::InstrumentStatus {
            cmd: cmd.to_string(),
            errors,
        })
    }
}

impl std::fmt::Debug for Core {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("config", &self.config)
            .field("connected", &self.transport.is_connected())
            .field("stale_replies", &self.stale_replies)
            .finish()
    }
}

fn join_cmd(cmd: &str, params: &str) -> String {
    if params.is_empty() {
        cmd.to_string()
    } else {
        format!("{cmd} {params}")
    }
}

fn expect_opc_done(cmd: &str, reply: &str) -> Result<()> {
    match conversions::string_to_int(reply) {
        Ok(1) => Ok(()),
        _ => Err(Error::decode(
            format!("unexpected operation-complete reply to {cmd}"),
            reply,
        )),
    }
}

/// `0,"No error"` and its `+0` spelling.
fn is_no_error(entry: &str) -> bool {
    let code = entry.split(',').next().unwrap_or("").trim();
    matches!(conversions::string_to_int(code), Ok(0))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
