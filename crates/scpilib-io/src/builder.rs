//! CoreBuilder -- fluent builder for constructing [`Core`] instances.
//!
//! Separates configuration from construction so that callers can set
//! timeouts, terminators and the binary block format before the transport
//! is connected.
//!
//! # Example
//!
//! ```no_run
//! use scpilib_io::builder::CoreBuilder;
//! use scpilib_io::protocol::BinFloatFormat;
//! use std::time::Duration;
//!
//! # async fn example() -> scpilib_core::Result<()> {
//! let mut core = CoreBuilder::new()
//!     .command_timeout(Duration::from_millis(500))
//!     .bin_float_format(BinFloatFormat::Real64Le)
//!     .status_checking(true)
//!     .connect_tcp("192.168.1.50:5025")
//!     .await?;
//! let idn = core.query_str("*IDN?").await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use scpilib_core::error::{Error, Result};
use scpilib_core::transport::Transport;

use crate::io::{Core, IoConfig};
use crate::protocol::BinFloatFormat;

/// Fluent builder for [`Core`].
///
/// Every setting defaults to [`IoConfig::default`], so the simplest usage
/// is `CoreBuilder::new().connect_tcp(addr)`.
#[derive(Debug, Clone, Default)]
pub struct CoreBuilder {
    config: IoConfig,
}

impl CoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: IoConfig) -> Self {
        CoreBuilder { config }
    }

    /// Timeout for a single query response (default: 2000ms).
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout = timeout;
        self
    }

    /// Operation-complete wait used when a call gives none (default: 10s).
    pub fn opc_timeout(mut self, timeout: Duration) -> Self {
        self.config.opc_timeout = timeout;
        self
    }

    /// Byte appended to each command (default: `\n`).
    pub fn write_terminator(mut self, terminator: u8) -> Self {
        self.config.write_terminator = terminator;
        self
    }

    /// Byte ending each response line (default: `\n`).
    pub fn read_terminator(mut self, terminator: u8) -> Self {
        self.config.read_terminator = terminator;
        self
    }

    /// First byte of a binary block response (default: `#`).
    pub fn block_marker(mut self, marker: u8) -> Self {
        self.config.block_marker = marker;
        self
    }

    /// Element format of binary float blocks (default: 32-bit little-endian).
    pub fn bin_float_format(mut self, format: BinFloatFormat) -> Self {
        self.config.bin_float_format = format;
        self
    }

    /// Poll the instrument error queue after every operation.
    pub fn status_checking(mut self, enabled: bool) -> Self {
        self.config.status_checking = enabled;
        self
    }

    /// Query appended by the `*_with_opc` operations (default: `*OPC?`).
    pub fn opc_query(mut self, query: &str) -> Self {
        self.config.opc_query = query.to_string();
        self
    }

    /// How long to wait for a reply owed by an earlier timed-out read
    /// before the next command is sent (default: 500ms).
    pub fn stale_reply_timeout(mut self, timeout: Duration) -> Self {
        self.config.stale_reply_timeout = timeout;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.config.command_timeout.is_zero() {
            return Err(Error::InvalidParameter(
                "command_timeout must be non-zero".into(),
            ));
        }
        if self.config.opc_query.trim().is_empty() {
            return Err(Error::InvalidParameter("opc_query must not be empty".into()));
        }
        if self.config.block_marker == self.config.read_terminator {
            return Err(Error::InvalidParameter(
                "block_marker and read_terminator cannot be the same byte".into(),
            ));
        }
        Ok(())
    }

    /// Build a [`Core`] with a caller-provided transport.
    ///
    /// This is the entry point for testing (pass a `MockTransport` from
    /// `scpilib-test-harness`) and for transports this workspace does not
    /// ship, such as a VISA session.
    pub fn build_with_transport(self, transport: Box<dyn Transport>) -> Result<Core> {
        self.validate()?;
        Ok(Core::new(transport, self.config))
    }

    /// Build a [`Core`] over a raw TCP socket (`host:port`).
    #[cfg(feature = "tcp")]
    pub async fn connect_tcp(self, addr: &str) -> Result<Core> {
        self.validate()?;
        let transport = scpilib_transport::TcpTransport::connect(addr).await?;
        self.build_with_transport(Box::new(transport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scpilib_test_harness::MockTransport;

    #[test]
    fn builder_defaults() {
        let core = CoreBuilder::new()
            .build_with_transport(Box::new(MockTransport::new()))
            .unwrap();
        let config = core.config();
        assert_eq!(config.command_timeout, Duration::from_millis(2000));
        assert_eq!(config.block_marker, b'#');
        assert!(!config.status_checking);
    }

    #[test]
    fn builder_overrides() {
        let core = CoreBuilder::new()
            .command_timeout(Duration::from_millis(250))
            .opc_timeout(Duration::from_secs(30))
            .write_terminator(b'\r')
            .read_terminator(b'\r')
            .block_marker(b'$')
            .bin_float_format(BinFloatFormat::Real64Be)
            .status_checking(true)
            .opc_query("*WAI;*OPC?")
            .stale_reply_timeout(Duration::from_millis(50))
            .build_with_transport(Box::new(MockTransport::new()))
            .unwrap();
        let config = core.config();
        assert_eq!(config.command_timeout, Duration::from_millis(250));
        assert_eq!(config.opc_timeout, Duration::from_secs(30));
        assert_eq!(config.write_terminator, b'\r');
        assert_eq!(config.read_terminator, b'\r');
        assert_eq!(config.block_marker, b'$');
        assert_eq!(config.bin_float_format, BinFloatFormat::Real64Be);
        assert!(config.status_checking);
        assert_eq!(config.opc_query, "*WAI;*OPC?");
        assert_eq!(config.stale_reply_timeout, Duration::from_millis(50));
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        let result = CoreBuilder::new()
            .command_timeout(Duration::ZERO)
            .build_with_transport(Box::new(MockTransport::new()));
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn builder_rejects_marker_equal_to_terminator() {
        let result = CoreBuilder::new()
            .block_marker(b'\n')
            .build_with_transport(Box::new(MockTransport::new()));
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn built_core_uses_terminators() {
        let mut mock = MockTransport::new();
        mock.expect(b"*IDN?\r", b"ACME,X1,0,1.0\r");
        let mut core = CoreBuilder::new()
            .write_terminator(b'\r')
            .read_terminator(b'\r')
            .build_with_transport(Box::new(mock))
            .unwrap();
        assert_eq!(core.query_str("*IDN?").await.unwrap(), "ACME,X1,0,1.0");
    }

    #[cfg(feature = "tcp")]
    #[tokio::test]
    async fn connect_tcp_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = CoreBuilder::new().connect_tcp(&addr).await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }
}
