//! Transport implementations for scpilib.
//!
//! This crate provides concrete implementations of the
//! [`Transport`](scpilib_core::Transport) trait from `scpilib-core`:
//!
//! - [`TcpTransport`]: raw-socket SCPI over TCP (port 5025 by convention)
//!
//! Other links (VISA, GPIB, USBTMC) plug into the dispatch core by
//! implementing the same trait.

pub mod tcp;

pub use tcp::{with_default_port, TcpTransport, DEFAULT_SCPI_PORT};
