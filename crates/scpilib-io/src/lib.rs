//! Dispatch core for SCPI instruments.
//!
//! This crate turns the marshalling types of `scpilib-core` into complete
//! request/response exchanges over a [`Transport`](scpilib_core::Transport).
//! One [`Core`](io::Core) owns the transport and performs one round trip
//! per call: write, write with operation-complete wait, text queries,
//! struct queries, and ASCII or binary float lists.
//!
//! # Architecture
//!
//! - [`protocol`] -- line and IEEE 488.2 binary block framing
//! - [`io`] -- the dispatch core and its configuration
//! - [`builder`] -- fluent construction of a configured core

pub mod builder;
pub mod io;
pub mod protocol;

pub use builder::CoreBuilder;
pub use io::{Core, IoConfig, Response};
pub use protocol::BinFloatFormat;
