//! scpilib-core: value model, marshalling rules, and error definitions for
//! scpilib.
//!
//! This crate knows how typed values are spelled in SCPI command and
//! response text. It performs no I/O; the dispatch core in `scpilib-io`
//! drives a [`Transport`] and hands the text to the types defined here.
//!
//! # Key types
//!
//! - [`DataType`] / [`Value`] -- the closed set of wire value kinds
//! - [`ArgSingleList`] -- command parameter composition
//! - [`StructDescriptor`] / [`DecodedRecord`] -- multi-value payloads
//! - [`ArgSingleSuppressed`] -- list responses with a status prefix
//! - [`CommandsGroup`] -- mnemonic tree with repeated capabilities
//! - [`EnumTable`] -- caller-owned enum/token mapping
//! - [`Transport`] -- byte-level communication channel
//! - [`Error`] / [`Result`] -- error handling

pub mod args;
pub mod conversions;
pub mod enums;
pub mod error;
pub mod group;
pub mod structs;
pub mod suppressed;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use scpilib_core::*`.
pub use args::{compose_cmd, ArgSingle, ArgSingleList};
pub use enums::{EnumTable, EnumTokens};
pub use error::{Error, Result};
pub use group::{CommandsGroup, RepCap};
pub use structs::{ArgStruct, Arity, DecodedRecord, FromValue, StructDescriptor, StructRecord};
pub use suppressed::ArgSingleSuppressed;
pub use transport::Transport;
pub use types::*;
