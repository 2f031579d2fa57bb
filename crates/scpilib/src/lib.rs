//! # scpilib -- typed SCPI command dispatch for instrument drivers
//!
//! `scpilib` is the shared runtime underneath generated SCPI instrument
//! drivers. A generated command method supplies a mnemonic template,
//! argument or field descriptors and its [`CommandsGroup`] node; this
//! library composes the command text, performs one round trip over the
//! instrument connection, and decodes the reply into typed values.
//!
//! ## Quick Start
//!
//! ```no_run
//! use scpilib::{CoreBuilder, DataType, ArgStruct, StructDescriptor};
//!
//! static LEVEL_FIELDS: [ArgStruct; 2] = [
//!     ArgStruct::scalar("Enabled", DataType::Boolean),
//!     ArgStruct::scalar("Level", DataType::Float),
//! ];
//! static LEVEL: StructDescriptor = StructDescriptor::new("Level", &LEVEL_FIELDS);
//!
//! #[tokio::main]
//! async fn main() -> scpilib::Result<()> {
//!     let mut core = CoreBuilder::new().connect_tcp("192.168.1.50").await?;
//!
//!     println!("{}", core.query_str("*IDN?").await?);
//!
//!     let rec = core.query_struct("FOO:BAR?", &LEVEL).await?;
//!     println!("reliability {:?}, level {}", rec.reliability(), rec.get::<f64>("Level")?);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! | Crate                  | Purpose                                              |
//! |------------------------|------------------------------------------------------|
//! | `scpilib-core`         | Data types, conversions, argument and struct codecs, command groups, errors, [`Transport`] |
//! | `scpilib-io`           | Line and binary block framing, the dispatch [`Core`], [`CoreBuilder`] |
//! | `scpilib-transport`    | Raw-socket TCP transport                             |
//! | **`scpilib`**          | This facade crate -- re-exports everything           |
//!
//! ## Feature Flags
//!
//! | Feature | Enables                                     | Default |
//! |---------|---------------------------------------------|---------|
//! | `tcp`   | [`transport`] module and `CoreBuilder::connect_tcp` | yes |

pub use scpilib_core::*;

pub use scpilib_io::{BinFloatFormat, Core, CoreBuilder, IoConfig, Response};

/// Wire framing: line and IEEE 488.2 binary block codecs.
pub mod protocol {
    pub use scpilib_io::protocol::*;
}

/// Concrete transports.
#[cfg(feature = "tcp")]
pub mod transport {
    pub use scpilib_transport::*;
}
