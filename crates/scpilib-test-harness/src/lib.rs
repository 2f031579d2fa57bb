//! scpilib-test-harness: scripted transports for scpilib tests.
//!
//! [`MockTransport`] drives the dispatch core in memory; [`MockTcpServer`]
//! stands in for a LAN instrument so the TCP transport can be exercised
//! end to end.

pub mod mock_tcp;
pub mod mock_transport;

pub use mock_tcp::MockTcpServer;
pub use mock_transport::MockTransport;
