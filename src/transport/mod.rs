//! ==============================================================================
//! transport - uplinks to the telemetry endpoint
//! ==============================================================================
//!
//! purpose:
//!     the delivery manager talks to exactly one of two link types:
//!       - a socket link (wired or wifi network interface, plain TCP)
//!       - a cellular modem driven over a serial port with AT commands
//!
//!     both traits are async; implementations that block (serial I/O) push
//!     the work onto tokio's blocking pool so the station loop stays responsive
//!     while still awaiting each step in order.
//!
//! relationships:
//!     - used by: delivery.rs
//!     - implemented by: ethernet.rs, modem.rs (and counting doubles in tests)
//!
//! ==============================================================================

#![allow(async_fn_in_trait)]

pub mod ethernet;
pub mod modem;

use anyhow::Result;

pub use ethernet::EthernetTransport;
pub use modem::AtModem;

/// A network interface that must be brought up once, then carries TCP.
pub trait SocketTransport {
    fn is_attached(&self) -> bool;
    async fn attach_network(&mut self) -> Result<()>;
    async fn connect(&mut self, host: &str, port: u16) -> Result<()>;
    async fn write(&mut self, data: &[u8]) -> Result<()>;
    async fn close(&mut self);
}

/// A cellular modem: registered on a network, then a packet data session,
/// then one TCP connection at a time.
pub trait ModemTransport {
    async fn reset(&mut self) -> Result<()>;
    async fn wait_for_network(&mut self) -> Result<()>;
    async fn data_session_connect(&mut self) -> Result<()>;
    async fn data_session_disconnect(&mut self) -> Result<()>;
    async fn connect(&mut self, host: &str, port: u16) -> Result<()>;
    async fn write(&mut self, data: &[u8]) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
}
