//! ==============================================================================
//! delivery.rs - one telemetry upload per cycle
//! ==============================================================================
//!
//! purpose:
//!     writes the serialized GET request to the endpoint over whichever uplink
//!     the station is configured with, and reports when the attempt happened
//!     and whether it worked. the outcome is for display only; the next cycle
//!     always makes a fresh attempt.
//!
//! state machine:
//!     Idle -> Connecting -> Sending -> Done(success | failure)
//!
//!     socket uplink: attach the interface once (kept for later cycles),
//!     connect, write, close. any failure ends the attempt.
//!
//!     modem uplink: reset, wait for network, open the data session, connect
//!     to the server. if anything after the reset fails, the data session is
//!     torn down and the whole sequence runs one more time; the second
//!     attempt's result is final. a failed reset ends the attempt at once.
//!     after sending, the socket and data session are always closed.
//!
//! ==============================================================================

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::transport::{AtModem, EthernetTransport, ModemTransport, SocketTransport};

/// Connecting sequences per modem delivery: the first try and one retry.
pub const MODEM_ATTEMPTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Idle,
    Connecting,
    Sending,
    Done { success: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    /// Time of the attempt as shown on the status display.
    pub at: String,
    pub success: bool,
}

pub enum Uplink<S, M> {
    Disabled,
    Socket(S),
    Modem(M),
}

/// The uplink types the station binary is built with.
pub type StationUplink = Uplink<EthernetTransport, AtModem<Box<dyn serialport::SerialPort>>>;

pub struct DeliveryManager<S, M> {
    uplink: Uplink<S, M>,
    host: String,
    port: u16,
    state: DeliveryState,
}

impl<S: SocketTransport, M: ModemTransport> DeliveryManager<S, M> {
    pub fn new(uplink: Uplink<S, M>, host: &str, port: u16) -> Self {
        Self {
            uplink,
            host: host.to_string(),
            port,
            state: DeliveryState::Idle,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self.uplink, Uplink::Disabled)
    }

    pub fn state(&self) -> DeliveryState {
        self.state
    }

    /// Sends `request` once. `None` when delivery is disabled.
    pub async fn deliver(&mut self, request: &str, at: String) -> Option<DeliveryOutcome> {
        self.state = DeliveryState::Connecting;
        let result = match &mut self.uplink {
            Uplink::Disabled => {
                self.state = DeliveryState::Idle;
                return None;
            }
            Uplink::Socket(socket) => {
                Self::deliver_socket(socket, &mut self.state, &self.host, self.port, request).await
            }
            Uplink::Modem(modem) => {
                Self::deliver_modem(modem, &mut self.state, &self.host, self.port, request).await
            }
        };

        let success = match result {
            Ok(()) => {
                info!(host = %self.host, "data sent");
                true
            }
            Err(e) => {
                warn!(host = %self.host, error = %format!("{e:#}"), "delivery failed");
                false
            }
        };
        self.state = DeliveryState::Done { success };
        Some(DeliveryOutcome { at, success })
    }

    async fn deliver_socket(
        socket: &mut S,
        state: &mut DeliveryState,
        host: &str,
        port: u16,
        request: &str,
    ) -> Result<()> {
        if !socket.is_attached() {
            socket.attach_network().await.context("network attach")?;
        }
        socket.connect(host, port).await.context("server connect")?;

        *state = DeliveryState::Sending;
        let sent = socket.write(request.as_bytes()).await.context("request write");
        socket.close().await;
        sent
    }

    async fn deliver_modem(
        modem: &mut M,
        state: &mut DeliveryState,
        host: &str,
        port: u16,
        request: &str,
    ) -> Result<()> {
        let mut attempt = 1;
        loop {
            modem.reset().await.context("modem reset")?;
            match Self::open_modem_link(modem, host, port).await {
                Ok(()) => break,
                Err(e) if attempt < MODEM_ATTEMPTS => {
                    warn!(attempt, error = %format!("{e:#}"), "modem link failed, retrying");
                    if let Err(e) = modem.data_session_disconnect().await {
                        warn!(error = %format!("{e:#}"), "data session teardown failed");
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }

        *state = DeliveryState::Sending;
        let sent = modem.write(request.as_bytes()).await.context("request write");
        if let Err(e) = modem.close().await {
            warn!(error = %format!("{e:#}"), "socket close failed");
        }
        if let Err(e) = modem.data_session_disconnect().await {
            warn!(error = %format!("{e:#}"), "data session teardown failed");
        }
        sent
    }

    async fn open_modem_link(modem: &mut M, host: &str, port: u16) -> Result<()> {
        modem.wait_for_network().await.context("network registration")?;
        modem.data_session_connect().await.context("data session")?;
        modem.connect(host, port).await.context("server connect")?;
        Ok(())
    }
}
