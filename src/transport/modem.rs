//! ==============================================================================
//! modem.rs - cellular uplink over AT commands
//! ==============================================================================
//!
//! purpose:
//!     drives a SIM800-class GSM/GPRS modem on a serial port:
//!       reset                  ATZ, ATE0
//!       wait_for_network       AT+CREG? until registered (home or roaming)
//!       data_session_connect   AT+CSTT (apn), AT+CIICR, AT+CIFSR
//!       connect                AT+CIPSTART="TCP",host,port
//!       write                  AT+CIPSEND, payload, Ctrl-Z
//!       close                  AT+CIPCLOSE
//!       data_session_disconnect AT+CIPSHUT
//!
//! threading:
//!     serial reads block, so every exchange runs on tokio's blocking pool
//!     with the port behind an async mutex, following the usual
//!     `spawn_blocking` + `blocking_lock` pattern for serial instruments.
//!
//! ==============================================================================

use std::io::{Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use tokio::sync::Mutex;
use tracing::{debug, info, trace};

use super::ModemTransport;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
const SESSION_TIMEOUT: Duration = Duration::from_secs(30);
const NETWORK_TIMEOUT: Duration = Duration::from_secs(60);
const NETWORK_POLL: Duration = Duration::from_secs(1);
const CTRL_Z: u8 = 0x1A;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApnSettings {
    pub apn: String,
    pub user: String,
    pub password: String,
}

/// Writes `payload` and reads until one of `expect` shows up.
fn exchange<P: Read + Write>(
    port: &mut P,
    payload: &[u8],
    expect: &[&str],
    timeout: Duration,
) -> Result<String> {
    trace!(sent = %String::from_utf8_lossy(payload).escape_default(), "modem tx");
    port.write_all(payload).context("serial write failed")?;
    port.flush().context("serial flush failed")?;

    let mut buffer = [0u8; 256];
    let mut response = String::new();
    let start = Instant::now();

    while start.elapsed() < timeout {
        if let Ok(n) = port.read(&mut buffer) {
            if n > 0 {
                response.push_str(&String::from_utf8_lossy(&buffer[..n]));
                if expect.iter().any(|token| response.contains(token)) {
                    trace!(received = %response.escape_default(), "modem rx");
                    return Ok(response.trim().to_string());
                }
                if response.contains("ERROR") {
                    bail!("modem answered {:?}", response.trim());
                }
                continue;
            }
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    bail!("no {:?} within {:?} (got {:?})", expect, timeout, response.trim())
}

pub struct AtModem<P> {
    port: Arc<Mutex<P>>,
    apn: ApnSettings,
    network_timeout: Duration,
}

impl AtModem<Box<dyn serialport::SerialPort>> {
    pub fn open(device: &str, baud: u32, apn: ApnSettings) -> Result<Self> {
        let port = serialport::new(device, baud)
            .timeout(Duration::from_millis(100))
            .open()
            .with_context(|| format!("cannot open modem port {device}"))?;
        info!(%device, baud, "modem port opened");
        Ok(Self::new(port, apn))
    }
}

impl<P: Read + Write + Send + 'static> AtModem<P> {
    pub fn new(port: P, apn: ApnSettings) -> Self {
        Self {
            port: Arc::new(Mutex::new(port)),
            apn,
            network_timeout: NETWORK_TIMEOUT,
        }
    }

    pub fn with_network_timeout(mut self, timeout: Duration) -> Self {
        self.network_timeout = timeout;
        self
    }

    async fn send(&self, payload: Vec<u8>, expect: &'static [&'static str], timeout: Duration) -> Result<String> {
        let port = Arc::clone(&self.port);
        tokio::task::spawn_blocking(move || {
            let mut port = port.blocking_lock();
            exchange(&mut *port, &payload, expect, timeout)
        })
        .await
        .context("modem task panicked")?
    }

    async fn command(&self, command: &str, expect: &'static [&'static str], timeout: Duration) -> Result<String> {
        self.send(format!("{command}\r").into_bytes(), expect, timeout)
            .await
            .with_context(|| format!("{command} failed"))
    }
}

impl<P: Read + Write + Send + 'static> ModemTransport for AtModem<P> {
    async fn reset(&mut self) -> Result<()> {
        self.command("ATZ", &["OK"], COMMAND_TIMEOUT).await?;
        self.command("ATE0", &["OK"], COMMAND_TIMEOUT).await?;
        debug!("modem reset");
        Ok(())
    }

    async fn wait_for_network(&mut self) -> Result<()> {
        let deadline = tokio::time::Instant::now() + self.network_timeout;
        loop {
            let reply = self.command("AT+CREG?", &["OK"], COMMAND_TIMEOUT).await?;
            if reply.contains("+CREG: 0,1") || reply.contains("+CREG: 0,5") {
                info!("modem registered on network");
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                bail!("modem not registered after {:?}", self.network_timeout);
            }
            tokio::time::sleep(NETWORK_POLL).await;
        }
    }

    async fn data_session_connect(&mut self) -> Result<()> {
        let ApnSettings { apn, user, password } = &self.apn;
        let cstt = format!("AT+CSTT=\"{apn}\",\"{user}\",\"{password}\"");
        self.command(&cstt, &["OK"], COMMAND_TIMEOUT).await?;
        self.command("AT+CIICR", &["OK"], SESSION_TIMEOUT).await?;
        // CIFSR answers with the bare address, no OK
        let ip = self.command("AT+CIFSR", &["."], COMMAND_TIMEOUT).await?;
        info!(apn = %apn, %ip, "data session up");
        Ok(())
    }

    async fn data_session_disconnect(&mut self) -> Result<()> {
        self.command("AT+CIPSHUT", &["SHUT OK"], SESSION_TIMEOUT).await?;
        Ok(())
    }

    async fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        let start = format!("AT+CIPSTART=\"TCP\",\"{host}\",\"{port}\"");
        self.command(&start, &["CONNECT OK", "ALREADY CONNECT"], SESSION_TIMEOUT).await?;
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.command("AT+CIPSEND", &[">"], COMMAND_TIMEOUT).await?;
        let mut payload = data.to_vec();
        payload.push(CTRL_Z);
        self.send(payload, &["SEND OK"], SESSION_TIMEOUT)
            .await
            .context("payload not accepted")?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.command("AT+CIPCLOSE", &["CLOSE OK"], COMMAND_TIMEOUT).await?;
        Ok(())
    }
}
