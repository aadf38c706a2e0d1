//! Socket uplink over a Linux network interface.
//!
//! "Attaching" means the interface reports its link as up in sysfs; the
//! kernel owns addressing. Each delivery opens one TCP connection.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info};

use super::SocketTransport;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct EthernetTransport {
    interface: String,
    sysfs_net: PathBuf,
    attached: bool,
    stream: Option<TcpStream>,
}

impl EthernetTransport {
    pub fn new(interface: &str) -> Self {
        Self::with_sysfs(interface, PathBuf::from("/sys/class/net"))
    }

    /// Reads link state from `sysfs_net/<interface>/operstate`.
    pub fn with_sysfs(interface: &str, sysfs_net: PathBuf) -> Self {
        Self {
            interface: interface.to_string(),
            sysfs_net,
            attached: false,
            stream: None,
        }
    }
}

impl SocketTransport for EthernetTransport {
    fn is_attached(&self) -> bool {
        self.attached
    }

    async fn attach_network(&mut self) -> Result<()> {
        let operstate = self.sysfs_net.join(&self.interface).join("operstate");
        let state = tokio::fs::read_to_string(&operstate)
            .await
            .with_context(|| format!("interface {} not found", self.interface))?;
        if state.trim() != "up" {
            bail!("interface {} is {}", self.interface, state.trim());
        }
        info!(interface = %self.interface, "network attached");
        self.attached = true;
        Ok(())
    }

    async fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port)))
            .await
            .with_context(|| format!("connecting to {host}:{port} timed out"))?
            .with_context(|| format!("connecting to {host}:{port}"))?;
        debug!(%host, port, "server connected");
        self.stream = Some(stream);
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            bail!("not connected");
        };
        stream.write_all(data).await.context("socket write failed")?;
        stream.flush().await.context("socket flush failed")?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!(error = %e, "socket shutdown failed");
            }
        }
    }
}
