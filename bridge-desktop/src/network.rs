//! Network Monitoring Implementation

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    network::{NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

const DEFAULT_PROBE_ADDR: &str = "8.8.8.8:53";
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Desktop network monitor implementation
///
/// Detects connectivity by opening a TCP connection to a well-known address.
/// Desktop links are reported as unmetered [`NetworkType::Other`]; telling
/// WiFi from Ethernet needs platform APIs this crate does not pull in.
pub struct DesktopNetworkMonitor {
    probe_addr: String,
    probe_timeout: Duration,
    cached_info: Arc<Mutex<Option<NetworkInfo>>>,
}

impl DesktopNetworkMonitor {
    /// Create a new network monitor
    pub fn new() -> Self {
        Self::with_probe_addr(DEFAULT_PROBE_ADDR)
    }

    /// Probe a specific `host:port`, typically the media server itself.
    pub fn with_probe_addr(addr: impl Into<String>) -> Self {
        Self {
            probe_addr: addr.into(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            cached_info: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Last observed network info, without probing.
    pub async fn last_known(&self) -> Option<NetworkInfo> {
        self.cached_info.lock().await.clone()
    }

    async fn check_connectivity(&self) -> NetworkStatus {
        match tokio::time::timeout(
            self.probe_timeout,
            tokio::net::TcpStream::connect(self.probe_addr.as_str()),
        )
        .await
        {
            Ok(Ok(_)) => NetworkStatus::Connected,
            Ok(Err(_)) | Err(_) => NetworkStatus::Disconnected,
        }
    }
}

impl Default for DesktopNetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkMonitor for DesktopNetworkMonitor {
    async fn get_network_info(&self) -> Result<NetworkInfo> {
        let status = self.check_connectivity().await;

        let info = NetworkInfo {
            status,
            network_type: (status == NetworkStatus::Connected).then_some(NetworkType::Other),
            is_metered: false,
        };

        *self.cached_info.lock().await = Some(info.clone());
        debug!(status = ?status, addr = %self.probe_addr, "Network info updated");

        Ok(info)
    }

    async fn is_metered(&self) -> bool {
        false
    }
}
