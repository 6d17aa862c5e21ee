use anyhow::{Context, Result};
use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::time::{self, Instant};

use crate::config::LocatorConfig;
use crate::session::BackendUrl;
use crate::types::{now_rfc3339, ProbeResult};

/// Reachability check against a candidate's health endpoint.
///
/// Implementations never fail: refused connections, timeouts and non-2xx
/// answers all come back as `false`.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, ip: Ipv4Addr) -> bool;
}

/// Probe `ip` and time it.
pub async fn probe_timed(prober: &dyn Prober, ip: Ipv4Addr) -> ProbeResult {
    let start = Instant::now();
    let reachable = prober.probe(ip).await;
    ProbeResult {
        ip,
        reachable,
        latency_ms: start.elapsed().as_millis() as u64,
        timestamp: now_rfc3339(),
    }
}

/// `GET http://<ip>:<port><health_path>` over a shared HTTP client.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
    port: u16,
    health_path: String,
    timeout: Duration,
}

impl HttpProber {
    /// Candidates are LAN addresses, so environment proxy settings are ignored.
    pub fn new(port: u16, health_path: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            port,
            health_path: health_path.into(),
            timeout,
        })
    }

    pub fn from_config(cfg: &LocatorConfig) -> Result<Self> {
        Self::new(cfg.port, cfg.health_path.clone(), cfg.probe_timeout())
    }

    pub fn health_url(&self, ip: Ipv4Addr) -> String {
        format!("http://{}:{}{}", ip, self.port, self.health_path)
    }

    /// Health-check an already known base URL, e.g. one restored from cache.
    pub async fn check_url(&self, base: &BackendUrl) -> bool {
        self.get_ok(&format!("{}{}", base.as_str(), self.health_path)).await
    }

    async fn get_ok(&self, url: &str) -> bool {
        let req = self.client.get(url).timeout(self.timeout).send();
        match time::timeout(self.timeout, req).await {
            Ok(Ok(resp)) => {
                tracing::trace!(url, status = %resp.status(), "probe answered");
                resp.status().is_success()
            }
            Ok(Err(e)) => {
                tracing::trace!(url, error = %e, "probe failed");
                false
            }
            Err(_) => {
                tracing::trace!(url, "probe timed out");
                false
            }
        }
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, ip: Ipv4Addr) -> bool {
        self.get_ok(&self.health_url(ip)).await
    }
}
