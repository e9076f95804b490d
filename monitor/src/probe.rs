//! Reachability probe and wake signal used by the connection monitor.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use e2pvr_common::protocol::current_time_url;
use e2pvr_common::wol::WakeOnLan;

/// A single reachability check against the backend.
pub trait Probe: Send + Sync {
    fn probe(&self) -> Result<()>;
}

/// Something that can wake a sleeping backend.
pub trait WakeSignal: Send + Sync {
    fn wake(&self) -> Result<()>;
}

// ── HTTP probe ───────────────────────────────────────────────────────────

/// Probes `GET <backend>/web/currenttime`.
///
/// Any HTTP response counts as reachable, whatever its status; only
/// timeouts and connection errors are failures.
pub struct HttpProbe {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(backend_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .context("Cannot create HTTP client")?;

        Ok(Self {
            client,
            url: current_time_url(backend_url),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Probe for HttpProbe {
    fn probe(&self) -> Result<()> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .with_context(|| format!("GET {}", self.url))?;
        debug!("Probe {} answered {}", self.url, resp.status());
        Ok(())
    }
}

// ── wake-on-LAN ──────────────────────────────────────────────────────────

impl WakeSignal for WakeOnLan {
    fn wake(&self) -> Result<()> {
        self.send()
            .with_context(|| format!("Wake-on-LAN for {}", self.mac()))
    }
}
