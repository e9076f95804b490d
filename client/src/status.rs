//! Connection listener that tracks backend availability for the client.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use tracing::{info, warn};

use e2pvr_common::protocol::ConnectionState;
use e2pvr_monitor::ConnectionListener;

/// Shared between the monitor thread and the rest of the client.
#[derive(Debug, Default)]
pub struct BackendStatus {
    available: AtomicBool,
    reloads: AtomicU32,
}

impl BackendStatus {
    /// Whether backend calls should be attempted right now.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// How many times the metadata had to be reloaded after reconnecting.
    pub fn reload_count(&self) -> u32 {
        self.reloads.load(Ordering::SeqCst)
    }
}

impl ConnectionListener for BackendStatus {
    fn connection_lost(&self) {
        if self.available.swap(false, Ordering::SeqCst) {
            warn!("Backend connection lost – pausing backend calls");
        }
    }

    fn connection_established(&self) {
        self.available.store(true, Ordering::SeqCst);
        let n = self.reloads.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Backend connection established – reloading metadata (#{n})");
    }

    fn connection_state_change(&self, url: &str, state: ConnectionState, _info: &str) {
        info!("Backend {url} is {state}");
    }
}
