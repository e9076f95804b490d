//! Shared types describing the receiver's web interface and the client's
//! view of it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lightweight endpoint used to check the backend is reachable.
pub const CURRENT_TIME_PATH: &str = "/web/currenttime";

/// Full URL of the health-probe endpoint for a backend base URL.
pub fn current_time_url(backend_url: &str) -> String {
    format!("{}{}", backend_url.trim_end_matches('/'), CURRENT_TIME_PATH)
}

/// Reachability of the backend as seen by the connection monitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Nothing has been attempted yet.
    #[default]
    Unknown,
    /// Started, first probe still pending.
    Connecting,
    Connected,
    /// Probe failed, or a full reload was requested.
    Unreachable,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "unknown",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Unreachable => "unreachable",
        })
    }
}
