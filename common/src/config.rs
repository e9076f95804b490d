//! Configuration parsing – reads a KEY=VALUE file (`e2pvr.conf`).
//!
//! The file is read once at startup; the monitor and the stream readers
//! receive immutable projections of it and never touch it again.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::wol::MacAddress;

/// Application configuration for the backend client.
#[derive(Debug, Clone)]
pub struct Config {
    // ── backend ──────────────────────────────────────────────────────
    /// Base URL of the receiver's web interface, without trailing slash.
    pub backend_url: String,

    // ── connection check (monitor) ───────────────────────────────────
    pub connection_check_interval_secs: u64,
    pub connection_check_timeout_secs: u64,
    pub wake_on_lan_mac: Option<MacAddress>,

    // ── streaming ────────────────────────────────────────────────────
    pub stream_read_timeout_secs: u64,
    /// Recording the client copies to `stream_output`, if any.
    pub stream_url: Option<String>,
    /// Epoch seconds at which the recording ends, 0 when complete.
    pub stream_end_time: i64,
    pub stream_output: Option<PathBuf>,
}

/// The part of [`Config`] the connection monitor needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub backend_url: String,
    pub interval_secs: u64,
    pub timeout_secs: u64,
    pub wake_on_lan_mac: Option<MacAddress>,
}

impl Config {
    /// Default config path.
    pub fn default_path() -> &'static str {
        "/etc/e2pvr/e2pvr.conf"
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            backend_url: self.backend_url.clone(),
            interval_secs: self.connection_check_interval_secs,
            timeout_secs: self.connection_check_timeout_secs,
            wake_on_lan_mac: self.wake_on_lan_mac,
        }
    }
}

/// Load and parse a `KEY=VALUE` configuration file.
pub fn load(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read config: {}", path.display()))?;

    let config = from_str(&text)
        .with_context(|| format!("Invalid config: {}", path.display()))?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Build a [`Config`] from the text of a configuration file.
///
/// Lines starting with `#` are comments.  Values may be optionally
/// double-quoted.  Unknown keys are silently ignored and malformed
/// numbers fall back to their defaults; only a malformed MAC address
/// is rejected.  A zero probe interval is raised to one second.
pub fn from_str(text: &str) -> Result<Config> {
    let map = parse_conf(text);

    let get = |key: &str| -> Option<String> {
        map.get(key).cloned().filter(|v| !v.is_empty())
    };
    let get_u64 = |key: &str, default: u64| -> u64 {
        get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    };

    let wake_on_lan_mac = get("WAKE_ON_LAN_MAC")
        .map(|v| v.parse::<MacAddress>())
        .transpose()
        .context("WAKE_ON_LAN_MAC")?;

    Ok(Config {
        backend_url: get("BACKEND_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| "http://127.0.0.1".into()),
        connection_check_interval_secs: get_u64("CONNECTION_CHECK_INTERVAL_SECS", 10).max(1),
        connection_check_timeout_secs: get_u64("CONNECTION_CHECK_TIMEOUT_SECS", 10),
        wake_on_lan_mac,
        stream_read_timeout_secs: get_u64("STREAM_READ_TIMEOUT_SECS", 30),
        stream_url: get("STREAM_URL"),
        stream_end_time: get("STREAM_END_TIME")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        stream_output: get("STREAM_OUTPUT").map(PathBuf::from),
    })
}

/// Parse `KEY=VALUE` lines into a map, stripping optional double-quotes.
fn parse_conf(text: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, val)) = line.split_once('=') {
            let key = key.trim();
            let val = val.trim().trim_matches('"');
            map.insert(key.to_string(), val.to_string());
        }
    }
    map
}

// ─── tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_conf() {
        let text = r#"
# comment
BACKEND_URL="http://192.168.1.20/"
CONNECTION_CHECK_INTERVAL_SECS=30
WAKE_ON_LAN_MAC=00:1d:ec:0a:0b:0c
"#;
        let map = parse_conf(text);
        assert_eq!(map["BACKEND_URL"], "http://192.168.1.20/");
        assert_eq!(map["CONNECTION_CHECK_INTERVAL_SECS"], "30");
        assert!(!map.contains_key("# comment"));
    }

    #[test]
    fn test_defaults() {
        let config = from_str("UNKNOWN_KEY=1\n").unwrap();
        assert_eq!(config.backend_url, "http://127.0.0.1");
        assert_eq!(config.connection_check_interval_secs, 10);
        assert_eq!(config.connection_check_timeout_secs, 10);
        assert_eq!(config.stream_read_timeout_secs, 30);
        assert_eq!(config.stream_end_time, 0);
        assert!(config.wake_on_lan_mac.is_none());
        assert!(config.stream_url.is_none());
        assert!(config.stream_output.is_none());
    }

    #[test]
    fn test_monitor_config_projection() {
        let text = "BACKEND_URL=http://box:8080/\n\
                    CONNECTION_CHECK_INTERVAL_SECS=20\n\
                    CONNECTION_CHECK_TIMEOUT_SECS=notanumber\n\
                    WAKE_ON_LAN_MAC=00-1D-EC-0A-0B-0C\n";
        let monitor = from_str(text).unwrap().monitor_config();
        assert_eq!(monitor.backend_url, "http://box:8080");
        assert_eq!(monitor.interval_secs, 20);
        assert_eq!(monitor.timeout_secs, 10);
        assert_eq!(
            monitor.wake_on_lan_mac.map(|m| m.to_string()),
            Some("00:1d:ec:0a:0b:0c".to_string())
        );
    }

    #[test]
    fn test_zero_interval_is_raised_to_one_second() {
        let config = from_str("CONNECTION_CHECK_INTERVAL_SECS=0\n").unwrap();
        assert_eq!(config.connection_check_interval_secs, 1);
        assert_eq!(config.monitor_config().interval_secs, 1);
    }

    #[test]
    fn test_bad_mac_is_rejected() {
        let err = from_str("WAKE_ON_LAN_MAC=zz:zz\n").unwrap_err();
        assert!(format!("{err:#}").contains("WAKE_ON_LAN_MAC"));
    }

    #[test]
    fn test_load_from_file() {
        let text = "STREAM_URL=http://box:8001/recording.ts\nSTREAM_END_TIME=1700000000\n";
        let tmp = tempfile(text);
        let config = load(tmp.as_path()).unwrap();
        assert_eq!(config.stream_url.as_deref(), Some("http://box:8001/recording.ts"));
        assert_eq!(config.stream_end_time, 1_700_000_000);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(load(Path::new("/nonexistent/e2pvr.conf")).is_err());
    }

    fn tempfile(content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("e2pvr_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test.conf");
        std::fs::write(&path, content).unwrap();
        path
    }
}
