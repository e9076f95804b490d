//! e2pvr client – watches the receiver's reachability and optionally
//! copies a (possibly still running) recording to a local file.

mod copy;
mod status;

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, info};

use e2pvr_common::config::Config;
use e2pvr_common::timer::CancellableTimer;
use e2pvr_monitor::ConnectionMonitor;
use e2pvr_stream::{HttpStreamOpener, RecordingReader, StreamReader};

use crate::status::BackendStatus;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── load config ──────────────────────────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| Config::default_path().to_string());
    let config =
        e2pvr_common::config::load(&PathBuf::from(&config_path)).context("Config load failed")?;

    info!("e2pvr client starting (backend={})", config.backend_url);

    // ── ctrl-c ───────────────────────────────────────────────────────
    let shutdown = CancellableTimer::new();
    let handler_shutdown = shutdown.clone();
    ctrlc::set_handler(move || {
        handler_shutdown.cancel();
        info!("Shutdown signal received");
    })
    .context("Cannot set Ctrl-C handler")?;

    // ── connection monitor ───────────────────────────────────────────
    let status = Arc::new(BackendStatus::default());
    let monitor = ConnectionMonitor::builder(config.monitor_config(), status.clone())
        .build()
        .context("Cannot create connection monitor")?;
    monitor.start()?;

    // ── optional recording copy ──────────────────────────────────────
    let stream_thread = match (&config.stream_url, &config.stream_output) {
        (Some(url), Some(output)) => Some(spawn_stream_copy(
            &config,
            url.clone(),
            output.clone(),
            shutdown.clone(),
            status.clone(),
        )?),
        _ => None,
    };

    while shutdown.sleep(Duration::from_secs(60)) {
        debug!(
            "Backend available={} reloads={}",
            status.is_available(),
            status.reload_count()
        );
    }

    monitor.stop();
    if let Some(handle) = stream_thread {
        handle.join().ok();
    }

    info!("e2pvr client stopped");
    Ok(())
}

fn spawn_stream_copy(
    config: &Config,
    url: String,
    output: PathBuf,
    shutdown: CancellableTimer,
    status: Arc<BackendStatus>,
) -> Result<JoinHandle<()>> {
    let opener = HttpStreamOpener::new(Duration::from_secs(config.stream_read_timeout_secs))
        .context("Cannot create stream HTTP client")?;
    let end_time = config.stream_end_time;
    let idle_wait = Duration::from_secs(config.connection_check_interval_secs.max(1));

    std::thread::Builder::new()
        .name("stream-copy".into())
        .spawn(move || {
            let result =
                copy_recording(opener, &url, end_time, &output, &shutdown, idle_wait, &status);
            if let Err(e) = result {
                error!("Stream copy failed: {e:#}");
            }
        })
        .context("Cannot spawn stream copy thread")
}

fn copy_recording(
    opener: HttpStreamOpener,
    url: &str,
    end_time: i64,
    output: &Path,
    shutdown: &CancellableTimer,
    idle_wait: Duration,
    status: &BackendStatus,
) -> Result<()> {
    let mut reader = RecordingReader::new(opener, url, end_time);
    if !reader.start() {
        anyhow::bail!("Cannot open recording {url}");
    }

    let file = File::create(output)
        .with_context(|| format!("Cannot create {}", output.display()))?;
    let mut out = BufWriter::new(file);

    info!(
        "Copying {url} → {} (length={:?}, live={})",
        output.display(),
        reader.length(),
        reader.is_realtime()
    );
    let total = copy::copy_stream(&mut reader, &mut out, shutdown, idle_wait, status)?;
    info!("Copied {total} bytes to {}", output.display());
    Ok(())
}
