//! Connection health monitor.
//!
//! A single background thread probes the backend, sends wake-on-LAN
//! packets when configured, and reports reachability transitions to a
//! [`ConnectionListener`].  Failed probes are retried at half the
//! configured interval for the first few attempts, then at the full
//! interval until the backend answers again.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use e2pvr_common::config::MonitorConfig;
use e2pvr_common::protocol::ConnectionState;
use e2pvr_common::timer::{CancellableTimer, SLEEP_STEP};
use e2pvr_common::wol::WakeOnLan;

use crate::listener::ConnectionListener;
use crate::probe::{HttpProbe, Probe, WakeSignal};

/// Shortest probe interval; zero would probe without pausing.
const MIN_INTERVAL_SECS: u64 = 1;

/// Consecutive failures retried at the fast (half) interval.
const FAST_RECONNECT_ATTEMPTS: u32 = 5;

/// Delay before the next probe after `retry_attempt` consecutive failures.
fn retry_delay(interval: Duration, retry_attempt: u32) -> Duration {
    if retry_attempt > 0 && retry_attempt <= FAST_RECONNECT_ATTEMPTS {
        interval / 2
    } else {
        interval
    }
}

#[derive(Debug, Default)]
struct Session {
    suspended: bool,
    state: ConnectionState,
}

struct Shared {
    config: MonitorConfig,
    listener: Arc<dyn ConnectionListener>,
    probe: Box<dyn Probe>,
    wake: Option<Box<dyn WakeSignal>>,
    session: Mutex<Session>,
    timer: CancellableTimer,
}

impl Shared {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_suspended(&self) -> bool {
        self.session().suspended
    }

    /// Record `new` and notify the listener, unless it is the current
    /// state or the host is asleep.
    fn set_state(&self, new: ConnectionState) {
        let old = {
            let mut session = self.session();
            if session.suspended || session.state == new {
                return;
            }
            std::mem::replace(&mut session.state, new)
        };

        info!("Connection state {old} → {new} ({})", self.config.backend_url);

        match new {
            ConnectionState::Unreachable => self.listener.connection_lost(),
            ConnectionState::Connected => self.listener.connection_established(),
            ConnectionState::Unknown | ConnectionState::Connecting => {}
        }
        self.listener
            .connection_state_change(&self.config.backend_url, new, "");
    }
}

// ── builder ──────────────────────────────────────────────────────────────

/// Assembles a [`ConnectionMonitor`].
///
/// Without an explicit probe the monitor uses [`HttpProbe`] against the
/// configured backend.  Without an explicit wake signal it sends
/// wake-on-LAN packets when the config carries a MAC address.
pub struct MonitorBuilder {
    config: MonitorConfig,
    listener: Arc<dyn ConnectionListener>,
    probe: Option<Box<dyn Probe>>,
    wake: Option<Box<dyn WakeSignal>>,
    sleep_step: Duration,
}

impl MonitorBuilder {
    pub fn probe(mut self, probe: impl Probe + 'static) -> Self {
        self.probe = Some(Box::new(probe));
        self
    }

    pub fn wake_signal(mut self, wake: impl WakeSignal + 'static) -> Self {
        self.wake = Some(Box::new(wake));
        self
    }

    pub fn sleep_step(mut self, step: Duration) -> Self {
        self.sleep_step = step;
        self
    }

    pub fn build(mut self) -> Result<ConnectionMonitor> {
        if self.config.interval_secs < MIN_INTERVAL_SECS {
            warn!(
                "Connection check interval {}s too short, using {MIN_INTERVAL_SECS}s",
                self.config.interval_secs
            );
            self.config.interval_secs = MIN_INTERVAL_SECS;
        }

        let probe = match self.probe {
            Some(p) => p,
            None => Box::new(HttpProbe::new(
                &self.config.backend_url,
                Duration::from_secs(self.config.timeout_secs),
            )?),
        };
        let wake = self.wake.or_else(|| {
            self.config
                .wake_on_lan_mac
                .map(|mac| Box::new(WakeOnLan::new(mac)) as Box<dyn WakeSignal>)
        });

        Ok(ConnectionMonitor {
            shared: Arc::new(Shared {
                config: self.config,
                listener: self.listener,
                probe,
                wake,
                session: Mutex::new(Session::default()),
                timer: CancellableTimer::new().with_step(self.sleep_step),
            }),
            worker: Mutex::new(None),
        })
    }
}

// ── monitor ──────────────────────────────────────────────────────────────

/// Owns the probe thread between [`start`](Self::start) and
/// [`stop`](Self::stop).
pub struct ConnectionMonitor {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionMonitor {
    pub fn builder(
        config: MonitorConfig,
        listener: Arc<dyn ConnectionListener>,
    ) -> MonitorBuilder {
        MonitorBuilder {
            config,
            listener,
            probe: None,
            wake: None,
            sleep_step: SLEEP_STEP,
        }
    }

    fn worker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Announce `Connecting` and spawn the probe loop.
    ///
    /// The listener is notified without any lock held, so it may call
    /// back into the monitor.  A `stop()` from that callback wins: the
    /// probe loop is then not started.
    pub fn start(&self) -> Result<()> {
        if self.worker().is_some() {
            warn!("Connection monitor already running");
            return Ok(());
        }

        self.shared.timer.arm();
        self.shared.set_state(ConnectionState::Connecting);

        // `stop()` cancels before taking the worker lock, so checking the
        // timer under the lock cannot miss a concurrent stop.
        let mut worker = self.worker();
        if !self.shared.timer.is_active() {
            debug!("Connection monitor stopped while starting");
            return Ok(());
        }
        if worker.is_some() {
            warn!("Connection monitor already running");
            return Ok(());
        }
        let probe_loop = ProbeLoop::new(Arc::clone(&self.shared));
        let handle = std::thread::Builder::new()
            .name("connection-monitor".into())
            .spawn(move || probe_loop.run())
            .context("Cannot spawn connection monitor thread")?;
        *worker = Some(handle);
        drop(worker);

        info!(
            "Connection monitor started for {} (interval={}s, timeout={}s)",
            self.shared.config.backend_url,
            self.shared.config.interval_secs,
            self.shared.config.timeout_secs
        );
        Ok(())
    }

    /// End the probe loop, wait for it, then report the connection lost.
    pub fn stop(&self) {
        self.shared.timer.cancel();

        let handle = self.worker().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Connection monitor thread panicked");
            }
        }

        info!("Connection monitor stopped");
        self.shared.listener.connection_lost();
    }

    /// The host is going to sleep: stop probing and notifying.
    pub fn on_sleep(&self) {
        self.shared.session().suspended = true;
        info!("Connection monitor suspended");
    }

    pub fn on_wake(&self) {
        self.shared.session().suspended = false;
        info!("Connection monitor resumed");
    }

    /// Report the backend as unreachable so dependants drop their state;
    /// the next successful probe reports it connected again.
    pub fn reconnect(&self) {
        info!("Reconnect requested for {}", self.shared.config.backend_url);
        self.shared.set_state(ConnectionState::Unreachable);
    }
}

impl Drop for ConnectionMonitor {
    fn drop(&mut self) {
        self.shared.timer.cancel();
        let handle = self
            .worker
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.join().ok();
        }
    }
}

// ── probe loop ───────────────────────────────────────────────────────────

struct ProbeLoop {
    shared: Arc<Shared>,
    retry_attempt: u32,
}

impl ProbeLoop {
    fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            retry_attempt: 0,
        }
    }

    fn run(mut self) {
        let timer = self.shared.timer.clone();
        while timer.is_active() {
            if !self.wait_while_suspended() {
                break;
            }
            let delay = self.step();
            timer.sleep(delay);
        }
        debug!("Probe loop finished");
    }

    /// Park until the host wakes up.  Returns `false` when cancelled.
    fn wait_while_suspended(&self) -> bool {
        let timer = &self.shared.timer;
        while self.shared.is_suspended() {
            if !timer.sleep(timer.step()) {
                return false;
            }
        }
        timer.is_active()
    }

    /// One wake + probe cycle; returns how long to sleep before the next.
    fn step(&mut self) -> Duration {
        let interval = Duration::from_secs(self.shared.config.interval_secs);

        if let Some(wake) = &self.shared.wake {
            if let Err(e) = wake.wake() {
                warn!("{e:#}");
            }
        }

        match self.shared.probe.probe() {
            Ok(()) => {
                self.shared.set_state(ConnectionState::Connected);
                self.retry_attempt = 0;
                interval
            }
            Err(e) => {
                if self.retry_attempt == 0 {
                    error!("Backend {} unreachable: {e:#}", self.shared.config.backend_url);
                } else {
                    debug!("Probe attempt {} failed: {e:#}", self.retry_attempt + 1);
                }
                self.shared.set_state(ConnectionState::Unreachable);
                self.retry_attempt = self.retry_attempt.saturating_add(1);
                retry_delay(interval, self.retry_attempt)
            }
        }
    }
}
