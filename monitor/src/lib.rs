//! Backend connection health monitoring.
//!
//! [`ConnectionMonitor`] keeps probing the receiver from a background
//! thread and tells a [`ConnectionListener`] whenever reachability changes.

mod listener;
mod monitor;
mod probe;

pub use listener::ConnectionListener;
pub use monitor::{ConnectionMonitor, MonitorBuilder};
pub use probe::{HttpProbe, Probe, WakeSignal};
