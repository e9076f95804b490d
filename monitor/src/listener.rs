//! Receiver of connection state transitions.

use e2pvr_common::protocol::ConnectionState;

/// Implemented by whoever needs to react to backend reachability: pausing
/// backend calls, reloading metadata, surfacing a message to the user.
///
/// Callbacks are invoked on the monitor's thread (or the thread calling
/// into the monitor) with no internal lock held, so implementations may
/// call back into the monitor.
pub trait ConnectionListener: Send + Sync {
    /// The backend became unreachable, or a full reload was requested.
    fn connection_lost(&self);

    /// The backend answered after being unreachable or unknown.
    fn connection_established(&self);

    /// Fired for every transition, after the specific callback above.
    fn connection_state_change(&self, url: &str, state: ConnectionState, info: &str);
}
