//! Types shared by the e2pvr crates: configuration, the receiver's web
//! protocol, wake-on-LAN and the interruptible timer.

pub mod config;
pub mod protocol;
pub mod timer;
pub mod wol;
