//! Stream readers for live channels and recordings served by the receiver.
//!
//! [`RecordingReader`] keeps following a recording the receiver is still
//! writing by periodically reopening it; [`LiveReader`] passes a live
//! channel stream straight through.  Both read from a [`RemoteFile`],
//! normally an [`HttpFile`].

mod clock;
mod error;
mod http;
mod live;
mod reader;
mod recording;
mod remote;

pub use clock::{Clock, SystemClock};
pub use error::StreamError;
pub use http::{HttpFile, HttpStreamOpener};
pub use live::LiveReader;
pub use reader::StreamReader;
pub use recording::{RecordingReader, NEAR_END_BYTES, REOPEN_INTERVAL, REOPEN_INTERVAL_FAST};
pub use remote::{OpenFlags, RemoteFile, StreamOpener};
