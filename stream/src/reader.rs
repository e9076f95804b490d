use std::io::SeekFrom;

use crate::error::StreamError;

/// What the playback pipeline sees of a stream, live or recorded.
pub trait StreamReader {
    /// Whether the underlying stream could be opened.
    fn start(&self) -> bool;

    /// Read up to `buf.len()` bytes.  Zero means end of stream, or for a
    /// recording still in progress, no new data yet.
    fn read_data(&mut self, buf: &mut [u8]) -> usize;

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, StreamError>;

    fn position(&self) -> u64;

    /// Total size when known.
    fn length(&self) -> Option<u64>;

    fn can_seek(&self) -> bool;

    /// Whether the stream is still being produced by the backend.
    fn is_realtime(&self) -> bool;
}
