//! The remote, seekable byte source the readers are built on.

use std::io::SeekFrom;

use crate::error::StreamError;

/// How a stream is being opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    /// Re-establishing a stream that was already open.
    pub reopen: bool,
    /// Ask every cache on the way to serve the file's current state.
    pub no_cache: bool,
}

impl OpenFlags {
    pub const INITIAL: Self = Self {
        reopen: false,
        no_cache: false,
    };

    pub const REOPEN: Self = Self {
        reopen: true,
        no_cache: true,
    };
}

/// An open handle on a remote file.  Closed when dropped.
pub trait RemoteFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError>;

    /// Move the read offset.  The returned offset is what the transport
    /// claims; [`position`](Self::position) is authoritative.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64, StreamError>;

    /// Size reported by the backend when the handle was (re)positioned,
    /// 0 when unknown.
    fn length(&self) -> u64;

    fn position(&self) -> u64;
}

/// Opens [`RemoteFile`]s by URL.
pub trait StreamOpener {
    type File: RemoteFile;

    /// Open `url` with the read offset already at `offset`.  The handle's
    /// [`position`](RemoteFile::position) tells where it actually landed.
    fn open_at(
        &self,
        url: &str,
        flags: OpenFlags,
        offset: u64,
    ) -> Result<Self::File, StreamError>;

    fn open(&self, url: &str, flags: OpenFlags) -> Result<Self::File, StreamError> {
        self.open_at(url, flags, 0)
    }
}
