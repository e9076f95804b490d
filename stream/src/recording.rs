//! Reader for recordings, including ones the receiver is still writing.
//!
//! An open HTTP handle keeps reporting the length the file had when the
//! request was made, so growth is only visible after reopening.  While a
//! recording is in progress the reader reopens whenever the consumer has
//! caught up with the known length, and otherwise on a timer that runs
//! faster close to the live edge.

use std::io::{self, SeekFrom};

use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::StreamError;
use crate::reader::StreamReader;
use crate::remote::{OpenFlags, RemoteFile, StreamOpener};

/// Seconds between reopens while far from the live edge.
pub const REOPEN_INTERVAL: i64 = 30;

/// Seconds between reopens within [`NEAR_END_BYTES`] of the live edge.
pub const REOPEN_INTERVAL_FAST: i64 = 10;

pub const NEAR_END_BYTES: u64 = 10 * 1024 * 1024;

pub struct RecordingReader<O: StreamOpener, C: Clock = SystemClock> {
    opener: O,
    clock: C,
    url: String,
    file: Option<O::File>,
    position: u64,
    known_length: u64,
    /// Epoch seconds the recording ends; 0 once it is known complete.
    end_time: i64,
    next_reopen: i64,
}

impl<O: StreamOpener> RecordingReader<O> {
    /// Open `url`.  `end_time` is the recording's scheduled end in epoch
    /// seconds, or 0 for a finished recording.
    pub fn new(opener: O, url: impl Into<String>, end_time: i64) -> Self {
        Self::with_clock(opener, url, end_time, SystemClock)
    }
}

impl<O: StreamOpener, C: Clock> RecordingReader<O, C> {
    pub fn with_clock(opener: O, url: impl Into<String>, end_time: i64, clock: C) -> Self {
        let url = url.into();
        let file = match opener.open(&url, OpenFlags::INITIAL) {
            Ok(f) => Some(f),
            Err(e) => {
                warn!("Cannot open recording {url}: {e}");
                None
            }
        };
        let known_length = file.as_ref().map_or(0, |f| f.length());
        let next_reopen = clock.now() + REOPEN_INTERVAL;

        debug!("Opened recording {url} (length={known_length}, end_time={end_time})");

        Self {
            opener,
            clock,
            url,
            file,
            position: 0,
            known_length,
            end_time,
            next_reopen,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn end_time(&self) -> i64 {
        self.end_time
    }

    pub fn next_reopen_deadline(&self) -> i64 {
        self.next_reopen
    }

    fn reopen_if_needed(&mut self) {
        // A failed initial open is reported through `start()`, not retried.
        if self.end_time == 0 || self.file.is_none() {
            return;
        }

        let now = self.clock.now();
        if self.position != self.known_length && now <= self.next_reopen {
            return;
        }

        self.reopen();

        let remaining = self.known_length.saturating_sub(self.position);
        let interval = if remaining <= NEAR_END_BYTES {
            REOPEN_INTERVAL_FAST
        } else {
            REOPEN_INTERVAL
        };
        self.next_reopen = now + interval;

        if now > self.end_time {
            info!("Recording {} has finished", self.url);
            self.end_time = 0;
        }
    }

    /// Swap in a fresh handle positioned where the consumer left off.
    /// If the reopen fails, or the new handle cannot be placed at the
    /// current position, the previous handle stays in place.
    fn reopen(&mut self) {
        let mut file = match self.opener.open_at(&self.url, OpenFlags::REOPEN, self.position) {
            Ok(f) => f,
            Err(e) => {
                warn!("Cannot reopen recording {}: {e}", self.url);
                return;
            }
        };

        if file.position() != self.position {
            if let Err(e) = file.seek(SeekFrom::Start(self.position)) {
                warn!(
                    "Cannot seek reopened recording {} to {}: {e}",
                    self.url, self.position
                );
                return;
            }
            if file.position() != self.position {
                warn!(
                    "Reopened recording {} landed at {} instead of {}",
                    self.url,
                    file.position(),
                    self.position
                );
                return;
            }
        }

        let old_length = self.known_length;
        self.known_length = file.length();
        self.file = Some(file);

        debug!(
            "Reopened {} at {} (length {} → {})",
            self.url, self.position, old_length, self.known_length
        );
    }
}

impl<O: StreamOpener, C: Clock> StreamReader for RecordingReader<O, C> {
    fn start(&self) -> bool {
        self.file.is_some()
    }

    fn read_data(&mut self, buf: &mut [u8]) -> usize {
        self.reopen_if_needed();

        let Some(file) = self.file.as_mut() else {
            return 0;
        };
        match file.read(buf) {
            Ok(n) => {
                self.position += n as u64;
                n
            }
            Err(e) => {
                warn!("Read from {} failed at {}: {e}", self.url, self.position);
                0
            }
        }
    }

    /// The transport has been seen to report a wrong offset after a seek,
    /// so position and length are re-read from the handle instead.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64, StreamError> {
        let file = self.file.as_mut().ok_or(StreamError::NotOpen)?;
        file.seek(pos)?;
        self.position = file.position();
        self.known_length = file.length();
        Ok(self.position)
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn length(&self) -> Option<u64> {
        Some(self.known_length)
    }

    fn can_seek(&self) -> bool {
        true
    }

    fn is_realtime(&self) -> bool {
        self.end_time != 0
    }
}

impl<O: StreamOpener, C: Clock> io::Read for RecordingReader<O, C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_data(buf))
    }
}
