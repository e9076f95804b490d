//! Pass-through reader for live channel streams.

use std::io::{self, SeekFrom};

use tracing::warn;

use crate::error::StreamError;
use crate::reader::StreamReader;
use crate::remote::{OpenFlags, RemoteFile, StreamOpener};

pub struct LiveReader<F> {
    url: String,
    file: Option<F>,
    position: u64,
}

impl<F: RemoteFile> LiveReader<F> {
    pub fn new<O>(opener: &O, url: impl Into<String>) -> Self
    where
        O: StreamOpener<File = F>,
    {
        let url = url.into();
        let file = match opener.open(&url, OpenFlags::INITIAL) {
            Ok(f) => Some(f),
            Err(e) => {
                warn!("Cannot open live stream {url}: {e}");
                None
            }
        };
        Self {
            url,
            file,
            position: 0,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl<F: RemoteFile> StreamReader for LiveReader<F> {
    fn start(&self) -> bool {
        self.file.is_some()
    }

    fn read_data(&mut self, buf: &mut [u8]) -> usize {
        let Some(file) = self.file.as_mut() else {
            return 0;
        };
        match file.read(buf) {
            Ok(n) => {
                self.position += n as u64;
                n
            }
            Err(e) => {
                warn!("Read from live stream {} failed: {e}", self.url);
                0
            }
        }
    }

    fn seek(&mut self, _pos: SeekFrom) -> Result<u64, StreamError> {
        Err(StreamError::NotSeekable)
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn length(&self) -> Option<u64> {
        None
    }

    fn can_seek(&self) -> bool {
        false
    }

    fn is_realtime(&self) -> bool {
        true
    }
}

impl<F: RemoteFile> io::Read for LiveReader<F> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_data(buf))
    }
}
