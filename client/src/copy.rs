//! Copies a stream to a local writer, waiting out the gaps of a recording
//! that is still in progress.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use e2pvr_common::timer::CancellableTimer;
use e2pvr_stream::StreamReader;

use crate::status::BackendStatus;

const CHUNK: usize = 256 * 1024;

/// Copy until end of stream or until `timer` is cancelled.
///
/// A zero read from a real-time stream means no new data yet: wait
/// `idle_wait` and read again.  Reading is paused while the backend is
/// unavailable.  Returns the number of bytes written.
pub fn copy_stream<R, W>(
    reader: &mut R,
    out: &mut W,
    timer: &CancellableTimer,
    idle_wait: Duration,
    status: &BackendStatus,
) -> Result<u64>
where
    R: StreamReader + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = vec![0u8; CHUNK];
    let mut total = 0u64;

    while timer.is_active() {
        if !status.is_available() {
            debug!("Backend unavailable – waiting before reading");
            timer.sleep(idle_wait);
            continue;
        }

        let n = reader.read_data(&mut buf);
        if n > 0 {
            out.write_all(&buf[..n]).context("Cannot write stream output")?;
            total += n as u64;
            continue;
        }

        if !reader.is_realtime() {
            info!("End of stream after {total} bytes");
            break;
        }
        debug!("No new data at {} – recording still in progress", reader.position());
        timer.sleep(idle_wait);
    }

    out.flush().context("Cannot flush stream output")?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::io::SeekFrom;

    use e2pvr_monitor::ConnectionListener;
    use e2pvr_stream::StreamError;

    /// Hands out scripted chunks; an empty chunk is a zero read.  Stops
    /// being real-time once the script runs out.
    struct ScriptedReader {
        chunks: VecDeque<Vec<u8>>,
        position: u64,
        reads: usize,
    }

    impl StreamReader for ScriptedReader {
        fn start(&self) -> bool {
            true
        }

        fn read_data(&mut self, buf: &mut [u8]) -> usize {
            self.reads += 1;
            let Some(chunk) = self.chunks.pop_front() else {
                return 0;
            };
            buf[..chunk.len()].copy_from_slice(&chunk);
            self.position += chunk.len() as u64;
            chunk.len()
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
            !self.chunks.is_empty()
        }
    }

    fn connected() -> BackendStatus {
        let status = BackendStatus::default();
        status.connection_established();
        status
    }

    #[test]
    fn test_copies_across_zero_reads_while_live() {
        let mut reader = ScriptedReader {
            chunks: [vec![1u8; 10], vec![], vec![], vec![2u8; 5]].into(),
            position: 0,
            reads: 0,
        };
        let timer = CancellableTimer::new().with_step(Duration::from_millis(1));
        let mut out = Vec::new();

        let total =
            copy_stream(&mut reader, &mut out, &timer, Duration::from_millis(1), &connected()).unwrap();

        assert_eq!(total, 15);
        assert_eq!(out, [vec![1u8; 10], vec![2u8; 5]].concat());
        assert_eq!(reader.reads, 5);
    }

    #[test]
    fn test_cancelled_timer_stops_copy() {
        let mut reader = ScriptedReader {
            chunks: [vec![1u8; 10]].into(),
            position: 0,
            reads: 0,
        };
        let timer = CancellableTimer::new();
        timer.cancel();
        let mut out = Vec::new();

        let total =
            copy_stream(&mut reader, &mut out, &timer, Duration::from_secs(1), &connected()).unwrap();
        assert_eq!(total, 0);
        assert_eq!(reader.reads, 0);
    }

    #[test]
    fn test_waits_while_backend_unavailable() {
        let mut reader = ScriptedReader {
            chunks: [vec![1u8; 10]].into(),
            position: 0,
            reads: 0,
        };
        let timer = CancellableTimer::new().with_step(Duration::from_millis(5));
        let canceller = timer.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            canceller.cancel();
        });
        let mut out = Vec::new();

        let total = copy_stream(
            &mut reader,
            &mut out,
            &timer,
            Duration::from_millis(5),
            &BackendStatus::default(),
        )
        .unwrap();
        handle.join().unwrap();

        assert_eq!(total, 0);
        assert_eq!(reader.reads, 0);
    }
}
