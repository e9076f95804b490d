//! [`RemoteFile`] over HTTP range requests.
//!
//! Every (re)position issues `GET` with `Range: bytes=<offset>-` and reads
//! the body sequentially.  The file length comes from `Content-Range` and
//! is therefore the size the receiver reported at request time.

use std::io::{self, Read, SeekFrom};
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{CACHE_CONTROL, CONTENT_RANGE, PRAGMA, RANGE};
use reqwest::StatusCode;
use tracing::debug;

use crate::error::StreamError;
use crate::remote::{OpenFlags, RemoteFile, StreamOpener};

/// Opens [`HttpFile`]s with a shared connection pool.
#[derive(Debug, Clone)]
pub struct HttpStreamOpener {
    client: Client,
}

impl HttpStreamOpener {
    /// `connect_timeout` bounds connection set-up only: a stream body may
    /// legitimately take hours to read.
    pub fn new(connect_timeout: Duration) -> Result<Self, StreamError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(None::<Duration>)
            .build()?;
        Ok(Self { client })
    }
}

impl StreamOpener for HttpStreamOpener {
    type File = HttpFile;

    fn open_at(
        &self,
        url: &str,
        flags: OpenFlags,
        offset: u64,
    ) -> Result<HttpFile, StreamError> {
        let mut file = HttpFile {
            client: self.client.clone(),
            url: url.to_string(),
            no_cache: flags.no_cache,
            body: None,
            position: 0,
            length: 0,
        };
        file.fetch_from(offset)?;
        debug!(
            "Opened {url} at {offset} (reopen={}, length={})",
            flags.reopen, file.length
        );
        Ok(file)
    }
}

pub struct HttpFile {
    client: Client,
    url: String,
    no_cache: bool,
    /// `None` once the offset is at or past the end of the file.
    body: Option<Response>,
    position: u64,
    length: u64,
}

impl HttpFile {
    fn fetch_from(&mut self, offset: u64) -> Result<(), StreamError> {
        let mut req = self
            .client
            .get(&self.url)
            .header(RANGE, format!("bytes={offset}-"));
        if self.no_cache {
            req = req
                .header(CACHE_CONTROL, "no-cache")
                .header(PRAGMA, "no-cache");
        }
        let mut resp = req.send()?;

        match resp.status() {
            StatusCode::PARTIAL_CONTENT => {
                if let Some(total) = content_range_total(&resp) {
                    self.length = total;
                }
                self.body = Some(resp);
            }
            StatusCode::RANGE_NOT_SATISFIABLE => {
                if let Some(total) = content_range_total(&resp) {
                    self.length = total;
                }
                self.body = None;
            }
            status if status.is_success() => {
                // Range ignored: the body starts at 0.
                self.length = resp.content_length().unwrap_or(0);
                if offset > 0 {
                    let skipped = io::copy(&mut (&mut resp).take(offset), &mut io::sink())?;
                    debug!("Server ignored range; skipped {skipped} bytes of {}", self.url);
                }
                self.body = Some(resp);
            }
            status => {
                return Err(StreamError::HttpStatus {
                    status,
                    url: self.url.clone(),
                });
            }
        }

        self.position = offset;
        Ok(())
    }
}

/// Total size from `Content-Range: bytes 0-99/1234` or `bytes */1234`.
fn content_range_total(resp: &Response) -> Option<u64> {
    let value = resp.headers().get(CONTENT_RANGE)?.to_str().ok()?;
    parse_content_range_total(value)
}

fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.trim().parse().ok()
}

impl RemoteFile for HttpFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        let Some(body) = self.body.as_mut() else {
            return Ok(0);
        };
        let n = body.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, StreamError> {
        let target = match pos {
            SeekFrom::Start(n) => i64::try_from(n).unwrap_or(i64::MAX),
            SeekFrom::Current(d) => self.position as i64 + d,
            SeekFrom::End(d) => self.length as i64 + d,
        };
        if target < 0 {
            return Err(StreamError::InvalidSeek {
                offset: target,
                length: self.length,
            });
        }

        self.body = None;
        self.fetch_from(target as u64)?;
        Ok(self.position)
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn position(&self) -> u64 {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::{header, HeaderMap, StatusCode as AxumStatus};
    use axum::response::{IntoResponse, Response as AxumResponse};
    use axum::routing::get;
    use axum::Router;

    use crate::reader::StreamReader;
    use crate::recording::RecordingReader;

    #[derive(Default)]
    struct Recording {
        data: Mutex<Vec<u8>>,
        cache_control: Mutex<Vec<Option<String>>>,
        range_starts: Mutex<Vec<usize>>,
    }

    impl Recording {
        fn grow_to(&self, len: usize) {
            let mut data = self.data.lock().unwrap();
            let start = data.len();
            data.extend((start..len).map(|i| (i % 251) as u8));
        }
    }

    /// Minimal range-capable file endpoint, like the receiver's file server.
    async fn serve_range(
        State(rec): State<Arc<Recording>>,
        headers: HeaderMap,
    ) -> AxumResponse {
        rec.cache_control.lock().unwrap().push(
            headers
                .get(header::CACHE_CONTROL)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        );
        let data = rec.data.lock().unwrap().clone();
        let len = data.len();
        let start = headers
            .get(header::RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("bytes="))
            .and_then(|v| v.trim_end_matches('-').parse::<usize>().ok())
            .unwrap_or(0);
        rec.range_starts.lock().unwrap().push(start);

        if start >= len {
            return (
                AxumStatus::RANGE_NOT_SATISFIABLE,
                [(header::CONTENT_RANGE, format!("bytes */{len}"))],
            )
                .into_response();
        }
        (
            AxumStatus::PARTIAL_CONTENT,
            [(header::CONTENT_RANGE, format!("bytes {start}-{}/{len}", len - 1))],
            data[start..].to_vec(),
        )
            .into_response()
    }

    fn spawn_server(app: Router) -> SocketAddr {
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
                tx.send(listener.local_addr().unwrap()).unwrap();
                axum::serve(listener, app).await.unwrap();
            });
        });
        rx.recv().unwrap()
    }

    fn recording_server(len: usize) -> (Arc<Recording>, String) {
        let rec = Arc::new(Recording::default());
        rec.grow_to(len);
        let app = Router::new()
            .route("/rec.ts", get(serve_range))
            .route("/plain.ts", get(|| async { (0..100u8).collect::<Vec<u8>>() }))
            .with_state(rec.clone());
        let addr = spawn_server(app);
        (rec, format!("http://{addr}"))
    }

    fn opener() -> HttpStreamOpener {
        HttpStreamOpener::new(Duration::from_secs(2)).unwrap()
    }

    fn expected(range: std::ops::Range<usize>) -> Vec<u8> {
        range.map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_parse_content_range_total() {
        assert_eq!(parse_content_range_total("bytes 0-99/1234"), Some(1234));
        assert_eq!(parse_content_range_total("bytes */500"), Some(500));
        assert_eq!(parse_content_range_total("bytes 0-99/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn test_open_and_read() {
        let (_rec, base) = recording_server(5000);
        let mut file = opener().open(&format!("{base}/rec.ts"), OpenFlags::INITIAL).unwrap();

        assert_eq!(file.length(), 5000);
        let mut out = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = file.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, expected(0..5000));
        assert_eq!(file.position(), 5000);
    }

    #[test]
    fn test_seek_and_read() {
        let (_rec, base) = recording_server(5000);
        let mut file = opener().open(&format!("{base}/rec.ts"), OpenFlags::INITIAL).unwrap();

        assert_eq!(file.seek(SeekFrom::Start(1000)).unwrap(), 1000);
        let mut buf = [0u8; 10];
        file.read_exact_all(&mut buf);
        assert_eq!(&buf[..], &expected(1000..1010)[..]);

        assert_eq!(file.seek(SeekFrom::End(-10)).unwrap(), 4990);
        assert_eq!(file.seek(SeekFrom::Current(5)).unwrap(), 4995);
        assert_eq!(file.seek(SeekFrom::Start(5000)).unwrap(), 5000);
        assert_eq!(file.read(&mut buf).unwrap(), 0);

        assert!(matches!(
            file.seek(SeekFrom::Current(-6000)),
            Err(StreamError::InvalidSeek { .. })
        ));
    }

    #[test]
    fn test_open_at_offset_is_a_single_request() {
        let (rec, base) = recording_server(5000);
        let mut file = opener()
            .open_at(&format!("{base}/rec.ts"), OpenFlags::REOPEN, 1000)
            .unwrap();

        assert_eq!(file.position(), 1000);
        assert_eq!(file.length(), 5000);
        let mut buf = [0u8; 10];
        file.read_exact_all(&mut buf);
        assert_eq!(&buf[..], &expected(1000..1010)[..]);
        assert_eq!(*rec.range_starts.lock().unwrap(), vec![1000]);
    }

    #[test]
    fn test_open_at_end_of_file() {
        let (_rec, base) = recording_server(5000);
        let mut file = opener()
            .open_at(&format!("{base}/rec.ts"), OpenFlags::REOPEN, 5000)
            .unwrap();

        assert_eq!(file.position(), 5000);
        assert_eq!(file.length(), 5000);
        assert_eq!(file.read(&mut [0u8; 16]).unwrap(), 0);
    }

    #[test]
    fn test_reopen_sends_no_cache() {
        let (rec, base) = recording_server(100);
        let url = format!("{base}/rec.ts");
        opener().open(&url, OpenFlags::INITIAL).unwrap();
        opener().open(&url, OpenFlags::REOPEN).unwrap();

        let seen = rec.cache_control.lock().unwrap().clone();
        assert_eq!(seen, vec![None, Some("no-cache".to_string())]);
    }

    #[test]
    fn test_missing_file_is_http_status_error() {
        let (_rec, base) = recording_server(100);
        let err = opener()
            .open(&format!("{base}/missing.ts"), OpenFlags::INITIAL)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            StreamError::HttpStatus { status, .. } if status == StatusCode::NOT_FOUND
        ));
    }

    #[test]
    fn test_server_without_range_support() {
        let (_rec, base) = recording_server(0);
        let mut file = opener().open(&format!("{base}/plain.ts"), OpenFlags::INITIAL).unwrap();
        assert_eq!(file.length(), 100);

        file.seek(SeekFrom::Start(40)).unwrap();
        let mut buf = [0u8; 5];
        file.read_exact_all(&mut buf);
        assert_eq!(buf, [40, 41, 42, 43, 44]);
    }

    #[test]
    fn test_recording_reader_follows_growth_over_http() {
        let (rec, base) = recording_server(20_000);
        let end_time = chrono::Utc::now().timestamp() + 3600;
        let mut reader = RecordingReader::new(opener(), format!("{base}/rec.ts"), end_time);
        assert!(reader.start());

        let mut out = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = reader.read_data(&mut buf);
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out.len(), 20_000);

        rec.grow_to(30_000);
        loop {
            let n = reader.read_data(&mut buf);
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, expected(0..30_000));
        assert_eq!(reader.length(), Some(30_000));
        assert!(reader.is_realtime());

        // Reopens resume at the reader's offset instead of starting over.
        let starts = rec.range_starts.lock().unwrap().clone();
        assert_eq!(starts[0], 0);
        assert!(starts.len() > 1);
        assert!(starts[1..].iter().all(|&start| start >= 20_000));
    }

    trait ReadExactAll {
        fn read_exact_all(&mut self, buf: &mut [u8]);
    }

    impl ReadExactAll for HttpFile {
        fn read_exact_all(&mut self, buf: &mut [u8]) {
            let mut filled = 0;
            while filled < buf.len() {
                let n = RemoteFile::read(self, &mut buf[filled..]).unwrap();
                assert!(n > 0, "unexpected end of stream");
                filled += n;
            }
        }
    }
}
