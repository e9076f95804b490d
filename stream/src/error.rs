use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("request for {url} returned HTTP {status}")]
    HttpStatus { status: StatusCode, url: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("invalid seek to offset {offset} (length {length})")]
    InvalidSeek { offset: i64, length: u64 },

    #[error("stream is not open")]
    NotOpen,

    #[error("live streams cannot seek")]
    NotSeekable,
}
