//! Error types for fetching registration records

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{url} responded with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;
