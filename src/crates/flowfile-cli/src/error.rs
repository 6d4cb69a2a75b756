//! CLI error type, grounded on `aco::error::AcoError`'s
//! `thiserror`-enum-with-`#[from]`-conversions shape.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("server returned {status}: {detail}")]
    Server { status: u16, detail: String },

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid position '{0}', expected X,Y")]
    InvalidPosition(String),
}

pub type Result<T> = std::result::Result<T, CliError>;
