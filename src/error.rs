use thiserror::Error;

/// Failure modes of one logical asset acquisition.
///
/// The client retries every variant identically; after retries are
/// exhausted the last error observed is surfaced to the caller.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport-level failure (unreachable host, reset connection).
    #[error("network error: {0}")]
    Network(String),

    /// The endpoint answered with a non-success status code.
    #[error("http status {status}")]
    Http { status: u16 },

    /// The response body failed structural validation.
    #[error("invalid response: {0}")]
    Validation(String),

    /// A validated response could not be turned into a display record.
    #[error("transform failed: {0}")]
    Transform(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => FetchError::Http {
                status: status.as_u16(),
            },
            None => FetchError::Network(err.to_string()),
        }
    }
}
