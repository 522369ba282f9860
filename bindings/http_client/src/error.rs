use std::time::Duration;

/// A request that did not produce a response.
#[derive(derive_more::Error, derive_more::Display, Debug, Clone, PartialEq)]
pub enum RequestError {
    #[display("network error: {message}")]
    Network { message: String },
    #[display("request timed out after {after:?}")]
    Timeout { after: Duration },
}

impl RequestError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RequestError::Timeout { .. })
    }
}

/// Map a reqwest error onto the engine's view of a failed request.
pub(crate) fn handle_reqwest_err(err: reqwest::Error, timeout: Duration) -> RequestError {
    if err.is_timeout() {
        RequestError::Timeout { after: timeout }
    } else {
        RequestError::Network {
            message: format!("{err:#}"),
        }
    }
}
