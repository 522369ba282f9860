mod error;
mod request;
mod reqwest_client;

use std::time::Duration;

pub mod prelude {
    pub use crate::error::RequestError;
    pub use crate::request::{HttpRequest, HttpResponse};
    pub use crate::reqwest_client::ReqwestHttpClient;
    pub use crate::HttpClient;

    // Re-exported so that scenarios don't need to depend on the http crate directly
    pub use http::Method;
}

/// The capability the engine needs from an HTTP stack: send one request and report what came back.
///
/// Implementations are shared between every virtual user so they must be safe to call
/// concurrently.
#[async_trait::async_trait]
pub trait HttpClient: Send + Sync {
    /// Send a request, giving up once `timeout` has elapsed.
    ///
    /// Any response, whatever its status, is a success at this level. Errors are reserved for
    /// transport failures.
    async fn send(
        &self,
        request: request::HttpRequest,
        timeout: Duration,
    ) -> Result<request::HttpResponse, error::RequestError>;
}
