use std::time::{Duration, Instant};

use anyhow::Context;

use crate::error::{handle_reqwest_err, RequestError};
use crate::request::{HttpRequest, HttpResponse};
use crate::HttpClient;

/// [HttpClient] backed by a pooled [reqwest::Client].
///
/// A single instance is shared by all virtual users. Connections are pooled per host.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(
        &self,
        request: HttpRequest,
        timeout: Duration,
    ) -> Result<HttpResponse, RequestError> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .timeout(timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let started = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|e| handle_reqwest_err(e, timeout))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| handle_reqwest_err(e, timeout))?;

        log::trace!("{} responded {} in {:?}", request.url, status, started.elapsed());

        Ok(HttpResponse::new(status, started.elapsed(), body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accept one connection, read the request and answer with `response` verbatim.
    async fn serve_once(response: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });

        format!("http://{addr}")
    }

    fn json_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    #[tokio::test]
    async fn send_returns_status_and_body() {
        let base = serve_once(json_response("200 OK", r#"{"token":"abc"}"#)).await;
        let client = ReqwestHttpClient::new().unwrap();

        let request = HttpRequest::new(Method::POST, format!("{base}/login"))
            .with_header("Content-Type", "application/json")
            .with_body(r#"{"username":"u","password":"p"}"#);
        let response = client.send(request, Duration::from_secs(5)).await.unwrap();

        assert_eq!(200, response.status);
        assert_eq!(
            Some("abc"),
            response.json().as_ref().and_then(|v| v["token"].as_str())
        );
    }

    #[tokio::test]
    async fn error_status_is_not_a_transport_failure() {
        let base = serve_once(json_response("401 Unauthorized", "{}")).await;
        let client = ReqwestHttpClient::new().unwrap();

        let response = client
            .send(
                HttpRequest::new(Method::GET, format!("{base}/protected")),
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert_eq!(401, response.status);
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let client = ReqwestHttpClient::new().unwrap();
        let err = client
            .send(
                HttpRequest::new(Method::GET, format!("http://{addr}/slow")),
                Duration::from_millis(100),
            )
            .await
            .unwrap_err();

        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn refused_connection_is_a_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ReqwestHttpClient::new().unwrap();
        let err = client
            .send(
                HttpRequest::new(Method::GET, format!("http://{addr}/")),
                Duration::from_secs(5),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RequestError::Network { .. }));
    }
}
