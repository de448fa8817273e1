//! Network access used on cache misses and during install.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;

use crate::error::{Error, Result};
use crate::http::{Headers, Request, Response};

/// Abstraction over the network for testability.
#[async_trait]
pub trait Network: Send + Sync {
    /// Performs the request and returns the response as received.
    ///
    /// Non-success statuses are returned as responses, not errors.
    async fn fetch(&self, request: &Request) -> Result<Response>;
}

/// Network implementation backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    client: reqwest::Client,
}

impl HttpNetwork {
    /// Creates a network with a pooled HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|_| {
            Error::InvalidMethod {
                method: request.method.clone(),
            }
        })?;
        let mut builder = self.client.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let status_text = reason_phrase(&resp);
        let headers = collect_headers(resp.headers());
        let body = resp.bytes().await?;
        log::debug!("{} {} -> {status}", request.method, request.url);

        Ok(Response {
            status,
            status_text,
            headers,
            body,
        })
    }
}

/// Reason phrase as sent by the server, falling back to the canonical one.
fn reason_phrase(resp: &reqwest::Response) -> String {
    resp.extensions()
        .get::<hyper::ext::ReasonPhrase>()
        .map_or_else(
            || {
                resp.status()
                    .canonical_reason()
                    .unwrap_or_default()
                    .to_string()
            },
            |reason| String::from_utf8_lossy(reason.as_bytes()).into_owned(),
        )
}

/// Flattens a header map, joining repeated fields with `", "` the way
/// `Headers.get()` does in a browser.
fn collect_headers(map: &HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for name in map.keys() {
        let values: Vec<_> = map
            .get_all(name)
            .iter()
            .map(|value| String::from_utf8_lossy(value.as_bytes()))
            .collect();
        headers.insert(name.as_str().to_string(), values.join(", "));
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use url::Url;

    /// Serves one connection with a canned raw HTTP response.
    async fn serve_once(raw: &'static [u8]) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let _ = socket.read(&mut buf).await.unwrap();
            socket.write_all(raw).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        Url::parse(&format!("http://{addr}/index.html")).unwrap()
    }

    fn local_network() -> HttpNetwork {
        HttpNetwork::with_client(reqwest::Client::builder().no_proxy().build().unwrap())
    }

    #[test]
    fn http_network_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<HttpNetwork>();
    }

    #[test]
    fn http_network_builds() {
        assert!(HttpNetwork::new().is_ok());
    }

    #[tokio::test]
    async fn fetch_returns_response_as_received() {
        let url = serve_once(
            b"HTTP/1.1 200 Fine Thanks\r\n\
              Set-Cookie: a=1\r\n\
              Set-Cookie: b=2\r\n\
              X-Name: caf\xe9\r\n\
              Content-Length: 5\r\n\
              Connection: close\r\n\
              \r\n\
              hello",
        )
        .await;

        let response = local_network().fetch(&Request::get(url)).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.status_text, "Fine Thanks");
        assert_eq!(response.header("set-cookie"), Some("a=1, b=2"));
        assert_eq!(response.header("x-name"), Some("caf\u{fffd}"));
        assert_eq!(response.body, "hello");
    }

    #[tokio::test]
    async fn fetch_keeps_error_statuses() {
        let url = serve_once(
            b"HTTP/1.1 404 Not Found\r\n\
              Content-Length: 4\r\n\
              Connection: close\r\n\
              \r\n\
              gone",
        )
        .await;

        let response = local_network().fetch(&Request::get(url)).await.unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(response.status_text, "Not Found");
        assert!(!response.is_success());
        assert_eq!(response.body, "gone");
    }

    #[tokio::test]
    async fn fetch_rejects_invalid_method() {
        let request = Request::new("NOT A METHOD", Url::parse("http://127.0.0.1:9/").unwrap());
        let result = local_network().fetch(&request).await;
        assert!(matches!(
            result,
            Err(Error::InvalidMethod { ref method }) if method == "NOT A METHOD"
        ));
    }
}
