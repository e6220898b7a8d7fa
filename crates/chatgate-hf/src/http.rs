//! HTTP transport abstraction for the upstream adapters.
//!
//! Every upstream call goes through [`HttpTransport`], which allows for
//! dependency injection and easy testing. The production implementation uses
//! reqwest. There are no retries at this layer or above it.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chatgate_core::ByteStream;
use futures_util::StreamExt;
use reqwest::header::SET_COOKIE;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::GatewayConfig;
use crate::error::{TransportError, TransportResult};

/// Longest response body excerpt kept in a status error.
const ERROR_BODY_LIMIT: usize = 512;

// ============================================================================
// Request / response values
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A transport-neutral upstream request.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub json: Option<Value>,
    pub timeout: Option<Duration>,
}

impl UpstreamRequest {
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            json: None,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            ..Self::post(url)
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.json = Some(body);
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Value of the first header with this name (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A fully buffered upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    /// `(name, value)` pairs from `Set-Cookie`.
    pub cookies: Vec<(String, String)>,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn json<T: DeserializeOwned>(&self) -> TransportResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Turn a non-success response into [`TransportError::Status`].
    pub fn error_for_status(self, url: &str) -> TransportResult<Self> {
        if self.is_success() {
            return Ok(self);
        }
        Err(TransportError::Status {
            status: self.status,
            url: url.to_string(),
            body: excerpt(&self.body),
        })
    }
}

fn excerpt(body: &[u8]) -> String {
    String::from_utf8_lossy(body)
        .chars()
        .take(ERROR_BODY_LIMIT)
        .collect()
}

/// Parse the `name=value` pair leading a `Set-Cookie` header.
fn parse_set_cookie(header: &str) -> Option<(String, String)> {
    let pair = header.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().trim_matches('"').to_string()))
}

// ============================================================================
// Transport trait
// ============================================================================

/// Sends upstream requests.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request and buffer the whole response, whatever its status.
    async fn send(&self, request: UpstreamRequest) -> TransportResult<UpstreamResponse>;

    /// Send a request and hand back the body as a stream.
    ///
    /// Non-success statuses fail with [`TransportError::Status`].
    async fn open_stream(&self, request: UpstreamRequest) -> TransportResult<ByteStream>;
}

// ============================================================================
// Reqwest transport
// ============================================================================

/// Production transport using reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client honouring the configured proxy.
    pub fn new(config: &GatewayConfig) -> TransportResult<Self> {
        let mut builder = reqwest::Client::builder().connect_timeout(Duration::from_secs(10));
        if let Some(proxy_url) = &config.proxy_url {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| TransportError::InvalidRequest(format!("proxy {proxy_url}: {e}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder.build()?;
        Ok(Self { client })
    }

    fn build(&self, request: UpstreamRequest) -> reqwest::RequestBuilder {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.json {
            builder = builder.json(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        builder
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: UpstreamRequest) -> TransportResult<UpstreamResponse> {
        let url = request.url.clone();
        let response = self.build(request).send().await?;
        let status = response.status().as_u16();
        let cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(parse_set_cookie)
            .collect();
        let body = response.bytes().await?;
        tracing::debug!(url = %url, status, bytes = body.len(), "Upstream response");
        Ok(UpstreamResponse {
            status,
            cookies,
            body,
        })
    }

    async fn open_stream(&self, request: UpstreamRequest) -> TransportResult<ByteStream> {
        let url = request.url.clone();
        let response = self.build(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            tracing::error!(url = %url, status = status.as_u16(), "Upstream rejected request");
            return Err(TransportError::Status {
                status: status.as_u16(),
                url,
                body: excerpt(&body),
            });
        }
        tracing::debug!(url = %url, status = status.as_u16(), "Upstream stream opened");
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other))
            .boxed())
    }
}

// ============================================================================
// Fake transport for testing
// ============================================================================

#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use super::*;
    use std::sync::{Arc, Mutex, PoisonError};

    /// Canned reply of the fake transport.
    #[derive(Debug, Clone)]
    pub enum FakeReply {
        /// A JSON body with status and cookies.
        Json {
            status: u16,
            body: Value,
            cookies: Vec<(String, String)>,
        },
        /// A bare status with a text body.
        Status(u16, String),
        /// A successful streamed body, delivered in these chunks.
        Stream(Vec<Bytes>),
        /// These chunks, then a read error.
        BrokenStream(Vec<Bytes>),
    }

    impl FakeReply {
        pub fn json(body: Value) -> Self {
            Self::Json {
                status: 200,
                body,
                cookies: Vec::new(),
            }
        }

        /// A 200 JSON reply carrying one cookie.
        pub fn json_with_cookie(body: Value, name: &str, value: &str) -> Self {
            Self::Json {
                status: 200,
                body,
                cookies: vec![(name.to_string(), value.to_string())],
            }
        }

        /// A streamed body made of text lines, one chunk per line.
        pub fn lines(lines: &[&str]) -> Self {
            Self::Stream(
                lines
                    .iter()
                    .map(|line| Bytes::from(format!("{line}\n")))
                    .collect(),
            )
        }
    }

    /// A fake transport that serves canned replies keyed by URL path suffix
    /// and records every request it sees.
    #[derive(Default)]
    pub struct FakeTransport {
        replies: Vec<(String, FakeReply)>,
        requests: Arc<Mutex<Vec<UpstreamRequest>>>,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Serve `reply` for URLs whose path ends with `path_suffix`.
        #[must_use]
        pub fn with_reply(mut self, path_suffix: &str, reply: FakeReply) -> Self {
            self.replies.push((path_suffix.to_string(), reply));
            self
        }

        /// Every request sent so far, in order.
        pub fn requests(&self) -> Vec<UpstreamRequest> {
            self.requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        fn record(&self, request: UpstreamRequest) -> TransportResult<FakeReply> {
            let path = request
                .url
                .split_once('?')
                .map_or(request.url.as_str(), |(path, _)| path)
                .to_string();
            let reply = self
                .replies
                .iter()
                .find(|(suffix, _)| path.ends_with(suffix.as_str()))
                .map(|(_, reply)| reply.clone());
            let url = request.url.clone();
            self.requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(request);
            reply.ok_or_else(|| TransportError::Network(format!("no fake reply for {url}")))
        }
    }

    #[async_trait]
    impl HttpTransport for FakeTransport {
        async fn send(&self, request: UpstreamRequest) -> TransportResult<UpstreamResponse> {
            match self.record(request)? {
                FakeReply::Json {
                    status,
                    body,
                    cookies,
                } => Ok(UpstreamResponse {
                    status,
                    cookies,
                    body: Bytes::from(body.to_string()),
                }),
                FakeReply::Status(status, body) => Ok(UpstreamResponse {
                    status,
                    cookies: Vec::new(),
                    body: Bytes::from(body),
                }),
                FakeReply::Stream(chunks) | FakeReply::BrokenStream(chunks) => {
                    Ok(UpstreamResponse {
                        status: 200,
                        cookies: Vec::new(),
                        body: Bytes::from(chunks.concat()),
                    })
                }
            }
        }

        async fn open_stream(&self, request: UpstreamRequest) -> TransportResult<ByteStream> {
            let url = request.url.clone();
            match self.record(request)? {
                FakeReply::Json { status, body, .. } if (200..300).contains(&status) => {
                    let chunk: Result<Bytes, std::io::Error> = Ok(Bytes::from(body.to_string()));
                    Ok(futures_util::stream::iter(vec![chunk]).boxed())
                }
                FakeReply::Json { status, body, .. } => Err(TransportError::Status {
                    status,
                    url,
                    body: body.to_string(),
                }),
                FakeReply::Status(status, body) => {
                    Err(TransportError::Status { status, url, body })
                }
                FakeReply::Stream(chunks) => Ok(futures_util::stream::iter(
                    chunks.into_iter().map(Ok::<_, std::io::Error>),
                )
                .boxed()),
                FakeReply::BrokenStream(chunks) => {
                    let items: Vec<Result<Bytes, std::io::Error>> = chunks
                        .into_iter()
                        .map(Ok)
                        .chain(std::iter::once(Err(std::io::Error::other(
                            "connection reset by peer",
                        ))))
                        .collect();
                    Ok(futures_util::stream::iter(items).boxed())
                }
            }
        }
    }
}
