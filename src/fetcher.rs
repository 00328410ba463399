//! Outbound HTTP fetch for playlists, segments and videos.
//!
//! [`Fetch`] is the seam between the proxy operations and the network.
//! [`HttpFetcher`] is the production implementation on top of `reqwest`.
//!
//! Each call is a single attempt. A failed request is reported straight back
//! to the caller without retry or backoff.

use async_trait::async_trait;
use axum::body::Bytes;
use futures_util::{StreamExt, TryStreamExt, stream::BoxStream};
use reqwest::{
    Client, Response,
    header::{CONTENT_TYPE, HeaderValue, REFERER, USER_AGENT},
    redirect::Policy,
};
use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::HttpConfig;

/// Browser-like client signature sent with every upstream request.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:146.0) Gecko/20100101 Firefox/146.0";

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Byte stream of an upstream body, handed to the HTTP layer as-is.
pub type BodyStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Origin responded with a status code >= 400
    #[error("HTTP {0}")]
    Status(u16),

    /// Connection, DNS, TLS, timeout or URL failure
    #[error("request failed: {}", error_chain(.0))]
    Transport(#[source] BoxError),
}

/// `err` followed by each of its sources, joined with `": "`.
///
/// `reqwest` keeps the useful part (`Connection refused`, `too many
/// redirects`, ...) in the source chain rather than in its own message.
fn error_chain(err: &BoxError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Transport(Box::new(e))
    }
}

/// Fully buffered upstream response.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub body: Bytes,
    /// `Content-Type` exactly as the origin sent it, empty when absent
    pub content_type: HeaderValue,
}

/// Upstream response whose body is still in flight.
pub struct FetchedStream {
    pub content_type: HeaderValue,
    pub content_length: Option<u64>,
    pub body: BodyStream,
}

impl std::fmt::Debug for FetchedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedStream")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Source of upstream content.
///
/// `referer` is sent as the `Referer` header when non-empty.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// GET `url` and buffer the whole body.
    async fn fetch(&self, url: &str, referer: &str) -> Result<Fetched, FetchError>;

    /// GET `url` and return as soon as headers arrive, body streamed.
    async fn open(&self, url: &str, referer: &str) -> Result<FetchedStream, FetchError>;
}

/// `reqwest`-backed fetcher shared by all requests.
///
/// TLS certificate validation is disabled so origins with self-signed or
/// misconfigured certificates stay reachable.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build the client from an immutable [`HttpConfig`].
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .redirect(Policy::limited(config.max_redirects))
            .danger_accept_invalid_certs(true)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self { client })
    }

    /// Send the GET and classify the status.
    ///
    /// Error responses are dropped here, before their body is read.
    async fn send(&self, url: &str, referer: &str) -> Result<Response, FetchError> {
        let mut request = self.client.get(url).header(USER_AGENT, DEFAULT_USER_AGENT);
        if !referer.is_empty() {
            request = request.header(REFERER, referer);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!("Upstream {} answered {}", url, status);

        if status.as_u16() >= 400 {
            return Err(FetchError::Status(status.as_u16()));
        }

        Ok(response)
    }
}

/// Raw `Content-Type` header; bytes outside visible ASCII are kept as sent.
fn content_type_of(response: &Response) -> HeaderValue {
    response
        .headers()
        .get(CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(""))
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str, referer: &str) -> Result<Fetched, FetchError> {
        let response = self.send(url, referer).await?;
        let content_type = content_type_of(&response);
        let body = response.bytes().await?;

        Ok(Fetched { body, content_type })
    }

    async fn open(&self, url: &str, referer: &str) -> Result<FetchedStream, FetchError> {
        let response = self.send(url, referer).await?;
        let content_type = content_type_of(&response);
        let content_length = response.content_length();
        let body = response
            .bytes_stream()
            .map_err(std::io::Error::other)
            .boxed();

        Ok(FetchedStream {
            content_type,
            content_length,
            body,
        })
    }
}
