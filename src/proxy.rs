//! Proxy operations: playlist, segment and video.
//!
//! All three share [`ProxyService::upstream`], which checks the target,
//! performs the fetch and maps failures onto [`ProxyError`]. They differ only
//! in what happens to a successful response.

use axum::{body::Bytes, http::HeaderValue};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info};

use crate::{
    error::{ProxyError, Result},
    fetcher::{BodyStream, Fetch, FetchError},
    hls::{is_hls_playlist, resolve_base, rewrite_playlist},
};

/// Content type used when the origin omits one on a playlist.
pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
pub const SEGMENT_CONTENT_TYPE: &str = "video/mp2t";
pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// Which proxy operation a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Playlist,
    Segment,
    Video,
}

impl Operation {
    /// Short name used in logs, metrics and error messages.
    pub fn label(self) -> &'static str {
        match self {
            Operation::Playlist => "m3u8",
            Operation::Segment => "segment",
            Operation::Video => "video",
        }
    }

    pub fn default_content_type(self) -> &'static str {
        match self {
            Operation::Playlist => PLAYLIST_CONTENT_TYPE,
            Operation::Segment => SEGMENT_CONTENT_TYPE,
            Operation::Video => VIDEO_CONTENT_TYPE,
        }
    }

    /// Origin content type, or this operation's default when it is empty.
    fn content_type_or_default(self, content_type: HeaderValue) -> HeaderValue {
        if content_type.is_empty() {
            HeaderValue::from_static(self.default_content_type())
        } else {
            content_type
        }
    }

    fn map_fetch_error(self, url: &str, err: FetchError) -> ProxyError {
        match err {
            FetchError::Status(status) => {
                error!("Proxy {} HTTP error {}: {}", self.label(), status, url);
                let message = match self {
                    Operation::Playlist => format!("HTTP {status}: {url}"),
                    Operation::Segment | Operation::Video => format!("HTTP {status}"),
                };
                ProxyError::UpstreamStatus { status, message }
            }
            source => {
                error!("Proxy {} failed for {}: {}", self.label(), url, source);
                ProxyError::UpstreamTransport {
                    operation: self.label(),
                    source,
                }
            }
        }
    }
}

/// Buffered proxy result: body plus the content type to serve it with.
#[derive(Debug, Clone)]
pub struct ProxiedContent {
    pub body: Bytes,
    pub content_type: HeaderValue,
}

/// Streamed video result.
pub struct ProxiedVideo {
    pub content_type: HeaderValue,
    /// Forwarded when the origin declared it
    pub content_length: Option<u64>,
    pub body: BodyStream,
}

impl std::fmt::Debug for ProxiedVideo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxiedVideo")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Stateless proxy service; cheap to clone and shared by all handlers.
#[derive(Clone)]
pub struct ProxyService {
    fetcher: Arc<dyn Fetch>,
}

impl ProxyService {
    pub fn new(fetcher: Arc<dyn Fetch>) -> Self {
        Self { fetcher }
    }

    /// Fetch a playlist and rewrite its URI lines to route through the proxy.
    ///
    /// Bodies that do not look like HLS are returned byte-for-byte.
    pub async fn playlist(&self, url: &str, referer: &str) -> Result<ProxiedContent> {
        let op = Operation::Playlist;
        let fetched = self
            .upstream(op, url, || self.fetcher.fetch(url, referer))
            .await?;

        let rewritten = {
            let text = String::from_utf8_lossy(&fetched.body);
            if is_hls_playlist(&text) {
                Some(rewrite_playlist(&text, &resolve_base(url), referer))
            } else {
                None
            }
        };

        let body = match rewritten {
            Some(text) => Bytes::from(text),
            None => fetched.body,
        };

        Ok(ProxiedContent {
            body,
            content_type: op.content_type_or_default(fetched.content_type),
        })
    }

    /// Fetch a media segment; the body is never modified.
    pub async fn segment(&self, url: &str, referer: &str) -> Result<ProxiedContent> {
        let op = Operation::Segment;
        let fetched = self
            .upstream(op, url, || self.fetcher.fetch(url, referer))
            .await?;

        Ok(ProxiedContent {
            body: fetched.body,
            content_type: op.content_type_or_default(fetched.content_type),
        })
    }

    /// Open a direct video URL and hand its body over as a stream.
    pub async fn video(&self, url: &str, referer: &str) -> Result<ProxiedVideo> {
        let op = Operation::Video;
        let opened = self
            .upstream(op, url, || self.fetcher.open(url, referer))
            .await?;

        Ok(ProxiedVideo {
            content_type: op.content_type_or_default(opened.content_type),
            content_length: opened.content_length,
            body: opened.body,
        })
    }

    /// Shared skeleton: validate the target, run `send`, classify failures.
    async fn upstream<T, F, Fut>(&self, op: Operation, url: &str, send: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, FetchError>>,
    {
        if url.is_empty() {
            return Err(ProxyError::BadRequest(
                "url parameter is required".to_string(),
            ));
        }

        info!("Proxying {} from {}", op.label(), url);
        send().await.map_err(|e| op.map_fetch_error(url, e))
    }
}
