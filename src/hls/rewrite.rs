//! Line-oriented playlist rewriting.
//!
//! Every URI line of a playlist is replaced by a link back into this proxy,
//! so the player fetches nested playlists and segments through us as well.
//! The playlist is not parsed into a model: lines are split on `\n`, tags
//! and blanks are copied byte-for-byte, and the output has exactly as many
//! lines as the input. URIs inside tag attributes (`#EXT-X-KEY:URI=...`,
//! `#EXT-X-MAP:URI=...`) are left untouched.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::debug;

use super::resolve::resolve_reference;

/// Route serving rewritten playlists.
pub const PLAYLIST_ROUTE: &str = "/proxy/m3u8";

/// Route serving raw media segments.
pub const SEGMENT_ROUTE: &str = "/proxy/segment";

/// What a playlist URI line points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// Another playlist (variant or rendition), rewritten again on request
    Playlist,
    /// Binary media, passed through untouched
    Segment,
}

impl ReferenceKind {
    /// Classify a trimmed URI line.
    ///
    /// Any occurrence of `m3u8` counts, so `variant.m3u8?token=...` and
    /// `/hls/m3u8/index` are both playlists.
    pub fn classify(reference: &str) -> Self {
        if reference.ends_with(".m3u8") || reference.contains("m3u8") {
            ReferenceKind::Playlist
        } else {
            ReferenceKind::Segment
        }
    }

    pub fn route(self) -> &'static str {
        match self {
            ReferenceKind::Playlist => PLAYLIST_ROUTE,
            ReferenceKind::Segment => SEGMENT_ROUTE,
        }
    }
}

/// Cheap check for content that looks like an HLS media or master playlist.
pub fn is_hls_playlist(content: &str) -> bool {
    content.contains("#EXTINF") || content.contains("#EXT-X-STREAM-INF")
}

/// Everything except `A-Z a-z 0-9 - _ . ~` is escaped in a query component.
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Query-component escaping with space as `+`.
fn encode_component(value: &str) -> String {
    // A literal '%' is emitted as "%25", so "%20" can only come from a space.
    utf8_percent_encode(value, QUERY_COMPONENT)
        .to_string()
        .replace("%20", "+")
}

/// Proxy-relative link for an absolute upstream URL.
pub fn proxy_link(kind: ReferenceKind, absolute_url: &str, referer: &str) -> String {
    format!(
        "{}?url={}&referer={}",
        kind.route(),
        encode_component(absolute_url),
        encode_component(referer)
    )
}

/// Rewrite every URI line of `content` into a proxy link.
///
/// Relative URIs are resolved against `base_url`. Content that does not look
/// like an HLS playlist is returned unchanged.
pub fn rewrite_playlist(content: &str, base_url: &str, referer: &str) -> String {
    if !is_hls_playlist(content) {
        debug!("Content has no #EXTINF or #EXT-X-STREAM-INF, passing through");
        return content.to_string();
    }

    let mut output = String::with_capacity(content.len() * 2);
    let mut playlists = 0usize;
    let mut segments = 0usize;

    for (index, line) in content.split('\n').enumerate() {
        if index > 0 {
            output.push('\n');
        }

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            output.push_str(line);
            continue;
        }

        let absolute = resolve_reference(trimmed, base_url);
        let kind = ReferenceKind::classify(trimmed);
        match kind {
            ReferenceKind::Playlist => playlists += 1,
            ReferenceKind::Segment => segments += 1,
        }
        output.push_str(&proxy_link(kind, &absolute, referer));
    }

    debug!(
        "Rewrote playlist: {} nested playlists, {} segments",
        playlists, segments
    );

    output
}
