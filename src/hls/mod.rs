//! HLS playlist handling: textual URL resolution and proxy rewriting.

pub mod resolve;
pub mod rewrite;

pub use resolve::{resolve_base, resolve_reference};
pub use rewrite::{ReferenceKind, is_hls_playlist, proxy_link, rewrite_playlist};
