//! HLS reverse proxy.
//!
//! Fetches playlists, segments and videos on behalf of players that cannot
//! send their own `Referer`, and rewrites playlists so that every nested
//! playlist and segment is requested through the proxy as well.

pub mod config;
pub mod error;
pub mod fetcher;
pub mod hls;
pub mod metrics;
pub mod proxy;
pub mod server;
