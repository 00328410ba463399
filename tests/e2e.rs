//! End-to-end tests for the HLS proxy.
//!
//! Starts a real Axum server on a random port in front of a wiremock origin
//! and walks a master playlist → media playlist → segment chain the way a
//! player would, following only the links the proxy hands out.

use hls_proxy::config::{Config, HttpConfig};
use hls_proxy::server::build_router;
use m3u8_rs::Playlist;
use std::net::SocketAddr;
use url::form_urlencoded;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REFERER: &str = "https://watch.example.com/embed/42";

const MASTER: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360
360p/index.m3u8?token=abc
#EXT-X-STREAM-INF:BANDWIDTH=2000000,RESOLUTION=1280x720
720p/index.m3u8?token=abc
";

const MEDIA: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:4
#EXT-X-MEDIA-SEQUENCE:0
#EXTINF:4.000,
seg0.ts
#EXTINF:4.000,
seg1.ts
#EXT-X-ENDLIST
";

/// Spin up the proxy on a random local port.
async fn start_proxy() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().unwrap();

    let config = Config {
        host: addr.ip().to_string(),
        port: addr.port(),
        http: HttpConfig::default(),
    };
    let app = build_router(config).unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

/// Origin that only answers when the injected Referer is present.
async fn start_origin() -> MockServer {
    let origin = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/live/master.m3u8"))
        .and(header("referer", REFERER))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(MASTER, "application/vnd.apple.mpegurl"),
        )
        .mount(&origin)
        .await;

    Mock::given(method("GET"))
        .and(path("/live/720p/index.m3u8"))
        .and(header("referer", REFERER))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(MEDIA, "application/vnd.apple.mpegurl"),
        )
        .mount(&origin)
        .await;

    Mock::given(method("GET"))
        .and(path("/live/720p/seg1.ts"))
        .and(header("referer", REFERER))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x47u8; 188 * 8], "video/mp2t"))
        .mount(&origin)
        .await;

    origin
}

fn proxy_url(addr: SocketAddr, kind: &str, target: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("url", target)
        .append_pair("referer", REFERER)
        .finish();
    format!("http://{}/proxy/{}?{}", addr, kind, query)
}

fn url_param(link: &str) -> String {
    let (_, query) = link.split_once('?').unwrap();
    form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == "url")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}

#[tokio::test]
async fn health_check() {
    let addr = start_proxy().await;

    let resp = reqwest::get(format!("http://{}/health", addr)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn player_walks_master_media_and_segment_through_proxy() {
    let addr = start_proxy().await;
    let origin = start_origin().await;
    let client = reqwest::Client::new();

    // Master playlist: variants become /proxy/m3u8 links.
    let master_url = format!("{}/live/master.m3u8", origin.uri());
    let resp = client
        .get(proxy_url(addr, "m3u8", &master_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["cache-control"], "no-cache");
    let master = resp.text().await.unwrap();

    let variants: Vec<String> = match m3u8_rs::parse_playlist_res(master.as_bytes()).unwrap() {
        Playlist::MasterPlaylist(pl) => pl.variants.into_iter().map(|v| v.uri).collect(),
        Playlist::MediaPlaylist(_) => panic!("expected a master playlist"),
    };
    assert_eq!(variants.len(), 2);
    assert!(variants.iter().all(|v| v.starts_with("/proxy/m3u8?")));
    assert_eq!(
        url_param(&variants[1]),
        format!("{}/live/720p/index.m3u8?token=abc", origin.uri())
    );

    // Media playlist, requested exactly as the player would.
    let resp = client
        .get(format!("http://{}{}", addr, variants[1]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let media = resp.text().await.unwrap();

    let segments: Vec<String> = match m3u8_rs::parse_playlist_res(media.as_bytes()).unwrap() {
        Playlist::MediaPlaylist(pl) => pl.segments.into_iter().map(|s| s.uri).collect(),
        Playlist::MasterPlaylist(_) => panic!("expected a media playlist"),
    };
    assert_eq!(segments.len(), 2);
    assert!(segments.iter().all(|s| s.starts_with("/proxy/segment?")));
    // Base of a URL with a query is everything up to the last '/'.
    assert_eq!(
        url_param(&segments[1]),
        format!("{}/live/720p/seg1.ts", origin.uri())
    );

    // Segment bytes come back untouched.
    let resp = client
        .get(format!("http://{}{}", addr, segments[1]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "video/mp2t");
    assert_eq!(resp.headers()["cache-control"], "max-age=3600");
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    let bytes = resp.bytes().await.unwrap();
    assert_eq!(bytes.len(), 188 * 8);
    assert!(bytes.iter().all(|b| *b == 0x47));
}

#[tokio::test]
async fn missing_segment_is_bad_gateway() {
    let addr = start_proxy().await;
    let origin = start_origin().await;

    let resp = reqwest::get(proxy_url(
        addr,
        "segment",
        &format!("{}/live/720p/seg9.ts", origin.uri()),
    ))
    .await
    .unwrap();

    assert_eq!(resp.status(), 502);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "HTTP 404");
}

#[tokio::test]
async fn video_is_streamed_with_length() {
    let addr = start_proxy().await;
    let origin = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/movie.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![9u8; 64 * 1024], ""))
        .mount(&origin)
        .await;

    let resp = reqwest::get(proxy_url(
        addr,
        "video",
        &format!("{}/movie.mp4", origin.uri()),
    ))
    .await
    .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "video/mp4");
    assert_eq!(resp.content_length(), Some(64 * 1024));
    assert_eq!(resp.bytes().await.unwrap().len(), 64 * 1024);
}
