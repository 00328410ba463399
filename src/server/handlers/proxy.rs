use crate::{
    error::{ProxyError, Result},
    metrics,
    proxy::{Operation, ProxiedContent},
    server::state::AppState,
};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::time::Instant;

/// Pull `url` (required, non-empty) and `referer` (optional) from the query.
fn target(params: &HashMap<String, String>) -> Result<(&str, &str)> {
    let url = params
        .get("url")
        .map(String::as_str)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ProxyError::BadRequest("url parameter is required".to_string()))?;
    let referer = params.get("referer").map(String::as_str).unwrap_or("");
    Ok((url, referer))
}

/// Record metrics for a finished request and pass the result through.
fn observe<T>(op: Operation, start: Instant, result: Result<T>) -> Result<T> {
    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            if matches!(
                e,
                ProxyError::UpstreamStatus { .. } | ProxyError::UpstreamTransport { .. }
            ) {
                metrics::record_upstream_error(op.label());
            }
            e.status_code()
        }
    };
    metrics::record_request(op.label(), status.as_u16());
    metrics::record_duration(op.label(), start);
    result
}

fn buffered_response(content: ProxiedContent, cache_control: &'static str) -> Response {
    (
        StatusCode::OK,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
            (header::CACHE_CONTROL, HeaderValue::from_static(cache_control)),
            (header::CONTENT_TYPE, content.content_type),
        ],
        Body::from(content.body),
    )
        .into_response()
}

/// Proxy an HLS playlist, rewriting its URI lines back through this server.
pub async fn proxy_playlist(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response> {
    let op = Operation::Playlist;
    let start = Instant::now();
    let result = async {
        let (url, referer) = target(&params)?;
        state.proxy.playlist(url, referer).await
    }
    .await;

    let content = observe(op, start, result)?;
    Ok(buffered_response(content, "no-cache"))
}

/// Proxy a media segment byte-for-byte.
pub async fn proxy_segment(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response> {
    let op = Operation::Segment;
    let start = Instant::now();
    let result = async {
        let (url, referer) = target(&params)?;
        state.proxy.segment(url, referer).await
    }
    .await;

    let content = observe(op, start, result)?;
    Ok(buffered_response(content, "max-age=3600"))
}

/// Proxy a direct video URL, streaming the body as it arrives.
pub async fn proxy_video(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response> {
    let op = Operation::Video;
    let start = Instant::now();
    let result = async {
        let (url, referer) = target(&params)?;
        state.proxy.video(url, referer).await
    }
    .await;

    let video = observe(op, start, result)?;

    let mut response = Body::from_stream(video.body).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(header::CONTENT_TYPE, video.content_type);
    if let Some(len) = video.content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }

    Ok(response)
}
