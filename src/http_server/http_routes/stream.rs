use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE},
    },
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use uuid::Uuid;

use crate::http_server::state::AppState;
use crate::services::streaming::{StreamError, StreamResponse};

pub async fn stream_station(
    State(state): State<Arc<AppState>>,
    Path(station_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response, StreamError> {
    let response = state
        .streams
        .deliver_station(station_id, range_header(&headers))
        .await?;
    Ok(audio_response(response))
}

pub async fn stream_track(
    State(state): State<Arc<AppState>>,
    Path(track_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response, StreamError> {
    let response = state
        .streams
        .deliver_track(track_id, range_header(&headers))
        .await?;
    Ok(audio_response(response))
}

/// A `Range` header that is not valid text is treated like a malformed one.
fn range_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(RANGE).and_then(|value| value.to_str().ok())
}

fn audio_response(response: StreamResponse) -> Response {
    let StreamResponse {
        range,
        content_type,
        body,
        guard,
        ..
    } = response;

    let status = if range.is_partial() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    if let Some(content_range) = range.content_range()
        && let Ok(value) = HeaderValue::from_str(&content_range)
    {
        headers.insert(CONTENT_RANGE, value);
    }

    let body = match guard {
        // The guard lives as long as the body stream, which is dropped once
        // the bytes are written or the client goes away
        Some(guard) => Body::from_stream(
            futures::stream::once(futures::future::ready(Ok::<_, Infallible>(body))).map(
                move |chunk| {
                    let _connection = &guard;
                    chunk
                },
            ),
        ),
        None => Body::from(body),
    };

    (status, headers, body).into_response()
}
