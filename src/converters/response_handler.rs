use crate::data_stream::{
    DATA_STREAM_HEADER, DATA_STREAM_VERSION, DataStreamPart, StreamChunk, encode_stream,
};
use crate::error::TranscodeError;
use crate::models::ErrorResponse;
use axum::{
    Json,
    body::Body,
    http::{HeaderName, HeaderValue, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use futures::{Stream, StreamExt};
use std::convert::Infallible;

pub const DATA_STREAM_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Streams chunks to the client as data stream protocol lines.
///
/// The status is committed before the first chunk is read, so a failure mid-stream
/// is reported in-band as a final `3:` error line.
pub fn data_stream_response<S, E>(chunks: S) -> Response
where
    S: Stream<Item = Result<StreamChunk, E>> + Send + 'static,
    E: From<TranscodeError> + std::fmt::Display + Send + 'static,
{
    let body = encode_stream(chunks).map(|part| {
        let line = match part {
            Ok(part) => part.encode(),
            Err(e) => DataStreamPart::Error(e.to_string()).encode(),
        };
        Ok::<_, Infallible>(line)
    });

    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, HeaderValue::from_static(DATA_STREAM_CONTENT_TYPE)),
            (
                HeaderName::from_static(DATA_STREAM_HEADER),
                HeaderValue::from_static(DATA_STREAM_VERSION),
            ),
        ],
        Body::from_stream(body),
    )
        .into_response()
}

pub fn error_response(
    status: StatusCode,
    message: impl Into<String>,
    r#type: &str,
    code: &str,
) -> Response {
    (status, Json(ErrorResponse::new(message, r#type, code))).into_response()
}
