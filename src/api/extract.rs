//! Request extractors whose rejections use the API error envelope.

use axum::extract::FromRequest;

use super::error::ApiError;

/// JSON body extractor. Malformed or mistyped payloads are rejected as a
/// `validation_error` naming the offending field instead of axum's plain-text
/// 422, which would be indistinguishable from a `reference_error`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
