// ViewerContext Middleware - builds the request-scoped ViewerContext and
// injects it into request extensions. Tokens are only extracted here;
// services resolve them through the SessionResolver.

use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::infrastructure::viewer::viewer::{new_request_id, ViewerContext};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub async fn viewer_context_middleware(
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let viewer_context = viewer_context_from_headers(request.headers())?;
    request.extensions_mut().insert(Arc::new(viewer_context));
    Ok(next.run(request).await)
}

/// A malformed Authorization header is rejected; an absent one yields an
/// anonymous context
pub fn viewer_context_from_headers(headers: &HeaderMap) -> Result<ViewerContext, StatusCode> {
    let session_token = match headers.get(AUTHORIZATION) {
        Some(value) => {
            let raw = value.to_str().map_err(|_| StatusCode::BAD_REQUEST)?;
            let token = raw
                .strip_prefix("Bearer ")
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .ok_or(StatusCode::BAD_REQUEST)?;
            Some(token.to_string())
        }
        None => None,
    };

    let request_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|id| !id.is_empty() && id.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(new_request_id);

    Ok(ViewerContext::new(request_id, session_token))
}
