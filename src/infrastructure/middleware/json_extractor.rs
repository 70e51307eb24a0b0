// JSON body extractor whose parse failures surface as `Validation` errors

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    response::{IntoResponse, Response},
    Json,
};

use crate::error::AppError;

/// Drop-in for `axum::Json` on request bodies. A body that is not JSON, has
/// the wrong content type or does not fit the target type becomes a 400
/// `{"kind":"validation"}` error. Failures while reading the body (size
/// limit, broken connection) keep axum's own status.
#[derive(Debug, Clone)]
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(JsonRejection::BytesRejection(rejection)) => Err(rejection.into_response()),
            Err(rejection) => Err(AppError::Validation(rejection.body_text()).into_response()),
        }
    }
}
