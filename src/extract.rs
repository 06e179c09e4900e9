//! Request extractors whose rejections render as `{"error": ...}` like
//! every other failure in the API.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// JSON request body
#[derive(Debug, Clone, Copy, Default)]
pub struct AppJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state).await?;
        Ok(AppJson(value))
    }
}

/// Query string
#[derive(Debug, Clone, Copy, Default)]
pub struct AppQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(AppQuery(value))
    }
}

/// Path parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct AppPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for AppPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(AppPath(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Stake {
        stake: f64,
    }

    #[tokio::test]
    async fn bad_json_becomes_app_error() {
        let req = Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from("{\"stake\":"))
            .unwrap();
        let err = AppJson::<Stake>::from_request(req, &()).await.unwrap_err();
        assert!(matches!(err, AppError::Rejected(StatusCode::BAD_REQUEST, _)));
    }

    #[tokio::test]
    async fn missing_fields_are_unprocessable() {
        let req = Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let err = AppJson::<Stake>::from_request(req, &()).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.to_string().contains("stake"));
    }

    #[tokio::test]
    async fn valid_json_passes_through() {
        let req = Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from("{\"stake\":25.0}"))
            .unwrap();
        let AppJson(stake) = AppJson::<Stake>::from_request(req, &()).await.unwrap();
        assert_eq!(stake.stake, 25.0);
    }

    #[tokio::test]
    async fn bad_query_becomes_app_error() {
        let req = Request::builder().uri("/?stake=lots").body(Body::empty()).unwrap();
        let (mut parts, _) = req.into_parts();
        let err = AppQuery::<Stake>::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
