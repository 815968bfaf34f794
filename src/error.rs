use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;

/// Request-scoped error taxonomy. Every variant maps to one HTTP status and a
/// JSON body with a `detail` message; validation errors also name the field.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// Activation uid failed to decode, or no user matched it. Both cases
    /// report identically so the endpoint cannot be used to enumerate users.
    #[error("Invalid UID.")]
    InvalidIdentifier,

    #[error("Invalid token.")]
    InvalidToken,

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Conflict(String),

    /// Collapses "does not exist" and "exists but outside the caller's
    /// visibility" into one answer.
    #[error("Not found.")]
    NotFound,

    #[error("Internal server error.")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::InvalidIdentifier | Self::InvalidToken => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(source) = &self {
            tracing::error!(error = ?source, "request failed");
        }
        let body = match &self {
            Self::Validation { field, message } => json!({ "detail": message, "field": field }),
            other => json!({ "detail": other.to_string() }),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// JSON body extractor that rejects malformed bodies through [`ApiError`],
/// keeping the `detail` response shape instead of axum's plain-text default.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                let detail = rejection.body_text();
                tracing::warn!(error = %detail, "malformed request body");
                Err(ApiError::validation("body", detail))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: ApiError) -> serde_json::Value {
        let response = err.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(
            ApiError::validation("max_cook_time", "Must be a valid integer.").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::InvalidIdentifier.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::InvalidToken.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::unauthenticated("nope").status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Conflict("taken".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn validation_body_names_the_field() {
        let body = body_json(ApiError::validation(
            "max_cook_time",
            "Must be a valid integer.",
        ))
        .await;
        assert_eq!(body["detail"], "Must be a valid integer.");
        assert_eq!(body["field"], "max_cook_time");
    }

    #[tokio::test]
    async fn errors_carry_a_detail_message() {
        let body = body_json(ApiError::NotFound).await;
        assert_eq!(body["detail"], "Not found.");

        let body = body_json(ApiError::InvalidToken).await;
        assert_eq!(body["detail"], "Invalid token.");
    }

    #[tokio::test]
    async fn internal_detail_stays_generic() {
        let body = body_json(ApiError::Internal(anyhow::anyhow!("secret db dsn"))).await;
        assert_eq!(body["detail"], "Internal server error.");
    }

    #[tokio::test]
    async fn malformed_bodies_reject_through_the_taxonomy() {
        #[derive(serde::Deserialize)]
        struct Sample {
            name: String,
        }

        async fn parse(body: &'static str) -> Result<Sample, ApiError> {
            let req = Request::builder()
                .method("POST")
                .uri("/")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(body))
                .expect("request");
            let ApiJson(value) = ApiJson::<Sample>::from_request(req, &()).await?;
            Ok(value)
        }

        let sample = parse(r#"{"name":"stew"}"#).await.expect("valid body");
        assert_eq!(sample.name, "stew");

        // Missing field, mistyped field, broken syntax: all the same shape.
        for bad in [r#"{"other":1}"#, r#"{"name":7}"#, "not json"] {
            let err = parse(bad).await.map(|_| ()).unwrap_err();
            assert!(matches!(err, ApiError::Validation { field: "body", .. }));
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        }
    }
}
