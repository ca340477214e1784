use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::ErrorReport;
use crate::application::posts::PostServiceError;
use crate::application::repos::RepoError;
use crate::domain::error::DomainError;

/// Error codes carried in the `error_code` field of the response envelope.
pub mod codes {
    pub const EMPTY_TITLE: &str = "EMPTY_TITLE";
    pub const EMPTY_BODY: &str = "EMPTY_BODY";
    pub const EMPTY_LIMIT: &str = "EMPTY_LIMIT";
    pub const INVALID_LIMIT: &str = "INVALID_LIMIT";
    pub const INVALID_POST_ID: &str = "INVALID_POST_ID";
    pub const INVALID_INPUT: &str = "INVALID_INPUT";
    pub const POST_NOT_FOUND: &str = "POST_NOT_FOUND";
    pub const SERVER_ERROR: &str = "SERVER_ERROR";
}

/// Envelope shared by every JSON response: `{"error_code"?, "result"?}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(result: T) -> Json<Self> {
        Json(Self {
            error_code: None,
            result: Some(result),
        })
    }
}

impl ApiResponse<()> {
    pub fn empty() -> Json<Self> {
        Json(Self {
            error_code: None,
            result: None,
        })
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, detail: impl Into<String>) -> Self {
        Self {
            status,
            code,
            detail: detail.into(),
        }
    }

    pub fn bad_request(code: &'static str, detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, detail)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::POST_NOT_FOUND, "post not found")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let code = match &err {
            DomainError::Empty { field: "title" } => codes::EMPTY_TITLE,
            DomainError::Empty { field: "body" } => codes::EMPTY_BODY,
            _ => codes::INVALID_INPUT,
        };
        Self::bad_request(code, err.to_string())
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => Self::not_found(),
            RepoError::InvalidInput { message } => {
                Self::bad_request(codes::INVALID_INPUT, message)
            }
            RepoError::Timeout => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::SERVER_ERROR,
                "database timeout",
            ),
            other @ (RepoError::Persistence(_) | RepoError::Integrity { .. }) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::SERVER_ERROR,
                other.to_string(),
            ),
        }
    }
}

impl From<PostServiceError> for ApiError {
    fn from(err: PostServiceError) -> Self {
        match err {
            PostServiceError::Validation(err) => err.into(),
            PostServiceError::NotFound => Self::not_found(),
            PostServiceError::Repo(err) => err.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            error_code: Some(self.code),
            result: None,
        };
        let mut response = (self.status, Json(body)).into_response();
        // Internal detail goes to the logging middleware, never to the client.
        ErrorReport::from_message(
            "infra::http::posts",
            self.status,
            format!("{}: {}", self.code, self.detail),
        )
        .attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_field_codes() {
        assert_eq!(
            ApiError::from(DomainError::empty("title")).code(),
            codes::EMPTY_TITLE
        );
        assert_eq!(
            ApiError::from(DomainError::empty("body")).code(),
            codes::EMPTY_BODY
        );
        let too_long = ApiError::from(DomainError::too_long("title", 100));
        assert_eq!(too_long.code(), codes::INVALID_INPUT);
        assert_eq!(too_long.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn persistence_failures_are_server_errors() {
        let err = ApiError::from(RepoError::from_persistence("connection reset"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), codes::SERVER_ERROR);
    }

    #[test]
    fn envelope_omits_absent_fields() {
        let Json(body) = ApiResponse::ok(7u64);
        assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"result":7}"#);
        let Json(body) = ApiResponse::empty();
        assert_eq!(serde_json::to_string(&body).unwrap(), "{}");
    }
}
