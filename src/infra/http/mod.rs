//! HTTP surface: JSON endpoints for posts and the popular-posts list.

mod error;
mod handlers;
mod middleware;

pub use error::{ApiError, ApiResponse, codes};

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::application::error::ErrorReport;
use crate::application::posts::PostService;
use crate::infra::db::PostgresRepositories;

use middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub posts: Arc<PostService>,
    /// Absent when the service runs without a database (tests).
    pub db: Option<Arc<PostgresRepositories>>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route(
            "/posts",
            get(handlers::list_posts).post(handlers::create_post),
        )
        .route("/posts/top10", get(handlers::top_posts))
        .route(
            "/posts/{id}",
            get(handlers::get_post).delete(handlers::delete_post),
        )
        .route("/health/db", get(db_health))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn db_health(State(state): State<HttpState>) -> Response {
    match state.db.as_ref() {
        Some(db) => db_health_response(db.health_check().await),
        None => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_message(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                "no database configured",
            )
            .attach(&mut response);
            response
        }
    }
}

fn db_health_response(result: Result<(), sqlx::Error>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
