use axum::extract::{FromRequest, Path, Query, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::{Form, Json};
use serde::Deserialize;

use crate::application::repos::MAX_PAGE_LIMIT;
use crate::domain::entities::PostRecord;

use super::HttpState;
use super::error::{ApiError, ApiResponse, codes};

#[derive(Debug, Default, Deserialize)]
pub struct CreatePostInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

/// `POST /posts`, accepting either a form or a JSON body.
pub async fn create_post(
    State(state): State<HttpState>,
    request: Request,
) -> Result<impl IntoResponse, ApiError> {
    let input = read_create_input(&state, request).await?;
    let id = state.posts.create(&input.title, &input.body).await?;
    Ok(ApiResponse::ok(id))
}

/// `GET /posts/{id}`. A hit records a visit in the background.
pub async fn get_post(
    State(state): State<HttpState>,
    Path(raw_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<PostRecord>>>, ApiError> {
    let id = parse_post_id(&raw_id)?;
    let posts = state.posts.fetch(&[id], 0, 0).await?;
    if posts.is_empty() {
        return Err(ApiError::not_found());
    }
    Ok(ApiResponse::ok(posts))
}

/// `GET /posts?limit=&offset=`, newest first. Listing does not count as a visit.
pub async fn list_posts(
    State(state): State<HttpState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<PostRecord>>>, ApiError> {
    let (limit, offset) = parse_page(&query)?;
    let posts = state.posts.fetch(&[], limit, offset).await?;
    if posts.is_empty() {
        return Err(ApiError::not_found());
    }
    Ok(ApiResponse::ok(posts))
}

/// `GET /posts/top10`, served from the popular cache. May be empty.
pub async fn top_posts(State(state): State<HttpState>) -> Json<ApiResponse<Vec<PostRecord>>> {
    ApiResponse::ok(state.posts.popular())
}

/// `DELETE /posts/{id}`.
pub async fn delete_post(
    State(state): State<HttpState>,
    Path(raw_id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let id = parse_post_id(&raw_id)?;
    state.posts.delete(id).await?;
    Ok(ApiResponse::empty())
}

async fn read_create_input(
    state: &HttpState,
    request: Request,
) -> Result<CreatePostInput, ApiError> {
    let is_json = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));

    if is_json {
        Json::<CreatePostInput>::from_request(request, state)
            .await
            .map(|Json(input)| input)
            .map_err(|rejection| ApiError::bad_request(codes::INVALID_INPUT, rejection.body_text()))
    } else {
        Form::<CreatePostInput>::from_request(request, state)
            .await
            .map(|Form(input)| input)
            .map_err(|rejection| ApiError::bad_request(codes::INVALID_INPUT, rejection.body_text()))
    }
}

fn parse_post_id(raw: &str) -> Result<u64, ApiError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request(
            codes::INVALID_POST_ID,
            "post id is empty",
        ));
    }
    trimmed.parse::<u64>().map_err(|err| {
        ApiError::bad_request(codes::INVALID_POST_ID, format!("`{trimmed}`: {err}"))
    })
}

fn parse_page(query: &ListQuery) -> Result<(u16, u64), ApiError> {
    let raw_limit = query
        .limit
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::bad_request(codes::EMPTY_LIMIT, "limit is required"))?;

    let limit = raw_limit
        .parse::<u64>()
        .ok()
        .filter(|limit| *limit > 0)
        .ok_or_else(|| {
            ApiError::bad_request(
                codes::INVALID_LIMIT,
                format!("`{raw_limit}` is not a positive integer"),
            )
        })?;
    let limit = limit.min(u64::from(MAX_PAGE_LIMIT)) as u16;

    let offset = match query.offset.as_deref().map(str::trim) {
        None | Some("") => 0,
        Some(raw) => raw.parse::<u64>().map_err(|err| {
            ApiError::bad_request(codes::INVALID_INPUT, format!("offset `{raw}`: {err}"))
        })?,
    };

    Ok((limit, offset))
}
