use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::{ApiResponse, AppState, Identity};
use crate::domain::aggregates::{NewReview, Review, ReviewPatch};
use crate::Result;

pub async fn list(State(s): State<AppState>, Path(slug): Path<String>) -> Result<Json<ApiResponse<Vec<Review>>>> {
    Ok(ApiResponse::data(s.reviews.list(&slug).await?))
}

pub async fn submit(State(s): State<AppState>, identity: Identity, Path(slug): Path<String>, Json(r): Json<NewReview>) -> Result<(StatusCode, Json<ApiResponse<Review>>)> {
    let review = s.reviews.submit(&slug, identity.user_id, r).await?;
    Ok((StatusCode::CREATED, ApiResponse::with_message("Review submitted.", review)))
}

pub async fn update(State(s): State<AppState>, identity: Identity, Path(id): Path<Uuid>, Json(r): Json<ReviewPatch>) -> Result<Json<ApiResponse<Review>>> {
    Ok(ApiResponse::with_message("Review updated.", s.reviews.update(id, identity.user_id, r).await?))
}

pub async fn delete(State(s): State<AppState>, identity: Identity, Path(id): Path<Uuid>) -> Result<Json<ApiResponse<()>>> {
    s.reviews.delete(id, identity.user_id).await?;
    Ok(ApiResponse::message("Review deleted."))
}
