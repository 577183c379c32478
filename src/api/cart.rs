use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{session_headers, ApiResponse, AppState, Identity};
use crate::domain::aggregates::{CartSummary, CartView, LineItemView};
use crate::services::MergeOutcome;
use crate::Result;

type Reply<T> = Result<(HeaderMap, Json<ApiResponse<T>>)>;

fn one() -> i64 { 1 }

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[serde(default = "one")]
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i64,
}

#[derive(Debug, Serialize)]
pub struct ClearedCart {
    pub removed: usize,
}

pub async fn view(State(s): State<AppState>, identity: Identity) -> Reply<CartView> {
    let owner = identity.cart_owner();
    let cart = s.carts.view(&owner).await?;
    Ok((session_headers(&owner), ApiResponse::data(cart)))
}

pub async fn summary(State(s): State<AppState>, identity: Identity) -> Reply<CartSummary> {
    let owner = identity.cart_owner();
    let summary = s.carts.summary(&owner).await?;
    Ok((session_headers(&owner), ApiResponse::data(summary)))
}

pub async fn add(State(s): State<AppState>, identity: Identity, Json(r): Json<AddItemRequest>) -> Result<(StatusCode, HeaderMap, Json<ApiResponse<LineItemView>>)> {
    let owner = identity.cart_owner();
    let line = s.carts.add(&owner, r.product_id, r.quantity).await?;
    Ok((StatusCode::CREATED, session_headers(&owner), ApiResponse::with_message("Item added to cart.", line)))
}

pub async fn update(State(s): State<AppState>, identity: Identity, Path(item_id): Path<Uuid>, Json(r): Json<UpdateItemRequest>) -> Reply<LineItemView> {
    let owner = identity.cart_owner();
    let line = s.carts.update(&owner, item_id, r.quantity).await?;
    Ok((session_headers(&owner), ApiResponse::with_message("Cart item updated.", line)))
}

pub async fn remove(State(s): State<AppState>, identity: Identity, Path(item_id): Path<Uuid>) -> Reply<LineItemView> {
    let owner = identity.cart_owner();
    let removed = s.carts.remove(&owner, item_id).await?;
    let message = format!("'{}' removed from cart.", removed.product_name);
    Ok((session_headers(&owner), ApiResponse::with_message(message, removed)))
}

pub async fn clear(State(s): State<AppState>, identity: Identity) -> Reply<ClearedCart> {
    let owner = identity.cart_owner();
    let removed = s.carts.clear(&owner).await?;
    let message = format!("Cart cleared. {removed} item(s) removed.");
    Ok((session_headers(&owner), ApiResponse::with_message(message, ClearedCart { removed })))
}

pub async fn merge(State(s): State<AppState>, identity: Identity) -> Result<Json<ApiResponse<MergeOutcome>>> {
    let user_id = identity.require_user()?;
    let outcome = s.carts.merge(user_id, identity.session_key.as_deref()).await?;
    let message = match &outcome {
        MergeOutcome::NothingToMerge => "No anonymous cart to merge.",
        MergeOutcome::Merged { .. } => "Carts merged successfully.",
    };
    Ok(ApiResponse::with_message(message, outcome))
}
