//! HTTP surface over the services.

pub mod cart;
pub mod catalog;
pub mod reviews;

use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::error;
use uuid::Uuid;

use crate::domain::aggregates::CartOwner;
use crate::publisher::EventPublisher;
use crate::repository::{CartRepository, CatalogRepository, ReviewRepository};
use crate::services::{CartService, CatalogService, ReviewService};
use crate::StorefrontError;

pub const USER_HEADER: &str = "x-user-id";
pub const SESSION_HEADER: &str = "x-session-key";

#[derive(Clone)]
pub struct AppState {
    pub carts: Arc<CartService>,
    pub catalog: Arc<CatalogService>,
    pub reviews: Arc<ReviewService>,
}

impl AppState {
    /// Wires every service onto one store implementing all repositories.
    pub fn from_store<S>(store: S, events: Arc<dyn EventPublisher>, low_stock_threshold: u32) -> Self
    where
        S: CartRepository + CatalogRepository + ReviewRepository + 'static,
    {
        let store = Arc::new(store);
        let carts: Arc<dyn CartRepository> = store.clone();
        let catalog: Arc<dyn CatalogRepository> = store.clone();
        let reviews: Arc<dyn ReviewRepository> = store;
        Self {
            carts: Arc::new(CartService::new(carts, events.clone())),
            catalog: Arc::new(CatalogService::new(catalog.clone(), reviews.clone(), events.clone(), low_stock_threshold)),
            reviews: Arc::new(ReviewService::new(catalog, reviews, events)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "opensase-storefront"})) }))
        .route("/api/v1/cart", get(cart::view))
        .route("/api/v1/cart/summary", get(cart::summary))
        .route("/api/v1/cart/add", post(cart::add))
        .route("/api/v1/cart/update/:item_id", patch(cart::update))
        .route("/api/v1/cart/remove/:item_id", delete(cart::remove))
        .route("/api/v1/cart/clear", delete(cart::clear))
        .route("/api/v1/cart/merge", post(cart::merge))
        .route("/api/v1/categories", get(catalog::list_categories).post(catalog::create_category))
        .route("/api/v1/categories/:id", get(catalog::get_category).put(catalog::update_category).delete(catalog::delete_category))
        .route("/api/v1/products", get(catalog::list_products).post(catalog::create_product))
        .route("/api/v1/products/featured", get(catalog::featured_products))
        .route("/api/v1/products/:slug", get(catalog::get_product).patch(catalog::update_product).delete(catalog::delete_product))
        .route("/api/v1/products/:slug/reviews", get(reviews::list).post(reviews::submit))
        .route("/api/v1/reviews/:id", patch(reviews::update).delete(reviews::delete))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Response envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn data(data: T) -> Json<Self> {
        Json(Self { success: true, message: None, data: Some(data) })
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self { success: true, message: Some(message.into()), data: Some(data) })
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Json<Self> {
        Json(Self { success: true, message: Some(message.into()), data: None })
    }

    fn failure(message: String) -> Json<Self> {
        Json(Self { success: false, message: Some(message), data: None })
    }
}

impl IntoResponse for StorefrontError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidQuantity | Self::InsufficientStock { .. } | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Database(_) | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = if status.is_server_error() {
            error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, ApiResponse::failure(message)).into_response()
    }
}

/// Caller identity as supplied by the upstream auth layer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Option<Uuid>,
    pub session_key: Option<String>,
}

impl Identity {
    /// The cart owner for this caller. Anonymous callers without a session
    /// key get a fresh one.
    pub fn cart_owner(&self) -> CartOwner {
        match (&self.user_id, &self.session_key) {
            (Some(user_id), _) => CartOwner::User(*user_id),
            (None, Some(key)) => CartOwner::Session(key.clone()),
            (None, None) => CartOwner::Session(Uuid::new_v4().simple().to_string()),
        }
    }

    pub fn require_user(&self) -> Result<Uuid, StorefrontError> {
        self.user_id.ok_or_else(|| StorefrontError::Unauthorized("User must be authenticated.".into()))
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = StorefrontError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts.headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
        };
        let user_id = header(USER_HEADER)
            .map(|raw| raw.parse::<Uuid>().map_err(|_| StorefrontError::Validation(format!("invalid {USER_HEADER} header"))))
            .transpose()?;
        Ok(Self { user_id, session_key: header(SESSION_HEADER) })
    }
}

/// Echoes the session key back so anonymous clients can keep using their cart.
pub fn session_headers(owner: &CartOwner) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(value) = owner.session_key().and_then(|key| HeaderValue::from_str(key).ok()) {
        headers.insert(SESSION_HEADER, value);
    }
    headers
}
