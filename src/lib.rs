//! OpenSASE Storefront
//!
//! Catalog, cart and review service for the OpenSASE e-commerce platform.
//!
//! ## Features
//! - Product and category catalog with nested product images
//! - Per-user or per-session shopping carts with live pricing
//! - Anonymous cart merge on sign-in, clamped to stock
//! - Product reviews with rating summaries

pub mod api;
pub mod config;
pub mod domain;
pub mod publisher;
pub mod repository;
pub mod services;

use thiserror::Error;

use crate::domain::aggregates::{CartError, CategoryError, ProductError, ReviewError};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    #[error("Only {available} items available in stock, {requested} requested")]
    InsufficientStock { available: u32, requested: u64 },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Not allowed to modify this resource")]
    Forbidden,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, StorefrontError>;

impl From<CartError> for StorefrontError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::InvalidQuantity => Self::InvalidQuantity,
            CartError::InsufficientStock { available, requested } => Self::InsufficientStock { available, requested },
            CartError::ItemNotFound => Self::NotFound("Cart item"),
        }
    }
}

impl From<ProductError> for StorefrontError {
    fn from(e: ProductError) -> Self { Self::Validation(e.to_string()) }
}

impl From<CategoryError> for StorefrontError {
    fn from(e: CategoryError) -> Self {
        match e {
            CategoryError::UnknownParent(_) => Self::NotFound("Parent category"),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<ReviewError> for StorefrontError {
    fn from(e: ReviewError) -> Self { Self::Validation(e.to_string()) }
}
