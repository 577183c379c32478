//! Persistence seams.
//!
//! Cart mutations run inside a [`CartUnitOfWork`]: everything read through it
//! is locked until `commit`, and dropping it without committing discards the
//! writes. Catalog and review access is plain request/response.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartOwner, Category, Product, ProductSummary, Review, StockedProduct};
use crate::Result;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn CartUnitOfWork>>;
}

#[async_trait]
pub trait CartUnitOfWork: Send {
    /// The owner's cart with its lines and live product data, locked.
    async fn find_cart(&mut self, owner: &CartOwner) -> Result<Option<Cart>>;
    /// The owner's cart, created empty when it does not exist yet.
    async fn upsert_cart(&mut self, owner: &CartOwner) -> Result<Cart>;
    /// An active product with its current stock.
    async fn find_product(&mut self, product_id: Uuid) -> Result<Option<StockedProduct>>;
    /// Writes the cart's line set: lines no longer present are deleted, the
    /// rest are inserted or updated (including lines moved from another cart).
    async fn save_cart(&mut self, cart: &Cart) -> Result<()>;
    async fn delete_cart(&mut self, cart_id: Uuid) -> Result<()>;
    async fn commit(&mut self) -> Result<()>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ProductQuery {
    pub page: u32,
    pub per_page: u32,
    pub category_id: Option<Uuid>,
    pub search: Option<String>,
    pub featured_only: bool,
}

impl ProductQuery {
    pub const MAX_PER_PAGE: u32 = 100;

    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(20).clamp(1, Self::MAX_PER_PAGE),
            ..Default::default()
        }
    }

    pub fn offset(&self) -> u64 { u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page) }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn insert_category(&self, category: &Category) -> Result<()>;
    async fn update_category(&self, category: &Category) -> Result<()>;
    /// Deletes the category and its descendants. Fails with `Conflict` while
    /// products still reference any of them.
    async fn delete_category(&self, id: Uuid) -> Result<bool>;
    async fn find_category(&self, id: Uuid) -> Result<Option<Category>>;
    async fn list_categories(&self) -> Result<Vec<Category>>;

    /// Inserts the product and its images atomically.
    async fn insert_product(&self, product: &Product) -> Result<()>;
    async fn update_product(&self, product: &Product) -> Result<()>;
    async fn find_product_by_slug(&self, slug: &str) -> Result<Option<Product>>;
    /// Active products, newest first.
    async fn list_products(&self, query: &ProductQuery) -> Result<Page<ProductSummary>>;
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Fails with `Conflict` when the user already reviewed the product.
    async fn insert_review(&self, review: &Review) -> Result<()>;
    async fn update_review(&self, review: &Review) -> Result<()>;
    async fn delete_review(&self, id: Uuid) -> Result<bool>;
    async fn find_review(&self, id: Uuid) -> Result<Option<Review>>;
    async fn list_approved(&self, product_id: Uuid) -> Result<Vec<Review>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_product_query_paging() {
        let q = ProductQuery::new(Some(0), Some(500));
        assert_eq!((q.page, q.per_page), (1, 100));
        assert_eq!(ProductQuery::new(Some(3), Some(20)).offset(), 40);
    }
}
