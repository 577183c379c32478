//! In-memory store. Units of work hold the store lock for their whole life
//! and commit by swapping in their working copy.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{CartRepository, CartUnitOfWork, CatalogRepository, Page, ProductQuery, ReviewRepository};
use crate::domain::aggregates::{Cart, CartOwner, Category, LineItem, Product, ProductSummary, Review, StockedProduct};
use crate::domain::value_objects::Quantity;
use crate::{Result, StorefrontError};

#[derive(Clone, Debug)]
struct CartRow { id: Uuid, owner: CartOwner, created_at: DateTime<Utc>, updated_at: DateTime<Utc> }

#[derive(Clone, Debug)]
struct LineRow { id: Uuid, cart_id: Uuid, product_id: Uuid, quantity: Quantity, created_at: DateTime<Utc>, updated_at: DateTime<Utc> }

#[derive(Clone, Debug, Default)]
struct State {
    categories: HashMap<Uuid, Category>,
    products: HashMap<Uuid, Product>,
    reviews: HashMap<Uuid, Review>,
    carts: HashMap<Uuid, CartRow>,
    lines: HashMap<Uuid, LineRow>,
}

impl State {
    fn cart_for(&self, owner: &CartOwner) -> Option<Cart> {
        let row = self.carts.values().find(|c| &c.owner == owner)?;
        let mut items: Vec<LineItem> = self
            .lines
            .values()
            .filter(|l| l.cart_id == row.id)
            .filter_map(|l| {
                let product = self.products.get(&l.product_id)?;
                Some(LineItem::restore(l.id, l.cart_id, product.stocked(), l.quantity, l.created_at, l.updated_at))
            })
            .collect();
        items.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then(b.id().cmp(&a.id())));
        Some(Cart::restore(row.id, row.owner.clone(), items, row.created_at, row.updated_at))
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<State>,
    working: State,
}

#[async_trait]
impl CartRepository for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn CartUnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, working }))
    }
}

#[async_trait]
impl CartUnitOfWork for MemoryUnitOfWork {
    async fn find_cart(&mut self, owner: &CartOwner) -> Result<Option<Cart>> {
        Ok(self.working.cart_for(owner))
    }

    async fn upsert_cart(&mut self, owner: &CartOwner) -> Result<Cart> {
        if let Some(cart) = self.working.cart_for(owner) { return Ok(cart); }
        let cart = Cart::new(owner.clone());
        self.working.carts.insert(cart.id(), CartRow { id: cart.id(), owner: owner.clone(), created_at: cart.created_at(), updated_at: cart.updated_at() });
        Ok(cart)
    }

    async fn find_product(&mut self, product_id: Uuid) -> Result<Option<StockedProduct>> {
        Ok(self.working.products.get(&product_id).filter(|p| p.is_active).map(Product::stocked))
    }

    async fn save_cart(&mut self, cart: &Cart) -> Result<()> {
        let row = self.working.carts.get_mut(&cart.id()).ok_or(StorefrontError::NotFound("Cart"))?;
        row.updated_at = cart.updated_at();
        let keep: HashSet<Uuid> = cart.items().iter().map(LineItem::id).collect();
        self.working.lines.retain(|id, line| line.cart_id != cart.id() || keep.contains(id));
        for item in cart.items() {
            self.working.lines.insert(item.id(), LineRow {
                id: item.id(), cart_id: cart.id(), product_id: item.product_id(), quantity: item.quantity(),
                created_at: item.created_at(), updated_at: item.updated_at(),
            });
        }
        Ok(())
    }

    async fn delete_cart(&mut self, cart_id: Uuid) -> Result<()> {
        self.working.carts.remove(&cart_id);
        self.working.lines.retain(|_, line| line.cart_id != cart_id);
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        *self.guard = std::mem::take(&mut self.working);
        Ok(())
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn insert_category(&self, category: &Category) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.categories.values().any(|c| c.slug == category.slug) {
            return Err(StorefrontError::Conflict(format!("Category with slug '{}' already exists", category.slug)));
        }
        state.categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn update_category(&self, category: &Category) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.categories.values().any(|c| c.slug == category.slug && c.id != category.id) {
            return Err(StorefrontError::Conflict(format!("Category with slug '{}' already exists", category.slug)));
        }
        let slot = state.categories.get_mut(&category.id).ok_or(StorefrontError::NotFound("Category"))?;
        *slot = category.clone();
        Ok(())
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.lock().await;
        if !state.categories.contains_key(&id) { return Ok(false); }
        let mut doomed = HashSet::from([id]);
        loop {
            let before = doomed.len();
            let children: Vec<Uuid> = state.categories.values()
                .filter(|c| c.parent_id.is_some_and(|p| doomed.contains(&p)))
                .map(|c| c.id)
                .collect();
            doomed.extend(children);
            if doomed.len() == before { break; }
        }
        if state.products.values().any(|p| doomed.contains(&p.category_id)) {
            return Err(StorefrontError::Conflict("Category is still referenced by products".into()));
        }
        state.categories.retain(|id, _| !doomed.contains(id));
        Ok(true)
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>> {
        Ok(self.state.lock().await.categories.get(&id).cloned())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let mut all: Vec<Category> = self.state.lock().await.categories.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.products.values().any(|p| p.slug == product.slug || p.sku == product.sku) {
            return Err(StorefrontError::Conflict("Product with this slug or SKU already exists".into()));
        }
        if !state.categories.contains_key(&product.category_id) {
            return Err(StorefrontError::NotFound("Category"));
        }
        state.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.products.values().any(|p| p.id != product.id && (p.slug == product.slug || p.sku == product.sku)) {
            return Err(StorefrontError::Conflict("Product with this slug or SKU already exists".into()));
        }
        let slot = state.products.get_mut(&product.id).ok_or(StorefrontError::NotFound("Product"))?;
        *slot = product.clone();
        Ok(())
    }

    async fn find_product_by_slug(&self, slug: &str) -> Result<Option<Product>> {
        Ok(self.state.lock().await.products.values().find(|p| p.slug.as_str() == slug).cloned())
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<Page<ProductSummary>> {
        let state = self.state.lock().await;
        let needle = query.search.as_deref().map(str::to_lowercase);
        let mut matching: Vec<&Product> = state.products.values()
            .filter(|p| p.is_active)
            .filter(|p| query.category_id.map_or(true, |c| p.category_id == c))
            .filter(|p| !query.featured_only || p.is_featured)
            .filter(|p| needle.as_deref().map_or(true, |n| p.name.to_lowercase().contains(n)))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let total = matching.len() as i64;
        let data = matching.into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(query.per_page as usize)
            .map(|p| {
                let category_name = state.categories.get(&p.category_id).map(|c| c.name.clone()).unwrap_or_default();
                ProductSummary::new(p, category_name)
            })
            .collect();
        Ok(Page { data, total, page: query.page, per_page: query.per_page })
    }
}

#[async_trait]
impl ReviewRepository for MemoryStore {
    async fn insert_review(&self, review: &Review) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.reviews.values().any(|r| r.product_id == review.product_id && r.user_id == review.user_id) {
            return Err(StorefrontError::Conflict("You have already reviewed this product".into()));
        }
        state.reviews.insert(review.id, review.clone());
        Ok(())
    }

    async fn update_review(&self, review: &Review) -> Result<()> {
        let mut state = self.state.lock().await;
        let slot = state.reviews.get_mut(&review.id).ok_or(StorefrontError::NotFound("Review"))?;
        *slot = review.clone();
        Ok(())
    }

    async fn delete_review(&self, id: Uuid) -> Result<bool> {
        Ok(self.state.lock().await.reviews.remove(&id).is_some())
    }

    async fn find_review(&self, id: Uuid) -> Result<Option<Review>> {
        Ok(self.state.lock().await.reviews.get(&id).cloned())
    }

    async fn list_approved(&self, product_id: Uuid) -> Result<Vec<Review>> {
        let mut reviews: Vec<Review> = self.state.lock().await.reviews.values()
            .filter(|r| r.product_id == product_id && r.is_approved)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }
}
