use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::aggregates::{
    Category, CategoryPatch, CategorySummary, CategoryTree, NewCategory, NewProduct, Product, ProductDetail, ProductPatch,
    ProductSummary,
};
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::publisher::{publish_all, EventPublisher};
use crate::repository::{CatalogRepository, Page, ProductQuery, ReviewRepository};
use crate::{Result, StorefrontError};

pub struct CatalogService {
    catalog: Arc<dyn CatalogRepository>,
    reviews: Arc<dyn ReviewRepository>,
    events: Arc<dyn EventPublisher>,
    low_stock_threshold: u32,
}

impl CatalogService {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        reviews: Arc<dyn ReviewRepository>,
        events: Arc<dyn EventPublisher>,
        low_stock_threshold: u32,
    ) -> Self {
        Self { catalog, reviews, events, low_stock_threshold }
    }

    // -------------------------------------------------------------------------
    // Categories
    // -------------------------------------------------------------------------

    pub async fn create_category(&self, new: NewCategory) -> Result<Category> {
        if let Some(parent_id) = new.parent_id {
            self.catalog.find_category(parent_id).await?.ok_or(StorefrontError::NotFound("Parent category"))?;
        }
        let category = Category::create(new)?;
        self.catalog.insert_category(&category).await?;
        info!(category_id = %category.id, slug = %category.slug, "category created");
        Ok(category)
    }

    pub async fn update_category(&self, id: Uuid, patch: CategoryPatch) -> Result<Category> {
        let all = self.catalog.list_categories().await?;
        let mut category = all.iter().find(|c| c.id == id).cloned().ok_or(StorefrontError::NotFound("Category"))?;
        category.apply(patch, &all)?;
        self.catalog.update_category(&category).await?;
        info!(category_id = %id, "category updated");
        Ok(category)
    }

    pub async fn delete_category(&self, id: Uuid) -> Result<()> {
        if !self.catalog.delete_category(id).await? {
            return Err(StorefrontError::NotFound("Category"));
        }
        info!(category_id = %id, "category deleted");
        Ok(())
    }

    /// Active categories, by name.
    pub async fn list_categories(&self) -> Result<Vec<CategorySummary>> {
        let all = self.catalog.list_categories().await?;
        Ok(all.iter().filter(|c| c.is_active).map(CategorySummary::from).collect())
    }

    /// An active category with its active descendants.
    pub async fn category_tree(&self, id: Uuid) -> Result<CategoryTree> {
        let all = self.catalog.list_categories().await?;
        let root = all.iter().find(|c| c.id == id && c.is_active).cloned().ok_or(StorefrontError::NotFound("Category"))?;
        Ok(CategoryTree::build(root, &all))
    }

    // -------------------------------------------------------------------------
    // Products
    // -------------------------------------------------------------------------

    pub async fn create_product(&self, new: NewProduct) -> Result<ProductDetail> {
        let category = self
            .catalog
            .find_category(new.category_id)
            .await?
            .ok_or_else(|| StorefrontError::Validation(format!("Category {} does not exist.", new.category_id)))?;
        let product = Product::create(new, &category, self.low_stock_threshold)?;
        self.catalog.insert_product(&product).await?;

        info!(product_id = %product.id, sku = %product.sku, images = product.images.len(), "product created");
        let event = DomainEvent::Product(ProductEvent::Created { product_id: product.id, sku: product.sku.clone() });
        publish_all(self.events.as_ref(), vec![event]).await;
        Ok(ProductDetail::new(product, Some(&category), vec![]))
    }

    pub async fn update_product(&self, slug: &str, patch: ProductPatch) -> Result<ProductDetail> {
        let mut product = self.active_product(slug).await?;
        let new_category = match patch.category_id {
            Some(id) => Some(self.catalog.find_category(id).await?.ok_or_else(|| {
                StorefrontError::Validation(format!("Category {id} does not exist."))
            })?),
            None => None,
        };
        product.apply(patch, new_category.as_ref(), self.low_stock_threshold)?;
        self.catalog.update_product(&product).await?;

        info!(product_id = %product.id, "product updated");
        publish_all(self.events.as_ref(), vec![DomainEvent::Product(ProductEvent::Updated { product_id: product.id })]).await;
        self.detail(product).await
    }

    /// Soft delete: the product disappears from the catalog but stays referenced.
    pub async fn delete_product(&self, slug: &str) -> Result<()> {
        let mut product = self.active_product(slug).await?;
        product.deactivate();
        self.catalog.update_product(&product).await?;

        info!(product_id = %product.id, "product deactivated");
        publish_all(self.events.as_ref(), vec![DomainEvent::Product(ProductEvent::Deactivated { product_id: product.id })]).await;
        Ok(())
    }

    pub async fn get_product(&self, slug: &str) -> Result<ProductDetail> {
        let product = self.active_product(slug).await?;
        self.detail(product).await
    }

    pub async fn list_products(&self, query: &ProductQuery) -> Result<Page<ProductSummary>> {
        let page = self.catalog.list_products(query).await?;
        debug!(total = page.total, page = page.page, "products listed");
        Ok(page)
    }

    pub async fn featured_products(&self, query: ProductQuery) -> Result<Page<ProductSummary>> {
        self.list_products(&ProductQuery { featured_only: true, ..query }).await
    }

    async fn active_product(&self, slug: &str) -> Result<Product> {
        self.catalog
            .find_product_by_slug(slug)
            .await?
            .filter(|p| p.is_active)
            .ok_or(StorefrontError::NotFound("Product"))
    }

    async fn detail(&self, product: Product) -> Result<ProductDetail> {
        let category = self.catalog.find_category(product.category_id).await?;
        let reviews = self.reviews.list_approved(product.id).await?;
        Ok(ProductDetail::new(product, category.as_ref(), reviews))
    }
}
