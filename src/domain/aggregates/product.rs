//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use thiserror::Error;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::domain::aggregates::category::{Category, CategorySummary};
use crate::domain::aggregates::review::{RatingSummary, Review};
use crate::domain::aggregates::cart::StockedProduct;
use crate::domain::services::pricing::Priced;
use crate::domain::value_objects::{Quantity, Sku, SkuError, Slug, SlugError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus { #[default] InStock, OutOfStock, LowStock }

impl StockStatus {
    pub fn for_quantity(quantity: u32, low_stock_threshold: u32) -> Self {
        match quantity {
            0 => Self::OutOfStock,
            q if q <= low_stock_threshold => Self::LowStock,
            _ => Self::InStock,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self { Self::InStock => "in_stock", Self::OutOfStock => "out_of_stock", Self::LowStock => "low_stock" }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in_stock" => Some(Self::InStock),
            "out_of_stock" => Some(Self::OutOfStock),
            "low_stock" => Some(Self::LowStock),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub id: Uuid,
    pub product_id: Uuid,
    pub url: String,
    pub alt_text: String,
    pub is_primary: bool,
    pub order: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: Slug,
    pub sku: Sku,
    pub description: String,
    pub short_description: String,
    pub price: Decimal,
    pub discount_price: Option<Decimal>,
    pub quantity: u32,
    pub stock_status: StockStatus,
    pub category_id: Uuid,
    pub brand: String,
    pub weight: Option<Decimal>,
    pub dimensions: String,
    pub is_active: bool,
    pub is_featured: bool,
    pub images: Vec<ProductImage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Priced for Product {
    fn list_price(&self) -> Decimal { self.price }
    fn discount_price(&self) -> Option<Decimal> { self.discount_price }
}

fn default_true() -> bool { true }

fn positive_amount(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        let mut err = ValidationError::new("positive");
        err.message = Some(Cow::from("Price must be greater than zero."));
        return Err(err);
    }
    Ok(())
}

fn discount_below_price(new: &NewProduct) -> Result<(), ValidationError> {
    match new.discount_price {
        Some(discount) if discount >= new.price => {
            let mut err = ValidationError::new("discount_price");
            err.message = Some(Cow::from("Discount price must be less than regular price."));
            Err(err)
        }
        _ => Ok(()),
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct NewProductImage {
    #[validate(length(min = 1, max = 2048))]
    pub url: String,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub alt_text: String,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub order: Option<u32>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[validate(schema(function = "discount_below_price"))]
pub struct NewProduct {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub sku: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub short_description: String,
    #[validate(custom = "positive_amount")]
    pub price: Decimal,
    #[serde(default)]
    #[validate(custom = "positive_amount")]
    pub discount_price: Option<Decimal>,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub stock_status: Option<StockStatus>,
    pub category_id: Uuid,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub brand: String,
    #[serde(default)]
    pub weight: Option<Decimal>,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub dimensions: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    #[validate(length(max = 10, message = "Maximum 10 images allowed."))]
    pub images: Vec<NewProductImage>,
}

/// Partial update. `clear_discount` drops an existing discount price.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct ProductPatch {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub slug: Option<String>,
    pub sku: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 500))]
    pub short_description: Option<String>,
    #[validate(custom = "positive_amount")]
    pub price: Option<Decimal>,
    #[validate(custom = "positive_amount")]
    pub discount_price: Option<Decimal>,
    #[serde(default)]
    pub clear_discount: bool,
    pub quantity: Option<u32>,
    pub stock_status: Option<StockStatus>,
    pub category_id: Option<Uuid>,
    #[validate(length(max = 100))]
    pub brand: Option<String>,
    pub weight: Option<Decimal>,
    #[validate(length(max = 100))]
    pub dimensions: Option<String>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
}

/// Resolves image order and the primary flag for a freshly created product:
/// a missing order becomes the image's position, and when no image is marked
/// primary the first one is.
pub fn arrange_images(product_id: Uuid, images: Vec<NewProductImage>, now: DateTime<Utc>) -> Vec<ProductImage> {
    let any_primary = images.iter().any(|img| img.is_primary);
    images
        .into_iter()
        .enumerate()
        .map(|(index, img)| ProductImage {
            id: Uuid::now_v7(),
            product_id,
            order: img.order.unwrap_or(index as u32),
            is_primary: img.is_primary || (index == 0 && !any_primary),
            url: img.url,
            alt_text: img.alt_text,
            created_at: now,
        })
        .collect()
}

impl Product {
    pub fn create(new: NewProduct, category: &Category, low_stock_threshold: u32) -> Result<Self, ProductError> {
        new.validate()?;
        for image in &new.images { image.validate()?; }
        if !category.is_active { return Err(ProductError::InactiveCategory); }
        if new.category_id != category.id { return Err(ProductError::CategoryMismatch); }

        let sku = Sku::new(new.sku)?;
        let slug = match new.slug {
            Some(slug) => Slug::new(slug)?,
            None => Slug::from_name(&new.name)?,
        };
        let id = Uuid::now_v7();
        let now = Utc::now();
        Ok(Self {
            id, name: new.name, slug, sku, description: new.description,
            short_description: new.short_description, price: new.price, discount_price: new.discount_price,
            quantity: new.quantity,
            stock_status: new.stock_status.unwrap_or_else(|| StockStatus::for_quantity(new.quantity, low_stock_threshold)),
            category_id: category.id, brand: new.brand, weight: new.weight, dimensions: new.dimensions,
            is_active: new.is_active, is_featured: new.is_featured,
            images: arrange_images(id, new.images, now),
            created_at: now, updated_at: now,
        })
    }

    /// Applies a partial update. `category` must be the category named by
    /// `patch.category_id` when one is given. On error the product is untouched.
    pub fn apply(&mut self, patch: ProductPatch, category: Option<&Category>, low_stock_threshold: u32) -> Result<(), ProductError> {
        patch.validate()?;
        let mut next = self.clone();
        if let Some(category) = category {
            if Some(category.id) != patch.category_id { return Err(ProductError::CategoryMismatch); }
            if !category.is_active { return Err(ProductError::InactiveCategory); }
            next.category_id = category.id;
        } else if patch.category_id.is_some() {
            return Err(ProductError::CategoryMismatch);
        }
        if let Some(name) = patch.name { next.name = name; }
        if let Some(slug) = patch.slug { next.slug = Slug::new(slug)?; }
        if let Some(sku) = patch.sku { next.sku = Sku::new(sku)?; }
        if let Some(description) = patch.description { next.description = description; }
        if let Some(short) = patch.short_description { next.short_description = short; }
        if let Some(price) = patch.price { next.price = price; }
        if patch.clear_discount { next.discount_price = None; }
        if let Some(discount) = patch.discount_price { next.discount_price = Some(discount); }
        if let Some(brand) = patch.brand { next.brand = brand; }
        if let Some(weight) = patch.weight { next.weight = Some(weight); }
        if let Some(dimensions) = patch.dimensions { next.dimensions = dimensions; }
        if let Some(active) = patch.is_active { next.is_active = active; }
        if let Some(featured) = patch.is_featured { next.is_featured = featured; }
        match (patch.quantity, patch.stock_status) {
            (_, Some(status)) => {
                if let Some(q) = patch.quantity { next.quantity = q; }
                next.stock_status = status;
            }
            (Some(q), None) => {
                next.quantity = q;
                next.stock_status = StockStatus::for_quantity(q, low_stock_threshold);
            }
            (None, None) => {}
        }
        if matches!(next.discount_price, Some(d) if d >= next.price) {
            return Err(ProductError::DiscountNotBelowPrice);
        }
        next.updated_at = Utc::now();
        *self = next;
        Ok(())
    }

    pub fn deactivate(&mut self) { self.is_active = false; self.updated_at = Utc::now(); }

    pub fn primary_image(&self) -> Option<&ProductImage> { self.images.iter().find(|img| img.is_primary) }

    pub fn stocked(&self) -> StockedProduct {
        StockedProduct {
            id: self.id, name: self.name.clone(), slug: self.slug.to_string(),
            price: self.price, discount_price: self.discount_price, stock: Quantity::new(self.quantity),
        }
    }
}

/// Row shown in product listings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    pub slug: Slug,
    pub price: Decimal,
    pub discount_price: Option<Decimal>,
    pub current_price: Decimal,
    pub category_name: String,
    pub primary_image: Option<ProductImage>,
    pub stock_status: StockStatus,
    pub is_active: bool,
}

impl ProductSummary {
    pub fn new(product: &Product, category_name: impl Into<String>) -> Self {
        Self {
            id: product.id, name: product.name.clone(), slug: product.slug.clone(),
            price: product.price, discount_price: product.discount_price, current_price: product.current_price(),
            category_name: category_name.into(), primary_image: product.primary_image().cloned(),
            stock_status: product.stock_status, is_active: product.is_active,
        }
    }
}

/// Full product page: catalog fields, category, approved reviews and their rating summary.
#[derive(Clone, Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub current_price: Decimal,
    pub category: Option<CategorySummary>,
    pub reviews: Vec<Review>,
    #[serde(flatten)]
    pub rating: RatingSummary,
}

impl ProductDetail {
    pub fn new(mut product: Product, category: Option<&Category>, reviews: Vec<Review>) -> Self {
        product.images.sort_by_key(|img| img.order);
        let reviews: Vec<Review> = reviews.into_iter().filter(|r| r.is_approved).collect();
        Self {
            current_price: product.current_price(),
            category: category.map(CategorySummary::from),
            rating: RatingSummary::from_reviews(&reviews),
            reviews,
            product,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ProductError {
    #[error("{0}")]
    Invalid(#[from] ValidationErrors),
    #[error("This category is inactive.")]
    InactiveCategory,
    #[error("Category does not match the requested category id")]
    CategoryMismatch,
    #[error("Discount price must be less than regular price.")]
    DiscountNotBelowPrice,
    #[error(transparent)]
    Sku(#[from] SkuError),
    #[error(transparent)]
    Slug(#[from] SlugError),
}
