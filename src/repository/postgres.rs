//! PostgreSQL store backed by `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use super::{CartRepository, CartUnitOfWork, CatalogRepository, Page, ProductQuery, ReviewRepository};
use crate::domain::aggregates::{
    Cart, CartOwner, Category, LineItem, Product, ProductImage, ProductSummary, Review, StockStatus, StockedProduct,
};
use crate::domain::value_objects::{Quantity, Rating, Sku, Slug};
use crate::{Result, StorefrontError};

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

fn corrupt(what: &str, detail: impl std::fmt::Display) -> StorefrontError {
    StorefrontError::Storage(format!("invalid {what} row: {detail}"))
}

/// Unique and foreign key violations become `Conflict`; everything else stays a database error.
fn map_write_error(e: sqlx::Error, conflict: &str) -> StorefrontError {
    if let sqlx::Error::Database(db) = &e {
        if matches!(db.code().as_deref(), Some("23505") | Some("23503")) {
            return StorefrontError::Conflict(conflict.to_string());
        }
    }
    StorefrontError::Database(e)
}

fn to_quantity(value: i32) -> Quantity { Quantity::new(u32::try_from(value).unwrap_or(0)) }

fn to_i32(value: u32, what: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| StorefrontError::Validation(format!("{what} is too large")))
}

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CartRow { id: Uuid, user_id: Option<Uuid>, session_key: Option<String>, created_at: DateTime<Utc>, updated_at: DateTime<Utc> }

#[derive(Debug, sqlx::FromRow)]
struct LineRow {
    id: Uuid, cart_id: Uuid, quantity: i32, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
    product_id: Uuid, product_name: String, product_slug: String, price: Decimal, discount_price: Option<Decimal>, stock: i32,
}

#[derive(Debug, sqlx::FromRow)]
struct StockRow { id: Uuid, name: String, slug: String, price: Decimal, discount_price: Option<Decimal>, quantity: i32 }

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: Uuid, name: String, slug: String, description: String, image_url: Option<String>, parent_id: Option<Uuid>,
    is_active: bool, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid, name: String, slug: String, sku: String, description: String, short_description: String,
    price: Decimal, discount_price: Option<Decimal>, quantity: i32, stock_status: String, category_id: Uuid,
    brand: String, weight: Option<Decimal>, dimensions: String, is_active: bool, is_featured: bool,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ListedProductRow {
    #[sqlx(flatten)]
    product: ProductRow,
    category_name: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ImageRow { id: Uuid, product_id: Uuid, url: String, alt_text: String, is_primary: bool, position: i32, created_at: DateTime<Utc> }

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: Uuid, product_id: Uuid, user_id: Uuid, rating: i16, title: String, comment: String,
    is_verified_purchase: bool, is_approved: bool, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl CartRow {
    fn owner(&self) -> Result<CartOwner> {
        match (&self.user_id, &self.session_key) {
            (Some(user_id), None) => Ok(CartOwner::User(*user_id)),
            (None, Some(key)) => Ok(CartOwner::Session(key.clone())),
            _ => Err(corrupt("cart", format!("{} must have exactly one owner", self.id))),
        }
    }
}

impl From<LineRow> for LineItem {
    fn from(r: LineRow) -> Self {
        let product = StockedProduct {
            id: r.product_id, name: r.product_name, slug: r.product_slug,
            price: r.price, discount_price: r.discount_price, stock: to_quantity(r.stock),
        };
        LineItem::restore(r.id, r.cart_id, product, to_quantity(r.quantity), r.created_at, r.updated_at)
    }
}

impl From<StockRow> for StockedProduct {
    fn from(r: StockRow) -> Self {
        StockedProduct { id: r.id, name: r.name, slug: r.slug, price: r.price, discount_price: r.discount_price, stock: to_quantity(r.quantity) }
    }
}

impl TryFrom<CategoryRow> for Category {
    type Error = StorefrontError;
    fn try_from(r: CategoryRow) -> Result<Self> {
        Ok(Category {
            slug: Slug::new(r.slug).map_err(|e| corrupt("category", e))?,
            id: r.id, name: r.name, description: r.description, image_url: r.image_url, parent_id: r.parent_id,
            is_active: r.is_active, created_at: r.created_at, updated_at: r.updated_at,
        })
    }
}

impl From<ImageRow> for ProductImage {
    fn from(r: ImageRow) -> Self {
        ProductImage {
            id: r.id, product_id: r.product_id, url: r.url, alt_text: r.alt_text, is_primary: r.is_primary,
            order: u32::try_from(r.position).unwrap_or(0), created_at: r.created_at,
        }
    }
}

impl ProductRow {
    fn into_product(self, images: Vec<ProductImage>) -> Result<Product> {
        Ok(Product {
            slug: Slug::new(self.slug).map_err(|e| corrupt("product", e))?,
            sku: Sku::new(self.sku).map_err(|e| corrupt("product", e))?,
            stock_status: StockStatus::parse(&self.stock_status).ok_or_else(|| corrupt("product", &self.stock_status))?,
            quantity: to_quantity(self.quantity).value(),
            id: self.id, name: self.name, description: self.description, short_description: self.short_description,
            price: self.price, discount_price: self.discount_price, category_id: self.category_id, brand: self.brand,
            weight: self.weight, dimensions: self.dimensions, is_active: self.is_active, is_featured: self.is_featured,
            images, created_at: self.created_at, updated_at: self.updated_at,
        })
    }
}

impl TryFrom<ReviewRow> for Review {
    type Error = StorefrontError;
    fn try_from(r: ReviewRow) -> Result<Self> {
        Ok(Review {
            rating: Rating::new(i32::from(r.rating)).map_err(|e| corrupt("review", e))?,
            id: r.id, product_id: r.product_id, user_id: r.user_id, title: r.title, comment: r.comment,
            is_verified_purchase: r.is_verified_purchase, is_approved: r.is_approved,
            created_at: r.created_at, updated_at: r.updated_at,
        })
    }
}

const PRODUCT_COLUMNS: &str = "p.id, p.name, p.slug, p.sku, p.description, p.short_description, p.price, p.discount_price, \
    p.quantity, p.stock_status, p.category_id, p.brand, p.weight, p.dimensions, p.is_active, p.is_featured, p.created_at, p.updated_at";

const CATEGORY_COLUMNS: &str = "id, name, slug, description, image_url, parent_id, is_active, created_at, updated_at";

const REVIEW_COLUMNS: &str = "id, product_id, user_id, rating, title, comment, is_verified_purchase, is_approved, created_at, updated_at";

async fn images_for(conn: &mut PgConnection, product_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<ProductImage>>> {
    let rows = sqlx::query_as::<_, ImageRow>(
        "SELECT id, product_id, url, alt_text, is_primary, position, created_at FROM product_images WHERE product_id = ANY($1) ORDER BY position, created_at",
    )
    .bind(product_ids)
    .fetch_all(conn)
    .await?;
    let mut by_product: HashMap<Uuid, Vec<ProductImage>> = HashMap::new();
    for row in rows {
        by_product.entry(row.product_id).or_default().push(row.into());
    }
    Ok(by_product)
}

// =============================================================================
// Cart unit of work
// =============================================================================

pub struct PgUnitOfWork {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgUnitOfWork {
    fn conn(&mut self) -> Result<&mut PgConnection> {
        self.tx.as_deref_mut().ok_or_else(|| StorefrontError::Storage("unit of work already committed".into()))
    }
}

#[async_trait]
impl CartRepository for PgStore {
    async fn begin(&self) -> Result<Box<dyn CartUnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx: Some(tx) }))
    }
}

#[async_trait]
impl CartUnitOfWork for PgUnitOfWork {
    async fn find_cart(&mut self, owner: &CartOwner) -> Result<Option<Cart>> {
        let conn = self.conn()?;
        let row = match owner {
            CartOwner::User(user_id) => {
                sqlx::query_as::<_, CartRow>("SELECT id, user_id, session_key, created_at, updated_at FROM carts WHERE user_id = $1 FOR UPDATE")
                    .bind(user_id)
                    .fetch_optional(&mut *conn)
                    .await?
            }
            CartOwner::Session(key) => {
                sqlx::query_as::<_, CartRow>("SELECT id, user_id, session_key, created_at, updated_at FROM carts WHERE session_key = $1 AND user_id IS NULL FOR UPDATE")
                    .bind(key)
                    .fetch_optional(&mut *conn)
                    .await?
            }
        };
        let Some(row) = row else { return Ok(None) };

        let lines = sqlx::query_as::<_, LineRow>(
            r#"
            SELECT ci.id, ci.cart_id, ci.quantity, ci.created_at, ci.updated_at,
                   p.id AS product_id, p.name AS product_name, p.slug AS product_slug,
                   p.price, p.discount_price, p.quantity AS stock
            FROM cart_items ci
            JOIN products p ON p.id = ci.product_id
            WHERE ci.cart_id = $1
            ORDER BY ci.created_at DESC, ci.id DESC
            FOR UPDATE OF ci FOR SHARE OF p
            "#,
        )
        .bind(row.id)
        .fetch_all(&mut *conn)
        .await?;
        debug!(cart_id = %row.id, lines = lines.len(), "cart loaded");

        let items = lines.into_iter().map(LineItem::from).collect();
        Ok(Some(Cart::restore(row.id, row.owner()?, items, row.created_at, row.updated_at)))
    }

    async fn upsert_cart(&mut self, owner: &CartOwner) -> Result<Cart> {
        sqlx::query("INSERT INTO carts (id, user_id, session_key, created_at, updated_at) VALUES ($1, $2, $3, NOW(), NOW()) ON CONFLICT DO NOTHING")
            .bind(Uuid::now_v7())
            .bind(owner.user_id())
            .bind(owner.session_key())
            .execute(self.conn()?)
            .await?;
        self.find_cart(owner).await?.ok_or_else(|| StorefrontError::Storage("cart vanished after upsert".into()))
    }

    async fn find_product(&mut self, product_id: Uuid) -> Result<Option<StockedProduct>> {
        let row = sqlx::query_as::<_, StockRow>(
            "SELECT id, name, slug, price, discount_price, quantity FROM products WHERE id = $1 AND is_active FOR SHARE",
        )
        .bind(product_id)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(row.map(StockedProduct::from))
    }

    async fn save_cart(&mut self, cart: &Cart) -> Result<()> {
        let conn = self.conn()?;
        let keep: Vec<Uuid> = cart.items().iter().map(LineItem::id).collect();
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND NOT (id = ANY($2))")
            .bind(cart.id())
            .bind(&keep)
            .execute(&mut *conn)
            .await?;
        for item in cart.items() {
            sqlx::query(
                r#"
                INSERT INTO cart_items (id, cart_id, product_id, quantity, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (id) DO UPDATE
                SET cart_id = EXCLUDED.cart_id, quantity = EXCLUDED.quantity, updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(item.id())
            .bind(cart.id())
            .bind(item.product_id())
            .bind(to_i32(item.quantity().value(), "quantity")?)
            .bind(item.created_at())
            .bind(item.updated_at())
            .execute(&mut *conn)
            .await?;
        }
        sqlx::query("UPDATE carts SET updated_at = $2 WHERE id = $1")
            .bind(cart.id())
            .bind(cart.updated_at())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    async fn delete_cart(&mut self, cart_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM carts WHERE id = $1").bind(cart_id).execute(self.conn()?).await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let tx = self.tx.take().ok_or_else(|| StorefrontError::Storage("unit of work already committed".into()))?;
        tx.commit().await?;
        Ok(())
    }
}

// =============================================================================
// Catalog
// =============================================================================

#[async_trait]
impl CatalogRepository for PgStore {
    async fn insert_category(&self, c: &Category) -> Result<()> {
        sqlx::query(&format!("INSERT INTO categories ({CATEGORY_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"))
            .bind(c.id).bind(&c.name).bind(c.slug.as_str()).bind(&c.description).bind(&c.image_url)
            .bind(c.parent_id).bind(c.is_active).bind(c.created_at).bind(c.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, &format!("Category with slug '{}' already exists", c.slug)))?;
        Ok(())
    }

    async fn update_category(&self, c: &Category) -> Result<()> {
        let done = sqlx::query(
            "UPDATE categories SET name = $2, slug = $3, description = $4, image_url = $5, parent_id = $6, is_active = $7, updated_at = $8 WHERE id = $1",
        )
        .bind(c.id).bind(&c.name).bind(c.slug.as_str()).bind(&c.description).bind(&c.image_url)
        .bind(c.parent_id).bind(c.is_active).bind(c.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &format!("Category with slug '{}' already exists", c.slug)))?;
        if done.rows_affected() == 0 { return Err(StorefrontError::NotFound("Category")); }
        Ok(())
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool> {
        let done = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, "Category is still referenced by products"))?;
        Ok(done.rows_affected() > 0)
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>> {
        sqlx::query_as::<_, CategoryRow>(&format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Category::try_from)
            .transpose()
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        sqlx::query_as::<_, CategoryRow>(&format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY name"))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Category::try_from)
            .collect()
    }

    async fn insert_product(&self, p: &Product) -> Result<()> {
        let conflict = format!("Product with slug '{}' or SKU '{}' already exists", p.slug, p.sku);
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO products (id, name, slug, sku, description, short_description, price, discount_price, quantity,
                                  stock_status, category_id, brand, weight, dimensions, is_active, is_featured, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(p.id).bind(&p.name).bind(p.slug.as_str()).bind(p.sku.as_str()).bind(&p.description).bind(&p.short_description)
        .bind(p.price).bind(p.discount_price).bind(to_i32(p.quantity, "quantity")?).bind(p.stock_status.as_str())
        .bind(p.category_id).bind(&p.brand).bind(p.weight).bind(&p.dimensions).bind(p.is_active).bind(p.is_featured)
        .bind(p.created_at).bind(p.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, &conflict))?;

        for image in &p.images {
            sqlx::query(
                "INSERT INTO product_images (id, product_id, url, alt_text, is_primary, position, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(image.id).bind(p.id).bind(&image.url).bind(&image.alt_text).bind(image.is_primary)
            .bind(to_i32(image.order, "image order")?).bind(image.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn update_product(&self, p: &Product) -> Result<()> {
        let done = sqlx::query(
            r#"
            UPDATE products SET name = $2, slug = $3, sku = $4, description = $5, short_description = $6, price = $7,
                   discount_price = $8, quantity = $9, stock_status = $10, category_id = $11, brand = $12, weight = $13,
                   dimensions = $14, is_active = $15, is_featured = $16, updated_at = $17
            WHERE id = $1
            "#,
        )
        .bind(p.id).bind(&p.name).bind(p.slug.as_str()).bind(p.sku.as_str()).bind(&p.description).bind(&p.short_description)
        .bind(p.price).bind(p.discount_price).bind(to_i32(p.quantity, "quantity")?).bind(p.stock_status.as_str())
        .bind(p.category_id).bind(&p.brand).bind(p.weight).bind(&p.dimensions).bind(p.is_active).bind(p.is_featured)
        .bind(p.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &format!("Product with slug '{}' or SKU '{}' already exists", p.slug, p.sku)))?;
        if done.rows_affected() == 0 { return Err(StorefrontError::NotFound("Product")); }
        Ok(())
    }

    async fn find_product_by_slug(&self, slug: &str) -> Result<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.slug = $1"))
            .bind(slug)
            .fetch_optional(&mut *conn)
            .await?;
        let Some(row) = row else { return Ok(None) };
        let images = images_for(&mut conn, &[row.id]).await?.remove(&row.id).unwrap_or_default();
        row.into_product(images).map(Some)
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<Page<ProductSummary>> {
        const FILTER: &str = "p.is_active \
            AND ($1::uuid IS NULL OR p.category_id = $1) \
            AND ($2::text IS NULL OR p.name ILIKE '%' || $2 || '%') \
            AND (NOT $3 OR p.is_featured)";
        let mut conn = self.pool.acquire().await?;

        let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM products p WHERE {FILTER}"))
            .bind(query.category_id)
            .bind(query.search.as_deref())
            .bind(query.featured_only)
            .fetch_one(&mut *conn)
            .await?;

        let rows = sqlx::query_as::<_, ListedProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS}, c.name AS category_name FROM products p JOIN categories c ON c.id = p.category_id \
             WHERE {FILTER} ORDER BY p.created_at DESC, p.id DESC LIMIT $4 OFFSET $5"
        ))
        .bind(query.category_id)
        .bind(query.search.as_deref())
        .bind(query.featured_only)
        .bind(i64::from(query.per_page))
        .bind(i64::try_from(query.offset()).unwrap_or(i64::MAX))
        .fetch_all(&mut *conn)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.product.id).collect();
        let mut images = images_for(&mut conn, &ids).await?;
        let data = rows
            .into_iter()
            .map(|r| {
                let product_images = images.remove(&r.product.id).unwrap_or_default();
                let product = r.product.into_product(product_images)?;
                Ok(ProductSummary::new(&product, r.category_name))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Page { data, total, page: query.page, per_page: query.per_page })
    }
}

// =============================================================================
// Reviews
// =============================================================================

#[async_trait]
impl ReviewRepository for PgStore {
    async fn insert_review(&self, r: &Review) -> Result<()> {
        sqlx::query(&format!("INSERT INTO reviews ({REVIEW_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"))
            .bind(r.id).bind(r.product_id).bind(r.user_id).bind(i16::from(r.rating.value())).bind(&r.title).bind(&r.comment)
            .bind(r.is_verified_purchase).bind(r.is_approved).bind(r.created_at).bind(r.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, "You have already reviewed this product"))?;
        Ok(())
    }

    async fn update_review(&self, r: &Review) -> Result<()> {
        let done = sqlx::query("UPDATE reviews SET rating = $2, title = $3, comment = $4, is_approved = $5, updated_at = $6 WHERE id = $1")
            .bind(r.id).bind(i16::from(r.rating.value())).bind(&r.title).bind(&r.comment).bind(r.is_approved).bind(r.updated_at)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 { return Err(StorefrontError::NotFound("Review")); }
        Ok(())
    }

    async fn delete_review(&self, id: Uuid) -> Result<bool> {
        let done = sqlx::query("DELETE FROM reviews WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }

    async fn find_review(&self, id: Uuid) -> Result<Option<Review>> {
        sqlx::query_as::<_, ReviewRow>(&format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Review::try_from)
            .transpose()
    }

    async fn list_approved(&self, product_id: Uuid) -> Result<Vec<Review>> {
        sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE product_id = $1 AND is_approved ORDER BY created_at DESC"
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Review::try_from)
        .collect()
    }
}
