use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiResponse, AppState};
use crate::domain::aggregates::{
    Category, CategoryPatch, CategorySummary, CategoryTree, NewCategory, NewProduct, ProductDetail, ProductPatch,
    ProductSummary,
};
use crate::repository::{Page, ProductQuery};
use crate::Result;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub category: Option<Uuid>,
    pub search: Option<String>,
}

impl ListParams {
    fn into_query(self) -> ProductQuery {
        let mut query = ProductQuery::new(self.page, self.per_page);
        query.category_id = self.category;
        query.search = self.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        query
    }
}

pub async fn list_categories(State(s): State<AppState>) -> Result<Json<ApiResponse<Vec<CategorySummary>>>> {
    Ok(ApiResponse::data(s.catalog.list_categories().await?))
}

pub async fn get_category(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<ApiResponse<CategoryTree>>> {
    Ok(ApiResponse::data(s.catalog.category_tree(id).await?))
}

pub async fn create_category(State(s): State<AppState>, Json(r): Json<NewCategory>) -> Result<(StatusCode, Json<ApiResponse<Category>>)> {
    let category = s.catalog.create_category(r).await?;
    Ok((StatusCode::CREATED, ApiResponse::with_message("Category created.", category)))
}

pub async fn update_category(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<CategoryPatch>) -> Result<Json<ApiResponse<Category>>> {
    Ok(ApiResponse::with_message("Category updated.", s.catalog.update_category(id, r).await?))
}

pub async fn delete_category(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<ApiResponse<()>>> {
    s.catalog.delete_category(id).await?;
    Ok(ApiResponse::message("Category deleted."))
}

pub async fn list_products(State(s): State<AppState>, Query(p): Query<ListParams>) -> Result<Json<ApiResponse<Page<ProductSummary>>>> {
    Ok(ApiResponse::data(s.catalog.list_products(&p.into_query()).await?))
}

pub async fn featured_products(State(s): State<AppState>, Query(p): Query<ListParams>) -> Result<Json<ApiResponse<Page<ProductSummary>>>> {
    Ok(ApiResponse::data(s.catalog.featured_products(p.into_query()).await?))
}

pub async fn get_product(State(s): State<AppState>, Path(slug): Path<String>) -> Result<Json<ApiResponse<ProductDetail>>> {
    Ok(ApiResponse::data(s.catalog.get_product(&slug).await?))
}

pub async fn create_product(State(s): State<AppState>, Json(r): Json<NewProduct>) -> Result<(StatusCode, Json<ApiResponse<ProductDetail>>)> {
    let product = s.catalog.create_product(r).await?;
    Ok((StatusCode::CREATED, ApiResponse::with_message("Product created.", product)))
}

pub async fn update_product(State(s): State<AppState>, Path(slug): Path<String>, Json(r): Json<ProductPatch>) -> Result<Json<ApiResponse<ProductDetail>>> {
    Ok(ApiResponse::with_message("Product updated.", s.catalog.update_product(&slug, r).await?))
}

pub async fn delete_product(State(s): State<AppState>, Path(slug): Path<String>) -> Result<Json<ApiResponse<()>>> {
    s.catalog.delete_product(&slug).await?;
    Ok(ApiResponse::message("Product deleted."))
}
