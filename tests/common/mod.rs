#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use opensase_storefront::api::AppState;
use opensase_storefront::domain::aggregates::{Category, NewCategory, NewProduct, ProductDetail};
use opensase_storefront::publisher::LogPublisher;
use opensase_storefront::repository::MemoryStore;

pub fn app_state() -> AppState {
    AppState::from_store(MemoryStore::new(), Arc::new(LogPublisher), 5)
}

pub fn money(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

pub async fn category(state: &AppState, name: &str) -> Category {
    state
        .catalog
        .create_category(NewCategory {
            name: name.into(), slug: None, description: String::new(), image_url: None, parent_id: None, is_active: true,
        })
        .await
        .unwrap()
}

pub fn new_product(category_id: Uuid, name: &str, price: Decimal, discount_price: Option<Decimal>, quantity: u32) -> NewProduct {
    NewProduct {
        name: name.into(),
        slug: None,
        sku: format!("SKU-{}", name.to_uppercase().replace(' ', "-")),
        description: String::new(),
        short_description: String::new(),
        price,
        discount_price,
        quantity,
        stock_status: None,
        category_id,
        brand: String::new(),
        weight: None,
        dimensions: String::new(),
        is_active: true,
        is_featured: false,
        images: vec![],
    }
}

pub async fn product(state: &AppState, category: &Category, name: &str, price: Decimal, discount_price: Option<Decimal>, quantity: u32) -> ProductDetail {
    state.catalog.create_product(new_product(category.id, name, price, discount_price, quantity)).await.unwrap()
}
