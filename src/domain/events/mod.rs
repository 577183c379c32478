//! Domain events
use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::{Rating, Sku};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Cart(CartEvent),
    Product(ProductEvent),
    Review(ReviewEvent),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CartEvent {
    ItemAdded { cart_id: Uuid, item_id: Uuid, product_id: Uuid, quantity: u32 },
    ItemUpdated { cart_id: Uuid, item_id: Uuid, quantity: u32 },
    ItemRemoved { cart_id: Uuid, item_id: Uuid, product_id: Uuid },
    Cleared { cart_id: Uuid, removed: usize },
    Merged { source_cart_id: Uuid, target_cart_id: Uuid, clamped: Vec<Uuid> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductEvent {
    Created { product_id: Uuid, sku: Sku },
    Updated { product_id: Uuid },
    Deactivated { product_id: Uuid },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReviewEvent {
    Submitted { review_id: Uuid, product_id: Uuid, rating: Rating },
}

impl DomainEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> String {
        let (area, name) = match self {
            Self::Cart(e) => ("cart", match e {
                CartEvent::ItemAdded { .. } => "item_added",
                CartEvent::ItemUpdated { .. } => "item_updated",
                CartEvent::ItemRemoved { .. } => "item_removed",
                CartEvent::Cleared { .. } => "cleared",
                CartEvent::Merged { .. } => "merged",
            }),
            Self::Product(e) => ("product", match e {
                ProductEvent::Created { .. } => "created",
                ProductEvent::Updated { .. } => "updated",
                ProductEvent::Deactivated { .. } => "deactivated",
            }),
            Self::Review(ReviewEvent::Submitted { .. }) => ("review", "submitted"),
        };
        format!("storefront.{area}.{name}")
    }
}
