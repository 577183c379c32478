//! Cart Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::events::{CartEvent, DomainEvent};
use crate::domain::services::pricing::{self, CartTotals, Priced};
use crate::domain::value_objects::Quantity;

/// Who a cart belongs to. A cart has exactly one owner for its whole life.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum CartOwner {
    User(Uuid),
    Session(String),
}

impl CartOwner {
    pub fn user_id(&self) -> Option<Uuid> {
        match self { Self::User(id) => Some(*id), Self::Session(_) => None }
    }
    pub fn session_key(&self) -> Option<&str> {
        match self { Self::Session(key) => Some(key), Self::User(_) => None }
    }
    pub fn is_anonymous(&self) -> bool { matches!(self, Self::Session(_)) }
}

/// The catalog fields a line item needs, read live from the product row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockedProduct {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub price: Decimal,
    pub discount_price: Option<Decimal>,
    pub stock: Quantity,
}

impl Priced for StockedProduct {
    fn list_price(&self) -> Decimal { self.price }
    fn discount_price(&self) -> Option<Decimal> { self.discount_price }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    id: Uuid,
    cart_id: Uuid,
    product: StockedProduct,
    quantity: Quantity,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl LineItem {
    pub fn restore(id: Uuid, cart_id: Uuid, product: StockedProduct, quantity: Quantity, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        Self { id, cart_id, product, quantity, created_at, updated_at }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn cart_id(&self) -> Uuid { self.cart_id }
    pub fn product(&self) -> &StockedProduct { &self.product }
    pub fn product_id(&self) -> Uuid { self.product.id }
    pub fn quantity(&self) -> Quantity { self.quantity }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    pub fn unit_price(&self) -> Decimal { self.product.current_price() }
    pub fn original_price(&self) -> Decimal { self.product.price }
    pub fn subtotal(&self) -> Decimal { pricing::line_subtotal(self.quantity, &self.product) }
    pub fn discount_amount(&self) -> Decimal { pricing::line_discount(self.quantity, &self.product) }

    pub(crate) fn set_quantity(&mut self, quantity: Quantity) {
        self.quantity = quantity;
        self.updated_at = Utc::now();
    }

    pub(crate) fn reassign(&mut self, cart_id: Uuid) {
        self.cart_id = cart_id;
        self.updated_at = Utc::now();
    }
}

#[derive(Clone, Debug)]
pub struct Cart {
    id: Uuid,
    owner: CartOwner,
    items: Vec<LineItem>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    events: Vec<DomainEvent>,
}

impl Cart {
    pub fn new(owner: CartOwner) -> Self {
        let now = Utc::now();
        Self { id: Uuid::now_v7(), owner, items: vec![], created_at: now, updated_at: now, events: vec![] }
    }

    pub fn restore(id: Uuid, owner: CartOwner, items: Vec<LineItem>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        Self { id, owner, items, created_at, updated_at, events: vec![] }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn owner(&self) -> &CartOwner { &self.owner }
    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn item(&self, item_id: Uuid) -> Option<&LineItem> { self.items.iter().find(|i| i.id == item_id) }
    pub fn item_for_product(&self, product_id: Uuid) -> Option<&LineItem> { self.items.iter().find(|i| i.product.id == product_id) }

    pub fn totals(&self) -> CartTotals { pricing::price_lines(&self.items) }

    pub fn summary(&self) -> CartSummary {
        let totals = self.totals();
        CartSummary { id: self.id, total_items: totals.total_items, total: totals.total }
    }

    /// Adds `requested` units of `product`. An existing line for the product
    /// grows instead of a second line being created.
    pub fn add_item(&mut self, product: StockedProduct, requested: i64) -> Result<&LineItem, CartError> {
        let quantity = Quantity::requested(requested).ok_or(CartError::InvalidQuantity)?;
        let asked = requested.unsigned_abs();
        let stock = product.stock;
        let idx = match self.items.iter().position(|i| i.product.id == product.id) {
            Some(idx) => {
                let wanted = u64::from(self.items[idx].quantity.value()) + asked;
                if wanted > u64::from(stock.value()) {
                    return Err(CartError::InsufficientStock { available: stock.value(), requested: wanted });
                }
                let line = &mut self.items[idx];
                line.product = product;
                let grown = line.quantity.add(quantity);
                line.set_quantity(grown);
                idx
            }
            None => {
                if asked > u64::from(stock.value()) {
                    return Err(CartError::InsufficientStock { available: stock.value(), requested: asked });
                }
                let now = Utc::now();
                self.items.push(LineItem { id: Uuid::now_v7(), cart_id: self.id, product, quantity, created_at: now, updated_at: now });
                self.items.len() - 1
            }
        };
        let line = &self.items[idx];
        self.events.push(DomainEvent::Cart(CartEvent::ItemAdded {
            cart_id: self.id, item_id: line.id, product_id: line.product.id, quantity: line.quantity.value(),
        }));
        self.updated_at = Utc::now();
        Ok(&self.items[idx])
    }

    /// Overwrites a line's quantity. Rejected, never clamped, when above stock.
    pub fn update_item(&mut self, item_id: Uuid, requested: i64) -> Result<&LineItem, CartError> {
        let idx = self.items.iter().position(|i| i.id == item_id).ok_or(CartError::ItemNotFound)?;
        let quantity = Quantity::requested(requested).ok_or(CartError::InvalidQuantity)?;
        let asked = requested.unsigned_abs();
        let stock = self.items[idx].product.stock;
        if asked > u64::from(stock.value()) {
            return Err(CartError::InsufficientStock { available: stock.value(), requested: asked });
        }
        self.items[idx].set_quantity(quantity);
        self.events.push(DomainEvent::Cart(CartEvent::ItemUpdated { cart_id: self.id, item_id, quantity: quantity.value() }));
        self.updated_at = Utc::now();
        Ok(&self.items[idx])
    }

    pub fn remove_item(&mut self, item_id: Uuid) -> Result<LineItem, CartError> {
        let idx = self.items.iter().position(|i| i.id == item_id).ok_or(CartError::ItemNotFound)?;
        let removed = self.items.remove(idx);
        self.events.push(DomainEvent::Cart(CartEvent::ItemRemoved { cart_id: self.id, item_id, product_id: removed.product.id }));
        self.updated_at = Utc::now();
        Ok(removed)
    }

    /// Empties the cart, returning how many lines were dropped.
    pub fn clear(&mut self) -> usize {
        let removed = self.items.len();
        self.items.clear();
        self.events.push(DomainEvent::Cart(CartEvent::Cleared { cart_id: self.id, removed }));
        self.updated_at = Utc::now();
        removed
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<LineItem> { &mut self.items }
    pub(crate) fn into_items(self) -> Vec<LineItem> { self.items }
    pub(crate) fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    pub(crate) fn touch(&mut self) { self.updated_at = Utc::now(); }
}

/// Read model returned by cart endpoints.
#[derive(Clone, Debug, Serialize)]
pub struct CartView {
    pub id: Uuid,
    pub items: Vec<LineItemView>,
    #[serde(flatten)]
    pub totals: CartTotals,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct LineItemView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_slug: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub original_price: Decimal,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&LineItem> for LineItemView {
    fn from(item: &LineItem) -> Self {
        Self {
            id: item.id, product_id: item.product.id, product_name: item.product.name.clone(),
            product_slug: item.product.slug.clone(), quantity: item.quantity.value(),
            unit_price: item.unit_price(), original_price: item.original_price(),
            subtotal: item.subtotal(), discount_amount: item.discount_amount(),
            created_at: item.created_at, updated_at: item.updated_at,
        }
    }
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            id: cart.id, items: cart.items.iter().map(LineItemView::from).collect(),
            totals: cart.totals(), created_at: cart.created_at, updated_at: cart.updated_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CartSummary {
    pub id: Uuid,
    pub total_items: u64,
    pub total: Decimal,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("Only {available} items available in stock, {requested} requested")]
    InsufficientStock { available: u32, requested: u64 },
    #[error("Item not found in cart")]
    ItemNotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(price: i64, discount: Option<i64>, stock: u32) -> StockedProduct {
        StockedProduct {
            id: Uuid::new_v4(), name: "Widget".into(), slug: "widget".into(),
            price: Decimal::new(price, 2), discount_price: discount.map(|d| Decimal::new(d, 2)), stock: Quantity::new(stock),
        }
    }

    #[test]
    fn test_cart_operations() {
        let mut cart = Cart::new(CartOwner::Session("abc".into()));
        let widget = product(1000, None, 10);
        cart.add_item(widget.clone(), 2).unwrap();
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.totals().subtotal, Decimal::new(2000, 2));
        cart.add_item(widget, 1).unwrap();
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity().value(), 3); // Merged
    }

    #[test]
    fn test_add_rejects_bad_quantities() {
        let mut cart = Cart::new(CartOwner::User(Uuid::new_v4()));
        let widget = product(1000, None, 3);
        assert_eq!(cart.add_item(widget.clone(), 0).unwrap_err(), CartError::InvalidQuantity);
        assert_eq!(cart.add_item(widget.clone(), 4).unwrap_err(), CartError::InsufficientStock { available: 3, requested: 4 });
        cart.add_item(widget.clone(), 2).unwrap();
        assert_eq!(cart.add_item(widget, 2).unwrap_err(), CartError::InsufficientStock { available: 3, requested: 4 });
        assert_eq!(cart.items()[0].quantity().value(), 2);
    }

    #[test]
    fn test_update_overwrites_within_stock() {
        let mut cart = Cart::new(CartOwner::User(Uuid::new_v4()));
        let id = cart.add_item(product(500, None, 5), 1).unwrap().id();
        assert_eq!(cart.update_item(id, 5).unwrap().quantity().value(), 5);
        assert!(matches!(cart.update_item(id, 6), Err(CartError::InsufficientStock { .. })));
        assert_eq!(cart.update_item(id, 0).unwrap_err(), CartError::InvalidQuantity);
        assert_eq!(cart.update_item(Uuid::new_v4(), 1).unwrap_err(), CartError::ItemNotFound);
        assert_eq!(cart.item(id).unwrap().quantity().value(), 5);
    }

    #[test]
    fn test_oversized_requests_report_insufficient_stock() {
        let mut cart = Cart::new(CartOwner::User(Uuid::new_v4()));
        let widget = product(1000, None, 3);
        let huge = i64::from(u32::MAX) + 1;
        assert_eq!(cart.add_item(widget.clone(), huge).unwrap_err(), CartError::InsufficientStock { available: 3, requested: 4_294_967_296 });
        let id = cart.add_item(widget.clone(), 1).unwrap().id();
        assert_eq!(cart.add_item(widget, i64::MAX).unwrap_err(), CartError::InsufficientStock { available: 3, requested: i64::MAX as u64 + 1 });
        assert_eq!(cart.update_item(id, huge).unwrap_err(), CartError::InsufficientStock { available: 3, requested: 4_294_967_296 });
        assert_eq!(cart.item(id).unwrap().quantity().value(), 1);
    }

    #[test]
    fn test_totals_with_discount() {
        let mut cart = Cart::new(CartOwner::User(Uuid::new_v4()));
        cart.add_item(product(1000, Some(800), 10), 2).unwrap();
        cart.add_item(product(250, None, 10), 4).unwrap();
        let totals = cart.totals();
        assert_eq!(totals.total_items, 6);
        assert_eq!(totals.subtotal, Decimal::new(2600, 2));
        assert_eq!(totals.total_discount, Decimal::new(400, 2));
        assert_eq!(totals.total, totals.subtotal - totals.total_discount);
    }

    #[test]
    fn test_clear_and_remove() {
        let mut cart = Cart::new(CartOwner::Session("s".into()));
        let id = cart.add_item(product(100, None, 9), 1).unwrap().id();
        cart.add_item(product(100, None, 9), 1).unwrap();
        assert_eq!(cart.remove_item(id).unwrap().id(), id);
        assert_eq!(cart.remove_item(id).unwrap_err(), CartError::ItemNotFound);
        assert_eq!(cart.clear(), 1);
        assert_eq!(cart.summary().total_items, 0);
        assert_eq!(cart.summary().total, Decimal::ZERO);
        assert_eq!(cart.take_events().len(), 4);
    }
}
