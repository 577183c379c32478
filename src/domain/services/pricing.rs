//! Pricing Engine
//!
//! Cart totals are derived from the live line items every time they are
//! read. Nothing here is stored.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::aggregates::LineItem;
use crate::domain::value_objects::Quantity;

/// Anything carrying a list price and an optional discounted price.
pub trait Priced {
    fn list_price(&self) -> Decimal;
    fn discount_price(&self) -> Option<Decimal>;

    fn is_on_sale(&self) -> bool {
        matches!(self.discount_price(), Some(discount) if discount < self.list_price())
    }

    fn current_price(&self) -> Decimal {
        match self.discount_price() {
            Some(discount) if self.is_on_sale() => discount,
            _ => self.list_price(),
        }
    }
}

/// `quantity × current_price`
pub fn line_subtotal(quantity: Quantity, product: &impl Priced) -> Decimal {
    quantity.as_decimal() * product.current_price()
}

/// `quantity × (price − discount_price)` when a discount price is set, zero otherwise.
pub fn line_discount(quantity: Quantity, product: &impl Priced) -> Decimal {
    match product.discount_price() {
        Some(discount) => quantity.as_decimal() * (product.list_price() - discount),
        None => Decimal::ZERO,
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CartTotals {
    pub total_items: u64,
    pub subtotal: Decimal,
    pub total_discount: Decimal,
    pub total: Decimal,
}

pub fn price_lines(items: &[LineItem]) -> CartTotals {
    let (total_items, subtotal, total_discount) = items.iter().fold(
        (0u64, Decimal::ZERO, Decimal::ZERO),
        |(count, subtotal, discount), item| {
            (
                count + u64::from(item.quantity().value()),
                subtotal + line_subtotal(item.quantity(), item.product()),
                discount + line_discount(item.quantity(), item.product()),
            )
        },
    );
    CartTotals { total_items, subtotal, total_discount, total: subtotal - total_discount }
}
