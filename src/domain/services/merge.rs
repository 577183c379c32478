//! Merge Resolver
//!
//! Folds an anonymous cart into the cart of the user who just signed in.
//! Quantities for products present in both carts are summed and clamped to
//! stock; this path never rejects. A line clamped to nothing is removed.

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::domain::aggregates::Cart;
use crate::domain::events::{CartEvent, DomainEvent};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Products whose quantities were summed into an existing target line.
    pub combined: Vec<Uuid>,
    /// Lines moved over from the source cart unchanged.
    pub moved: Vec<Uuid>,
    pub clamped: Vec<ClampedLine>,
    /// Products sold out since they were carted; their target lines are removed.
    pub dropped: Vec<Uuid>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClampedLine {
    pub product_id: Uuid,
    pub requested: u32,
    pub kept: u32,
}

/// Moves every line of `source` into `target`. The caller deletes the source
/// cart in the same unit of work.
pub fn merge_carts(target: &mut Cart, source: Cart) -> MergeReport {
    let source_id = source.id();
    let target_id = target.id();
    let mut report = MergeReport::default();

    for mut line in source.into_items() {
        let product_id = line.product_id();
        let existing = target.items_mut().iter_mut().find(|i| i.product_id() == product_id);
        match existing {
            Some(existing) => {
                let requested = existing.quantity().add(line.quantity());
                let kept = requested.clamp_to(line.product().stock);
                if kept != requested {
                    warn!(cart_id = %target_id, %product_id, requested = requested.value(), kept = kept.value(), "merged quantity clamped to stock");
                    report.clamped.push(ClampedLine { product_id, requested: requested.value(), kept: kept.value() });
                }
                if kept.is_zero() {
                    report.dropped.push(product_id);
                } else {
                    existing.set_quantity(kept);
                    report.combined.push(product_id);
                }
            }
            None => {
                line.reassign(target_id);
                report.moved.push(line.id());
                target.items_mut().push(line);
            }
        }
    }

    if !report.dropped.is_empty() {
        target.items_mut().retain(|i| !report.dropped.contains(&i.product_id()));
    }
    target.touch();
    target.raise_event(DomainEvent::Cart(CartEvent::Merged {
        source_cart_id: source_id,
        target_cart_id: target_id,
        clamped: report.clamped.iter().map(|c| c.product_id).collect(),
    }));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{CartOwner, LineItem, StockedProduct};
    use chrono::Utc;
    use crate::domain::value_objects::Quantity;
    use rust_decimal::Decimal;

    fn product(stock: u32) -> StockedProduct {
        StockedProduct {
            id: Uuid::new_v4(), name: "Mug".into(), slug: "mug".into(),
            price: Decimal::new(1200, 2), discount_price: None, stock: Quantity::new(stock),
        }
    }

    #[test]
    fn test_merge_clamps_to_stock() {
        let a = product(4);
        let mut anonymous = Cart::new(CartOwner::Session("s1".into()));
        anonymous.add_item(a.clone(), 3).unwrap();
        let mut target = Cart::new(CartOwner::User(Uuid::new_v4()));
        target.add_item(a.clone(), 2).unwrap();

        let report = merge_carts(&mut target, anonymous);

        assert_eq!(target.items().len(), 1);
        assert_eq!(target.item_for_product(a.id).unwrap().quantity().value(), 4);
        assert_eq!(report.clamped, vec![ClampedLine { product_id: a.id, requested: 5, kept: 4 }]);
    }

    #[test]
    fn test_merge_drops_lines_of_sold_out_products() {
        let a = product(4);
        let b = product(10);
        let mut target = Cart::new(CartOwner::User(Uuid::new_v4()));
        target.add_item(a.clone(), 1).unwrap();
        target.add_item(b.clone(), 1).unwrap();

        // stock ran out after the anonymous line was carted
        let sold_out = StockedProduct { stock: Quantity::new(0), ..a.clone() };
        let (source_id, now) = (Uuid::new_v4(), Utc::now());
        let line = LineItem::restore(Uuid::now_v7(), source_id, sold_out, Quantity::new(2), now, now);
        let anonymous = Cart::restore(source_id, CartOwner::Session("s4".into()), vec![line], now, now);

        let report = merge_carts(&mut target, anonymous);

        assert!(target.item_for_product(a.id).is_none());
        assert_eq!(target.items().len(), 1);
        assert_eq!(report.dropped, vec![a.id]);
        assert_eq!(report.clamped, vec![ClampedLine { product_id: a.id, requested: 3, kept: 0 }]);
        assert!(report.combined.is_empty());
    }

    #[test]
    fn test_merge_moves_missing_lines() {
        let b = product(10);
        let mut anonymous = Cart::new(CartOwner::Session("s2".into()));
        let moved_id = anonymous.add_item(b.clone(), 2).unwrap().id();
        let mut target = Cart::new(CartOwner::User(Uuid::new_v4()));

        let report = merge_carts(&mut target, anonymous);

        let line = target.item_for_product(b.id).unwrap();
        assert_eq!(line.quantity().value(), 2);
        assert_eq!(line.id(), moved_id);
        assert_eq!(line.cart_id(), target.id());
        assert_eq!(report.moved, vec![moved_id]);
        assert!(report.clamped.is_empty());
    }

    #[test]
    fn test_merge_empty_source_raises_event_only() {
        let mut target = Cart::new(CartOwner::User(Uuid::new_v4()));
        let report = merge_carts(&mut target, Cart::new(CartOwner::Session("s3".into())));
        assert_eq!(report, MergeReport::default());
        assert!(target.is_empty());
        assert_eq!(target.take_events().len(), 1);
    }
}
