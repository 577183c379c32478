mod common;

use rust_decimal::Decimal;
use uuid::Uuid;

use common::{app_state, category, money, product};
use opensase_storefront::domain::aggregates::{CartOwner, ProductPatch};
use opensase_storefront::services::MergeOutcome;
use opensase_storefront::StorefrontError;

fn session(key: &str) -> CartOwner {
    CartOwner::Session(key.to_string())
}

#[tokio::test]
async fn new_cart_is_empty_and_prices_to_zero() {
    let state = app_state();
    let owner = CartOwner::User(Uuid::new_v4());

    let view = state.carts.view(&owner).await.unwrap();
    assert!(view.items.is_empty());
    assert_eq!(view.totals.subtotal, Decimal::ZERO);
    assert_eq!(view.totals.total, Decimal::ZERO);

    let again = state.carts.view(&owner).await.unwrap();
    assert_eq!(again.id, view.id);
}

#[tokio::test]
async fn adding_same_product_accumulates_on_one_line() {
    let state = app_state();
    let cat = category(&state, "Tools").await;
    let hammer = product(&state, &cat, "Hammer", money(1000), None, 10).await;
    let owner = session("abc");

    let first = state.carts.add(&owner, hammer.product.id, 2).await.unwrap();
    let second = state.carts.add(&owner, hammer.product.id, 3).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.quantity, 5);
    let view = state.carts.view(&owner).await.unwrap();
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.totals.total_items, 5);
    assert_eq!(view.totals.subtotal, money(5000));
}

#[tokio::test]
async fn totals_always_equal_subtotal_minus_discount() {
    let state = app_state();
    let cat = category(&state, "Tools").await;
    let saw = product(&state, &cat, "Saw", money(2000), Some(money(1500)), 10).await;
    let drill = product(&state, &cat, "Drill", money(4999), None, 10).await;
    let owner = session("abc");

    state.carts.add(&owner, saw.product.id, 2).await.unwrap();
    state.carts.add(&owner, drill.product.id, 1).await.unwrap();

    let view = state.carts.view(&owner).await.unwrap();
    // 2 x 15.00 + 1 x 49.99
    assert_eq!(view.totals.subtotal, money(7999));
    // 2 x (20.00 - 15.00)
    assert_eq!(view.totals.total_discount, money(1000));
    assert_eq!(view.totals.total, view.totals.subtotal - view.totals.total_discount);
    assert_eq!(view.totals.total, money(6999));

    let summary = state.carts.summary(&owner).await.unwrap();
    assert_eq!(summary.total_items, 3);
    assert_eq!(summary.total, money(6999));
}

#[tokio::test]
async fn prices_follow_the_catalog_on_every_read() {
    let state = app_state();
    let cat = category(&state, "Tools").await;
    let level = product(&state, &cat, "Level", money(1200), None, 10).await;
    let owner = session("abc");
    state.carts.add(&owner, level.product.id, 2).await.unwrap();

    let patch = ProductPatch { price: Some(money(1500)), ..Default::default() };
    state.catalog.update_product(level.product.slug.as_str(), patch).await.unwrap();

    let summary = state.carts.summary(&owner).await.unwrap();
    assert_eq!(summary.total, money(3000));
}

#[tokio::test]
async fn add_beyond_stock_is_rejected_and_cart_unchanged() {
    let state = app_state();
    let cat = category(&state, "Tools").await;
    let wrench = product(&state, &cat, "Wrench", money(800), None, 4).await;
    let owner = session("abc");
    state.carts.add(&owner, wrench.product.id, 3).await.unwrap();

    let err = state.carts.add(&owner, wrench.product.id, 2).await.unwrap_err();
    assert!(matches!(err, StorefrontError::InsufficientStock { available: 4, requested: 5 }));

    let view = state.carts.view(&owner).await.unwrap();
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].quantity, 3);
}

#[tokio::test]
async fn update_beyond_stock_is_rejected_not_clamped() {
    let state = app_state();
    let cat = category(&state, "Tools").await;
    let pliers = product(&state, &cat, "Pliers", money(650), None, 5).await;
    let owner = session("abc");
    let line = state.carts.add(&owner, pliers.product.id, 1).await.unwrap();

    let err = state.carts.update(&owner, line.id, 6).await.unwrap_err();
    assert!(matches!(err, StorefrontError::InsufficientStock { available: 5, requested: 6 }));
    assert_eq!(state.carts.view(&owner).await.unwrap().items[0].quantity, 1);

    let updated = state.carts.update(&owner, line.id, 5).await.unwrap();
    assert_eq!(updated.quantity, 5);
}

#[tokio::test]
async fn non_positive_quantities_are_invalid() {
    let state = app_state();
    let cat = category(&state, "Tools").await;
    let tape = product(&state, &cat, "Tape", money(300), None, 5).await;
    let owner = session("abc");

    assert!(matches!(state.carts.add(&owner, tape.product.id, 0).await, Err(StorefrontError::InvalidQuantity)));
    assert!(matches!(state.carts.add(&owner, tape.product.id, -2).await, Err(StorefrontError::InvalidQuantity)));

    let line = state.carts.add(&owner, tape.product.id, 1).await.unwrap();
    assert!(matches!(state.carts.update(&owner, line.id, 0).await, Err(StorefrontError::InvalidQuantity)));
}

#[tokio::test]
async fn unknown_or_inactive_products_are_not_found() {
    let state = app_state();
    let cat = category(&state, "Tools").await;
    let old = product(&state, &cat, "Old Chisel", money(900), None, 5).await;
    state.catalog.delete_product(old.product.slug.as_str()).await.unwrap();
    let owner = session("abc");

    assert!(matches!(state.carts.add(&owner, Uuid::new_v4(), 1).await, Err(StorefrontError::NotFound("Product"))));
    assert!(matches!(state.carts.add(&owner, old.product.id, 1).await, Err(StorefrontError::NotFound("Product"))));
}

#[tokio::test]
async fn lines_of_another_cart_are_not_found() {
    let state = app_state();
    let cat = category(&state, "Tools").await;
    let clamp = product(&state, &cat, "Clamp", money(450), None, 5).await;
    let line = state.carts.add(&session("alice"), clamp.product.id, 1).await.unwrap();

    let bob = session("bob");
    assert!(matches!(state.carts.update(&bob, line.id, 2).await, Err(StorefrontError::NotFound(_))));
    assert!(matches!(state.carts.remove(&bob, line.id).await, Err(StorefrontError::NotFound(_))));
    assert_eq!(state.carts.view(&session("alice")).await.unwrap().items.len(), 1);
}

#[tokio::test]
async fn remove_returns_the_dropped_line() {
    let state = app_state();
    let cat = category(&state, "Tools").await;
    let file = product(&state, &cat, "File", money(350), None, 5).await;
    let owner = session("abc");
    let line = state.carts.add(&owner, file.product.id, 2).await.unwrap();

    let removed = state.carts.remove(&owner, line.id).await.unwrap();
    assert_eq!(removed.product_name, "File");
    assert_eq!(removed.quantity, 2);
    assert!(state.carts.view(&owner).await.unwrap().items.is_empty());
}

#[tokio::test]
async fn clear_then_summary_reports_zero() {
    let state = app_state();
    let cat = category(&state, "Tools").await;
    let a = product(&state, &cat, "Bit Set", money(1999), Some(money(1499)), 5).await;
    let b = product(&state, &cat, "Gloves", money(599), None, 5).await;
    let owner = session("abc");
    state.carts.add(&owner, a.product.id, 2).await.unwrap();
    state.carts.add(&owner, b.product.id, 1).await.unwrap();

    assert_eq!(state.carts.clear(&owner).await.unwrap(), 2);

    let summary = state.carts.summary(&owner).await.unwrap();
    assert_eq!(summary.total_items, 0);
    assert_eq!(summary.total, Decimal::ZERO);
}

#[tokio::test]
async fn merge_sums_and_clamps_to_stock() {
    let state = app_state();
    let cat = category(&state, "Tools").await;
    let a = product(&state, &cat, "Product A", money(1000), None, 4).await;
    let user_id = Uuid::new_v4();
    state.carts.add(&session("anon"), a.product.id, 3).await.unwrap();
    state.carts.add(&CartOwner::User(user_id), a.product.id, 2).await.unwrap();

    let outcome = state.carts.merge(user_id, Some("anon")).await.unwrap();
    let MergeOutcome::Merged { cart, report } = outcome else { panic!("expected a merge") };

    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 4);
    assert_eq!(report.clamped.len(), 1);
    assert_eq!(report.clamped[0].requested, 5);
    assert_eq!(report.clamped[0].kept, 4);

    // the anonymous cart is gone: viewing it creates a fresh, empty one
    let anon = state.carts.view(&session("anon")).await.unwrap();
    assert!(anon.items.is_empty());
}

#[tokio::test]
async fn merge_against_sold_out_product_drops_the_line() {
    let state = app_state();
    let cat = category(&state, "Tools").await;
    let p = product(&state, &cat, "Product P", money(1000), None, 5).await;
    let user_id = Uuid::new_v4();
    let user = CartOwner::User(user_id);
    state.carts.add(&session("anon"), p.product.id, 2).await.unwrap();
    state.carts.add(&user, p.product.id, 1).await.unwrap();

    let patch = ProductPatch { quantity: Some(0), ..Default::default() };
    state.catalog.update_product(p.product.slug.as_str(), patch).await.unwrap();

    let MergeOutcome::Merged { cart, report } = state.carts.merge(user_id, Some("anon")).await.unwrap() else {
        panic!("expected a merge")
    };
    assert!(cart.items.is_empty());
    assert_eq!(report.dropped, vec![p.product.id]);
    assert_eq!(report.clamped[0].kept, 0);

    let view = state.carts.view(&user).await.unwrap();
    assert!(view.items.is_empty());
    assert_eq!(view.totals.total_items, 0);
}

#[tokio::test]
async fn oversized_quantity_is_insufficient_stock() {
    let state = app_state();
    let cat = category(&state, "Tools").await;
    let rope = product(&state, &cat, "Rope", money(700), None, 5).await;
    let owner = session("abc");
    let huge = i64::from(u32::MAX) + 1;

    let err = state.carts.add(&owner, rope.product.id, huge).await.unwrap_err();
    assert!(matches!(err, StorefrontError::InsufficientStock { available: 5, requested: 4_294_967_296 }));

    let line = state.carts.add(&owner, rope.product.id, 1).await.unwrap();
    let err = state.carts.update(&owner, line.id, huge).await.unwrap_err();
    assert!(matches!(err, StorefrontError::InsufficientStock { available: 5, .. }));
}

#[tokio::test]
async fn merge_moves_lines_missing_from_target() {
    let state = app_state();
    let cat = category(&state, "Tools").await;
    let b = product(&state, &cat, "Product B", money(500), None, 10).await;
    let user_id = Uuid::new_v4();
    let moved = state.carts.add(&session("anon"), b.product.id, 2).await.unwrap();

    let MergeOutcome::Merged { cart, report } = state.carts.merge(user_id, Some("anon")).await.unwrap() else {
        panic!("expected a merge")
    };
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].id, moved.id);
    assert_eq!(cart.items[0].quantity, 2);
    assert_eq!(report.moved, vec![moved.id]);
    assert!(report.clamped.is_empty());
}

#[tokio::test]
async fn merge_without_anonymous_cart_is_a_no_op() {
    let state = app_state();
    let user_id = Uuid::new_v4();

    assert!(matches!(state.carts.merge(user_id, Some("nobody")).await.unwrap(), MergeOutcome::NothingToMerge));
    assert!(matches!(state.carts.merge(user_id, None).await.unwrap(), MergeOutcome::NothingToMerge));
}

#[tokio::test]
async fn concurrent_adds_do_not_lose_increments() {
    let state = app_state();
    let cat = category(&state, "Tools").await;
    let nails = product(&state, &cat, "Nails", money(10), None, 100).await;
    let owner = session("busy");

    let mut handles = Vec::new();
    for _ in 0..20 {
        let carts = state.carts.clone();
        let owner = owner.clone();
        let id = nails.product.id;
        handles.push(tokio::spawn(async move { carts.add(&owner, id, 1).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let view = state.carts.view(&owner).await.unwrap();
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].quantity, 20);
}
