use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::aggregates::{CartOwner, CartSummary, CartView, LineItemView};
use crate::domain::services::{merge_carts, MergeReport};
use crate::publisher::{publish_all, EventPublisher};
use crate::repository::CartRepository;
use crate::{Result, StorefrontError};

/// Cart operations. Every call is one unit of work: a rejected call leaves
/// the stored cart exactly as it was.
pub struct CartService {
    carts: Arc<dyn CartRepository>,
    events: Arc<dyn EventPublisher>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MergeOutcome {
    NothingToMerge,
    Merged { cart: CartView, report: MergeReport },
}

impl CartService {
    pub fn new(carts: Arc<dyn CartRepository>, events: Arc<dyn EventPublisher>) -> Self {
        Self { carts, events }
    }

    /// The owner's cart, created on first access.
    pub async fn view(&self, owner: &CartOwner) -> Result<CartView> {
        let mut uow = self.carts.begin().await?;
        let cart = uow.upsert_cart(owner).await?;
        uow.commit().await?;
        debug!(cart_id = %cart.id(), lines = cart.items().len(), "cart viewed");
        Ok(CartView::from(&cart))
    }

    pub async fn summary(&self, owner: &CartOwner) -> Result<CartSummary> {
        let mut uow = self.carts.begin().await?;
        let cart = uow.upsert_cart(owner).await?;
        uow.commit().await?;
        Ok(cart.summary())
    }

    pub async fn add(&self, owner: &CartOwner, product_id: Uuid, quantity: i64) -> Result<LineItemView> {
        let mut uow = self.carts.begin().await?;
        let mut cart = uow.upsert_cart(owner).await?;
        let product = uow.find_product(product_id).await?.ok_or(StorefrontError::NotFound("Product"))?;
        let line = LineItemView::from(cart.add_item(product, quantity)?);
        uow.save_cart(&cart).await?;
        uow.commit().await?;

        info!(cart_id = %cart.id(), %product_id, quantity = line.quantity, "item added to cart");
        publish_all(self.events.as_ref(), cart.take_events()).await;
        Ok(line)
    }

    pub async fn update(&self, owner: &CartOwner, item_id: Uuid, quantity: i64) -> Result<LineItemView> {
        let mut uow = self.carts.begin().await?;
        let mut cart = uow.upsert_cart(owner).await?;
        let line = LineItemView::from(cart.update_item(item_id, quantity)?);
        uow.save_cart(&cart).await?;
        uow.commit().await?;

        info!(cart_id = %cart.id(), %item_id, quantity = line.quantity, "cart item updated");
        publish_all(self.events.as_ref(), cart.take_events()).await;
        Ok(line)
    }

    /// Removes a line and returns it as it was before removal.
    pub async fn remove(&self, owner: &CartOwner, item_id: Uuid) -> Result<LineItemView> {
        let mut uow = self.carts.begin().await?;
        let mut cart = uow.upsert_cart(owner).await?;
        let removed = cart.remove_item(item_id)?;
        uow.save_cart(&cart).await?;
        uow.commit().await?;

        info!(cart_id = %cart.id(), %item_id, product = %removed.product().name, "cart item removed");
        publish_all(self.events.as_ref(), cart.take_events()).await;
        Ok(LineItemView::from(&removed))
    }

    /// Empties the cart, returning how many lines were removed.
    pub async fn clear(&self, owner: &CartOwner) -> Result<usize> {
        let mut uow = self.carts.begin().await?;
        let mut cart = uow.upsert_cart(owner).await?;
        let removed = cart.clear();
        uow.save_cart(&cart).await?;
        uow.commit().await?;

        info!(cart_id = %cart.id(), removed, "cart cleared");
        publish_all(self.events.as_ref(), cart.take_events()).await;
        Ok(removed)
    }

    /// Folds the anonymous cart of `session_key` into the user's cart and
    /// deletes it. Without an anonymous cart this is a successful no-op.
    pub async fn merge(&self, user_id: Uuid, session_key: Option<&str>) -> Result<MergeOutcome> {
        let Some(session_key) = session_key else { return Ok(MergeOutcome::NothingToMerge) };
        let mut uow = self.carts.begin().await?;
        let Some(anonymous) = uow.find_cart(&CartOwner::Session(session_key.to_string())).await? else {
            debug!(%user_id, "no anonymous cart to merge");
            return Ok(MergeOutcome::NothingToMerge);
        };
        let source_id = anonymous.id();
        let mut target = uow.upsert_cart(&CartOwner::User(user_id)).await?;

        let report = merge_carts(&mut target, anonymous);
        uow.save_cart(&target).await?;
        uow.delete_cart(source_id).await?;
        uow.commit().await?;

        info!(
            %user_id, source_cart_id = %source_id, target_cart_id = %target.id(),
            moved = report.moved.len(), combined = report.combined.len(), clamped = report.clamped.len(), dropped = report.dropped.len(),
            "carts merged"
        );
        publish_all(self.events.as_ref(), target.take_events()).await;
        Ok(MergeOutcome::Merged { cart: CartView::from(&target), report })
    }
}
