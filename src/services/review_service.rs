use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::domain::aggregates::{NewReview, Review, ReviewPatch};
use crate::domain::events::{DomainEvent, ReviewEvent};
use crate::publisher::{publish_all, EventPublisher};
use crate::repository::{CatalogRepository, ReviewRepository};
use crate::{Result, StorefrontError};

pub struct ReviewService {
    catalog: Arc<dyn CatalogRepository>,
    reviews: Arc<dyn ReviewRepository>,
    events: Arc<dyn EventPublisher>,
}

impl ReviewService {
    pub fn new(catalog: Arc<dyn CatalogRepository>, reviews: Arc<dyn ReviewRepository>, events: Arc<dyn EventPublisher>) -> Self {
        Self { catalog, reviews, events }
    }

    /// One review per user and product; the author is always the caller.
    pub async fn submit(&self, product_slug: &str, user_id: Option<Uuid>, new: NewReview) -> Result<Review> {
        let user_id = user_id.ok_or_else(|| StorefrontError::Unauthorized("User must be authenticated.".into()))?;
        let product = self
            .catalog
            .find_product_by_slug(product_slug)
            .await?
            .filter(|p| p.is_active)
            .ok_or(StorefrontError::NotFound("Product"))?;
        let review = Review::submit(product.id, user_id, new)?;
        self.reviews.insert_review(&review).await?;

        info!(review_id = %review.id, product_id = %product.id, rating = review.rating.value(), "review submitted");
        let event = DomainEvent::Review(ReviewEvent::Submitted { review_id: review.id, product_id: product.id, rating: review.rating });
        publish_all(self.events.as_ref(), vec![event]).await;
        Ok(review)
    }

    pub async fn list(&self, product_slug: &str) -> Result<Vec<Review>> {
        let product = self
            .catalog
            .find_product_by_slug(product_slug)
            .await?
            .filter(|p| p.is_active)
            .ok_or(StorefrontError::NotFound("Product"))?;
        self.reviews.list_approved(product.id).await
    }

    pub async fn update(&self, review_id: Uuid, user_id: Option<Uuid>, patch: ReviewPatch) -> Result<Review> {
        let mut review = self.owned_review(review_id, user_id).await?;
        review.apply(patch)?;
        self.reviews.update_review(&review).await?;
        info!(%review_id, "review updated");
        Ok(review)
    }

    pub async fn delete(&self, review_id: Uuid, user_id: Option<Uuid>) -> Result<()> {
        self.owned_review(review_id, user_id).await?;
        self.reviews.delete_review(review_id).await?;
        info!(%review_id, "review deleted");
        Ok(())
    }

    async fn owned_review(&self, review_id: Uuid, user_id: Option<Uuid>) -> Result<Review> {
        let user_id = user_id.ok_or_else(|| StorefrontError::Unauthorized("User must be authenticated.".into()))?;
        let review = self.reviews.find_review(review_id).await?.ok_or(StorefrontError::NotFound("Review"))?;
        if review.user_id != user_id { return Err(StorefrontError::Forbidden); }
        Ok(review)
    }
}
