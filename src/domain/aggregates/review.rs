//! Review Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::domain::value_objects::{Rating, RatingError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub rating: Rating,
    pub title: String,
    pub comment: String,
    pub is_verified_purchase: bool,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct NewReview {
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(length(min = 1))]
    pub comment: String,
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct ReviewPatch {
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<i32>,
    #[validate(length(min = 1, max = 100))]
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub comment: Option<String>,
}

impl Review {
    pub fn submit(product_id: Uuid, user_id: Uuid, new: NewReview) -> Result<Self, ReviewError> {
        new.validate()?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(), product_id, user_id, rating: Rating::new(new.rating)?,
            title: new.title, comment: new.comment, is_verified_purchase: true, is_approved: true,
            created_at: now, updated_at: now,
        })
    }

    pub fn apply(&mut self, patch: ReviewPatch) -> Result<(), ReviewError> {
        patch.validate()?;
        if let Some(rating) = patch.rating { self.rating = Rating::new(rating)?; }
        if let Some(title) = patch.title { self.title = title; }
        if let Some(comment) = patch.comment { self.comment = comment; }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Rating aggregate over approved reviews: mean rounded to one decimal place.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RatingSummary {
    pub average_rating: Option<Decimal>,
    pub review_count: u64,
}

impl RatingSummary {
    pub fn from_reviews(reviews: &[Review]) -> Self {
        let approved: Vec<u8> = reviews.iter().filter(|r| r.is_approved).map(|r| r.rating.value()).collect();
        if approved.is_empty() { return Self::default(); }
        let sum: Decimal = approved.iter().map(|r| Decimal::from(*r)).sum();
        let count = approved.len() as u64;
        Self { average_rating: Some((sum / Decimal::from(count)).round_dp(1)), review_count: count }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ReviewError {
    #[error("{0}")]
    Invalid(#[from] ValidationErrors),
    #[error(transparent)]
    Rating(#[from] RatingError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(rating: i32, approved: bool) -> Review {
        let mut r = Review::submit(Uuid::nil(), Uuid::new_v4(), NewReview { rating, title: "Nice".into(), comment: "Works".into() }).unwrap();
        r.is_approved = approved;
        r
    }

    #[test]
    fn test_rating_summary_ignores_unapproved() {
        let summary = RatingSummary::from_reviews(&[review(5, true), review(4, true), review(4, true), review(1, false)]);
        assert_eq!(summary.review_count, 3);
        assert_eq!(summary.average_rating, Some(Decimal::new(43, 1)));
        assert_eq!(RatingSummary::from_reviews(&[]).average_rating, None);
    }

    #[test]
    fn test_submit_validates() {
        let bad = NewReview { rating: 6, title: "x".into(), comment: "y".into() };
        assert!(matches!(Review::submit(Uuid::nil(), Uuid::nil(), bad), Err(ReviewError::Invalid(_))));
        let untitled = NewReview { rating: 3, title: String::new(), comment: "y".into() };
        assert!(Review::submit(Uuid::nil(), Uuid::nil(), untitled).is_err());
    }
}
