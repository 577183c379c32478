//! Value Objects for the storefront

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// SKU (Stock Keeping Unit) value object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sku(String);

impl Sku {
    pub fn new(value: impl Into<String>) -> Result<Self, SkuError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(SkuError::Empty); }
        if value.chars().count() > 50 { return Err(SkuError::TooLong); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for Sku {
    type Error = SkuError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Sku> for String {
    fn from(sku: Sku) -> Self { sku.0 }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SkuError {
    #[error("SKU must not be empty")]
    Empty,
    #[error("SKU must be at most 50 characters")]
    TooLong,
}

/// URL slug: lowercase ASCII letters, digits and single dashes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    pub fn new(value: impl Into<String>) -> Result<Self, SlugError> {
        let value = value.into();
        if value.is_empty() { return Err(SlugError::Empty); }
        if value.len() > 255 { return Err(SlugError::TooLong); }
        let valid = value.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
        if !valid || value.starts_with('-') || value.ends_with('-') { return Err(SlugError::Invalid(value)); }
        Ok(Self(value))
    }

    /// Derives a slug from a display name: "Winter Coats & Jackets" -> "winter-coats-jackets".
    pub fn from_name(name: &str) -> Result<Self, SlugError> {
        let mut slug = String::with_capacity(name.len());
        for c in name.trim().chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
            } else if !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
        }
        while slug.ends_with('-') { slug.pop(); }
        Self::new(slug)
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for Slug {
    type Error = SlugError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self { slug.0 }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug must not be empty")]
    Empty,
    #[error("slug must be at most 255 characters")]
    TooLong,
    #[error("invalid slug '{0}'")]
    Invalid(String),
}

/// Review rating, 1 to 5 stars.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Rating(u8);

impl Rating {
    pub fn new(value: i32) -> Result<Self, RatingError> {
        match u8::try_from(value) {
            Ok(v @ 1..=5) => Ok(Self(v)),
            _ => Err(RatingError(value)),
        }
    }
    pub fn value(&self) -> u8 { self.0 }
}

impl TryFrom<i32> for Rating {
    type Error = RatingError;
    fn try_from(value: i32) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Rating> for i32 {
    fn from(r: Rating) -> Self { i32::from(r.0) }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("rating must be between 1 and 5, got {0}")]
pub struct RatingError(pub i32);

/// Quantity value object
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Self { Self(value) }

    /// A requested line quantity: anything below one is rejected, anything
    /// above `u32::MAX` saturates and is left to the stock check.
    pub fn requested(value: i64) -> Option<Self> {
        if value < 1 { return None; }
        Some(Self(u32::try_from(value).unwrap_or(u32::MAX)))
    }

    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: Quantity) -> Self { Self(self.0.saturating_add(other.0)) }
    pub fn clamp_to(self, cap: Quantity) -> Self { Self(self.0.min(cap.0)) }
    pub fn is_zero(&self) -> bool { self.0 == 0 }
    pub fn as_decimal(&self) -> Decimal { Decimal::from(self.0) }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}
