//! Application services: load through the repositories, apply domain rules,
//! persist, then publish the resulting events.
pub mod cart_service;
pub mod catalog_service;
pub mod review_service;

pub use cart_service::{CartService, MergeOutcome};
pub use catalog_service::CatalogService;
pub use review_service::ReviewService;
