//! Aggregates module
pub mod cart;
pub mod category;
pub mod product;
pub mod review;

pub use cart::{Cart, CartError, CartOwner, CartSummary, CartView, LineItem, LineItemView, StockedProduct};
pub use category::{Category, CategoryError, CategoryPatch, CategorySummary, CategoryTree, NewCategory};
pub use product::{NewProduct, NewProductImage, Product, ProductDetail, ProductError, ProductImage, ProductPatch, ProductSummary, StockStatus};
pub use review::{NewReview, RatingSummary, Review, ReviewError, ReviewPatch};
