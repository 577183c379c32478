//! Pure cart ledger logic: pricing and merging.
pub mod merge;
pub mod pricing;

pub use merge::{merge_carts, ClampedLine, MergeReport};
pub use pricing::{CartTotals, Priced};
