//! Storefront domain: aggregates, value objects, events and the pure cart ledger.
pub mod aggregates;
pub mod events;
pub mod services;
pub mod value_objects;
