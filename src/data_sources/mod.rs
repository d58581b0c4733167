//! Read-only data sources.

pub mod coffees;
pub mod order;

pub use coffees::COFFEES_DATA_SOURCE;
pub use order::ORDER_DATA_SOURCE;
