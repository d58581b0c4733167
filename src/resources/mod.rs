//! Managed resources.

pub mod order;

pub use order::{OrderResource, ORDER_RESOURCE};
