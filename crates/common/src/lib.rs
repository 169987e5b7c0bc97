//! Identifier types shared by every crate in the checkout service.

mod types;

pub use types::{HistoryEventId, OrderId, OrderItemId, ProductId, UserId};
