//! Orders, their line items and status history.

mod draft;
mod model;
mod state;

pub use draft::OrderDraft;
pub use model::{Order, OrderHistoryEvent, OrderItem};
pub use state::OrderStatus;
