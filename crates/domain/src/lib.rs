//! Domain layer for the checkout service.
//!
//! This crate provides the core checkout types:
//! - `Money` amounts in minor units with checked arithmetic
//! - `Cart` validation of caller-supplied cart lines
//! - `Order`, `OrderItem` and `OrderHistoryEvent` entities
//! - `OrderStatus` state machine (pending → confirmed | failed)
//! - `OrderDraft`, which prices a cart from authoritative product data

pub mod cart;
pub mod error;
pub mod money;
pub mod order;
pub mod product;

pub use cart::{Cart, CartLine, Shortage};
pub use common::{HistoryEventId, OrderId, OrderItemId, ProductId, UserId};
pub use error::DomainError;
pub use money::Money;
pub use order::{Order, OrderDraft, OrderHistoryEvent, OrderItem, OrderStatus};
pub use product::Product;
