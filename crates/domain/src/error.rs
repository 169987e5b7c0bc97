//! Domain error types.

use common::ProductId;
use thiserror::Error;

use crate::order::OrderStatus;

/// Errors raised while validating carts or building orders.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    /// The cart contains no lines.
    #[error("Cart has no items")]
    EmptyCart,

    /// A cart line requests a non-positive quantity.
    #[error("Invalid quantity for product {product_id}: {quantity} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    /// A price string could not be parsed as a non-negative amount.
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// The order has no delivery location.
    #[error("Delivery location is required")]
    MissingLocation,

    /// A computed amount or quantity does not fit in its representation.
    #[error("Amount overflow")]
    AmountOverflow,

    /// A cart line references a product that was not supplied for pricing.
    #[error("Product not found: {0}")]
    MissingProduct(ProductId),

    /// The order status does not allow the requested transition.
    #[error("Invalid state transition: cannot move from {from} to {to}")]
    InvalidStateTransition { from: OrderStatus, to: OrderStatus },

    /// A persisted status string is not a known order status.
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),
}
