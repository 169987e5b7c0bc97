//! Checkout error types.

use common::{OrderId, ProductId};
use domain::{DomainError, Shortage};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur while placing or reading orders.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Malformed or empty input. Nothing was written.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A cart line references a product that doesn't exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The order doesn't exist or isn't visible to the caller.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Stock can't cover the requested quantity.
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// Payment was declined. A failed order was recorded.
    #[error("Payment declined for order {order_id}")]
    PaymentDeclined { order_id: OrderId },

    /// The payment decision point could not be reached.
    #[error("Payment service error: {0}")]
    Payment(String),

    /// Storage failure. The transaction was rolled back.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// Unexpected failure, such as an aborted transaction task.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for CheckoutError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::MissingProduct(id) => CheckoutError::ProductNotFound(id),
            DomainError::InvalidStateTransition { .. } | DomainError::UnknownStatus(_) => {
                CheckoutError::Internal(err.to_string())
            }
            DomainError::EmptyCart
            | DomainError::InvalidQuantity { .. }
            | DomainError::InvalidPrice(_)
            | DomainError::MissingLocation
            | DomainError::AmountOverflow => CheckoutError::Validation(err.to_string()),
        }
    }
}

impl From<Shortage> for CheckoutError {
    fn from(shortage: Shortage) -> Self {
        CheckoutError::InsufficientStock {
            product_id: shortage.product_id,
            requested: shortage.requested,
            available: shortage.available,
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_mapping() {
        assert!(matches!(
            CheckoutError::from(DomainError::EmptyCart),
            CheckoutError::Validation(_)
        ));

        let id = ProductId::new();
        assert!(matches!(
            CheckoutError::from(DomainError::MissingProduct(id)),
            CheckoutError::ProductNotFound(p) if p == id
        ));

        assert!(matches!(
            CheckoutError::from(DomainError::UnknownStatus("shipped".to_string())),
            CheckoutError::Internal(_)
        ));
    }
}
