//! Checkout orchestration.
//!
//! Placing an order runs these steps:
//! 1. Validate the cart and resolve every product
//! 2. Check stock for the merged demand
//! 3. Price the order from the catalog
//! 4. Ask the payment decider
//! 5. Persist the outcome in one transaction
//!
//! A declined payment persists a failed order with no items. An accepted one
//! persists the confirmed order, its items, the stock decrements and a
//! history event together, retrying once if a concurrent checkout took the
//! stock first.

pub mod error;
pub mod orchestrator;
pub mod orders;
pub mod payment;

pub use error::{CheckoutError, Result};
pub use orchestrator::{CheckoutOrchestrator, PlacedOrder};
pub use orders::{OrderDetails, OrderService};
pub use payment::{
    DEFAULT_ACCEPT_RATE, FixedPaymentDecider, PaymentDecider, PaymentDecision, PaymentError,
    RandomPaymentDecider,
};
