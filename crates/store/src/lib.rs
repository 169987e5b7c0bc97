//! Durable state for checkout: inventory, the order ledger and order history.
//!
//! [`CheckoutStore`] is the read side and the factory for
//! [`StoreTransaction`]s. Every mutation made during a checkout goes through
//! one transaction, which either commits as a unit or leaves no trace.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, InMemoryTransaction};
pub use postgres::{PostgresStore, PostgresTransaction};
pub use store::{
    CheckoutStore, CheckoutStoreExt, Decrement, HistoryRecorder, Inventory, Ledger,
    StoreTransaction,
};
