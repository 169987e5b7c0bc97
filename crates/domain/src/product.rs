//! Catalog product as seen by checkout.

use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Authoritative price and stock for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub unit_price: Money,
    /// Units available for sale. Never negative.
    pub quantity: u32,
}

impl Product {
    /// Creates a product record.
    pub fn new(id: ProductId, name: impl Into<String>, unit_price: Money, quantity: u32) -> Self {
        Self {
            id,
            name: name.into(),
            unit_price,
            quantity,
        }
    }

    /// Returns true if at least `requested` units are available.
    pub fn has_stock(&self, requested: u32) -> bool {
        self.quantity >= requested
    }
}
