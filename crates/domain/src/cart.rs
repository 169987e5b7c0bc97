//! Caller-supplied cart lines and their validated form.

use std::collections::HashMap;

use common::ProductId;

use crate::error::DomainError;
use crate::money::Money;
use crate::product::Product;

/// A single requested line as supplied by the caller.
///
/// `quoted_price` is what the client believes the unit price is. It is kept
/// for diagnostics only; orders are always priced from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub quoted_price: Option<Money>,
}

impl CartLine {
    /// Creates a cart line without a quoted price.
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
            quoted_price: None,
        }
    }

    /// Attaches the price the client quoted for this line.
    pub fn with_quoted_price(mut self, price: Money) -> Self {
        self.quoted_price = Some(price);
        self
    }
}

/// A product whose stock cannot cover the requested quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortage {
    pub product_id: ProductId,
    pub requested: u32,
    pub available: u32,
}

/// A validated, non-empty cart.
///
/// Lines naming the same product are merged, so each product appears once
/// and the order of first appearance is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Validates caller-supplied lines.
    pub fn new(lines: Vec<CartLine>) -> Result<Self, DomainError> {
        if lines.is_empty() {
            return Err(DomainError::EmptyCart);
        }

        let mut merged: Vec<CartLine> = Vec::with_capacity(lines.len());
        let mut positions: HashMap<ProductId, usize> = HashMap::new();

        for line in lines {
            if line.quantity == 0 {
                return Err(DomainError::InvalidQuantity {
                    product_id: line.product_id,
                    quantity: line.quantity,
                });
            }

            match positions.get(&line.product_id) {
                Some(&index) => {
                    let existing = &mut merged[index];
                    existing.quantity = existing
                        .quantity
                        .checked_add(line.quantity)
                        .ok_or(DomainError::AmountOverflow)?;
                    if existing.quoted_price.is_none() {
                        existing.quoted_price = line.quoted_price;
                    }
                }
                None => {
                    positions.insert(line.product_id, merged.len());
                    merged.push(line);
                }
            }
        }

        Ok(Self { lines: merged })
    }

    /// Returns the merged lines.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Returns the distinct product ids in the cart.
    pub fn product_ids(&self) -> impl Iterator<Item = ProductId> + '_ {
        self.lines.iter().map(|line| line.product_id)
    }

    /// Returns the number of distinct products.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Always false; a `Cart` is non-empty by construction.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Returns the first line whose product cannot cover the requested quantity.
    ///
    /// A product missing from `products` counts as zero stock.
    pub fn find_shortage(&self, products: &HashMap<ProductId, Product>) -> Option<Shortage> {
        self.lines.iter().find_map(|line| {
            let available = products.get(&line.product_id).map_or(0, |p| p.quantity);
            (available < line.quantity).then_some(Shortage {
                product_id: line.product_id,
                requested: line.quantity,
                available,
            })
        })
    }
}
