//! Demo catalogue for running without a database.

use common::ProductId;
use domain::{Money, Product};
use store::CheckoutStore;

const DEMO_PRODUCTS: &[(&str, i64, u32)] = &[
    ("Espresso Beans 1kg", 2499, 25),
    ("Ceramic Mug", 1200, 40),
    ("Pour-Over Kettle", 5900, 8),
    ("Paper Filters (100)", 650, 100),
    ("Hand Grinder", 8900, 3),
];

/// Inserts the demo products into `store` and returns them.
pub async fn seed_catalog<S: CheckoutStore + ?Sized>(store: &S) -> store::Result<Vec<Product>> {
    let mut products = Vec::with_capacity(DEMO_PRODUCTS.len());
    for &(name, cents, quantity) in DEMO_PRODUCTS {
        let product = Product::new(ProductId::new(), name, Money::from_cents(cents), quantity);
        store.upsert_product(&product).await?;
        products.push(product);
    }
    Ok(products)
}
