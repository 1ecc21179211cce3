//! Catalog product and cart line types.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use quantofy_core::{Price, ProductId};

/// A digital product offered in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub description: String,
    pub price: Price,
    pub original_price: Price,
    /// Advertised discount, in percent.
    pub discount: u8,
    pub category: String,
    pub technologies: Vec<String>,
    pub rating: Decimal,
    pub downloads: u32,
    pub active: bool,
    pub featured: bool,
}

impl Product {
    /// Amount saved against the original price, if any.
    #[must_use]
    pub fn savings(&self) -> Option<Price> {
        (self.original_price > self.price)
            .then(|| Price::new(self.original_price.amount() - self.price.amount()))
    }

    /// Discount against the original price, rounded to whole percent.
    ///
    /// Derived from the prices; `discount` is the advertised figure.
    #[must_use]
    pub fn discount_percent(&self) -> u8 {
        let original = self.original_price.amount();
        if original <= Decimal::ZERO || self.price >= self.original_price {
            return 0;
        }
        let percent = (original - self.price.amount()) / original * Decimal::ONE_HUNDRED;
        percent.round().to_u8().unwrap_or(0)
    }

    /// Whether the product matches a free-text query.
    ///
    /// Case-insensitive over title, description, category, and technologies.
    #[must_use]
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        [&self.title, &self.description, &self.category]
            .into_iter()
            .chain(self.technologies.iter())
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

/// A product line in the cart.
///
/// The product is snapshotted when first added; later catalog changes do
/// not alter lines already in the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    #[serde(flatten)]
    pub product: Product,
    /// Always at least 1.
    pub quantity: u32,
}

impl CartItem {
    /// Product identifier of this line.
    #[must_use]
    pub const fn id(&self) -> ProductId {
        self.product.id
    }

    /// Unit price at the time the product was added.
    #[must_use]
    pub const fn price(&self) -> Price {
        self.product.price
    }

    /// `price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product.price * self.quantity
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product() -> Product {
        Product {
            id: ProductId::new(2),
            title: "Loja Virtual Responsiva".to_owned(),
            description: "Template completo para e-commerce".to_owned(),
            price: Price::from_cents(14990),
            original_price: Price::from_cents(24990),
            discount: 40,
            category: "E-commerce".to_owned(),
            technologies: vec!["React".to_owned(), "Node.js".to_owned()],
            rating: Decimal::new(49, 1),
            downloads: 2100,
            active: true,
            featured: true,
        }
    }

    #[test]
    fn test_savings() {
        assert_eq!(product().savings(), Some(Price::from_cents(10000)));

        let mut full_price = product();
        full_price.original_price = full_price.price;
        assert_eq!(full_price.savings(), None);
    }

    #[test]
    fn test_discount_percent() {
        assert_eq!(product().discount_percent(), 40);

        let mut full_price = product();
        full_price.original_price = full_price.price;
        assert_eq!(full_price.discount_percent(), 0);
    }

    #[test]
    fn test_matches_technologies_case_insensitively() {
        assert!(product().matches("node"));
        assert!(product().matches("  E-COMMERCE "));
        assert!(!product().matches("php"));
    }

    #[test]
    fn test_cart_item_flattens_product_fields() {
        let item = CartItem {
            product: product(),
            quantity: 2,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["id"], 2);
        assert_eq!(json["quantity"], 2);
        assert_eq!(json["originalPrice"], "249.90");

        let back: CartItem = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
        assert_eq!(back.line_total(), Price::from_cents(29980));
    }
}
