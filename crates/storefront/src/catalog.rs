//! Product catalog.
//!
//! The storefront sells a fixed set of digital products. An operator may
//! persist an edited list under `quantofy_products`; [`stored`] prefers that
//! list over the built-in one.

use rust_decimal::Decimal;

use quantofy_core::{Price, ProductId};

use crate::db::Storage;
use crate::models::product::Product;
use crate::models::session_keys;

fn product(
    id: u32,
    title: &str,
    description: &str,
    (price, original_price, discount): (i64, i64, u8),
    category: &str,
    technologies: &[&str],
    (downloads, rating_tenths): (u32, i64),
) -> Product {
    Product {
        id: ProductId::new(id),
        title: title.to_owned(),
        description: description.to_owned(),
        price: Price::from_cents(price),
        original_price: Price::from_cents(original_price),
        discount,
        category: category.to_owned(),
        technologies: technologies.iter().map(|t| (*t).to_owned()).collect(),
        rating: Decimal::new(rating_tenths, 1),
        downloads,
        active: true,
        featured: true,
    }
}

/// Every built-in product, in display order.
#[must_use]
pub fn all() -> Vec<Product> {
    vec![
        product(
            1,
            "Sistema ERP Completo",
            "Sistema de gestão empresarial com módulos financeiro, estoque e vendas",
            (29990, 49990, 40),
            "Gestão",
            &["PHP", "MySQL", "Bootstrap"],
            (1250, 48),
        ),
        product(
            2,
            "Loja Virtual Responsiva",
            "Template completo para e-commerce com painel administrativo",
            (14990, 24990, 40),
            "E-commerce",
            &["React", "Node.js", "MongoDB"],
            (2100, 49),
        ),
        product(
            3,
            "App Delivery Multi-Restaurante",
            "Aplicativo completo para delivery com integração WhatsApp",
            (19990, 34990, 43),
            "Mobile",
            &["React Native", "Firebase"],
            (890, 47),
        ),
    ]
}

/// Active products flagged for the home page.
#[must_use]
pub fn featured() -> Vec<Product> {
    all().into_iter().filter(|p| p.active && p.featured).collect()
}

/// Look up a product by ID.
#[must_use]
pub fn by_id(id: ProductId) -> Option<Product> {
    all().into_iter().find(|p| p.id == id)
}

/// Products in `category` (case-insensitive).
#[must_use]
pub fn by_category(category: &str) -> Vec<Product> {
    all()
        .into_iter()
        .filter(|p| p.category.to_lowercase() == category.trim().to_lowercase())
        .collect()
}

/// Active products matching a free-text query.
#[must_use]
pub fn search(query: &str) -> Vec<Product> {
    all()
        .into_iter()
        .filter(|p| p.active && p.matches(query))
        .collect()
}

/// The persisted product list, or the built-in catalog when none is stored.
#[must_use]
pub fn stored(storage: &Storage) -> Vec<Product> {
    storage
        .load_optional::<Vec<Product>>(session_keys::PRODUCTS)
        .filter(|products| !products.is_empty())
        .unwrap_or_else(all)
}

/// Persist an edited product list.
pub fn save(storage: &Storage, products: &[Product]) {
    storage.save(session_keys::PRODUCTS, products);
}
