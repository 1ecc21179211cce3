//! Shopping cart.
//!
//! [`Cart`] is the plain line list. [`CartStore`] wraps it in a shared
//! handle: the UI layer and the post-checkout clear task hold clones of the
//! same store.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

use quantofy_core::{Price, ProductId};

use crate::db::Storage;
use crate::error::add_breadcrumb;
use crate::models::product::{CartItem, Product};
use crate::models::session_keys;

/// Largest quantity a single line can hold.
pub const MAX_LINE_QUANTITY: u32 = 9_999;

/// Cart lines in insertion order, at most one per product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Add one unit of `product`, merging with an existing line.
    ///
    /// A line already at [`MAX_LINE_QUANTITY`] stays there.
    pub fn add(&mut self, product: &Product) {
        if let Some(line) = self.items.iter_mut().find(|i| i.id() == product.id) {
            line.quantity = line.quantity.saturating_add(1).min(MAX_LINE_QUANTITY);
        } else {
            self.items.push(CartItem {
                product: product.clone(),
                quantity: 1,
            });
        }
    }

    /// Remove the line for `id`. Unknown IDs are ignored.
    pub fn remove(&mut self, id: ProductId) {
        self.items.retain(|i| i.id() != id);
    }

    /// Set the quantity of the line for `id`; zero or less removes it.
    ///
    /// Quantities above [`MAX_LINE_QUANTITY`] are capped. Unknown IDs are
    /// ignored.
    pub fn set_quantity(&mut self, id: ProductId, quantity: i64) {
        if quantity <= 0 {
            self.remove(id);
            return;
        }
        let quantity = u32::try_from(quantity)
            .unwrap_or(u32::MAX)
            .min(MAX_LINE_QUANTITY);
        if let Some(line) = self.items.iter_mut().find(|i| i.id() == id) {
            line.quantity = quantity;
        }
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// The lines, in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Number of units across all lines.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.items
            .iter()
            .fold(0, |total: u32, i| total.saturating_add(i.quantity))
    }

    /// Sum of `price * quantity` over all lines.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Shared cart handle.
///
/// Clones share the same cart. A persistent store saves the cart under
/// `quantofy_cart` after every change.
#[derive(Debug, Clone, Default)]
pub struct CartStore {
    cart: Arc<Mutex<Cart>>,
    storage: Option<Storage>,
}

impl CartStore {
    /// A session-only cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A cart loaded from and saved to `storage`.
    #[must_use]
    pub fn persistent(storage: Storage) -> Self {
        let cart: Cart = storage.load(session_keys::CART);
        Self {
            cart: Arc::new(Mutex::new(cart)),
            storage: Some(storage),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Cart> {
        self.cart.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mutate(&self, change: impl FnOnce(&mut Cart)) {
        let mut cart = self.lock();
        change(&mut cart);
        if let Some(storage) = &self.storage {
            storage.save(session_keys::CART, &*cart);
        }
        debug!(
            lines = cart.items().len(),
            total_items = cart.total_items(),
            total = %cart.total_price().amount(),
            "Cart updated"
        );
    }

    /// Add one unit of `product`.
    pub fn add_to_cart(&self, product: &Product) {
        let id = product.id.to_string();
        add_breadcrumb("cart", "Added to cart", Some(&[("product_id", id.as_str())]));
        self.mutate(|cart| cart.add(product));
    }

    /// Remove a product's line.
    pub fn remove_from_cart(&self, id: ProductId) {
        let id_str = id.to_string();
        add_breadcrumb("cart", "Removed from cart", Some(&[("product_id", id_str.as_str())]));
        self.mutate(|cart| cart.remove(id));
    }

    /// Set a line's quantity; zero or less removes it.
    pub fn update_quantity(&self, id: ProductId, quantity: i64) {
        self.mutate(|cart| cart.set_quantity(id, quantity));
    }

    /// Empty the cart.
    pub fn clear_cart(&self) {
        add_breadcrumb("cart", "Cart cleared", None);
        self.mutate(Cart::clear);
    }

    /// Copy of the current lines.
    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.lock().items().to_vec()
    }

    /// Copy of the whole cart.
    #[must_use]
    pub fn snapshot(&self) -> Cart {
        self.lock().clone()
    }

    /// Number of units across all lines.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.lock().total_items()
    }

    /// Sum of `price * quantity` over all lines.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.lock().total_price()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
