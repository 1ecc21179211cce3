//! Storage keys for persisted storefront state.

/// Namespaced storage keys.
pub mod keys {
    use quantofy_core::UserId;

    /// Namespace shared by every storefront key.
    pub const NAMESPACE: &str = "quantofy_";

    /// Key for the full user list.
    pub const USERS: &str = "quantofy_users";

    /// Key for the current session user.
    pub const CURRENT_USER: &str = "quantofy_user";

    /// Key for the persisted cart.
    pub const CART: &str = "quantofy_cart";

    /// Key for an operator-saved product list.
    pub const PRODUCTS: &str = "quantofy_products";

    /// Prefix of the per-user purchase lists.
    pub const PURCHASES_PREFIX: &str = "quantofy_purchases_";

    /// Key holding the purchases of `user_id`.
    #[must_use]
    pub fn purchases(user_id: UserId) -> String {
        format!("{PURCHASES_PREFIX}{user_id}")
    }
}
