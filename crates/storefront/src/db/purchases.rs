//! Purchase repository over the per-user purchase lists.

use chrono::{DateTime, Utc};

use quantofy_core::{PurchaseId, PurchaseStatus, UserId};

use super::Storage;
use crate::models::purchase::Purchase;
use crate::models::session_keys;

/// Repository for purchase records.
pub struct PurchaseRepository<'a> {
    storage: &'a Storage,
}

impl<'a> PurchaseRepository<'a> {
    /// Create a new purchase repository.
    #[must_use]
    pub const fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Purchases of one user, in creation order.
    #[must_use]
    pub fn for_user(&self, user_id: UserId) -> Vec<Purchase> {
        self.storage.load(&session_keys::purchases(user_id))
    }

    /// Append a purchase to its owner's list.
    pub fn append(&self, purchase: &Purchase) {
        let key = session_keys::purchases(purchase.user_id);
        let mut purchases: Vec<Purchase> = self.storage.load(&key);
        purchases.push(purchase.clone());
        self.storage.save(&key, &purchases);
    }

    /// Every purchase of every user.
    #[must_use]
    pub fn all(&self) -> Vec<Purchase> {
        self.storage
            .keys_with_prefix(session_keys::PURCHASES_PREFIX)
            .iter()
            .flat_map(|key| self.storage.load::<Vec<Purchase>>(key))
            .collect()
    }

    /// Find the purchase backed by a gateway payment.
    #[must_use]
    pub fn find_by_payment_id(&self, payment_id: &str) -> Option<Purchase> {
        self.all()
            .into_iter()
            .find(|p| p.payment_id.as_deref() == Some(payment_id))
    }

    /// Move a purchase to `status`, wherever it is stored.
    ///
    /// Returns the updated purchase, or `None` if no purchase has that ID.
    #[must_use]
    pub fn update_status(
        &self,
        id: PurchaseId,
        status: PurchaseStatus,
        now: DateTime<Utc>,
    ) -> Option<Purchase> {
        for key in self.storage.keys_with_prefix(session_keys::PURCHASES_PREFIX) {
            let mut purchases: Vec<Purchase> = self.storage.load(&key);
            if let Some(purchase) = purchases.iter_mut().find(|p| p.id == id) {
                purchase.status = status;
                purchase.updated_at = Some(now);
                let updated = purchase.clone();
                self.storage.save(&key, &purchases);
                return Some(updated);
            }
        }
        None
    }

    /// Delete every purchase list.
    pub fn clear(&self) {
        for key in self.storage.keys_with_prefix(session_keys::PURCHASES_PREFIX) {
            self.storage.remove(&key);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use quantofy_core::Price;

    use super::*;
    use crate::models::purchase::NewPurchase;

    fn purchase(user_id: UserId, payment_id: &str) -> Purchase {
        NewPurchase {
            items: Vec::new(),
            total: Price::from_cents(14990),
            status: PurchaseStatus::Pending,
            payment_id: Some(payment_id.to_owned()),
            billing_type: None,
        }
        .into_purchase(user_id, Utc::now())
    }

    #[test]
    fn test_lists_are_kept_per_user() {
        let storage = Storage::in_memory();
        let repo = PurchaseRepository::new(&storage);
        let (ana, bia) = (UserId::generate(), UserId::generate());

        repo.append(&purchase(ana, "pay_1"));
        repo.append(&purchase(ana, "pay_2"));
        repo.append(&purchase(bia, "pay_3"));

        assert_eq!(repo.for_user(ana).len(), 2);
        assert_eq!(repo.for_user(bia).len(), 1);
        assert_eq!(repo.all().len(), 3);
    }

    #[test]
    fn test_update_status_finds_purchase_across_users() {
        let storage = Storage::in_memory();
        let repo = PurchaseRepository::new(&storage);
        let owner = UserId::generate();
        repo.append(&purchase(UserId::generate(), "pay_1"));
        let target = purchase(owner, "pay_2");
        repo.append(&target);

        let now = Utc::now();
        let updated = repo
            .update_status(target.id, PurchaseStatus::Completed, now)
            .unwrap();

        assert_eq!(updated.status, PurchaseStatus::Completed);
        assert_eq!(updated.updated_at, Some(now));
        assert_eq!(repo.for_user(owner)[0].status, PurchaseStatus::Completed);
    }

    #[test]
    fn test_update_status_unknown_purchase() {
        let storage = Storage::in_memory();
        let repo = PurchaseRepository::new(&storage);
        assert!(
            repo.update_status(PurchaseId::generate(), PurchaseStatus::Completed, Utc::now())
                .is_none()
        );
    }

    #[test]
    fn test_find_by_payment_id() {
        let storage = Storage::in_memory();
        let repo = PurchaseRepository::new(&storage);
        repo.append(&purchase(UserId::generate(), "pay_abc"));

        assert!(repo.find_by_payment_id("pay_abc").is_some());
        assert!(repo.find_by_payment_id("pay_xyz").is_none());
    }
}
