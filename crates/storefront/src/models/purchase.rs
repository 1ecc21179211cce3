//! Purchase records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quantofy_core::{BillingType, Price, PurchaseId, PurchaseStatus, UserId};

use super::product::CartItem;

/// A completed checkout, recorded against the buyer.
///
/// `items` and `total` never change after creation; only `status` (and
/// with it `updated_at`) moves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: PurchaseId,
    pub user_id: UserId,
    pub items: Vec<CartItem>,
    pub total: Price,
    pub status: PurchaseStatus,
    /// Gateway charge backing this purchase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_type: Option<BillingType>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Purchase {
    /// Number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0, |total: u32, item| total.saturating_add(item.quantity))
    }
}

/// Data supplied when recording a purchase.
#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub items: Vec<CartItem>,
    pub total: Price,
    pub status: PurchaseStatus,
    pub payment_id: Option<String>,
    pub billing_type: Option<BillingType>,
}

impl NewPurchase {
    /// Build the record for `user_id`, stamped at `now`.
    #[must_use]
    pub fn into_purchase(self, user_id: UserId, now: DateTime<Utc>) -> Purchase {
        Purchase {
            id: PurchaseId::generate(),
            user_id,
            items: self.items,
            total: self.total,
            status: self.status,
            payment_id: self.payment_id,
            billing_type: self.billing_type,
            created_at: now,
            updated_at: None,
        }
    }
}
