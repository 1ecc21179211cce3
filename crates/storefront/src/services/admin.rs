//! Store operator reporting.
//!
//! Reports cover customer accounts only; purchases made from the admin
//! account are not counted.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use quantofy_core::{Email, Price, PurchaseId, PurchaseStatus, UserRole};

use crate::db::Storage;
use crate::db::purchases::PurchaseRepository;
use crate::db::users::UserRepository;
use crate::models::purchase::Purchase;
use crate::models::session_keys;
use crate::models::user::CurrentUser;

/// Number of purchases listed in [`SystemStats::recent_purchases`].
pub const RECENT_PURCHASES: usize = 10;

/// A purchase with its buyer's contact details.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseWithBuyer {
    #[serde(flatten)]
    pub purchase: Purchase,
    pub user_name: String,
    pub user_email: Email,
}

/// Store-wide figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    /// Customer accounts.
    pub total_users: usize,
    pub total_purchases: usize,
    pub completed_purchases: usize,
    pub pending_purchases: usize,
    pub total_revenue: Price,
    pub average_order_value: Price,
    /// Newest first.
    pub recent_purchases: Vec<Purchase>,
}

/// What to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Users,
    Purchases,
    Stats,
    All,
}

impl ExportKind {
    /// Name used on the command line and in file names.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Purchases => "purchases",
            Self::Stats => "stats",
            Self::All => "all",
        }
    }

    /// Default export file name, e.g. `quantofy_users_2026-03-10.json`.
    #[must_use]
    pub fn file_name(&self, date: NaiveDate) -> String {
        format!("quantofy_{}_{}.json", self.as_str(), date.format("%Y-%m-%d"))
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "users" => Ok(Self::Users),
            "purchases" => Ok(Self::Purchases),
            "stats" => Ok(Self::Stats),
            "all" => Ok(Self::All),
            _ => Err(format!("invalid export kind: {s}")),
        }
    }
}

/// Reporting and maintenance over the stored accounts and purchases.
#[derive(Debug, Clone)]
pub struct AdminService {
    storage: Storage,
}

impl AdminService {
    /// Create a new admin service.
    #[must_use]
    pub const fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Customer accounts, without credentials, in registration order.
    #[must_use]
    pub fn customers(&self) -> Vec<CurrentUser> {
        UserRepository::new(&self.storage)
            .all()
            .iter()
            .filter(|u| u.role == UserRole::Customer)
            .map(CurrentUser::from)
            .collect()
    }

    /// Every customer purchase with buyer details, newest first.
    #[must_use]
    pub fn all_purchases(&self) -> Vec<PurchaseWithBuyer> {
        let purchases = PurchaseRepository::new(&self.storage);
        let mut all: Vec<PurchaseWithBuyer> = self
            .customers()
            .into_iter()
            .flat_map(|user| {
                purchases
                    .for_user(user.id)
                    .into_iter()
                    .map(move |purchase| PurchaseWithBuyer {
                        purchase,
                        user_name: user.name.clone(),
                        user_email: user.email.clone(),
                    })
            })
            .collect();
        all.sort_by(|a, b| b.purchase.created_at.cmp(&a.purchase.created_at));
        all
    }

    /// Store-wide figures over customer purchases.
    #[must_use]
    pub fn stats(&self) -> SystemStats {
        let customers = self.customers();
        let purchases = PurchaseRepository::new(&self.storage);
        let mut all: Vec<Purchase> = customers
            .iter()
            .flat_map(|user| purchases.for_user(user.id))
            .collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total_revenue: Price = all.iter().map(|p| p.total).sum();
        let average_order_value = if all.is_empty() {
            Price::ZERO
        } else {
            Price::new((total_revenue.amount() / Decimal::from(all.len())).round_dp(2))
        };
        let count = |status: PurchaseStatus| all.iter().filter(|p| p.status == status).count();

        SystemStats {
            total_users: customers.len(),
            total_purchases: all.len(),
            completed_purchases: count(PurchaseStatus::Completed),
            pending_purchases: count(PurchaseStatus::Pending),
            total_revenue,
            average_order_value,
            recent_purchases: all.into_iter().take(RECENT_PURCHASES).collect(),
        }
    }

    /// Set a purchase's status. Returns `false` if no purchase has that ID.
    pub fn update_purchase_status(&self, id: PurchaseId, status: PurchaseStatus) -> bool {
        let updated = PurchaseRepository::new(&self.storage)
            .update_status(id, status, Utc::now())
            .is_some();
        if updated {
            info!(purchase_id = %id, status = %status, "Purchase status updated");
        } else {
            warn!(purchase_id = %id, "Purchase not found");
        }
        updated
    }

    /// The purchase backed by a gateway charge.
    #[must_use]
    pub fn find_purchase_by_payment(&self, payment_id: &str) -> Option<Purchase> {
        PurchaseRepository::new(&self.storage).find_by_payment_id(payment_id)
    }

    /// Export data as JSON.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if a record cannot be encoded.
    pub fn export(&self, kind: ExportKind) -> Result<serde_json::Value, serde_json::Error> {
        match kind {
            ExportKind::Users => serde_json::to_value(self.customers()),
            ExportKind::Purchases => serde_json::to_value(self.all_purchases()),
            ExportKind::Stats => serde_json::to_value(self.stats()),
            ExportKind::All => Ok(serde_json::json!({
                "users": serde_json::to_value(self.customers())?,
                "purchases": serde_json::to_value(self.all_purchases())?,
                "stats": serde_json::to_value(self.stats())?,
            })),
        }
    }

    /// Delete every account, the saved product list and all purchases.
    pub fn clear_data(&self) {
        UserRepository::new(&self.storage).clear();
        self.storage.remove(session_keys::PRODUCTS);
        PurchaseRepository::new(&self.storage).clear();
        warn!("Store data cleared");
    }
}
