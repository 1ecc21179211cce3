//! Status and role enums for storefront entities.

use serde::{Deserialize, Serialize};

/// Storefront account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Regular buyer account, created by registration.
    #[default]
    Customer,
    /// Store operator, created by the one-time bootstrap.
    Admin,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid user role: {s}")),
        }
    }
}

/// Lifecycle of a recorded purchase.
///
/// Purchases start `Pending` when the gateway charge is created and move to
/// `Completed` once the payment is received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    #[default]
    Pending,
    Completed,
}

impl std::fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for PurchaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("invalid purchase status: {s}")),
        }
    }
}

/// Payment method offered at checkout.
///
/// Serialized with the gateway's wire names (`PIX`, `BOLETO`, `CREDIT_CARD`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingType {
    /// Instant transfer via PIX QR code.
    #[default]
    Pix,
    /// Bank slip.
    Boleto,
    CreditCard,
}

impl BillingType {
    /// All billing types in the order they are offered.
    pub const ALL: [Self; 3] = [Self::Pix, Self::Boleto, Self::CreditCard];

    /// Wire name used by the payment gateway.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pix => "PIX",
            Self::Boleto => "BOLETO",
            Self::CreditCard => "CREDIT_CARD",
        }
    }

    /// Human-readable label shown on the payment step.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pix => "PIX - Pagamento instantâneo",
            Self::Boleto => "Boleto Bancário",
            Self::CreditCard => "Cartão de Crédito",
        }
    }
}

impl std::fmt::Display for BillingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BillingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("invalid billing type: {s}"))
    }
}
