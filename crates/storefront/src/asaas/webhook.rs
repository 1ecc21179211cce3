//! Inbound payment notifications.
//!
//! Asaas posts `{"event": "...", "payment": {...}}` for every charge state
//! change and authenticates with the `asaas-access-token` header.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use quantofy_core::PurchaseStatus;

use super::types::Payment;
use crate::db::Storage;
use crate::db::purchases::PurchaseRepository;

/// Header carrying the webhook token configured in the Asaas dashboard.
pub const ACCESS_TOKEN_HEADER: &str = "asaas-access-token";

/// Errors raised while accepting a webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Missing or mismatched access token.
    #[error("webhook access token rejected")]
    Unauthorized,

    /// Body is not a valid notification.
    #[error("invalid webhook payload: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Payment event name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentEvent {
    Created,
    Received,
    Confirmed,
    Overdue,
    Deleted,
    Refunded,
    /// Any event this storefront does not act on.
    Other(String),
}

impl PaymentEvent {
    /// Wire name, e.g. `PAYMENT_RECEIVED`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "PAYMENT_CREATED",
            Self::Received => "PAYMENT_RECEIVED",
            Self::Confirmed => "PAYMENT_CONFIRMED",
            Self::Overdue => "PAYMENT_OVERDUE",
            Self::Deleted => "PAYMENT_DELETED",
            Self::Refunded => "PAYMENT_REFUNDED",
            Self::Other(name) => name,
        }
    }

    /// Whether the event means the money arrived.
    #[must_use]
    pub const fn settles_payment(&self) -> bool {
        matches!(self, Self::Received | Self::Confirmed)
    }
}

impl From<String> for PaymentEvent {
    fn from(name: String) -> Self {
        match name.as_str() {
            "PAYMENT_CREATED" => Self::Created,
            "PAYMENT_RECEIVED" => Self::Received,
            "PAYMENT_CONFIRMED" => Self::Confirmed,
            "PAYMENT_OVERDUE" => Self::Overdue,
            "PAYMENT_DELETED" => Self::Deleted,
            "PAYMENT_REFUNDED" => Self::Refunded,
            _ => Self::Other(name),
        }
    }
}

impl From<PaymentEvent> for String {
    fn from(event: PaymentEvent) -> Self {
        event.as_str().to_owned()
    }
}

impl FromStr for PaymentEvent {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_owned()))
    }
}

impl fmt::Display for PaymentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookNotification {
    pub event: PaymentEvent,
    #[serde(default)]
    pub payment: Option<Payment>,
}

/// Acknowledgement returned to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    pub status: String,
}

impl WebhookAck {
    fn success() -> Self {
        Self {
            status: "success".to_owned(),
        }
    }
}

/// Applies payment notifications to recorded purchases.
pub struct WebhookHandler {
    storage: Storage,
    access_token: Option<SecretString>,
}

impl WebhookHandler {
    /// Create a handler. Without `access_token` every request is accepted.
    #[must_use]
    pub const fn new(storage: Storage, access_token: Option<SecretString>) -> Self {
        Self {
            storage,
            access_token,
        }
    }

    /// Check the `asaas-access-token` header value.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::Unauthorized` if a token is configured and
    /// `provided` is missing or different.
    pub fn authorize(&self, provided: Option<&str>) -> Result<(), WebhookError> {
        match &self.access_token {
            None => Ok(()),
            Some(expected) => {
                if verify_access_token(expected.expose_secret(), provided) {
                    Ok(())
                } else {
                    warn!("Rejected webhook with invalid access token");
                    Err(WebhookError::Unauthorized)
                }
            }
        }
    }

    /// Authorize, parse and handle a raw request body.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError` if the token is rejected or the body is not a
    /// notification.
    pub fn handle_request(
        &self,
        access_token: Option<&str>,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<WebhookAck, WebhookError> {
        self.authorize(access_token)?;
        let notification: WebhookNotification = serde_json::from_str(body)?;
        Ok(self.handle(&notification, now))
    }

    /// Handle a parsed notification. Always acknowledges.
    pub fn handle(&self, notification: &WebhookNotification, now: DateTime<Utc>) -> WebhookAck {
        let event = &notification.event;
        let Some(payment) = notification.payment.as_ref() else {
            debug!(event = %event, "Webhook without payment, ignoring");
            return WebhookAck::success();
        };

        match event {
            PaymentEvent::Received | PaymentEvent::Confirmed => {
                info!(event = %event, payment_id = %payment.id, "Payment received");
                self.complete_purchase(&payment.id, now);
            }
            PaymentEvent::Overdue => {
                warn!(payment_id = %payment.id, "Payment overdue");
            }
            PaymentEvent::Deleted => {
                info!(payment_id = %payment.id, "Payment deleted");
            }
            PaymentEvent::Created | PaymentEvent::Refunded => {
                info!(event = %event, payment_id = %payment.id, "Payment event");
            }
            PaymentEvent::Other(name) => {
                debug!(event = %name, payment_id = %payment.id, "Unhandled webhook event");
            }
        }

        WebhookAck::success()
    }

    fn complete_purchase(&self, payment_id: &str, now: DateTime<Utc>) {
        let purchases = PurchaseRepository::new(&self.storage);
        let Some(purchase) = purchases.find_by_payment_id(payment_id) else {
            warn!(payment_id, "No purchase recorded for paid charge");
            return;
        };
        if purchase.status == PurchaseStatus::Completed {
            debug!(purchase_id = %purchase.id, "Purchase already completed");
            return;
        }
        if purchases
            .update_status(purchase.id, PurchaseStatus::Completed, now)
            .is_some()
        {
            info!(purchase_id = %purchase.id, payment_id, "Purchase completed");
        }
    }
}

/// Compare a received token against the expected one in constant time.
#[must_use]
pub fn verify_access_token(expected: &str, provided: Option<&str>) -> bool {
    provided.is_some_and(|token| constant_time_compare(expected, token))
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
