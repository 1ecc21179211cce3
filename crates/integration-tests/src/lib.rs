//! Shared fixtures for the Quantofy integration tests.
//!
//! The tests run the storefront services against a [`FileStore`] in a
//! temporary directory and a scripted [`ScriptedGateway`] instead of the
//! Asaas API.
//!
//! [`FileStore`]: quantofy_storefront::db::FileStore

use std::sync::Mutex;
use std::time::Duration;

use quantofy_core::Email;
use quantofy_storefront::StorefrontConfig;
use quantofy_storefront::asaas::{
    Customer, CustomerInput, GatewayError, Payment, PaymentGateway, PaymentRequest, PaymentStatus,
};
use quantofy_storefront::models::NewUser;
use quantofy_storefront::services::checkout::CustomerInfo;

/// An API key that passes the secret checks.
pub const API_KEY: &str = "$aact_MzkwODA2MWY2OGM3MWRlMDU2NWM3MzJlNzZmNGZhZGY6OjRhYmM";

/// Webhook token that passes the secret checks.
pub const WEBHOOK_TOKEN: &str = "wh_7Fq2Lz9XpR4mNc8VbT1sKd6YhJ3e";

/// Grace period used by [`config`].
pub const CART_CLEAR_GRACE: Duration = Duration::from_millis(2000);

/// Configuration rooted at `data_dir` with no auth latency and the webhook
/// token set.
///
/// # Panics
///
/// Panics if the fixed test values are rejected.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn config(data_dir: &std::path::Path) -> StorefrontConfig {
    let data_dir = data_dir.display().to_string();
    StorefrontConfig::from_lookup(|key| match key {
        "ASAAS_API_KEY" => Some(API_KEY.to_owned()),
        "ASAAS_WEBHOOK_TOKEN" => Some(WEBHOOK_TOKEN.to_owned()),
        "QUANTOFY_DATA_DIR" => Some(data_dir.clone()),
        "QUANTOFY_AUTH_LATENCY_MS" => Some("0".to_owned()),
        "QUANTOFY_CART_CLEAR_GRACE_MS" => Some(CART_CLEAR_GRACE.as_millis().to_string()),
        _ => None,
    })
    .unwrap()
}

/// Registration input for a customer.
///
/// # Panics
///
/// Panics if `email` is invalid.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn new_user(name: &str, email: &str) -> NewUser {
    NewUser {
        name: name.to_owned(),
        email: Email::parse(email).unwrap(),
        password: "secret123".to_owned(),
        phone: "11988887777".to_owned(),
    }
}

/// Complete buyer details.
#[must_use]
pub fn buyer() -> CustomerInfo {
    CustomerInfo {
        name: "Ana Souza".to_owned(),
        email: "ana@quantofy.com".to_owned(),
        cpf_cnpj: "12345678901".to_owned(),
        mobile_phone: "11988887777".to_owned(),
        city: "São Paulo".to_owned(),
        state: "SP".to_owned(),
        ..CustomerInfo::default()
    }
}

/// In-process gateway that records requests and fails on demand.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    /// Customers returned by the tax-ID lookup.
    pub existing: Vec<Customer>,
    /// Reject every charge with a 400.
    pub reject_payments: bool,
    requests: Mutex<Vec<PaymentRequest>>,
    created_customers: Mutex<Vec<CustomerInput>>,
}

impl ScriptedGateway {
    /// A gateway that rejects every charge.
    #[must_use]
    pub fn rejecting() -> Self {
        Self {
            reject_payments: true,
            ..Self::default()
        }
    }

    /// Charges submitted so far.
    #[must_use]
    pub fn requests(&self) -> Vec<PaymentRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Customers created so far.
    #[must_use]
    pub fn created_customers(&self) -> Vec<CustomerInput> {
        self.created_customers
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

impl PaymentGateway for ScriptedGateway {
    async fn find_customers_by_tax_id(&self, _cpf_cnpj: &str) -> Result<Vec<Customer>, GatewayError> {
        Ok(self.existing.clone())
    }

    async fn create_customer(&self, input: &CustomerInput) -> Result<Customer, GatewayError> {
        if let Ok(mut created) = self.created_customers.lock() {
            created.push(input.clone());
        }
        Ok(Customer {
            id: "cus_000005219613".to_owned(),
            name: input.name.clone(),
            email: Some(input.email.clone()),
            cpf_cnpj: Some(input.cpf_cnpj.clone()),
        })
    }

    async fn create_payment(&self, request: &PaymentRequest) -> Result<Payment, GatewayError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if self.reject_payments {
            return Err(GatewayError::Api {
                status: 400,
                message: "O campo value deve ser maior que zero.".to_owned(),
            });
        }
        Ok(Payment {
            id: "pay_080225913252".to_owned(),
            status: PaymentStatus::Pending,
            value: request.value,
            customer: Some(request.customer.clone()),
            billing_type: Some(request.billing_type.into()),
            due_date: Some(request.due_date),
            external_reference: Some(request.external_reference.clone()),
            invoice_url: Some("https://sandbox.asaas.com/i/080225913252".to_owned()),
            bank_slip_url: None,
            pix_transaction: None,
        })
    }
}
