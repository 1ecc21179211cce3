//! Asaas payment gateway integration.
//!
//! [`AsaasClient`] speaks the REST API. Checkout depends only on the
//! [`PaymentGateway`] trait so it can run against a fake in tests.

mod client;
pub mod types;
pub mod webhook;

use std::future::Future;

use thiserror::Error;
use tracing::{info, warn};

pub use client::AsaasClient;
pub use types::{
    CardPayment, ChargeBillingType, ChargeType, CreditCard, CreditCardHolderInfo, Customer, CustomerInput,
    LinkBillingType, ListResponse, Payment, PaymentFilters, PaymentLink, PaymentLinkRequest,
    PaymentRequest, PaymentStatus,
};
pub use webhook::{PaymentEvent, WebhookError, WebhookHandler, WebhookNotification};

/// Errors that can occur when interacting with the Asaas API.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Client could not be built from the configuration.
    #[error("Invalid gateway configuration: {0}")]
    Config(String),

    /// The charge could not be built from the checkout inputs.
    #[error("Invalid payment request: {0}")]
    InvalidRequest(String),
}

impl GatewayError {
    pub(crate) fn missing_api_key() -> Self {
        Self::Config("ASAAS_API_KEY is not set".to_owned())
    }
}

/// Operations checkout needs from the payment gateway.
pub trait PaymentGateway: Send + Sync {
    /// Customers registered under a CPF/CNPJ.
    fn find_customers_by_tax_id(
        &self,
        cpf_cnpj: &str,
    ) -> impl Future<Output = Result<Vec<Customer>, GatewayError>> + Send;

    /// Register a new customer.
    fn create_customer(
        &self,
        input: &CustomerInput,
    ) -> impl Future<Output = Result<Customer, GatewayError>> + Send;

    /// Create a charge.
    fn create_payment(
        &self,
        request: &PaymentRequest,
    ) -> impl Future<Output = Result<Payment, GatewayError>> + Send;
}

/// Find the gateway customer for `input`, creating one if needed.
///
/// The first customer registered under the same CPF/CNPJ is reused. A failed
/// lookup is not fatal: it is logged and a new customer is created, which
/// can leave duplicate customers on the gateway side.
///
/// # Errors
///
/// Returns the gateway error if customer creation fails.
pub async fn resolve_customer<G: PaymentGateway>(
    gateway: &G,
    input: &CustomerInput,
) -> Result<Customer, GatewayError> {
    match gateway.find_customers_by_tax_id(&input.cpf_cnpj).await {
        Ok(customers) => {
            if let Some(existing) = customers.into_iter().next() {
                info!(customer_id = %existing.id, "Reusing existing gateway customer");
                return Ok(existing);
            }
        }
        Err(e) => {
            warn!(error = %e, "Customer lookup failed, creating a new customer");
        }
    }

    let customer = gateway.create_customer(input).await?;
    info!(customer_id = %customer.id, "Created gateway customer");
    Ok(customer)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod fake {
    //! In-memory gateway used by unit tests.

    use std::sync::Mutex;

    use super::*;

    /// Programmable fake gateway that records every call.
    #[derive(Default)]
    pub struct FakeGateway {
        pub existing: Vec<Customer>,
        pub fail_lookup: bool,
        pub fail_payment: bool,
        pub calls: Mutex<Vec<String>>,
        pub payments: Mutex<Vec<PaymentRequest>>,
    }

    impl FakeGateway {
        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_owned());
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl PaymentGateway for FakeGateway {
        async fn find_customers_by_tax_id(
            &self,
            _cpf_cnpj: &str,
        ) -> Result<Vec<Customer>, GatewayError> {
            self.record("find_customers");
            if self.fail_lookup {
                return Err(GatewayError::Api {
                    status: 500,
                    message: "lookup unavailable".to_owned(),
                });
            }
            Ok(self.existing.clone())
        }

        async fn create_customer(&self, input: &CustomerInput) -> Result<Customer, GatewayError> {
            self.record("create_customer");
            Ok(Customer {
                id: "cus_new".to_owned(),
                name: input.name.clone(),
                email: Some(input.email.clone()),
                cpf_cnpj: Some(input.cpf_cnpj.clone()),
            })
        }

        async fn create_payment(&self, request: &PaymentRequest) -> Result<Payment, GatewayError> {
            self.record("create_payment");
            if self.fail_payment {
                return Err(GatewayError::Api {
                    status: 400,
                    message: "invalid billing".to_owned(),
                });
            }
            self.payments.lock().unwrap().push(request.clone());
            Ok(Payment {
                id: "pay_123".to_owned(),
                status: PaymentStatus::Pending,
                value: request.value,
                customer: Some(request.customer.clone()),
                billing_type: Some(request.billing_type.into()),
                due_date: Some(request.due_date),
                external_reference: Some(request.external_reference.clone()),
                invoice_url: None,
                bank_slip_url: None,
                pix_transaction: None,
            })
        }
    }
}
