//! HTTP client for the Asaas v3 REST API.

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use super::types::{
    Customer, CustomerInput, ErrorBody, ListResponse, Payment, PaymentFilters, PaymentLink,
    PaymentLinkRequest, PaymentRequest,
};
use super::{GatewayError, PaymentGateway};
use crate::config::AsaasConfig;

/// Asaas API client.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct AsaasClient {
    client: reqwest::Client,
    base_url: Url,
}

impl std::fmt::Debug for AsaasClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsaasClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl AsaasClient {
    /// Create a new Asaas API client.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or not a valid header value,
    /// or if the HTTP client fails to build.
    pub fn new(config: &AsaasConfig) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();

        let key = config.api_key.as_ref().ok_or_else(GatewayError::missing_api_key)?;
        let mut api_key = HeaderValue::from_str(key.expose_secret())
            .map_err(|e| GatewayError::Config(format!("Invalid API key format: {e}")))?;
        api_key.set_sensitive(true);
        headers.insert("access_token", api_key);

        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        headers.insert(
            "User-Agent",
            HeaderValue::from_static(concat!("quantofy-storefront/", env!("CARGO_PKG_VERSION"))),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// Gateway API root.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Full URL for an API path such as `payments/pay_1`.
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.as_str().trim_end_matches('/'))
    }

    /// Send a request and decode the JSON body of a 2xx response.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, GatewayError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| GatewayError::Parse(e.to_string()))
    }

    // =========================================================================
    // Customers
    // =========================================================================

    /// Register a customer.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, input))]
    pub async fn create_customer(&self, input: &CustomerInput) -> Result<Customer, GatewayError> {
        let customer: Customer = self
            .send(self.client.post(self.endpoint("customers")).json(input))
            .await?;
        debug!(customer_id = %customer.id, "Customer created");
        Ok(customer)
    }

    /// Customers registered under a CPF/CNPJ.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, cpf_cnpj))]
    pub async fn find_customers_by_tax_id(
        &self,
        cpf_cnpj: &str,
    ) -> Result<Vec<Customer>, GatewayError> {
        let url = format!(
            "{}?cpfCnpj={}",
            self.endpoint("customers"),
            urlencoding::encode(cpf_cnpj)
        );
        let page: ListResponse<Customer> = self.send(self.client.get(&url)).await?;
        debug!(count = page.data.len(), "Customer lookup finished");
        Ok(page.data)
    }

    // =========================================================================
    // Payments
    // =========================================================================

    /// Create a charge.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, request), fields(billing_type = %request.billing_type.as_str(), value = %request.value))]
    pub async fn create_payment(&self, request: &PaymentRequest) -> Result<Payment, GatewayError> {
        let payment: Payment = self
            .send(self.client.post(self.endpoint("payments")).json(request))
            .await?;
        debug!(payment_id = %payment.id, status = ?payment.status, "Payment created");
        Ok(payment)
    }

    /// Fetch a charge by ID.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self))]
    pub async fn get_payment(&self, payment_id: &str) -> Result<Payment, GatewayError> {
        let url = self.endpoint(&format!("payments/{}", urlencoding::encode(payment_id)));
        self.send(self.client.get(&url)).await
    }

    /// List charges matching `filters`.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_payments(
        &self,
        filters: &PaymentFilters,
    ) -> Result<ListResponse<Payment>, GatewayError> {
        let query = filters.to_query();
        let url = if query.is_empty() {
            self.endpoint("payments")
        } else {
            format!("{}?{query}", self.endpoint("payments"))
        };
        self.send(self.client.get(&url)).await
    }

    // =========================================================================
    // Payment links
    // =========================================================================

    /// Create a shareable payment link.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_payment_link(
        &self,
        request: &PaymentLinkRequest,
    ) -> Result<PaymentLink, GatewayError> {
        self.send(self.client.post(self.endpoint("paymentLinks")).json(request))
            .await
    }
}

impl PaymentGateway for AsaasClient {
    async fn find_customers_by_tax_id(&self, cpf_cnpj: &str) -> Result<Vec<Customer>, GatewayError> {
        Self::find_customers_by_tax_id(self, cpf_cnpj).await
    }

    async fn create_customer(&self, input: &CustomerInput) -> Result<Customer, GatewayError> {
        Self::create_customer(self, input).await
    }

    async fn create_payment(&self, request: &PaymentRequest) -> Result<Payment, GatewayError> {
        Self::create_payment(self, request).await
    }
}

/// Build the error for a non-2xx response.
///
/// Prefers the upstream message, then the first listed error, then the HTTP
/// reason phrase.
fn api_error(status: StatusCode, body: &str) -> GatewayError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        });

    GatewayError::Api {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn config(base_url: &str) -> AsaasConfig {
        AsaasConfig {
            base_url: Url::parse(base_url).unwrap(),
            api_key: Some(SecretString::from("$aact_test_key")),
            webhook_token: None,
        }
    }

    #[test]
    fn test_endpoint_joins_paths() {
        let client = AsaasClient::new(&config("https://sandbox.asaas.com/api/v3")).unwrap();
        assert_eq!(
            client.endpoint("payments"),
            "https://sandbox.asaas.com/api/v3/payments"
        );

        let client = AsaasClient::new(&config("https://sandbox.asaas.com/api/v3/")).unwrap();
        assert_eq!(
            client.endpoint("paymentLinks"),
            "https://sandbox.asaas.com/api/v3/paymentLinks"
        );
    }

    #[test]
    fn test_invalid_api_key_is_rejected() {
        let mut config = config("https://sandbox.asaas.com/api/v3");
        config.api_key = Some(SecretString::from("line\nbreak"));
        let err = AsaasClient::new(&config).unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));

        config.api_key = None;
        let err = AsaasClient::new(&config).unwrap_err();
        assert!(matches!(err, GatewayError::Config(ref msg) if msg.contains("ASAAS_API_KEY")));
    }

    #[test]
    fn test_debug_omits_credentials() {
        let client = AsaasClient::new(&config("https://sandbox.asaas.com/api/v3")).unwrap();
        let debug = format!("{client:?}");
        assert!(debug.contains("sandbox.asaas.com"));
        assert!(!debug.contains("aact_test_key"));
    }

    #[test]
    fn test_api_error_uses_first_error_description() {
        let body = r#"{"errors":[{"code":"invalid_cpfCnpj","description":"O CPF informado é inválido."}]}"#;
        let err = api_error(StatusCode::BAD_REQUEST, body);
        match err {
            GatewayError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "O CPF informado é inválido.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_api_error_prefers_message() {
        let err = api_error(StatusCode::UNAUTHORIZED, r#"{"message":"Chave de API inválida"}"#);
        assert_eq!(err.to_string(), "API error: 401 - Chave de API inválida");
    }

    #[test]
    fn test_api_error_falls_back_to_reason_phrase() {
        let err = api_error(StatusCode::BAD_GATEWAY, "<html>upstream down</html>");
        assert_eq!(err.to_string(), "API error: 502 - Bad Gateway");
    }
}
