//! Request and response types for the Asaas REST API.
//!
//! Field names follow the provider's camelCase wire format.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use quantofy_core::{BillingType, Price};

use super::GatewayError;
use crate::models::product::CartItem;

// =============================================================================
// Customers
// =============================================================================

/// Payload for `POST /customers`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInput {
    pub name: String,
    /// CPF or CNPJ (Brazilian tax id).
    pub cpf_cnpj: String,
    pub email: String,
    pub mobile_phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
    /// Neighbourhood.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
}

/// Customer record returned by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub cpf_cnpj: Option<String>,
}

/// Paginated list envelope (`{"data": [...]}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub total_count: Option<u64>,
}

// =============================================================================
// Payments
// =============================================================================

/// Fixed-value discount applied until `due_date_limit_days` before due date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discount {
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
    pub due_date_limit_days: u32,
}

/// Monthly interest or late fine, in percent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Percentage {
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
}

/// Card data for `CREDIT_CARD` charges.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditCard {
    pub holder_name: String,
    pub number: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub ccv: String,
}

impl std::fmt::Debug for CreditCard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let last4: String = self
            .number
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        f.debug_struct("CreditCard")
            .field("holder_name", &self.holder_name)
            .field("number", &format!("**** {last4}"))
            .field("ccv", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Card holder details required alongside [`CreditCard`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditCardHolderInfo {
    pub name: String,
    pub email: String,
    pub cpf_cnpj: String,
    pub postal_code: String,
    pub address_number: String,
    pub phone: String,
}

/// Card details attached to a charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardPayment {
    pub card: CreditCard,
    pub holder: CreditCardHolderInfo,
}

/// Payload for `POST /payments`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    /// Gateway customer ID.
    pub customer: String,
    pub billing_type: BillingType,
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
    pub due_date: NaiveDate,
    pub description: String,
    pub external_reference: String,
    pub discount: Discount,
    pub interest: Percentage,
    pub fine: Percentage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_card: Option<CreditCard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_card_holder_info: Option<CreditCardHolderInfo>,
}

impl PaymentRequest {
    /// Default due date offset, in days.
    pub const DEFAULT_DUE_DAYS: u32 = 7;

    /// Monthly interest applied to late payments, in percent.
    pub const INTEREST_PERCENT: i64 = 2;

    /// Fine applied to late payments, in percent.
    pub const FINE_PERCENT: i64 = 1;

    /// Build the charge for a cart.
    ///
    /// `reference` disambiguates the charge on the gateway side
    /// (`QUANTOFY-<reference>`); callers pass the current time in
    /// milliseconds. Card details are only attached for
    /// [`BillingType::CreditCard`].
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::InvalidRequest` if the due date falls outside
    /// the supported calendar range.
    pub fn for_cart(
        customer_id: &str,
        billing_type: BillingType,
        items: &[CartItem],
        today: NaiveDate,
        due_days: u32,
        reference: i64,
        card: Option<CardPayment>,
    ) -> Result<Self, GatewayError> {
        let due_date = today
            .checked_add_days(chrono::Days::new(u64::from(due_days)))
            .ok_or_else(|| {
                GatewayError::InvalidRequest(format!("due date {today} + {due_days} days is out of range"))
            })?;
        let total: Price = items.iter().map(CartItem::line_total).sum();
        let (credit_card, credit_card_holder_info) = match (billing_type, card) {
            (BillingType::CreditCard, Some(card)) => (Some(card.card), Some(card.holder)),
            _ => (None, None),
        };

        Ok(Self {
            customer: customer_id.to_owned(),
            billing_type,
            value: total.amount(),
            due_date,
            description: format!("Compra Quantofy - {} item(s)", items.len()),
            external_reference: format!("QUANTOFY-{reference}"),
            discount: Discount {
                value: Decimal::ZERO,
                due_date_limit_days: 0,
            },
            interest: Percentage {
                value: Decimal::from(Self::INTEREST_PERCENT),
            },
            fine: Percentage {
                value: Decimal::from(Self::FINE_PERCENT),
            },
            credit_card,
            credit_card_holder_info,
        })
    }
}

/// Charge status reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Received,
    Confirmed,
    Overdue,
    Refunded,
    ReceivedInCash,
    RefundRequested,
    ChargebackRequested,
    AwaitingRiskAnalysis,
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    /// Whether the money has been received.
    #[must_use]
    pub const fn is_paid(&self) -> bool {
        matches!(self, Self::Received | Self::Confirmed | Self::ReceivedInCash)
    }
}

/// Billing type as reported on a charge.
///
/// Charges created from payment links stay `UNDEFINED` until the buyer picks
/// a method, and the gateway also reports methods this store never offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChargeBillingType {
    Undefined,
    Pix,
    Boleto,
    CreditCard,
    DebitCard,
    #[serde(other)]
    Unknown,
}

impl ChargeBillingType {
    /// The checkout billing type, for methods this store offers.
    #[must_use]
    pub const fn offered(self) -> Option<BillingType> {
        match self {
            Self::Pix => Some(BillingType::Pix),
            Self::Boleto => Some(BillingType::Boleto),
            Self::CreditCard => Some(BillingType::CreditCard),
            Self::Undefined | Self::DebitCard | Self::Unknown => None,
        }
    }
}

impl From<BillingType> for ChargeBillingType {
    fn from(billing_type: BillingType) -> Self {
        match billing_type {
            BillingType::Pix => Self::Pix,
            BillingType::Boleto => Self::Boleto,
            BillingType::CreditCard => Self::CreditCard,
        }
    }
}

/// PIX QR code details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixQrCode {
    /// Copy-and-paste PIX code.
    pub payload: String,
    #[serde(default)]
    pub encoded_image: Option<String>,
}

/// PIX transaction attached to a charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixTransaction {
    pub qr_code: PixQrCode,
}

/// Payment record returned by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub status: PaymentStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub billing_type: Option<ChargeBillingType>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub external_reference: Option<String>,
    #[serde(default)]
    pub invoice_url: Option<String>,
    #[serde(default)]
    pub bank_slip_url: Option<String>,
    #[serde(default)]
    pub pix_transaction: Option<PixTransaction>,
}

impl Payment {
    /// Copy-and-paste PIX code, when the gateway returned one.
    #[must_use]
    pub fn pix_payload(&self) -> Option<&str> {
        self.pix_transaction
            .as_ref()
            .map(|pix| pix.qr_code.payload.as_str())
    }
}

/// Filters for `GET /payments`.
#[derive(Debug, Clone, Default)]
pub struct PaymentFilters {
    pub customer: Option<String>,
    pub status: Option<PaymentStatus>,
    pub billing_type: Option<BillingType>,
    pub external_reference: Option<String>,
    pub offset: Option<u32>,
    pub limit: Option<u32>,
}

impl PaymentFilters {
    /// Query string (without the leading `?`), empty when no filter is set.
    #[must_use]
    pub fn to_query(&self) -> String {
        let status = self.status.and_then(|s| {
            serde_json::to_value(s)
                .ok()
                .and_then(|v| v.as_str().map(str::to_owned))
        });
        let pairs = [
            ("customer", self.customer.clone()),
            ("status", status),
            ("billingType", self.billing_type.map(|b| b.as_str().to_owned())),
            ("externalReference", self.external_reference.clone()),
            ("offset", self.offset.map(|o| o.to_string())),
            ("limit", self.limit.map(|l| l.to_string())),
        ];

        pairs
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| format!("{key}={}", urlencoding::encode(&v))))
            .collect::<Vec<_>>()
            .join("&")
    }
}

// =============================================================================
// Payment links
// =============================================================================

/// How a payment link charges the buyer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChargeType {
    /// Single charge.
    #[default]
    Detached,
    Installment,
    Recurrent,
}

/// Redirect configuration after a payment link is paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkCallback {
    pub success_url: String,
    #[serde(default = "default_true")]
    pub auto_redirect: bool,
}

const fn default_true() -> bool {
    true
}

/// Payload for `POST /paymentLinks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLinkRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Decimal>,
    pub billing_type: LinkBillingType,
    pub charge_type: ChargeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_installment_count: Option<u32>,
    pub notification_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback: Option<LinkCallback>,
}

impl PaymentLinkRequest {
    /// A single-charge link with notifications on.
    #[must_use]
    pub fn new(name: impl Into<String>, billing_type: LinkBillingType) -> Self {
        Self {
            name: name.into(),
            description: None,
            end_date: None,
            value: None,
            billing_type,
            charge_type: ChargeType::default(),
            max_installment_count: None,
            notification_enabled: true,
            callback: None,
        }
    }
}

/// Billing types accepted by payment links (adds `UNDEFINED`: buyer chooses).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkBillingType {
    #[default]
    Undefined,
    Pix,
    Boleto,
    CreditCard,
}

impl From<BillingType> for LinkBillingType {
    fn from(billing_type: BillingType) -> Self {
        match billing_type {
            BillingType::Pix => Self::Pix,
            BillingType::Boleto => Self::Boleto,
            BillingType::CreditCard => Self::CreditCard,
        }
    }
}

/// Payment link returned by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLink {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub active: bool,
}

// =============================================================================
// Errors
// =============================================================================

/// Error body returned on non-2xx responses.
///
/// The gateway usually sends `{"errors": [{"code", "description"}]}`; some
/// endpoints send a bare `{"message"}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
}

/// One entry of [`ErrorBody::errors`].
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    pub description: String,
}

impl ErrorBody {
    /// The most specific message available.
    #[must_use]
    pub fn into_message(self) -> Option<String> {
        self.message
            .filter(|m| !m.is_empty())
            .or_else(|| self.errors.into_iter().next().map(|e| e.description))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use quantofy_core::ProductId;

    use super::*;
    use crate::catalog;

    fn cart() -> Vec<CartItem> {
        let product = catalog::by_id(ProductId::new(2)).unwrap();
        vec![CartItem {
            product,
            quantity: 1,
        }]
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    #[test]
    fn test_payment_for_cart_payload() {
        let request =
            PaymentRequest::for_cart("cus_1", BillingType::Pix, &cart(), today(), 7, 1_700, None)
                .unwrap();
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["customer"], "cus_1");
        assert_eq!(json["billingType"], "PIX");
        assert_eq!(json["value"], 149.9);
        assert_eq!(json["dueDate"], "2026-03-17");
        assert_eq!(json["description"], "Compra Quantofy - 1 item(s)");
        assert_eq!(json["externalReference"], "QUANTOFY-1700");
        assert_eq!(json["discount"]["value"], 0.0);
        assert_eq!(json["discount"]["dueDateLimitDays"], 0);
        assert_eq!(json["interest"]["value"], 2.0);
        assert_eq!(json["fine"]["value"], 1.0);
        assert!(json.get("creditCard").is_none());
    }

    #[test]
    fn test_out_of_range_due_date_is_an_error() {
        let err = PaymentRequest::for_cart(
            "cus_1",
            BillingType::Pix,
            &cart(),
            NaiveDate::MAX,
            1,
            1,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidRequest(_)));

        assert!(
            PaymentRequest::for_cart("cus_1", BillingType::Pix, &cart(), today(), u32::MAX, 1, None)
                .is_err()
        );
    }

    fn card() -> CardPayment {
        CardPayment {
            card: CreditCard {
                holder_name: "ANA SOUZA".to_owned(),
                number: "5162306219378829".to_owned(),
                expiry_month: "05".to_owned(),
                expiry_year: "2030".to_owned(),
                ccv: "318".to_owned(),
            },
            holder: CreditCardHolderInfo {
                name: "Ana Souza".to_owned(),
                email: "ana@quantofy.com".to_owned(),
                cpf_cnpj: "12345678901".to_owned(),
                postal_code: "01234567".to_owned(),
                address_number: "123".to_owned(),
                phone: "11999999999".to_owned(),
            },
        }
    }

    #[test]
    fn test_card_details_only_attached_for_credit_card() {
        let boleto = PaymentRequest::for_cart(
            "cus_1",
            BillingType::Boleto,
            &cart(),
            today(),
            7,
            1,
            Some(card()),
        )
        .unwrap();
        assert!(boleto.credit_card.is_none());

        let credit = PaymentRequest::for_cart(
            "cus_1",
            BillingType::CreditCard,
            &cart(),
            today(),
            7,
            1,
            Some(card()),
        )
        .unwrap();
        let json = serde_json::to_value(&credit).unwrap();
        assert_eq!(json["creditCard"]["holderName"], "ANA SOUZA");
        assert_eq!(json["creditCardHolderInfo"]["cpfCnpj"], "12345678901");
    }

    #[test]
    fn test_credit_card_debug_masks_number() {
        let debug = format!("{:?}", card().card);
        assert!(debug.contains("**** 8829"));
        assert!(!debug.contains("5162306219378829"));
        assert!(!debug.contains("318"));
    }

    #[test]
    fn test_payment_response_parsing() {
        let json = r#"{
            "object": "payment",
            "id": "pay_080225913252",
            "status": "PENDING",
            "value": 149.9,
            "billingType": "PIX",
            "dueDate": "2026-03-17",
            "bankSlipUrl": null,
            "pixTransaction": {"qrCode": {"payload": "00020126..."}}
        }"#;
        let payment: Payment = serde_json::from_str(json).unwrap();

        assert_eq!(payment.id, "pay_080225913252");
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.value, Decimal::new(1499, 1));
        assert_eq!(payment.pix_payload(), Some("00020126..."));
        assert!(payment.bank_slip_url.is_none());
    }

    #[test]
    fn test_charge_billing_types_outside_checkout_are_tolerated() {
        for (wire, expected) in [
            ("UNDEFINED", ChargeBillingType::Undefined),
            ("DEBIT_CARD", ChargeBillingType::DebitCard),
            ("TRANSFER", ChargeBillingType::Unknown),
        ] {
            let json = format!(r#"{{"id":"p","status":"RECEIVED","value":1,"billingType":"{wire}"}}"#);
            let payment: Payment = serde_json::from_str(&json).unwrap();
            assert_eq!(payment.billing_type, Some(expected));
            assert_eq!(expected.offered(), None);
        }
        assert_eq!(
            ChargeBillingType::from(BillingType::CreditCard).offered(),
            Some(BillingType::CreditCard)
        );
    }

    #[test]
    fn test_payment_page_with_link_charge_parses() {
        let json = r#"{
            "object": "list",
            "hasMore": false,
            "totalCount": 2,
            "data": [
                {"id": "pay_1", "status": "PENDING", "value": 149.9, "billingType": "PIX"},
                {"id": "pay_2", "status": "PENDING", "value": 99.9, "billingType": "UNDEFINED"}
            ]
        }"#;
        let page: ListResponse<Payment> = serde_json::from_str(json).unwrap();

        assert_eq!(page.data.len(), 2);
        assert_eq!(page.data[0].billing_type, Some(ChargeBillingType::Pix));
        assert_eq!(page.data[1].billing_type, Some(ChargeBillingType::Undefined));
    }

    #[test]
    fn test_unknown_payment_status_is_tolerated() {
        let payment: Payment =
            serde_json::from_str(r#"{"id":"p","status":"DUNNING_REQUESTED","value":1}"#).unwrap();
        assert_eq!(payment.status, PaymentStatus::Unknown);
        assert!(!payment.status.is_paid());
    }

    #[test]
    fn test_payment_filters_query() {
        let filters = PaymentFilters {
            customer: Some("cus_1".to_owned()),
            status: Some(PaymentStatus::ReceivedInCash),
            limit: Some(10),
            ..PaymentFilters::default()
        };
        assert_eq!(
            filters.to_query(),
            "customer=cus_1&status=RECEIVED_IN_CASH&limit=10"
        );
        assert_eq!(PaymentFilters::default().to_query(), "");
    }

    #[test]
    fn test_payment_link_defaults() {
        let link = PaymentLinkRequest::new("ERP", BillingType::Pix.into());
        let json = serde_json::to_value(&link).unwrap();
        assert_eq!(json["chargeType"], "DETACHED");
        assert_eq!(json["billingType"], "PIX");
        assert_eq!(json["notificationEnabled"], true);
        assert!(json.get("value").is_none());
    }

    #[test]
    fn test_error_body_message_preference() {
        let body: ErrorBody = serde_json::from_str(
            r#"{"errors":[{"code":"invalid_customer","description":"Cliente inválido"}]}"#,
        )
        .unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Cliente inválido"));

        let body: ErrorBody = serde_json::from_str(r#"{"message":"Unauthorized"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Unauthorized"));

        assert!(ErrorBody::default().into_message().is_none());
    }
}
