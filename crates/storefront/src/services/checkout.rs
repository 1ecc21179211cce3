//! Checkout flow.
//!
//! Three steps: customer details, payment method, confirmation. Submitting
//! resolves the gateway customer, creates one charge for the cart total and
//! records a pending purchase for the logged-in user. The cart is cleared by
//! a background task once the grace period has passed, so the confirmation
//! can still show what was bought.

use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use quantofy_core::{BillingType, Price, PurchaseStatus};

use crate::asaas::{
    self, CardPayment, CustomerInput, GatewayError, Payment, PaymentGateway, PaymentRequest,
    PaymentStatus,
};
use crate::config::StorefrontConfig;
use crate::error::add_breadcrumb;
use crate::models::product::CartItem;
use crate::models::purchase::{NewPurchase, Purchase};
use crate::services::auth::{AuthService, Session};
use crate::services::cart::CartStore;

/// Shown when the charge could not be created.
pub const PAYMENT_FAILED_MESSAGE: &str = "Erro ao processar pagamento. Tente novamente.";

/// Where the buyer is in the checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckoutStep {
    #[default]
    CollectingInfo,
    SelectingPayment,
    Confirmed,
}

/// Errors raised by the checkout flow.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Required customer fields are blank.
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    /// The action is not available at the current step.
    #[error("cannot {action} while at step {step:?}")]
    InvalidStep {
        action: &'static str,
        step: CheckoutStep,
    },

    /// There is nothing to pay for.
    #[error("cart is empty")]
    EmptyCart,

    /// The gateway rejected or failed the charge.
    #[error("payment failed: {0}")]
    Gateway(#[from] GatewayError),
}

impl CheckoutError {
    /// Message shown to the buyer.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::MissingFields(_) => "Preencha todos os campos obrigatórios",
            Self::InvalidStep { .. } => "Etapa inválida. Reinicie a compra.",
            Self::EmptyCart => "Seu carrinho está vazio",
            Self::Gateway(_) => PAYMENT_FAILED_MESSAGE,
        }
    }
}

/// Buyer details collected in the first step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
    /// CPF or CNPJ.
    pub cpf_cnpj: String,
    pub mobile_phone: String,
    pub address: String,
    pub address_number: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl CustomerInfo {
    /// Required fields that are blank after trimming, in form order.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("name", &self.name),
            ("email", &self.email),
            ("cpfCnpj", &self.cpf_cnpj),
            ("mobilePhone", &self.mobile_phone),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect()
    }

    /// Gateway payload; blank optional fields are left out.
    #[must_use]
    pub fn to_customer_input(&self) -> CustomerInput {
        fn optional(value: &str) -> Option<String> {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_owned())
        }

        CustomerInput {
            name: self.name.trim().to_owned(),
            cpf_cnpj: self.cpf_cnpj.trim().to_owned(),
            email: self.email.trim().to_owned(),
            mobile_phone: self.mobile_phone.trim().to_owned(),
            address: optional(&self.address),
            address_number: optional(&self.address_number),
            city: optional(&self.city),
            state: optional(&self.state),
            postal_code: optional(&self.postal_code),
            ..CustomerInput::default()
        }
    }
}

/// Result of a successful submit.
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub payment: Payment,
    /// The recorded purchase; `None` for an anonymous buyer.
    pub purchase: Option<Purchase>,
}

impl Confirmation {
    /// Gateway charge ID.
    #[must_use]
    pub fn payment_id(&self) -> &str {
        &self.payment.id
    }

    /// Charge status at creation time.
    #[must_use]
    pub const fn status(&self) -> PaymentStatus {
        self.payment.status
    }

    /// Charged amount.
    #[must_use]
    pub const fn value(&self) -> Price {
        Price::new(self.payment.value)
    }

    /// PIX copy-and-paste code, for PIX charges.
    #[must_use]
    pub fn pix_payload(&self) -> Option<&str> {
        self.payment.pix_payload()
    }

    /// Bank slip URL, for boleto charges.
    #[must_use]
    pub fn boleto_url(&self) -> Option<&str> {
        self.payment.bank_slip_url.as_deref()
    }
}

/// Checkout state machine.
#[derive(Debug)]
pub struct CheckoutFlow {
    step: CheckoutStep,
    customer: CustomerInfo,
    billing_type: BillingType,
    card: Option<CardPayment>,
    confirmation: Option<Confirmation>,
    cart_clear: Option<JoinHandle<()>>,
    payment_due_days: u32,
    cart_clear_grace: Duration,
}

impl CheckoutFlow {
    /// A fresh checkout at the first step, paying by PIX.
    #[must_use]
    pub fn new(payment_due_days: u32, cart_clear_grace: Duration) -> Self {
        Self {
            step: CheckoutStep::default(),
            customer: CustomerInfo::default(),
            billing_type: BillingType::default(),
            card: None,
            confirmation: None,
            cart_clear: None,
            payment_due_days,
            cart_clear_grace,
        }
    }

    /// A fresh checkout using the configured due date and grace period.
    #[must_use]
    pub fn from_config(config: &StorefrontConfig) -> Self {
        Self::new(config.payment_due_days, config.cart_clear_grace)
    }

    /// Current step.
    #[must_use]
    pub const fn step(&self) -> CheckoutStep {
        self.step
    }

    /// Collected buyer details.
    #[must_use]
    pub const fn customer(&self) -> &CustomerInfo {
        &self.customer
    }

    /// Edit buyer details.
    pub fn customer_mut(&mut self) -> &mut CustomerInfo {
        &mut self.customer
    }

    /// Chosen payment method.
    #[must_use]
    pub const fn billing_type(&self) -> BillingType {
        self.billing_type
    }

    /// Choose the payment method.
    pub fn select_billing_type(&mut self, billing_type: BillingType) {
        self.billing_type = billing_type;
    }

    /// Attach card details, used when paying by credit card.
    pub fn set_card(&mut self, card: Option<CardPayment>) {
        self.card = card;
    }

    /// The confirmation, once submitted.
    #[must_use]
    pub const fn confirmation(&self) -> Option<&Confirmation> {
        self.confirmation.as_ref()
    }

    /// Move from customer details to payment selection.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::MissingFields` listing blank required fields,
    /// or `CheckoutError::InvalidStep` outside the first step.
    pub fn proceed(&mut self) -> Result<(), CheckoutError> {
        if self.step != CheckoutStep::CollectingInfo {
            return Err(CheckoutError::InvalidStep {
                action: "proceed",
                step: self.step,
            });
        }
        let missing = self.customer.missing_fields();
        if !missing.is_empty() {
            return Err(CheckoutError::MissingFields(missing));
        }
        self.step = CheckoutStep::SelectingPayment;
        Ok(())
    }

    /// Go back from payment selection to customer details.
    ///
    /// Returns `false` (and does nothing) from any other step.
    pub fn back(&mut self) -> bool {
        if self.step == CheckoutStep::SelectingPayment {
            self.step = CheckoutStep::CollectingInfo;
            true
        } else {
            false
        }
    }

    /// Close the checkout and reset every field.
    ///
    /// A pending cart clear keeps running.
    pub fn close(&mut self) {
        let payment_due_days = self.payment_due_days;
        let cart_clear_grace = self.cart_clear_grace;
        *self = Self::new(payment_due_days, cart_clear_grace);
    }

    /// Take the handle of the pending cart clear task, if any.
    pub fn take_cart_clear(&mut self) -> Option<JoinHandle<()>> {
        self.cart_clear.take()
    }

    /// Create the charge for the cart.
    ///
    /// On failure the flow stays at payment selection, nothing is recorded
    /// and the cart is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidStep` outside payment selection,
    /// `CheckoutError::EmptyCart` for an empty cart, and
    /// `CheckoutError::Gateway` if the gateway fails.
    #[instrument(skip_all, fields(billing_type = %self.billing_type.as_str()))]
    pub async fn submit<G: PaymentGateway>(
        &mut self,
        gateway: &G,
        cart: &CartStore,
        auth: &AuthService,
        session: &Session,
    ) -> Result<&Confirmation, CheckoutError> {
        if self.step != CheckoutStep::SelectingPayment {
            return Err(CheckoutError::InvalidStep {
                action: "submit",
                step: self.step,
            });
        }
        let items = cart.items();
        if items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        add_breadcrumb(
            "checkout",
            "Payment submitted",
            Some(&[("billing_type", self.billing_type.as_str())]),
        );

        let payment = match self.create_charge(gateway, &items).await {
            Ok(payment) => payment,
            Err(e) => {
                let event_id = sentry::capture_error(&e);
                error!(error = %e, sentry_event_id = %event_id, "Checkout payment failed");
                return Err(CheckoutError::Gateway(e));
            }
        };

        let purchase = if session.is_authenticated() {
            let total: Price = items.iter().map(CartItem::line_total).sum();
            let recorded = auth.add_purchase(
                session,
                NewPurchase {
                    items,
                    total,
                    status: PurchaseStatus::Pending,
                    payment_id: Some(payment.id.clone()),
                    billing_type: Some(self.billing_type),
                },
            );
            match recorded {
                Ok(purchase) => Some(purchase),
                Err(e) => {
                    warn!(error = %e, payment_id = %payment.id, "Purchase not recorded");
                    None
                }
            }
        } else {
            None
        };

        info!(
            payment_id = %payment.id,
            value = %payment.value,
            recorded = purchase.is_some(),
            "Checkout confirmed"
        );

        self.step = CheckoutStep::Confirmed;
        self.cart_clear = Some(spawn_cart_clear(cart.clone(), self.cart_clear_grace));
        Ok(self.confirmation.insert(Confirmation { payment, purchase }))
    }

    async fn create_charge<G: PaymentGateway>(
        &self,
        gateway: &G,
        items: &[CartItem],
    ) -> Result<Payment, GatewayError> {
        let customer = asaas::resolve_customer(gateway, &self.customer.to_customer_input()).await?;

        let now = Utc::now();
        let card = match self.billing_type {
            BillingType::CreditCard => self.card.clone(),
            BillingType::Pix | BillingType::Boleto => None,
        };
        let request = PaymentRequest::for_cart(
            &customer.id,
            self.billing_type,
            items,
            now.date_naive(),
            self.payment_due_days,
            now.timestamp_millis(),
            card,
        )?;

        gateway.create_payment(&request).await
    }
}

fn spawn_cart_clear(cart: CartStore, grace: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        cart.clear_cart();
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use quantofy_core::{Email, ProductId};

    use super::*;
    use crate::asaas::fake::FakeGateway;
    use crate::catalog;
    use crate::db::Storage;
    use crate::models::user::NewUser;

    const GRACE: Duration = Duration::from_millis(2000);

    fn flow() -> CheckoutFlow {
        let mut flow = CheckoutFlow::new(7, GRACE);
        *flow.customer_mut() = CustomerInfo {
            name: "Ana Souza".to_owned(),
            email: "ana@quantofy.com".to_owned(),
            cpf_cnpj: "12345678901".to_owned(),
            mobile_phone: "11988887777".to_owned(),
            ..CustomerInfo::default()
        };
        flow
    }

    fn cart_with_store_template() -> CartStore {
        let cart = CartStore::new();
        cart.add_to_cart(&catalog::by_id(ProductId::new(2)).unwrap());
        cart
    }

    fn auth() -> AuthService {
        AuthService::new(Storage::in_memory(), Duration::ZERO)
    }

    #[test]
    fn test_proceed_requires_fields() {
        let mut flow = flow();
        flow.customer_mut().cpf_cnpj = "   ".to_owned();
        flow.customer_mut().mobile_phone.clear();

        let err = flow.proceed().unwrap_err();

        assert!(matches!(err, CheckoutError::MissingFields(ref f) if f == &["cpfCnpj", "mobilePhone"]));
        assert_eq!(flow.step(), CheckoutStep::CollectingInfo);
    }

    #[test]
    fn test_back_and_close() {
        let mut flow = flow();
        assert!(!flow.back());

        flow.proceed().unwrap();
        flow.select_billing_type(BillingType::Boleto);
        assert!(flow.back());
        assert_eq!(flow.step(), CheckoutStep::CollectingInfo);

        flow.close();
        assert_eq!(flow.step(), CheckoutStep::CollectingInfo);
        assert_eq!(flow.customer(), &CustomerInfo::default());
        assert_eq!(flow.billing_type(), BillingType::Pix);
    }

    #[test]
    fn test_customer_input_drops_blank_optionals() {
        let mut info = flow().customer().clone();
        info.city = "  São Paulo ".to_owned();
        let input = info.to_customer_input();
        assert_eq!(input.city.as_deref(), Some("São Paulo"));
        assert!(input.postal_code.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_before_payment_step_is_rejected() {
        let gateway = FakeGateway::default();
        let mut flow = flow();
        let err = flow
            .submit(&gateway, &cart_with_store_template(), &auth(), &Session::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidStep { .. }));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_with_empty_cart() {
        let gateway = FakeGateway::default();
        let mut flow = flow();
        flow.proceed().unwrap();

        let err = flow
            .submit(&gateway, &CartStore::new(), &auth(), &Session::anonymous())
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::EmptyCart));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_submit_records_purchase_and_clears_cart_later() {
        let gateway = FakeGateway::default();
        let auth = auth();
        let mut session = Session::anonymous();
        auth.register(
            &mut session,
            NewUser {
                name: "Ana Souza".to_owned(),
                email: Email::parse("ana@quantofy.com").unwrap(),
                password: "segredo1".to_owned(),
                phone: "11988887777".to_owned(),
            },
        )
        .await
        .unwrap();
        let cart = cart_with_store_template();
        let mut flow = flow();
        flow.proceed().unwrap();

        let confirmation = flow
            .submit(&gateway, &cart, &auth, &session)
            .await
            .unwrap()
            .clone();

        assert_eq!(
            gateway.calls(),
            vec!["find_customers", "create_customer", "create_payment"]
        );
        assert_eq!(confirmation.payment_id(), "pay_123");
        assert_eq!(confirmation.value(), Price::from_cents(14990));
        assert_eq!(flow.step(), CheckoutStep::Confirmed);

        let purchases = auth.user_purchases(&session);
        assert_eq!(purchases.len(), 1);
        assert_eq!(purchases[0].status, PurchaseStatus::Pending);
        assert_eq!(purchases[0].payment_id.as_deref(), Some("pay_123"));
        assert_eq!(purchases[0].total, Price::from_cents(14990));

        assert!(!cart.is_empty());
        tokio::time::sleep(GRACE - Duration::from_millis(1)).await;
        assert!(!cart.is_empty());
        flow.take_cart_clear().unwrap().await.unwrap();
        assert!(cart.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_anonymous_submit_records_nothing() {
        let gateway = FakeGateway::default();
        let auth = auth();
        let mut flow = flow();
        flow.proceed().unwrap();

        let confirmation = flow
            .submit(&gateway, &cart_with_store_template(), &auth, &Session::anonymous())
            .await
            .unwrap();

        assert!(confirmation.purchase.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_submit_keeps_state() {
        let gateway = FakeGateway {
            fail_payment: true,
            ..FakeGateway::default()
        };
        let auth = auth();
        let cart = cart_with_store_template();
        let mut flow = flow();
        flow.proceed().unwrap();

        let err = flow
            .submit(&gateway, &cart, &auth, &Session::anonymous())
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), PAYMENT_FAILED_MESSAGE);
        assert_eq!(flow.step(), CheckoutStep::SelectingPayment);
        assert!(flow.confirmation().is_none());
        assert!(flow.take_cart_clear().is_none());
        assert_eq!(cart.total_items(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_due_date_fails_without_charging() {
        let gateway = FakeGateway::default();
        let cart = cart_with_store_template();
        let mut flow = flow();
        flow.payment_due_days = u32::MAX;
        flow.proceed().unwrap();

        let err = flow
            .submit(&gateway, &cart, &auth(), &Session::anonymous())
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::Gateway(GatewayError::InvalidRequest(_))));
        assert!(gateway.payments.lock().unwrap().is_empty());
        assert_eq!(flow.step(), CheckoutStep::SelectingPayment);
        assert_eq!(cart.total_items(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_card_details_sent_only_for_credit_card() {
        use crate::asaas::{CreditCard, CreditCardHolderInfo};

        let card = CardPayment {
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
                phone: "11988887777".to_owned(),
            },
        };
        let gateway = FakeGateway::default();

        for billing_type in [BillingType::Pix, BillingType::CreditCard] {
            let mut flow = flow();
            flow.set_card(Some(card.clone()));
            flow.select_billing_type(billing_type);
            flow.proceed().unwrap();
            flow.submit(&gateway, &cart_with_store_template(), &auth(), &Session::anonymous())
                .await
                .unwrap();
        }

        let payments = gateway.payments.lock().unwrap();
        assert_eq!(payments[0].billing_type, BillingType::Pix);
        assert!(payments[0].credit_card.is_none());
        assert_eq!(payments[1].billing_type, BillingType::CreditCard);
        assert_eq!(payments[1].credit_card.as_ref().unwrap().holder_name, "ANA SOUZA");
    }
}
