//! Gateway charge lookups and payment links.

use std::io::Write;

use quantofy_core::BillingType;
use quantofy_storefront::asaas::AsaasClient;
use quantofy_storefront::asaas::types::{
    LinkBillingType, Payment, PaymentFilters, PaymentLinkRequest, PaymentStatus,
};
use quantofy_storefront::{AppError, AppState};
use rust_decimal::Decimal;

use super::{CommandError, write_json};

/// Parse a status name such as `pending` or `RECEIVED`.
pub fn parse_status(s: &str) -> Result<PaymentStatus, CommandError> {
    let status: PaymentStatus =
        serde_json::from_value(serde_json::Value::String(s.to_uppercase()))?;
    if status == PaymentStatus::Unknown {
        return Err(CommandError::InvalidArgument(format!("payment status: {s}")));
    }
    Ok(status)
}

fn client(state: &AppState) -> Result<&AsaasClient, CommandError> {
    Ok(state.asaas().map_err(AppError::from)?)
}

fn write_payment(out: &mut impl Write, payment: &Payment) -> Result<(), CommandError> {
    writeln!(
        out,
        "{}\t{:?}\t{}\t{}\t{}",
        payment.id,
        payment.status,
        payment.value,
        payment
            .due_date
            .map_or_else(|| "-".to_owned(), |d| d.to_string()),
        payment.external_reference.as_deref().unwrap_or("-"),
    )?;
    Ok(())
}

/// Show one charge, with the local purchase it backs if any.
pub async fn get(state: &AppState, id: &str, out: &mut impl Write) -> Result<(), CommandError> {
    let payment = client(state)?
        .get_payment(id)
        .await
        .map_err(AppError::from)?;
    write_json(out, &payment)?;

    if let Some(purchase) = state.admin().find_purchase_by_payment(&payment.id) {
        writeln!(out, "Local purchase {} is {}", purchase.id, purchase.status)?;
    }
    Ok(())
}

/// List charges matching the filters.
pub async fn list(
    state: &AppState,
    filters: &PaymentFilters,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let page = client(state)?
        .list_payments(filters)
        .await
        .map_err(AppError::from)?;
    for payment in &page.data {
        write_payment(out, payment)?;
    }
    match page.total_count {
        Some(total) => writeln!(out, "{} of {total} charge(s)", page.data.len())?,
        None => writeln!(out, "{} charge(s)", page.data.len())?,
    }
    if page.has_more {
        writeln!(out, "More results available; use --offset")?;
    }
    Ok(())
}

/// Create a hosted payment link.
pub async fn link(
    state: &AppState,
    name: &str,
    value: Option<&str>,
    billing_type: Option<BillingType>,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let mut request = PaymentLinkRequest::new(
        name,
        billing_type.map_or(LinkBillingType::Undefined, LinkBillingType::from),
    );
    request.value = value
        .map(|v| {
            v.parse::<Decimal>()
                .map_err(|_| CommandError::InvalidArgument(format!("value: {v}")))
        })
        .transpose()?;

    let link = client(state)?
        .create_payment_link(&request)
        .await
        .map_err(AppError::from)?;
    tracing::info!(link_id = %link.id, "Payment link created");
    writeln!(out, "{}\t{}", link.id, link.url)?;
    Ok(())
}
