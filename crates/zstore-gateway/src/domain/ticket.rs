//! Ticket validation, channel naming and price formatting.

use super::error::TicketValidationError;
use super::types::{CreateTicketRequest, PlatformId, TransactionTicket};

/// Prefix on every ticket channel name.
pub const CHANNEL_PREFIX: &str = "🎫";

/// Platform limit on channel name length, in characters.
pub const MAX_CHANNEL_NAME: usize = 100;

impl TryFrom<CreateTicketRequest> for TransactionTicket {
    type Error = TicketValidationError;

    fn try_from(req: CreateTicketRequest) -> Result<Self, Self::Error> {
        let buyer_name = required("buyerName", req.buyer_name)?;
        let seller_id = required("sellerId", req.seller_id)?;
        let product_name = required("productName", req.product_name)?;
        let brand_name = required("brandName", req.brand_name)?;
        let method = required("method", req.method)?;

        let price = req.price.ok_or(TicketValidationError::Missing("price"))?;
        let price = u64::try_from(price).map_err(|_| TicketValidationError::NegativePrice(price))?;

        Ok(TransactionTicket {
            buyer_name,
            counterparty_id: PlatformId::parse(&seller_id)?,
            product_name,
            price,
            brand_name,
            method,
        })
    }
}

fn required(field: &'static str, value: Option<String>) -> Result<String, TicketValidationError> {
    let value = value.ok_or(TicketValidationError::Missing(field))?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TicketValidationError::Empty(field));
    }
    Ok(trimmed.to_string())
}

/// Build the channel name for a ticket: `🎫-{brand}-{buyer}`.
///
/// Whitespace runs become `-`, anything outside alphanumerics, `-` and `_` is
/// dropped, dashes collapse, and the result is capped at `MAX_CHANNEL_NAME`.
pub fn channel_name(brand_name: &str, buyer_name: &str) -> String {
    let parts: Vec<String> = [brand_name, buyer_name]
        .iter()
        .map(|p| sanitize_segment(p))
        .filter(|p| !p.is_empty())
        .collect();

    let body = if parts.is_empty() {
        "ticket".to_string()
    } else {
        parts.join("-")
    };

    format!("{}-{}", CHANNEL_PREFIX, body)
        .chars()
        .take(MAX_CHANNEL_NAME)
        .collect::<String>()
        .trim_end_matches('-')
        .to_string()
}

fn sanitize_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        let mapped = if c.is_whitespace() || c == '-' {
            '-'
        } else if c.is_alphanumeric() || c == '_' {
            c
        } else {
            continue;
        };
        if mapped == '-' && (out.is_empty() || out.ends_with('-')) {
            continue;
        }
        out.push(mapped);
    }
    out.trim_end_matches('-').to_string()
}

/// Format an amount in rupiah with id-ID digit grouping: `Rp 50.000`.
pub fn format_rupiah(amount: u64) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    format!("Rp {}", grouped)
}
