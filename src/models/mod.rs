mod invoice;
mod line_item;

pub use invoice::{DATE_FORMAT, Invoice, NewInvoice, parse_date};
pub use line_item::{LineItem, NewLineItem};

pub(crate) use invoice::{decode_stored_date, encode_date, sum_subtotals, validate_customer};
pub(crate) use line_item::validate_quantity;

use bigdecimal::BigDecimal;
use std::str::FromStr;

use crate::error::{Result, StoreError};

/// Parses a caller-supplied price as an exact decimal.
pub fn parse_price(value: &str) -> Result<BigDecimal> {
    BigDecimal::from_str(value.trim())
        .map_err(|_| StoreError::Validation(format!("invalid price `{value}`")))
}
