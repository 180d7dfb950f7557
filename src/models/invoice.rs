use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use super::{LineItem, NewLineItem};
use crate::error::{Result, StoreError};

/// Storage format for invoice dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
// Older databases stored a full timestamp in the date column.
const LEGACY_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, PartialEq)]
pub struct Invoice {
    pub id: i64,
    pub date: NaiveDate,
    pub customer: String,
    pub line_items: Vec<LineItem>,
}

impl Invoice {
    /// Sum of the current line items' subtotals.
    pub fn total(&self) -> BigDecimal {
        sum_subtotals(self.line_items.iter().map(LineItem::subtotal))
    }
}

/// An invoice that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInvoice {
    pub date: NaiveDate,
    pub customer: String,
    pub line_items: Vec<NewLineItem>,
}

impl NewInvoice {
    /// Starts an invoice dated today with no line items.
    pub fn new(customer: impl Into<String>) -> Self {
        Self {
            date: chrono::Local::now().date_naive(),
            customer: customer.into(),
            line_items: Vec::new(),
        }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    pub fn with_item(mut self, item: NewLineItem) -> Self {
        self.line_items.push(item);
        self
    }

    pub fn total(&self) -> BigDecimal {
        sum_subtotals(self.line_items.iter().map(NewLineItem::subtotal))
    }

    pub fn validate(&self) -> Result<()> {
        validate_customer(&self.customer)?;
        for item in &self.line_items {
            item.validate()?;
        }
        Ok(())
    }
}

pub(crate) fn validate_customer(customer: &str) -> Result<()> {
    if customer.trim().is_empty() {
        return Err(StoreError::Validation(
            "customer must not be empty".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn sum_subtotals(subtotals: impl Iterator<Item = BigDecimal>) -> BigDecimal {
    subtotals.fold(BigDecimal::default(), |acc, subtotal| acc + subtotal)
}

/// Parses a `YYYY-MM-DD` date supplied by a caller.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| StoreError::Validation(format!("invalid date `{value}`, expected YYYY-MM-DD")))
}

/// Decodes a persisted date, accepting the legacy timestamp form.
pub(crate) fn decode_stored_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(value, LEGACY_DATETIME_FORMAT)
                .map(|timestamp| timestamp.date())
        })
        .map_err(|_| StoreError::CorruptRecord {
            column: "date",
            value: value.to_string(),
        })
}

pub(crate) fn encode_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use std::str::FromStr;

    fn price(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    fn item(id: i64, quantity: u32, unit_price: &str) -> LineItem {
        LineItem {
            id,
            invoice_id: 7,
            name: format!("item {id}"),
            quantity,
            unit_price: price(unit_price),
        }
    }

    #[test]
    fn total_sums_subtotals_without_drift() {
        let invoice = Invoice {
            id: 7,
            date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            customer: "Ferretería López".to_string(),
            line_items: vec![item(1, 3, "19.99"), item(2, 1, "0.1"), item(3, 2, "0.2")],
        };

        assert_eq!(invoice.total(), price("60.47"));
    }

    #[test]
    fn empty_invoice_totals_zero() {
        let invoice = NewInvoice::new("Ana");
        assert_eq!(invoice.total(), BigDecimal::default());
    }

    #[test]
    fn blank_customer_is_rejected() {
        let invoice = NewInvoice::new("   ");
        assert!(matches!(invoice.validate(), Err(StoreError::Validation(_))));
    }

    #[test]
    fn invalid_item_fails_invoice_validation() {
        let invoice = NewInvoice::new("Ana").with_item(NewLineItem::new("Caja", 0, price("2")));
        assert!(matches!(invoice.validate(), Err(StoreError::Validation(_))));
    }

    #[test]
    fn stored_dates_accept_legacy_timestamps() {
        let expected = NaiveDate::from_ymd_opt(2023, 11, 30).unwrap();

        assert_eq!(decode_stored_date("2023-11-30").unwrap(), expected);
        assert_eq!(decode_stored_date("2023-11-30T18:45:02").unwrap(), expected);
        assert_eq!(decode_stored_date("2023-11-3").unwrap(), expected.with_day(3).unwrap());
    }

    #[test]
    fn malformed_stored_date_is_corrupt() {
        let err = decode_stored_date("30/11/2023").unwrap_err();
        assert!(matches!(err, StoreError::CorruptRecord { column: "date", .. }));
    }

    #[test]
    fn parse_date_rejects_garbage() {
        assert!(parse_date("2024-02-30").is_err());
        assert_eq!(
            parse_date("2024-02-29").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
    }
}
