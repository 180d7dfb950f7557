//! Time-bucketed reporting queries.

use bigdecimal::BigDecimal;
use std::collections::BTreeSet;
use chrono::{Datelike, NaiveDate};
use tracing::debug;

use super::{Database, InvoiceRow, SELECT_INVOICE, hydrate_all};
use crate::error::{Result, StoreError};
use crate::models::{Invoice, sum_subtotals};

impl Database {
    /// Distinct years that have at least one invoice, most recent first
    pub async fn list_years_with_invoices(&self) -> Result<Vec<i32>> {
        let rows = sqlx::query_as::<_, InvoiceRow>(SELECT_INVOICE)
            .fetch_all(&self.pool)
            .await?;

        // Decoded in Rust so a malformed date fails instead of yielding a bogus year
        let mut years = BTreeSet::new();
        for row in &rows {
            years.insert(row.decoded_date()?.year());
        }

        Ok(years.into_iter().rev().collect())
    }

    /// Invoices dated within `year`/`month`, oldest first, with their line items
    pub async fn list_invoices_for_month(&self, year: i32, month: u32) -> Result<Vec<Invoice>> {
        month_bounds(year, month)?;

        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query_as::<_, InvoiceRow>(SELECT_INVOICE)
            .fetch_all(&mut *tx)
            .await?;

        let mut matching = Vec::new();
        for row in rows {
            let date = row.decoded_date()?;
            if date.year() == year && date.month() == month {
                matching.push((date, row));
            }
        }
        matching.sort_by_key(|(date, row)| (*date, row.id));

        debug!(year, month, invoices = matching.len(), "monthly invoices loaded");
        let rows = matching.into_iter().map(|(_, row)| row).collect();
        let invoices = hydrate_all(&mut *tx, rows).await?;
        tx.commit().await?;
        Ok(invoices)
    }

    /// Sum of invoice totals for `year`/`month`; zero when the month is empty
    pub async fn total_for_month(&self, year: i32, month: u32) -> Result<BigDecimal> {
        let invoices = self.list_invoices_for_month(year, month).await?;
        Ok(sum_subtotals(invoices.iter().map(Invoice::total)))
    }
}

/// First day of the month and first day of the following month.
fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
        StoreError::Validation(format!("invalid month {year}-{month}, expected 1-12"))
    })?;

    let end = if start.month() == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| StoreError::Validation(format!("year {year} is out of range")))?;

    Ok((start, end))
}
