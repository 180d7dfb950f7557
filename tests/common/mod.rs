#![allow(dead_code)]

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use invoice_store::{Database, NewInvoice, NewLineItem};
use std::str::FromStr;
use tempfile::TempDir;

/// Opens a fresh database inside a temporary directory.
///
/// The directory must outlive the database handle.
pub async fn open_temp_db() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("invoices.db")).await.unwrap();
    (dir, db)
}

pub fn price(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).unwrap()
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn item(name: &str, quantity: u32, unit_price: &str) -> NewLineItem {
    NewLineItem::new(name, quantity, price(unit_price))
}

pub fn invoice(customer: &str, on: NaiveDate, items: Vec<NewLineItem>) -> NewInvoice {
    items
        .into_iter()
        .fold(NewInvoice::new(customer).with_date(on), NewInvoice::with_item)
}
