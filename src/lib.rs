//! Local invoice storage: invoices with line items kept in a SQLite file,
//! with exact decimal money and monthly reporting.

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::Config;
pub use db::Database;
pub use error::{Result, StoreError};
pub use models::{Invoice, LineItem, NewInvoice, NewLineItem};
