use bigdecimal::BigDecimal;
use serde::Serialize;

use crate::error::{Result, StoreError};

/// A priced entry attached to exactly one invoice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    pub id: i64,
    pub invoice_id: i64,
    pub name: String,
    pub quantity: u32,
    pub unit_price: BigDecimal,
}

impl LineItem {
    /// `quantity × unit_price`, computed on every call.
    pub fn subtotal(&self) -> BigDecimal {
        subtotal(self.quantity, &self.unit_price)
    }
}

/// Line item values supplied by callers; the store assigns `id` and `invoice_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLineItem {
    pub name: String,
    pub quantity: u32,
    pub unit_price: BigDecimal,
}

impl NewLineItem {
    pub fn new(name: impl Into<String>, quantity: u32, unit_price: BigDecimal) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit_price,
        }
    }

    pub fn subtotal(&self) -> BigDecimal {
        subtotal(self.quantity, &self.unit_price)
    }

    pub fn validate(&self) -> Result<()> {
        validate_quantity(self.quantity)
    }
}

pub(crate) fn validate_quantity(quantity: u32) -> Result<()> {
    if quantity < 1 {
        return Err(StoreError::Validation(
            "quantity must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn subtotal(quantity: u32, unit_price: &BigDecimal) -> BigDecimal {
    unit_price.clone() * BigDecimal::from(quantity)
}
