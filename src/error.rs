use thiserror::Error;

/// Failures reported by the invoice store.
///
/// Reads report a missing record as `Ok(None)`; `NotFound` is only returned
/// when a mutation addresses a record that does not exist.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] sqlx::Error),

    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("corrupt value `{value}` in column {column}")]
    CorruptRecord { column: &'static str, value: String },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                Self::Integrity(db_err.message().to_string())
            }
            _ => Self::StoreUnavailable(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
