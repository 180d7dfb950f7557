mod migrations;
mod reports;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Connection, SqlitePool};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::models::{
    Invoice, LineItem, NewInvoice, NewLineItem, decode_stored_date, encode_date,
    validate_customer, validate_quantity,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_INVOICE: &str = "SELECT id, date, COALESCE(customer, '') AS customer FROM invoices";

const SELECT_LINE_ITEMS: &str = r#"
    SELECT
        id,
        invoiceId,
        COALESCE(name, '') AS name,
        COALESCE(quantity, 1) AS quantity,
        COALESCE(CAST(unitPrice AS TEXT), '0') AS unitPrice
    FROM line_items
    WHERE invoiceId = ?
    ORDER BY id ASC
"#;

#[derive(sqlx::FromRow)]
struct InvoiceRow {
    id: i64,
    date: Option<String>,
    customer: String,
}

impl InvoiceRow {
    fn decoded_date(&self) -> Result<NaiveDate> {
        decode_stored_date(self.date.as_deref().unwrap_or_default())
    }

    fn into_invoice(self, line_items: Vec<LineItem>) -> Result<Invoice> {
        Ok(Invoice {
            id: self.id,
            date: self.decoded_date()?,
            customer: self.customer,
            line_items,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LineItemRow {
    id: i64,
    #[sqlx(rename = "invoiceId")]
    invoice_id: i64,
    name: String,
    quantity: i64,
    #[sqlx(rename = "unitPrice")]
    unit_price: String,
}

impl TryFrom<LineItemRow> for LineItem {
    type Error = StoreError;

    fn try_from(row: LineItemRow) -> Result<Self> {
        let quantity = u32::try_from(row.quantity)
            .ok()
            .filter(|quantity| *quantity >= 1)
            .ok_or_else(|| StoreError::CorruptRecord {
                column: "quantity",
                value: row.quantity.to_string(),
            })?;
        let unit_price =
            BigDecimal::from_str(&row.unit_price).map_err(|_| StoreError::CorruptRecord {
                column: "unitPrice",
                value: row.unit_price.clone(),
            })?;

        Ok(Self {
            id: row.id,
            invoice_id: row.invoice_id,
            name: row.name,
            quantity,
            unit_price,
        })
    }
}

/// Handle to the invoice database.
///
/// Cloning is cheap; every clone shares the same connection pool and each
/// operation checks out its own connection or transaction.
#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
    path: PathBuf,
}

impl Database {
    /// Open the database described by `config`, creating and migrating it as needed
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let path = config.database_path()?;
        let db = Self::open_with(&path, config.max_connections).await?;
        Ok(db)
    }

    /// Open (or create) the database file at `path` with the default pool size
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path.as_ref(), Config::default().max_connections).await
    }

    async fn open_with(path: &Path, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        initialize(&options).await?;

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let db = Self {
            pool,
            path: path.to_path_buf(),
        };

        info!(path = %db.path.display(), "invoice database ready");
        Ok(db)
    }

    /// Get a reference to the connection pool
    pub fn get_pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Location of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // Invoice operations
    pub async fn create_invoice(&self, invoice: &NewInvoice) -> Result<i64> {
        invoice.validate()?;

        let mut tx = self.pool.begin().await?;

        let invoice_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO invoices (date, customer) VALUES (?, ?) RETURNING id",
        )
        .bind(encode_date(invoice.date))
        .bind(&invoice.customer)
        .fetch_one(&mut *tx)
        .await?;

        for item in &invoice.line_items {
            insert_line_item(&mut tx, invoice_id, item).await?;
        }

        tx.commit().await?;

        debug!(
            invoice_id,
            line_items = invoice.line_items.len(),
            "invoice created"
        );
        Ok(invoice_id)
    }

    /// All invoices, newest first, with their line items
    pub async fn list_invoices(&self) -> Result<Vec<Invoice>> {
        // One read transaction so headers and items come from the same snapshot
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query_as::<_, InvoiceRow>(&format!("{SELECT_INVOICE} ORDER BY id DESC"))
            .fetch_all(&mut *tx)
            .await?;

        let invoices = hydrate_all(&mut *tx, rows).await?;
        tx.commit().await?;
        Ok(invoices)
    }

    pub async fn get_invoice(&self, id: i64) -> Result<Option<Invoice>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, InvoiceRow>(&format!("{SELECT_INVOICE} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let invoice = match row {
            Some(row) => {
                let line_items = fetch_line_items(&mut *tx, row.id).await?;
                Some(row.into_invoice(line_items)?)
            }
            None => {
                debug!(invoice_id = id, "invoice not found");
                None
            }
        };

        tx.commit().await?;
        Ok(invoice)
    }

    pub async fn update_invoice_header(
        &self,
        id: i64,
        date: NaiveDate,
        customer: &str,
    ) -> Result<()> {
        validate_customer(customer)?;

        let result = sqlx::query("UPDATE invoices SET date = ?, customer = ? WHERE id = ?")
            .bind(encode_date(date))
            .bind(customer)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            warn!(invoice_id = id, "header update matched no invoice");
            return Err(StoreError::NotFound {
                entity: "invoice",
                id,
            });
        }

        debug!(invoice_id = id, "invoice header updated");
        Ok(())
    }

    /// Delete an invoice and all of its line items in one transaction
    pub async fn delete_invoice(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Children first so no line item ever points at a missing invoice
        let items = sqlx::query("DELETE FROM line_items WHERE invoiceId = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let header = sqlx::query("DELETE FROM invoices WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if header.rows_affected() == 0 {
            // Dropping `tx` rolls back the line item delete
            warn!(invoice_id = id, "delete matched no invoice");
            return Err(StoreError::NotFound {
                entity: "invoice",
                id,
            });
        }

        tx.commit().await?;

        debug!(
            invoice_id = id,
            line_items = items.rows_affected(),
            "invoice deleted"
        );
        Ok(())
    }

    // Line item operations
    pub async fn get_line_items_by_invoice(&self, invoice_id: i64) -> Result<Vec<LineItem>> {
        let mut conn = self.pool.acquire().await?;
        fetch_line_items(&mut conn, invoice_id).await
    }

    pub async fn add_line_item(&self, invoice_id: i64, item: &NewLineItem) -> Result<i64> {
        item.validate()?;

        // Parent check and insert in one statement, so the write lock is taken up front
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO line_items (invoiceId, name, quantity, unitPrice)
            SELECT ?, ?, ?, ?
            WHERE EXISTS (SELECT 1 FROM invoices WHERE id = ?)
            RETURNING id
            "#,
        )
        .bind(invoice_id)
        .bind(&item.name)
        .bind(i64::from(item.quantity))
        .bind(item.unit_price.to_string())
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(id) = id else {
            warn!(invoice_id, "line item rejected, invoice missing");
            return Err(StoreError::Integrity(format!(
                "line item would reference missing invoice {invoice_id}"
            )));
        };

        debug!(invoice_id, line_item_id = id, "line item added");
        Ok(id)
    }

    pub async fn update_line_item(
        &self,
        id: i64,
        name: &str,
        quantity: u32,
        unit_price: &BigDecimal,
    ) -> Result<()> {
        validate_quantity(quantity)?;

        let result = sqlx::query(
            "UPDATE line_items SET name = ?, quantity = ?, unitPrice = ? WHERE id = ?",
        )
        .bind(name)
        .bind(i64::from(quantity))
        .bind(unit_price.to_string())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!(line_item_id = id, "update matched no line item");
            return Err(StoreError::NotFound {
                entity: "line item",
                id,
            });
        }

        debug!(line_item_id = id, "line item updated");
        Ok(())
    }

    pub async fn remove_line_item(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM line_items WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            warn!(line_item_id = id, "remove matched no line item");
            return Err(StoreError::NotFound {
                entity: "line item",
                id,
            });
        }

        debug!(line_item_id = id, "line item removed");
        Ok(())
    }
}

/// Idempotent schema setup, run once per `open` before the pool exists.
///
/// Uses its own connection and `BEGIN IMMEDIATE`, so concurrent openers queue
/// on the busy timeout instead of failing a read-to-write upgrade.
async fn initialize(options: &SqliteConnectOptions) -> Result<()> {
    let mut conn = SqliteConnection::connect_with(options).await?;

    sqlx::query("BEGIN IMMEDIATE").execute(&mut conn).await?;
    let applied = match migrations::apply(&mut conn).await {
        Ok(applied) => applied,
        Err(err) => {
            if let Err(rollback) = sqlx::query("ROLLBACK").execute(&mut conn).await {
                warn!(error = %rollback, "schema rollback failed");
            }
            return Err(err);
        }
    };
    sqlx::query("COMMIT").execute(&mut conn).await?;
    conn.close().await?;

    debug!(applied, "schema initialized");
    Ok(())
}

async fn insert_line_item(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    invoice_id: i64,
    item: &NewLineItem,
) -> Result<i64> {
    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO line_items (invoiceId, name, quantity, unitPrice)
        VALUES (?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(invoice_id)
    .bind(&item.name)
    .bind(i64::from(item.quantity))
    .bind(item.unit_price.to_string())
    .fetch_one(&mut **tx)
    .await?;

    Ok(id)
}

async fn fetch_line_items(conn: &mut SqliteConnection, invoice_id: i64) -> Result<Vec<LineItem>> {
    let rows = sqlx::query_as::<_, LineItemRow>(SELECT_LINE_ITEMS)
        .bind(invoice_id)
        .fetch_all(&mut *conn)
        .await?;

    rows.into_iter().map(LineItem::try_from).collect()
}

async fn hydrate_all(conn: &mut SqliteConnection, rows: Vec<InvoiceRow>) -> Result<Vec<Invoice>> {
    let mut invoices = Vec::with_capacity(rows.len());
    for row in rows {
        let line_items = fetch_line_items(conn, row.id).await?;
        invoices.push(row.into_invoice(line_items)?);
    }
    Ok(invoices)
}

/// Open the configured database
pub async fn init(config: &Config) -> anyhow::Result<Database> {
    Database::new(config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(quantity: i64, unit_price: &str) -> LineItemRow {
        LineItemRow {
            id: 1,
            invoice_id: 2,
            name: "Resma".to_string(),
            quantity,
            unit_price: unit_price.to_string(),
        }
    }

    #[test]
    fn legacy_real_price_text_decodes_exactly() {
        let item = LineItem::try_from(row(3, "19.99")).unwrap();
        assert_eq!(item.subtotal().to_string(), "59.97");
    }

    #[test]
    fn non_positive_quantity_is_corrupt() {
        let err = LineItem::try_from(row(0, "1.00")).unwrap_err();
        assert!(matches!(err, StoreError::CorruptRecord { column: "quantity", .. }));

        let err = LineItem::try_from(row(-4, "1.00")).unwrap_err();
        assert!(matches!(err, StoreError::CorruptRecord { column: "quantity", .. }));
    }

    #[test]
    fn non_decimal_price_is_corrupt() {
        let err = LineItem::try_from(row(1, "doce")).unwrap_err();
        assert!(matches!(err, StoreError::CorruptRecord { column: "unitPrice", .. }));
    }
}
