//! Schema bootstrap and column migrations.
//!
//! Tables are created with `IF NOT EXISTS`. Later changes are expressed as
//! column migrations: each one inspects `PRAGMA table_info` and runs only when
//! its column is missing or declared with an outdated type, so the routine is
//! safe on every startup and needs no version bookkeeping.
//!
//! The caller owns the surrounding transaction.

use sqlx::sqlite::SqliteConnection;
use sqlx::Row;
use tracing::info;

use crate::error::Result;

const CREATE_TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS invoices (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL,
        customer TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS line_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        invoiceId INTEGER NOT NULL REFERENCES invoices (id),
        name TEXT NOT NULL,
        quantity INTEGER NOT NULL DEFAULT 1,
        unitPrice TEXT NOT NULL
    )
    "#,
];

// Indexes reference migrated columns, so they are created last.
const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_line_items_invoice_id ON line_items (invoiceId)",
    "CREATE INDEX IF NOT EXISTS idx_invoices_date ON invoices (date)",
];

/// One column as reported by `pragma_table_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
}

#[derive(Debug, Clone, Copy)]
enum Pending {
    /// Column absent.
    Missing,
    /// Column present with a declared type other than this one.
    TypeOtherThan(&'static str),
}

#[derive(Debug, Clone, Copy)]
struct ColumnMigration {
    table: &'static str,
    column: &'static str,
    pending: Pending,
    statements: &'static [&'static str],
}

impl ColumnMigration {
    fn is_pending(&self, columns: &[ColumnInfo]) -> bool {
        let column = columns.iter().find(|info| info.name == self.column);
        match (self.pending, column) {
            (Pending::Missing, column) => column.is_none(),
            (Pending::TypeOtherThan(expected), Some(info)) => {
                !info.declared_type.eq_ignore_ascii_case(expected)
            }
            (Pending::TypeOtherThan(_), None) => false,
        }
    }
}

const MIGRATIONS: &[ColumnMigration] = &[
    ColumnMigration {
        table: "line_items",
        column: "quantity",
        pending: Pending::Missing,
        statements: &["ALTER TABLE line_items ADD COLUMN quantity INTEGER NOT NULL DEFAULT 1"],
    },
    // Older files declared the price REAL, which turns every decimal written
    // into a float. Rebuild the table with a TEXT price, keeping ids.
    ColumnMigration {
        table: "line_items",
        column: "unitPrice",
        pending: Pending::TypeOtherThan("TEXT"),
        statements: &[
            r#"
            CREATE TABLE line_items_rebuild (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                invoiceId INTEGER NOT NULL REFERENCES invoices (id),
                name TEXT NOT NULL,
                quantity INTEGER NOT NULL DEFAULT 1,
                unitPrice TEXT NOT NULL
            )
            "#,
            r#"
            INSERT INTO line_items_rebuild (id, invoiceId, name, quantity, unitPrice)
            SELECT
                id,
                invoiceId,
                COALESCE(name, ''),
                COALESCE(quantity, 1),
                COALESCE(CAST(unitPrice AS TEXT), '0')
            FROM line_items
            ORDER BY id
            "#,
            "DROP TABLE line_items",
            "ALTER TABLE line_items_rebuild RENAME TO line_items",
        ],
    },
];

/// Creates missing tables, applies pending column migrations and ensures indexes.
///
/// Returns the number of migrations applied.
pub async fn apply(conn: &mut SqliteConnection) -> Result<usize> {
    for statement in CREATE_TABLES {
        sqlx::query(statement).execute(&mut *conn).await?;
    }

    let mut applied = 0;
    for migration in MIGRATIONS {
        let columns = table_columns(conn, migration.table).await?;
        if !migration.is_pending(&columns) {
            continue;
        }

        info!(
            table = migration.table,
            column = migration.column,
            "migrating column"
        );
        for statement in migration.statements {
            sqlx::query(statement).execute(&mut *conn).await?;
        }
        applied += 1;
    }

    for statement in CREATE_INDEXES {
        sqlx::query(statement).execute(&mut *conn).await?;
    }

    Ok(applied)
}

/// Lists the columns of `table` as SQLite currently sees them.
pub async fn table_columns(conn: &mut SqliteConnection, table: &str) -> Result<Vec<ColumnInfo>> {
    let rows = sqlx::query("SELECT name, type FROM pragma_table_info(?)")
        .bind(table)
        .fetch_all(&mut *conn)
        .await?;

    rows.iter()
        .map(|row| -> Result<ColumnInfo> {
            Ok(ColumnInfo {
                name: row.try_get("name")?,
                declared_type: row.try_get("type")?,
            })
        })
        .collect()
}
