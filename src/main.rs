use anyhow::{Result, bail};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use invoice_store::models::{parse_date, parse_price};
use invoice_store::{Database, Invoice, LineItem, NewInvoice, NewLineItem, config};

/// Record invoices and their line items in a local database
#[derive(Parser)]
#[command(name = "invoice_store", version)]
struct Cli {
    /// Print records as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an invoice, optionally with line items
    Create {
        #[arg(long)]
        customer: String,
        /// Invoice date (YYYY-MM-DD), today when omitted
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
        /// Line item as NAME:QUANTITY:PRICE, repeatable
        #[arg(long = "item", value_parser = parse_item_arg)]
        items: Vec<NewLineItem>,
    },
    /// List all invoices, newest first
    List,
    /// Show one invoice
    Show { id: i64 },
    /// List the years that have invoices
    Years,
    /// List the invoices of one month
    Month { year: i32, month: u32 },
    /// Sum of invoice totals for one month
    Total { year: i32, month: u32 },
    /// Change an invoice's date and customer
    UpdateHeader {
        id: i64,
        #[arg(long, value_parser = parse_date_arg)]
        date: NaiveDate,
        #[arg(long)]
        customer: String,
    },
    /// Append a line item (NAME:QUANTITY:PRICE) to an invoice
    AddItem {
        invoice_id: i64,
        #[arg(value_parser = parse_item_arg)]
        item: NewLineItem,
    },
    /// Rewrite one line item (NAME:QUANTITY:PRICE)
    UpdateItem {
        id: i64,
        #[arg(value_parser = parse_item_arg)]
        item: NewLineItem,
    },
    /// Remove one line item
    RemoveItem { id: i64 },
    /// Delete an invoice and all of its line items
    Delete { id: i64 },
}

/// JSON shape of an invoice: the stored record plus its derived total
#[derive(Serialize)]
struct InvoiceView<'a> {
    id: i64,
    date: NaiveDate,
    customer: &'a str,
    total: BigDecimal,
    line_items: Vec<LineItemView<'a>>,
}

#[derive(Serialize)]
struct LineItemView<'a> {
    #[serde(flatten)]
    item: &'a LineItem,
    subtotal: BigDecimal,
}

#[derive(Serialize)]
struct MonthTotal {
    year: i32,
    month: u32,
    total: BigDecimal,
}

impl<'a> From<&'a Invoice> for InvoiceView<'a> {
    fn from(invoice: &'a Invoice) -> Self {
        Self {
            id: invoice.id,
            date: invoice.date,
            customer: &invoice.customer,
            total: invoice.total(),
            line_items: invoice
                .line_items
                .iter()
                .map(|item| LineItemView {
                    item,
                    subtotal: item.subtotal(),
                })
                .collect(),
        }
    }
}

fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    parse_date(value).map_err(|err| err.to_string())
}

fn parse_item_arg(value: &str) -> Result<NewLineItem, String> {
    // Split from the right so item names may contain ':'
    let mut parts = value.rsplitn(3, ':');
    let (Some(price), Some(quantity), Some(name)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(format!("expected NAME:QUANTITY:PRICE, got `{value}`"));
    };

    let quantity = quantity
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid quantity `{quantity}`"))?;
    let unit_price = parse_price(price).map_err(|err| err.to_string())?;

    let item = NewLineItem::new(name.trim(), quantity, unit_price);
    item.validate().map_err(|err| err.to_string())?;
    Ok(item)
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = config::init()?;
    let db = invoice_store::db::init(&config).await?;

    let result = run(&db, cli.command, cli.json).await;
    db.close().await;
    result
}

async fn run(db: &Database, command: Command, as_json: bool) -> Result<()> {
    match command {
        Command::Create {
            customer,
            date,
            items,
        } => {
            let mut invoice = NewInvoice::new(customer);
            if let Some(date) = date {
                invoice = invoice.with_date(date);
            }
            invoice.line_items = items;

            let id = db.create_invoice(&invoice).await?;
            println!("Created invoice {id}");
        }
        Command::List => print_invoices(&db.list_invoices().await?, as_json)?,
        Command::Show { id } => match db.get_invoice(id).await? {
            Some(invoice) => print_invoices(std::slice::from_ref(&invoice), as_json)?,
            None => bail!("invoice {id} not found"),
        },
        Command::Years => {
            let years = db.list_years_with_invoices().await?;
            if as_json {
                println!("{}", serde_json::to_string_pretty(&years)?);
            } else {
                for year in years {
                    println!("{year}");
                }
            }
        }
        Command::Month { year, month } => {
            print_invoices(&db.list_invoices_for_month(year, month).await?, as_json)?
        }
        Command::Total { year, month } => {
            let total = db.total_for_month(year, month).await?;
            if as_json {
                let record = MonthTotal { year, month, total };
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                println!("{year}-{month:02}: {total}");
            }
        }
        Command::UpdateHeader { id, date, customer } => {
            db.update_invoice_header(id, date, &customer).await?;
            println!("Updated invoice {id}");
        }
        Command::AddItem { invoice_id, item } => {
            let id = db.add_line_item(invoice_id, &item).await?;
            println!("Added line item {id} to invoice {invoice_id}");
        }
        Command::UpdateItem { id, item } => {
            db.update_line_item(id, &item.name, item.quantity, &item.unit_price)
                .await?;
            println!("Updated line item {id}");
        }
        Command::RemoveItem { id } => {
            db.remove_line_item(id).await?;
            println!("Removed line item {id}");
        }
        Command::Delete { id } => {
            db.delete_invoice(id).await?;
            println!("Deleted invoice {id}");
        }
    }

    Ok(())
}

fn print_invoices(invoices: &[Invoice], as_json: bool) -> Result<()> {
    if as_json {
        let records: Vec<_> = invoices.iter().map(InvoiceView::from).collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    for invoice in invoices {
        println!(
            "#{:<5} {}  {:<30} {:>12}",
            invoice.id,
            invoice.date,
            invoice.customer,
            invoice.total().to_string()
        );
        for item in &invoice.line_items {
            println!(
                "       [{}] {:<28} {:>4} x {:>10} = {:>12}",
                item.id,
                item.name,
                item.quantity,
                item.unit_price.to_string(),
                item.subtotal().to_string()
            );
        }
    }

    Ok(())
}
