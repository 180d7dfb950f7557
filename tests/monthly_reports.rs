mod common;

use common::{date, invoice, item, open_temp_db, price};
use invoice_store::{Database, StoreError};

async fn seed(db: &Database) -> Vec<i64> {
    let fixtures = [
        invoice("Ana", date(2024, 3, 20), vec![item("a", 3, "19.99")]),
        invoice("Luis", date(2024, 3, 2), vec![item("b", 1, "0.10"), item("c", 1, "0.20")]),
        invoice("Marta", date(2024, 4, 1), vec![item("d", 1, "100")]),
        invoice("Pablo", date(2023, 3, 15), vec![item("e", 2, "5.50")]),
        invoice("Rosa", date(2024, 2, 29), vec![item("f", 1, "7")]),
        invoice("Sara", date(2022, 12, 31), vec![]),
    ];

    let mut ids = Vec::new();
    for fixture in &fixtures {
        ids.push(db.create_invoice(fixture).await.unwrap());
    }
    ids
}

#[tokio::test]
async fn month_listing_filters_by_year_and_month_ascending() {
    let (_dir, db) = open_temp_db().await;
    let ids = seed(&db).await;

    let march = db.list_invoices_for_month(2024, 3).await.unwrap();

    let listed: Vec<_> = march.iter().map(|i| i.id).collect();
    assert_eq!(listed, [ids[1], ids[0]]);
    assert!(march.iter().all(|i| i.date.format("%Y-%m").to_string() == "2024-03"));
    assert_eq!(march[0].line_items.len(), 2);
    assert_eq!(march[1].line_items.len(), 1);
}

#[tokio::test]
async fn month_total_sums_invoice_totals_exactly() {
    let (_dir, db) = open_temp_db().await;
    seed(&db).await;

    let march = db.list_invoices_for_month(2024, 3).await.unwrap();
    let total = db.total_for_month(2024, 3).await.unwrap();

    assert_eq!(total, price("60.27"));
    assert_eq!(total, march.iter().map(|i| i.total()).fold(price("0"), |a, b| a + b));
    assert_eq!(db.total_for_month(2022, 12).await.unwrap(), price("0"));
}

#[tokio::test]
async fn empty_month_has_no_invoices_and_zero_total() {
    let (_dir, db) = open_temp_db().await;
    seed(&db).await;

    assert!(db.list_invoices_for_month(2024, 7).await.unwrap().is_empty());
    assert_eq!(db.total_for_month(2024, 7).await.unwrap(), price("0"));
}

#[tokio::test]
async fn month_boundaries_are_exclusive_of_neighbours() {
    let (_dir, db) = open_temp_db().await;
    let ids = seed(&db).await;

    let february = db.list_invoices_for_month(2024, 2).await.unwrap();
    let april = db.list_invoices_for_month(2024, 4).await.unwrap();
    let december = db.list_invoices_for_month(2022, 12).await.unwrap();

    assert_eq!(february.iter().map(|i| i.id).collect::<Vec<_>>(), [ids[4]]);
    assert_eq!(april.iter().map(|i| i.id).collect::<Vec<_>>(), [ids[2]]);
    assert_eq!(december.iter().map(|i| i.id).collect::<Vec<_>>(), [ids[5]]);
}

#[tokio::test]
async fn invalid_month_is_a_validation_error() {
    let (_dir, db) = open_temp_db().await;

    assert!(matches!(
        db.list_invoices_for_month(2024, 13).await,
        Err(StoreError::Validation(_))
    ));
    assert!(matches!(
        db.total_for_month(2024, 0).await,
        Err(StoreError::Validation(_))
    ));
}

#[tokio::test]
async fn years_are_distinct_and_descending() {
    let (_dir, db) = open_temp_db().await;
    assert!(db.list_years_with_invoices().await.unwrap().is_empty());

    seed(&db).await;

    assert_eq!(db.list_years_with_invoices().await.unwrap(), [2024, 2023, 2022]);
}

#[tokio::test]
async fn deleted_invoice_drops_out_of_reports() {
    let (_dir, db) = open_temp_db().await;
    let ids = seed(&db).await;

    db.delete_invoice(ids[0]).await.unwrap();

    assert_eq!(db.total_for_month(2024, 3).await.unwrap(), price("0.30"));
    db.delete_invoice(ids[3]).await.unwrap();
    assert_eq!(db.list_years_with_invoices().await.unwrap(), [2024, 2022]);
}

#[tokio::test]
async fn unpadded_stored_date_is_listed_in_its_month() {
    let (_dir, db) = open_temp_db().await;
    let ids = seed(&db).await;

    let unpadded: i64 =
        sqlx::query_scalar("INSERT INTO invoices (date, customer) VALUES ('2024-3-5', 'Teresa') RETURNING id")
            .fetch_one(db.get_pool())
            .await
            .unwrap();

    let march = db.list_invoices_for_month(2024, 3).await.unwrap();

    assert_eq!(march.iter().map(|i| i.id).collect::<Vec<_>>(), [ids[1], unpadded, ids[0]]);
    assert_eq!(march[1].date, date(2024, 3, 5));
}

#[tokio::test]
async fn malformed_stored_date_fails_the_month_report() {
    let (_dir, db) = open_temp_db().await;
    seed(&db).await;

    sqlx::query("INSERT INTO invoices (date, customer) VALUES ('30/11/2023', 'Teresa')")
        .execute(db.get_pool())
        .await
        .unwrap();

    assert!(matches!(
        db.list_invoices_for_month(2024, 3).await,
        Err(StoreError::CorruptRecord { column: "date", .. })
    ));
    assert!(matches!(
        db.total_for_month(2024, 3).await,
        Err(StoreError::CorruptRecord { column: "date", .. })
    ));
}
