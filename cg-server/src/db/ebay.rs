//! eBay order queries

use cg_common::Result;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::models::ebay::{
    EbayOrder, EbayOrderItem, EbayOrderListItem, OrderQuery, OrderTotals, SourceTotal, DEFAULT_SOURCE,
};
use crate::pagination::PageRequest;

const ORDER_COLUMNS: &str = r#"
    o.ebay_order_id, o.order_number, o.order_date, o.seller_buyer_name,
    o.transaction_type, o.status, o.source,
    ROUND(o.subtotal, 2) AS subtotal,
    ROUND(o.shipping_cost, 2) AS shipping_cost,
    ROUND(o.sales_tax, 2) AS sales_tax,
    ROUND(o.total_amount, 2) AS total_amount,
    o.reported_item_count, o.delivery_date, o.email_subject, o.notes, o.created_at
"#;

const SORT_COLUMNS: &[(&str, &str)] = &[
    ("order_date", "o.order_date"),
    ("order_number", "o.order_number"),
    ("seller_buyer_name", "o.seller_buyer_name"),
    ("transaction_type", "o.transaction_type"),
    ("status", "o.status"),
    ("total_amount", "o.total_amount"),
    ("item_count", "item_count"),
];

fn push_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, query: &'a OrderQuery) {
    let present = |v: &'a Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty());

    if let Some(from) = present(&query.date_from) {
        qb.push(" AND o.order_date >= ").push_bind(format!("{} 00:00:00", from));
    }
    if let Some(to) = present(&query.date_to) {
        qb.push(" AND o.order_date <= ").push_bind(format!("{} 23:59:59", to));
    }
    if let Some(txn_type) = present(&query.transaction_type) {
        qb.push(" AND o.transaction_type = ").push_bind(txn_type);
    }
    if let Some(status) = present(&query.status) {
        qb.push(" AND o.status = ").push_bind(status);
    }
    if let Some(source) = present(&query.source) {
        qb.push(" AND COALESCE(o.source, ")
            .push_bind(DEFAULT_SOURCE)
            .push(") = ")
            .push_bind(source);
    }
    if let Some(search) = present(&query.search) {
        let pattern = format!("%{}%", search);
        qb.push(" AND (o.order_number LIKE ").push_bind(pattern.clone());
        qb.push(" OR o.seller_buyer_name LIKE ").push_bind(pattern.clone());
        qb.push(" OR o.email_subject LIKE ").push_bind(pattern);
        qb.push(")");
    }
}

pub async fn list_orders(
    pool: &SqlitePool,
    query: &OrderQuery,
    page: &PageRequest,
) -> Result<(Vec<EbayOrderListItem>, i64)> {
    let mut count: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT COUNT(*) FROM ebay_orders o WHERE 1 = 1");
    push_filters(&mut count, query);
    let total: i64 = count.build_query_scalar::<i64>().fetch_one(pool).await?;

    let sort = query
        .sort
        .as_deref()
        .and_then(|s| SORT_COLUMNS.iter().find(|(name, _)| *name == s))
        .map(|(_, column)| *column)
        .unwrap_or("o.order_date");
    let direction = match query.order.as_deref().map(str::to_ascii_uppercase).as_deref() {
        Some("ASC") => "ASC",
        _ => "DESC",
    };

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT ");
    qb.push(ORDER_COLUMNS).push(
        r#",
        (SELECT COUNT(*) FROM ebay_order_items i WHERE i.ebay_order_id = o.ebay_order_id) AS item_count
        FROM ebay_orders o WHERE 1 = 1"#,
    );
    push_filters(&mut qb, query);
    qb.push(format!(" ORDER BY {} {}, o.ebay_order_id DESC", sort, direction));
    qb.push(" LIMIT ").push_bind(page.per_page);
    qb.push(" OFFSET ").push_bind(page.offset);

    let rows = qb
        .build_query_as::<EbayOrderListItem>()
        .fetch_all(pool)
        .await?;

    Ok((rows, total))
}

pub async fn get_order(pool: &SqlitePool, ebay_order_id: i64) -> Result<Option<EbayOrder>> {
    let sql = format!(
        "SELECT {} FROM ebay_orders o WHERE o.ebay_order_id = ?",
        ORDER_COLUMNS
    );
    let row = sqlx::query_as::<_, EbayOrder>(&sql)
        .bind(ebay_order_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn order_items(pool: &SqlitePool, ebay_order_id: i64) -> Result<Vec<EbayOrderItem>> {
    let rows = sqlx::query_as::<_, EbayOrderItem>(
        r#"
        SELECT ebay_item_id, ebay_order_id, item_title, item_price, quantity, ebay_item_number
        FROM ebay_order_items WHERE ebay_order_id = ?
        ORDER BY ebay_item_id
        "#,
    )
    .bind(ebay_order_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Resolved order changes; `None` keeps the stored value
#[derive(Debug, Default)]
pub struct OrderChanges<'a> {
    pub status: Option<&'a str>,
    pub transaction_type: Option<&'a str>,
    pub notes: Option<Option<&'a str>>,
}

pub async fn update_order(pool: &SqlitePool, ebay_order_id: i64, changes: &OrderChanges<'_>) -> Result<bool> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE ebay_orders SET ");
    let mut set = qb.separated(", ");

    if let Some(status) = changes.status {
        set.push("status = ").push_bind_unseparated(status.to_string());
    }
    if let Some(txn_type) = changes.transaction_type {
        set.push("transaction_type = ").push_bind_unseparated(txn_type.to_string());
    }
    if let Some(notes) = changes.notes {
        set.push("notes = ").push_bind_unseparated(notes.map(str::to_string));
    }

    qb.push(" WHERE ebay_order_id = ").push_bind(ebay_order_id);
    let result = qb.build().execute(pool).await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_order(pool: &SqlitePool, ebay_order_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM ebay_orders WHERE ebay_order_id = ?")
        .bind(ebay_order_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Spend, item and seller totals
///
/// Confirmation emails list at most ten items, so `total_items` prefers the
/// reported count over the stored rows.
pub async fn order_totals(pool: &SqlitePool) -> Result<OrderTotals> {
    let totals = sqlx::query_as::<_, OrderTotals>(
        r#"
        SELECT COUNT(*) AS total_orders,
               ROUND(COALESCE(SUM(o.total_amount), 0.0), 2) AS total_spent,
               ROUND(COALESCE(SUM(o.subtotal), 0.0), 2) AS total_subtotal,
               ROUND(COALESCE(SUM(o.shipping_cost), 0.0), 2) AS total_shipping,
               ROUND(COALESCE(SUM(o.sales_tax), 0.0), 2) AS total_tax,
               ROUND(COALESCE(AVG(o.total_amount), 0.0), 2) AS avg_order_total,
               COALESCE(SUM(COALESCE(o.reported_item_count,
                   (SELECT COUNT(*) FROM ebay_order_items i WHERE i.ebay_order_id = o.ebay_order_id))), 0)
                   AS total_items,
               (SELECT COUNT(*) FROM ebay_order_items) AS total_items_in_db,
               COUNT(DISTINCT o.seller_buyer_name) AS unique_sellers,
               COALESCE(SUM(o.status = 'Delivered'), 0) AS delivered_count
        FROM ebay_orders o
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(totals)
}

/// Order count and total per source
pub async fn source_totals(pool: &SqlitePool) -> Result<Vec<SourceTotal>> {
    let rows = sqlx::query_as::<_, SourceTotal>(
        r#"
        SELECT COALESCE(source, ?) AS source,
               COUNT(*) AS count,
               ROUND(COALESCE(SUM(total_amount), 0.0), 2) AS total
        FROM ebay_orders
        GROUP BY COALESCE(source, ?)
        ORDER BY source
        "#,
    )
    .bind(DEFAULT_SOURCE)
    .bind(DEFAULT_SOURCE)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
