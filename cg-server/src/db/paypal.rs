//! PayPal transactions and allocations

use cg_common::Result;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::models::paypal::{
    Allocation, AllocationDetail, AssignmentStatus, ChargeCategory, MonthSummary, SalesSource,
    SourceSummary, Transaction, TransactionListItem, TransactionQuery, TransactionSummary,
};
use crate::pagination::PageRequest;

const TRANSACTION_COLUMNS: &str = r#"
    t.pp_transaction_id, t.transaction_date, t.transaction_time, t.name, t.type,
    t.status, t.currency, t.amount, t.fees, t.net_amount, t.from_email, t.to_email,
    t.paypal_txn_id, t.item_title, t.order_number, t.charge_category, t.created_at
"#;

const ALLOCATION_COLUMNS: &str = r#"
    a.allocation_id, a.pp_transaction_id, a.sales_source, a.livestream_id,
    a.amount_allocated, a.notes, a.assigned_by, a.assigned_at, a.is_locked,
    a.locked_by, a.locked_at
"#;

/// Per-transaction allocation rollup joined as `a`
const ALLOCATION_ROLLUP: &str = r#"
    LEFT JOIN (
        SELECT pp_transaction_id,
               SUM(amount_allocated) AS allocated_amount,
               COUNT(*) AS allocation_count,
               SUM(is_locked) AS locked_count
        FROM paypal_allocations GROUP BY pp_transaction_id
    ) a ON a.pp_transaction_id = t.pp_transaction_id
"#;

/// Sortable columns by request name
const SORT_COLUMNS: &[(&str, &str)] = &[
    ("transaction_date", "t.transaction_date"),
    ("name", "t.name"),
    ("type", "t.type"),
    ("amount", "t.amount"),
    ("charge_category", "t.charge_category"),
    ("status", "t.status"),
    ("order_number", "t.order_number"),
    ("allocated_amount", "allocated_amount"),
];

/// SQL condition selecting one assignment status (needs the rollup join)
fn assignment_condition(status: AssignmentStatus) -> &'static str {
    match status {
        AssignmentStatus::Unassigned => "COALESCE(a.allocation_count, 0) = 0",
        AssignmentStatus::Locked => "a.allocation_count > 0 AND a.locked_count = a.allocation_count",
        AssignmentStatus::Assigned => {
            "a.allocation_count > 0 AND a.locked_count < a.allocation_count \
             AND ABS(a.allocated_amount) >= ABS(t.amount) - 0.01"
        }
        AssignmentStatus::Partial => {
            "a.allocation_count > 0 AND a.locked_count < a.allocation_count \
             AND ABS(a.allocated_amount) < ABS(t.amount) - 0.01"
        }
    }
}

/// Fields of a transaction to insert, already classified
#[derive(Debug, Clone)]
pub struct TransactionInsert {
    pub transaction_date: String,
    pub transaction_time: Option<String>,
    pub name: Option<String>,
    pub txn_type: String,
    pub status: Option<String>,
    pub currency: String,
    pub amount: f64,
    pub fees: f64,
    pub net_amount: Option<f64>,
    pub from_email: Option<String>,
    pub to_email: Option<String>,
    pub paypal_txn_id: Option<String>,
    pub item_title: Option<String>,
    pub order_number: Option<String>,
    pub charge_category: ChargeCategory,
}

pub async fn insert_transaction(pool: &SqlitePool, txn: &TransactionInsert) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO paypal_transactions (
            transaction_date, transaction_time, name, type, status, currency, amount,
            fees, net_amount, from_email, to_email, paypal_txn_id, item_title,
            order_number, charge_category
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&txn.transaction_date)
    .bind(&txn.transaction_time)
    .bind(&txn.name)
    .bind(&txn.txn_type)
    .bind(&txn.status)
    .bind(&txn.currency)
    .bind(txn.amount)
    .bind(txn.fees)
    .bind(txn.net_amount)
    .bind(&txn.from_email)
    .bind(&txn.to_email)
    .bind(&txn.paypal_txn_id)
    .bind(&txn.item_title)
    .bind(&txn.order_number)
    .bind(txn.charge_category)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn paypal_txn_id_exists(pool: &SqlitePool, paypal_txn_id: &str) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT pp_transaction_id FROM paypal_transactions WHERE paypal_txn_id = ?",
    )
    .bind(paypal_txn_id)
    .fetch_optional(pool)
    .await?;

    Ok(found.is_some())
}

pub async fn get_transaction(pool: &SqlitePool, id: i64) -> Result<Option<Transaction>> {
    let sql = format!(
        "SELECT {} FROM paypal_transactions t WHERE t.pp_transaction_id = ?",
        TRANSACTION_COLUMNS
    );
    let row = sqlx::query_as::<_, Transaction>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn delete_transaction(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM paypal_transactions WHERE pp_transaction_id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

fn push_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, query: &'a TransactionQuery) {
    let present = |v: &'a Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty());

    if let Some(from) = present(&query.date_from) {
        qb.push(" AND t.transaction_date >= ").push_bind(from);
    }
    if let Some(to) = present(&query.date_to) {
        qb.push(" AND t.transaction_date <= ").push_bind(to);
    }
    if let Some(name) = present(&query.name) {
        qb.push(" AND t.name LIKE ").push_bind(format!("%{}%", name));
    }
    if let Some(txn_type) = present(&query.txn_type) {
        qb.push(" AND t.type = ").push_bind(txn_type);
    }
    if let Some(category) = present(&query.charge_category) {
        qb.push(" AND t.charge_category = ").push_bind(category);
    }
    if let Some(search) = present(&query.search) {
        let pattern = format!("%{}%", search);
        qb.push(" AND (t.name LIKE ").push_bind(pattern.clone());
        qb.push(" OR t.item_title LIKE ").push_bind(pattern.clone());
        qb.push(" OR t.order_number LIKE ").push_bind(pattern.clone());
        qb.push(" OR t.from_email LIKE ").push_bind(pattern.clone());
        qb.push(" OR t.paypal_txn_id LIKE ").push_bind(pattern);
        qb.push(")");
    }
    if let Some(status) = present(&query.assignment_status).and_then(AssignmentStatus::parse) {
        qb.push(" AND (").push(assignment_condition(status)).push(")");
    }
}

/// One page of transactions with allocation rollups
pub async fn list_transactions(
    pool: &SqlitePool,
    query: &TransactionQuery,
    page: &PageRequest,
) -> Result<(Vec<TransactionListItem>, i64)> {
    let mut count: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM paypal_transactions t ");
    count.push(ALLOCATION_ROLLUP).push(" WHERE 1 = 1");
    push_filters(&mut count, query);
    let total: i64 = count.build_query_scalar::<i64>().fetch_one(pool).await?;

    let sort = query
        .sort
        .as_deref()
        .and_then(|s| SORT_COLUMNS.iter().find(|(name, _)| *name == s))
        .map(|(_, column)| *column)
        .unwrap_or("t.transaction_date");
    let direction = match query.order.as_deref().map(str::to_ascii_uppercase).as_deref() {
        Some("ASC") => "ASC",
        _ => "DESC",
    };

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT ");
    qb.push(TRANSACTION_COLUMNS)
        .push(
            r#",
            COALESCE(a.allocated_amount, 0.0) AS allocated_amount,
            COALESCE(a.allocation_count, 0) AS allocation_count,
            COALESCE(a.locked_count, 0) AS locked_count
            FROM paypal_transactions t "#,
        )
        .push(ALLOCATION_ROLLUP)
        .push(" WHERE 1 = 1");
    push_filters(&mut qb, query);
    qb.push(format!(" ORDER BY {} {}, t.pp_transaction_id DESC", sort, direction));
    qb.push(" LIMIT ").push_bind(page.per_page);
    qb.push(" OFFSET ").push_bind(page.offset);

    let rows = qb
        .build_query_as::<TransactionListItem>()
        .fetch_all(pool)
        .await?;

    Ok((rows, total))
}

pub async fn allocations_for(pool: &SqlitePool, pp_transaction_id: i64) -> Result<Vec<AllocationDetail>> {
    let sql = format!(
        r#"
        SELECT {}, l.livestream_title
        FROM paypal_allocations a
        LEFT JOIN livestreams l ON l.livestream_id = a.livestream_id
        WHERE a.pp_transaction_id = ?
        ORDER BY a.assigned_at, a.allocation_id
        "#,
        ALLOCATION_COLUMNS
    );
    let rows = sqlx::query_as::<_, AllocationDetail>(&sql)
        .bind(pp_transaction_id)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

pub async fn get_allocation(pool: &SqlitePool, allocation_id: i64) -> Result<Option<Allocation>> {
    let sql = format!(
        "SELECT {} FROM paypal_allocations a WHERE a.allocation_id = ?",
        ALLOCATION_COLUMNS
    );
    let row = sqlx::query_as::<_, Allocation>(&sql)
        .bind(allocation_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Sum of a transaction's allocations, optionally leaving one out
pub async fn allocated_total(
    pool: &SqlitePool,
    pp_transaction_id: i64,
    excluding: Option<i64>,
) -> Result<f64> {
    let total: f64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(amount_allocated), 0.0) FROM paypal_allocations
        WHERE pp_transaction_id = ? AND (? IS NULL OR allocation_id != ?)
        "#,
    )
    .bind(pp_transaction_id)
    .bind(excluding)
    .bind(excluding)
    .fetch_one(pool)
    .await?;

    Ok(total)
}

pub async fn insert_allocation(
    pool: &SqlitePool,
    pp_transaction_id: i64,
    sales_source: SalesSource,
    livestream_id: Option<&str>,
    amount: f64,
    notes: Option<&str>,
    assigned_by: Option<i64>,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO paypal_allocations (
            pp_transaction_id, sales_source, livestream_id, amount_allocated, notes, assigned_by
        ) VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(pp_transaction_id)
    .bind(sales_source)
    .bind(livestream_id)
    .bind(amount)
    .bind(notes)
    .bind(assigned_by)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Resolved changes for one allocation; `None` keeps the stored value
#[derive(Debug, Default)]
pub struct AllocationChanges {
    pub sales_source: Option<SalesSource>,
    pub livestream_id: Option<Option<String>>,
    pub amount_allocated: Option<f64>,
    pub notes: Option<Option<String>>,
}

impl AllocationChanges {
    pub fn is_empty(&self) -> bool {
        self.sales_source.is_none()
            && self.livestream_id.is_none()
            && self.amount_allocated.is_none()
            && self.notes.is_none()
    }
}

pub async fn update_allocation(
    pool: &SqlitePool,
    allocation_id: i64,
    changes: &AllocationChanges,
) -> Result<()> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE paypal_allocations SET ");
    let mut set = qb.separated(", ");

    if let Some(source) = changes.sales_source {
        set.push("sales_source = ").push_bind_unseparated(source);
    }
    if let Some(livestream_id) = &changes.livestream_id {
        set.push("livestream_id = ").push_bind_unseparated(livestream_id.clone());
    }
    if let Some(amount) = changes.amount_allocated {
        set.push("amount_allocated = ").push_bind_unseparated(amount);
    }
    if let Some(notes) = &changes.notes {
        set.push("notes = ").push_bind_unseparated(notes.clone());
    }

    qb.push(" WHERE allocation_id = ").push_bind(allocation_id);
    qb.build().execute(pool).await?;

    Ok(())
}

pub async fn delete_allocation(pool: &SqlitePool, allocation_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM paypal_allocations WHERE allocation_id = ?")
        .bind(allocation_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Purchases with an order number and no allocations yet
pub async fn unassigned_order_purchases(pool: &SqlitePool) -> Result<Vec<Transaction>> {
    let sql = format!(
        r#"
        SELECT {} FROM paypal_transactions t
        WHERE t.charge_category = 'purchase'
          AND t.order_number IS NOT NULL AND t.order_number != ''
          AND NOT EXISTS (SELECT 1 FROM paypal_allocations a
                          WHERE a.pp_transaction_id = t.pp_transaction_id)
        ORDER BY t.transaction_date, t.pp_transaction_id
        "#,
        TRANSACTION_COLUMNS
    );
    let rows = sqlx::query_as::<_, Transaction>(&sql).fetch_all(pool).await?;

    Ok(rows)
}

/// Allocate each `(transaction, livestream, amount)` in full, in one transaction
pub async fn insert_auto_assignments(
    pool: &SqlitePool,
    assignments: &[(i64, Option<String>, f64)],
    assigned_by: Option<i64>,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    for (pp_transaction_id, livestream_id, amount) in assignments {
        sqlx::query(
            r#"
            INSERT INTO paypal_allocations (
                pp_transaction_id, sales_source, livestream_id, amount_allocated, notes, assigned_by
            ) VALUES (?, 'Auction', ?, ?, 'Auto-assigned by order number', ?)
            "#,
        )
        .bind(pp_transaction_id)
        .bind(livestream_id)
        .bind(amount)
        .bind(assigned_by)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Livestream of the first auction line item with this order id
///
/// `None` when no line item has the order id; `Some(None)` when it does but
/// is not attached to a livestream.
pub async fn livestream_for_order(pool: &SqlitePool, order_id: &str) -> Result<Option<Option<String>>> {
    let livestream: Option<Option<String>> = sqlx::query_scalar(
        r#"
        SELECT livestream_id FROM auction_line_items
        WHERE order_id = ?
        ORDER BY line_item_id LIMIT 1
        "#,
    )
    .bind(order_id)
    .fetch_optional(pool)
    .await?;

    Ok(livestream)
}

/// Lock every unlocked allocation of transactions dated within the range
pub async fn lock_range(
    pool: &SqlitePool,
    date_from: &str,
    date_to: &str,
    locked_by: Option<i64>,
    locked_at: &str,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE paypal_allocations SET is_locked = 1, locked_by = ?, locked_at = ?
        WHERE is_locked = 0 AND pp_transaction_id IN (
            SELECT pp_transaction_id FROM paypal_transactions
            WHERE transaction_date >= ? AND transaction_date <= ?
        )
        "#,
    )
    .bind(locked_by)
    .bind(locked_at)
    .bind(date_from)
    .bind(date_to)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn unlock_range(pool: &SqlitePool, date_from: &str, date_to: &str) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE paypal_allocations SET is_locked = 0, locked_by = NULL, locked_at = NULL
        WHERE is_locked = 1 AND pp_transaction_id IN (
            SELECT pp_transaction_id FROM paypal_transactions
            WHERE transaction_date >= ? AND transaction_date <= ?
        )
        "#,
    )
    .bind(date_from)
    .bind(date_to)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Totals over the (optional) date range
pub async fn summarize(
    pool: &SqlitePool,
    date_from: Option<&str>,
    date_to: Option<&str>,
) -> Result<TransactionSummary> {
    let sql = format!(
        r#"
        SELECT
            COUNT(*) AS total_transactions,
            COALESCE(SUM(t.charge_category = 'purchase'), 0) AS purchase_count,
            COALESCE(SUM(t.charge_category = 'refund'), 0) AS refund_count,
            COALESCE(SUM(t.charge_category = 'income'), 0) AS income_count,
            COALESCE(SUM(CASE WHEN t.amount < 0 THEN t.amount ELSE 0.0 END), 0.0) AS total_debits,
            COALESCE(SUM(CASE WHEN t.amount > 0 THEN t.amount ELSE 0.0 END), 0.0) AS total_credits,
            COALESCE(SUM(t.amount), 0.0) AS net_amount,
            COALESCE(SUM(t.charge_category IN ('purchase', 'refund', 'income')), 0) AS assignable_count,
            COALESCE(SUM(t.charge_category IN ('purchase', 'refund', 'income') AND ({unassigned})), 0) AS unassigned_count,
            COALESCE(SUM(t.charge_category IN ('purchase', 'refund', 'income') AND ({partial})), 0) AS partial_count,
            COALESCE(SUM(t.charge_category IN ('purchase', 'refund', 'income') AND ({assigned})), 0) AS assigned_count,
            COALESCE(SUM(t.charge_category IN ('purchase', 'refund', 'income') AND ({locked})), 0) AS locked_count,
            COALESCE(SUM(CASE WHEN t.charge_category IN ('purchase', 'refund', 'income') AND ({unassigned})
                              THEN t.amount ELSE 0.0 END), 0.0) AS unassigned_total,
            COALESCE(SUM(CASE WHEN t.charge_category IN ('purchase', 'refund', 'income') AND ({assigned})
                              THEN t.amount ELSE 0.0 END), 0.0) AS assigned_total,
            COALESCE(SUM(CASE WHEN t.charge_category IN ('purchase', 'refund', 'income') AND ({locked})
                              THEN t.amount ELSE 0.0 END), 0.0) AS locked_total
        FROM paypal_transactions t
        {rollup}
        WHERE (? IS NULL OR t.transaction_date >= ?) AND (? IS NULL OR t.transaction_date <= ?)
        "#,
        unassigned = assignment_condition(AssignmentStatus::Unassigned),
        partial = assignment_condition(AssignmentStatus::Partial),
        assigned = assignment_condition(AssignmentStatus::Assigned),
        locked = assignment_condition(AssignmentStatus::Locked),
        rollup = ALLOCATION_ROLLUP,
    );

    let summary = sqlx::query_as::<_, TransactionSummary>(&sql)
        .bind(date_from)
        .bind(date_from)
        .bind(date_to)
        .bind(date_to)
        .fetch_one(pool)
        .await?;

    Ok(summary)
}

pub async fn source_summary(pool: &SqlitePool) -> Result<Vec<SourceSummary>> {
    let rows = sqlx::query_as::<_, SourceSummary>(
        r#"
        SELECT sales_source,
               COUNT(*) AS allocation_count,
               COALESCE(SUM(amount_allocated), 0.0) AS total_allocated,
               COALESCE(SUM(is_locked), 0) AS locked_count
        FROM paypal_allocations
        GROUP BY sales_source
        ORDER BY sales_source
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Assignable transactions per month, newest 12 months
pub async fn month_summary(pool: &SqlitePool) -> Result<Vec<MonthSummary>> {
    let rows = sqlx::query_as::<_, MonthSummary>(
        r#"
        SELECT substr(t.transaction_date, 1, 7) AS month,
               COUNT(*) AS transaction_count,
               COALESCE(SUM(t.amount), 0.0) AS total_amount,
               COALESCE(SUM(EXISTS (SELECT 1 FROM paypal_allocations a
                                    WHERE a.pp_transaction_id = t.pp_transaction_id)), 0) AS assigned_count
        FROM paypal_transactions t
        WHERE t.charge_category IN ('purchase', 'refund', 'income')
        GROUP BY month
        ORDER BY month DESC
        LIMIT 12
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn distinct_types(pool: &SqlitePool) -> Result<Vec<String>> {
    let rows = sqlx::query_scalar("SELECT DISTINCT type FROM paypal_transactions ORDER BY type")
        .fetch_all(pool)
        .await?;

    Ok(rows)
}
