//! PayPal transaction and allocation endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use cg_common::time::{now_local, to_db};

use super::actor::Actor;
use crate::db::paypal::{self as paypal_db, AllocationChanges, TransactionInsert};
use crate::models::paypal::{
    AllocationDetail, AllocationUpdate, AssignmentStatus, DateRange, MonthSummary, NewAllocation,
    NewTransaction, SalesSource, SourceSummary, Transaction, TransactionListItem, TransactionQuery,
    TransactionSummary,
};
use crate::pagination::{PageRequest, TRANSACTION_PAGES};
use crate::services::allocation::{self, AllocationAction, AllocationError};
use crate::{ApiError, ApiResult, AppState};

impl From<AllocationError> for ApiError {
    fn from(err: AllocationError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionPage {
    pub data: Vec<TransactionListItem>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Debug, Serialize)]
pub struct TransactionDetail {
    pub transaction: Transaction,
    pub allocations: Vec<AllocationDetail>,
}

#[derive(Debug, Serialize)]
pub struct AssignmentSummary {
    pub by_source: Vec<SourceSummary>,
    pub by_month: Vec<MonthSummary>,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_source(value: &str) -> ApiResult<SalesSource> {
    SalesSource::parse(value.trim()).ok_or_else(|| AllocationError::InvalidSource.into())
}

async fn load_transaction(state: &AppState, id: i64) -> ApiResult<Transaction> {
    paypal_db::get_transaction(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Transaction not found"))
}

/// POST /api/paypal/transactions handler
///
/// Records one transaction, deriving its charge category from the type and
/// its order number from the item title.
///
/// **Request:** `{"transaction_date", "type", "amount", ...}`
/// **Response:** 201 `{"message": "Transaction recorded", "id", "charge_category", "order_number"}`
///
/// **Errors:**
/// - 400 Bad Request: missing date, type or amount
/// - 409 Conflict: the PayPal transaction id is already recorded
pub async fn create_transaction(
    State(state): State<AppState>,
    Json(body): Json<NewTransaction>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let transaction_date = trimmed(body.transaction_date)
        .ok_or_else(|| ApiError::bad_request("Missing required field: transaction_date"))?;
    let txn_type = trimmed(body.txn_type).ok_or_else(|| ApiError::bad_request("Missing required field: type"))?;
    let amount = body
        .amount
        .ok_or_else(|| ApiError::bad_request("Missing required field: amount"))?;

    let paypal_txn_id = trimmed(body.paypal_txn_id);
    if let Some(txn_id) = paypal_txn_id.as_deref() {
        if paypal_db::paypal_txn_id_exists(&state.db, txn_id).await? {
            return Err(ApiError::Conflict(format!("Transaction {} already recorded", txn_id)));
        }
    }

    let item_title = trimmed(body.item_title);
    let insert = TransactionInsert {
        charge_category: allocation::classify_type(&txn_type, amount),
        order_number: item_title.as_deref().and_then(allocation::extract_order_number),
        transaction_date,
        transaction_time: trimmed(body.transaction_time),
        name: trimmed(body.name),
        txn_type,
        status: trimmed(body.status),
        currency: trimmed(body.currency).unwrap_or_else(|| "USD".to_string()),
        amount,
        fees: body.fees.unwrap_or(0.0),
        net_amount: body.net_amount,
        from_email: trimmed(body.from_email),
        to_email: trimmed(body.to_email),
        paypal_txn_id,
        item_title,
    };

    let id = paypal_db::insert_transaction(&state.db, &insert).await?;
    info!(pp_transaction_id = id, category = insert.charge_category.as_str(), "PayPal transaction recorded");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Transaction recorded",
            "id": id,
            "charge_category": insert.charge_category,
            "order_number": insert.order_number,
        })),
    ))
}

/// GET /api/paypal/transactions handler
///
/// **Query:** `page`, `per_page` (1-100, default 50), `sort`, `order`,
/// `date_from`, `date_to`, `name`, `type`, `charge_category`, `search`,
/// `assignment_status`
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<TransactionQuery>,
) -> ApiResult<Json<TransactionPage>> {
    if let Some(status) = query.assignment_status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        if AssignmentStatus::parse(status).is_none() {
            return Err(ApiError::BadRequest(format!("Unknown assignment status: {}", status)));
        }
    }

    let page = PageRequest::new(query.page, query.per_page, TRANSACTION_PAGES);
    let (mut rows, total) = paypal_db::list_transactions(&state.db, &query, &page).await?;
    for row in &mut rows {
        row.assignment_status = Some(allocation::assignment_status(
            row.transaction.amount,
            row.allocated_amount,
            row.allocation_count,
            row.locked_count,
        ));
    }

    Ok(Json(TransactionPage {
        data: rows,
        total,
        page: page.page,
        per_page: page.per_page,
    }))
}

/// GET /api/paypal/transactions/{id} handler
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<TransactionDetail>> {
    let transaction = load_transaction(&state, id).await?;
    let allocations = paypal_db::allocations_for(&state.db, id).await?;

    Ok(Json(TransactionDetail { transaction, allocations }))
}

/// DELETE /api/paypal/transactions/{id} handler
///
/// Allocations go with the transaction.
pub async fn delete_transaction(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    if !paypal_db::delete_transaction(&state.db, id).await? {
        return Err(ApiError::not_found("Transaction not found"));
    }
    Ok(Json(json!({ "message": "Deleted" })))
}

/// POST /api/paypal/allocations handler
///
/// **Request:** `{"pp_transaction_id", "sales_source", "livestream_id", "amount_allocated", "notes"}`
/// **Response:** 201 `{"message": "Allocation created", "id"}`
///
/// **Errors:**
/// - 400 Bad Request: missing id or zero amount, unknown source, sign
///   mismatch, over-allocation
/// - 404 Not Found: unknown transaction
pub async fn create_allocation(
    State(state): State<AppState>,
    actor: Actor,
    Json(body): Json<NewAllocation>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let txn_id = body.pp_transaction_id.filter(|id| *id > 0);
    let requested = body.amount_allocated.filter(|a| *a != 0.0);
    let (Some(txn_id), Some(requested)) = (txn_id, requested) else {
        return Err(AllocationError::MissingFields.into());
    };
    let source = match body.sales_source.as_deref() {
        Some(s) => parse_source(s)?,
        None => SalesSource::Auction,
    };

    let txn = load_transaction(&state, txn_id).await?;
    let allocated = paypal_db::allocated_total(&state.db, txn_id, None).await?;
    let amount = allocation::check_amount(txn.amount, allocated, requested, AllocationAction::Create)?;

    let livestream_id = trimmed(body.livestream_id);
    let notes = trimmed(body.notes);
    let id = paypal_db::insert_allocation(
        &state.db,
        txn_id,
        source,
        livestream_id.as_deref(),
        amount,
        notes.as_deref(),
        actor.0,
    )
    .await?;
    info!(allocation_id = id, pp_transaction_id = txn_id, amount, source = source.as_str(), "Allocation created");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Allocation created", "id": id })),
    ))
}

/// PUT /api/paypal/allocations/{id} handler
///
/// **Request:** any of `sales_source`, `livestream_id`, `amount_allocated`, `notes`
/// **Response:** `{"message": "Allocation updated"}`
///
/// **Errors:**
/// - 404 Not Found
/// - 403 Forbidden: allocation is locked
/// - 400 Bad Request: nothing to update, or the new amount fails the checks
pub async fn update_allocation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<AllocationUpdate>,
) -> ApiResult<Json<Value>> {
    let alloc = paypal_db::get_allocation(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Allocation not found"))?;
    if alloc.is_locked {
        return Err(ApiError::Forbidden("Cannot edit a locked allocation".to_string()));
    }

    let mut changes = AllocationChanges {
        sales_source: body.sales_source.as_deref().map(parse_source).transpose()?,
        livestream_id: body.livestream_id.map(trimmed),
        amount_allocated: None,
        notes: body.notes.map(trimmed),
    };

    if let Some(requested) = body.amount_allocated {
        let txn = load_transaction(&state, alloc.pp_transaction_id).await?;
        let others = paypal_db::allocated_total(&state.db, alloc.pp_transaction_id, Some(id)).await?;
        changes.amount_allocated = Some(allocation::check_amount(
            txn.amount,
            others,
            requested,
            AllocationAction::Update,
        )?);
    }

    if changes.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }
    paypal_db::update_allocation(&state.db, id, &changes).await?;

    Ok(Json(json!({ "message": "Allocation updated" })))
}

/// DELETE /api/paypal/allocations/{id} handler
///
/// **Errors:**
/// - 404 Not Found
/// - 403 Forbidden: allocation is locked
pub async fn delete_allocation(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    let alloc = paypal_db::get_allocation(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Allocation not found"))?;
    if alloc.is_locked {
        return Err(ApiError::Forbidden("Cannot delete a locked allocation".to_string()));
    }

    paypal_db::delete_allocation(&state.db, id).await?;
    Ok(Json(json!({ "message": "Allocation deleted" })))
}

/// POST /api/paypal/auto-assign handler
///
/// Allocates each unassigned purchase with an order number in full to
/// Auction, linked to the livestream of the matching line item (if any).
///
/// **Response:** `{"matched", "unmatched", "message"}`
pub async fn auto_assign(State(state): State<AppState>, actor: Actor) -> ApiResult<Json<Value>> {
    let candidates = paypal_db::unassigned_order_purchases(&state.db).await?;
    if candidates.is_empty() {
        return Ok(Json(json!({
            "matched": 0,
            "unmatched": 0,
            "message": "No unassigned transactions with order numbers",
        })));
    }

    let mut assignments = Vec::new();
    for txn in &candidates {
        let Some(order) = txn.order_number.as_deref() else {
            continue;
        };
        if let Some(livestream_id) = paypal_db::livestream_for_order(&state.db, order).await? {
            assignments.push((txn.pp_transaction_id, livestream_id, txn.amount));
        }
    }
    paypal_db::insert_auto_assignments(&state.db, &assignments, actor.0).await?;

    let matched = assignments.len();
    let unmatched = candidates.len() - matched;
    info!(matched, unmatched, "Auto-assigned PayPal purchases");

    Ok(Json(json!({
        "matched": matched,
        "unmatched": unmatched,
        "message": format!("Matched {} of {} transactions", matched, candidates.len()),
    })))
}

/// POST /api/paypal/lock handler
///
/// **Request:** `{"date_from", "date_to"}` (inclusive transaction dates)
/// **Response:** `{"message", "locked_count"}`
pub async fn lock_allocations(
    State(state): State<AppState>,
    actor: Actor,
    Json(range): Json<DateRange>,
) -> ApiResult<Json<Value>> {
    let (from, to) = range
        .both()
        .ok_or_else(|| ApiError::bad_request("date_from and date_to are required"))?;

    let count = paypal_db::lock_range(&state.db, from, to, actor.0, &to_db(&now_local())).await?;
    info!(date_from = from, date_to = to, count, "Allocations locked");

    Ok(Json(json!({
        "message": format!("Locked {} allocations", count),
        "locked_count": count,
    })))
}

/// POST /api/paypal/unlock handler
///
/// **Request:** `{"date_from", "date_to"}`
/// **Response:** `{"message", "unlocked_count"}`
pub async fn unlock_allocations(
    State(state): State<AppState>,
    Json(range): Json<DateRange>,
) -> ApiResult<Json<Value>> {
    let (from, to) = range
        .both()
        .ok_or_else(|| ApiError::bad_request("date_from and date_to are required"))?;

    let count = paypal_db::unlock_range(&state.db, from, to).await?;
    info!(date_from = from, date_to = to, count, "Allocations unlocked");

    Ok(Json(json!({
        "message": format!("Unlocked {} allocations", count),
        "unlocked_count": count,
    })))
}

/// GET /api/paypal/summary handler
///
/// **Query:** optional `date_from`, `date_to`
pub async fn summary(
    State(state): State<AppState>,
    Query(range): Query<DateRange>,
) -> ApiResult<Json<TransactionSummary>> {
    let bound = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
    let from = bound(&range.date_from);
    let to = bound(&range.date_to);

    Ok(Json(
        paypal_db::summarize(&state.db, from.as_deref(), to.as_deref()).await?,
    ))
}

/// GET /api/paypal/assignments/summary handler
///
/// **Response:** totals by sales source and by month (latest 12 months)
pub async fn assignment_summary(State(state): State<AppState>) -> ApiResult<Json<AssignmentSummary>> {
    let by_source = paypal_db::source_summary(&state.db).await?;
    let by_month = paypal_db::month_summary(&state.db).await?;

    Ok(Json(AssignmentSummary { by_source, by_month }))
}

/// GET /api/paypal/types handler
pub async fn transaction_types(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let types = paypal_db::distinct_types(&state.db).await?;
    Ok(Json(json!({ "data": types })))
}

/// Build PayPal routes
pub fn paypal_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/paypal/transactions",
            get(list_transactions).post(create_transaction),
        )
        .route(
            "/api/paypal/transactions/:id",
            get(get_transaction).delete(delete_transaction),
        )
        .route("/api/paypal/allocations", post(create_allocation))
        .route(
            "/api/paypal/allocations/:id",
            put(update_allocation).delete(delete_allocation),
        )
        .route("/api/paypal/auto-assign", post(auto_assign))
        .route("/api/paypal/lock", post(lock_allocations))
        .route("/api/paypal/unlock", post(unlock_allocations))
        .route("/api/paypal/summary", get(summary))
        .route("/api/paypal/assignments/summary", get(assignment_summary))
        .route("/api/paypal/types", get(transaction_types))
}
