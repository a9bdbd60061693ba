//! eBay order endpoints

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::info;

use crate::db::ebay::{self as ebay_db, OrderChanges};
use crate::models::ebay::{
    EbayOrder, EbayOrderItem, EbayOrderListItem, OrderQuery, OrderTotals, OrderUpdate, ORDER_STATUSES,
    TRANSACTION_TYPES,
};
use crate::pagination::{PageRequest, EBAY_PAGES};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct OrderPage {
    pub data: Vec<EbayOrderListItem>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    pub order: EbayOrder,
    pub items: Vec<EbayOrderItem>,
}

#[derive(Debug, Serialize)]
pub struct SourceBreakdown {
    pub count: i64,
    pub total: f64,
}

#[derive(Debug, Serialize)]
pub struct OrderSummary {
    #[serde(flatten)]
    pub totals: OrderTotals,
    pub sources: BTreeMap<String, SourceBreakdown>,
}

/// GET /api/ebay/orders handler
///
/// **Query:** `page`, `per_page` (10-100, default 50), `sort`, `order`,
/// `date_from`, `date_to`, `transaction_type`, `status`, `source`, `search`
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderQuery>,
) -> ApiResult<Json<OrderPage>> {
    let page = PageRequest::new(query.page, query.per_page, EBAY_PAGES);
    let (rows, total) = ebay_db::list_orders(&state.db, &query, &page).await?;

    Ok(Json(OrderPage {
        data: rows,
        total,
        page: page.page,
        per_page: page.per_page,
    }))
}

/// GET /api/ebay/orders/{id} handler
pub async fn get_order(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<OrderDetail>> {
    let order = ebay_db::get_order(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;
    let items = ebay_db::order_items(&state.db, id).await?;

    Ok(Json(OrderDetail { order, items }))
}

/// PUT /api/ebay/orders/{id} handler
///
/// **Request:** any of `status`, `transaction_type`, `notes`
/// **Response:** `{"message": "Order updated"}`
///
/// **Errors:**
/// - 400 Bad Request: unknown status or type, or nothing to update
/// - 404 Not Found
pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<OrderUpdate>,
) -> ApiResult<Json<Value>> {
    let status = body.status.as_deref().map(str::trim);
    if let Some(status) = status {
        if !ORDER_STATUSES.contains(&status) {
            return Err(ApiError::bad_request("Invalid status"));
        }
    }
    let transaction_type = body.transaction_type.as_deref().map(str::trim);
    if let Some(txn_type) = transaction_type {
        if !TRANSACTION_TYPES.contains(&txn_type) {
            return Err(ApiError::bad_request("Invalid transaction type"));
        }
    }

    let changes = OrderChanges {
        status,
        transaction_type,
        notes: body
            .notes
            .as_ref()
            .map(|n| n.as_deref().map(str::trim).filter(|n| !n.is_empty())),
    };
    if changes.status.is_none() && changes.transaction_type.is_none() && changes.notes.is_none() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    if !ebay_db::update_order(&state.db, id, &changes).await? {
        return Err(ApiError::not_found("Order not found"));
    }
    info!(ebay_order_id = id, "eBay order updated");

    Ok(Json(json!({ "message": "Order updated" })))
}

/// DELETE /api/ebay/orders/{id} handler
pub async fn delete_order(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    if !ebay_db::delete_order(&state.db, id).await? {
        return Err(ApiError::not_found("Order not found"));
    }
    Ok(Json(json!({ "message": "Order deleted" })))
}

/// GET /api/ebay/summary handler
///
/// **Response:** spend and item totals plus `sources` keyed by source name
pub async fn summary(State(state): State<AppState>) -> ApiResult<Json<OrderSummary>> {
    let totals = ebay_db::order_totals(&state.db).await?;
    let sources = ebay_db::source_totals(&state.db)
        .await?
        .into_iter()
        .map(|s| (s.source, SourceBreakdown { count: s.count, total: s.total }))
        .collect();

    Ok(Json(OrderSummary { totals, sources }))
}

/// Build eBay routes
pub fn ebay_routes() -> Router<AppState> {
    Router::new()
        .route("/api/ebay/orders", get(list_orders))
        .route(
            "/api/ebay/orders/:id",
            get(get_order).put(update_order).delete(delete_order),
        )
        .route("/api/ebay/summary", get(summary))
}
