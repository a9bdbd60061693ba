//! PayPal transactions, allocations and reconciliation endpoints

mod helpers;

use axum::http::StatusCode;
use serde_json::{json, Value};
use sqlx::SqlitePool;

use helpers::{delete, get, post, put, test_app};

async fn record(app: &axum::Router, body: Value) -> i64 {
    let (status, body) = post(app, "/api/paypal/transactions", body).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_i64().unwrap()
}

async fn purchase(app: &axum::Router, date: &str, amount: f64, title: Option<&str>) -> i64 {
    record(
        app,
        json!({
            "transaction_date": date,
            "type": "Express Checkout Payment",
            "amount": amount,
            "name": "Card Shop LLC",
            "item_title": title,
        }),
    )
    .await
}

async fn allocate(app: &axum::Router, txn: i64, amount: f64) -> (StatusCode, Value) {
    post(
        app,
        "/api/paypal/allocations",
        json!({ "pp_transaction_id": txn, "amount_allocated": amount, "sales_source": "Auction" }),
    )
    .await
}

async fn seed_livestream(pool: &SqlitePool, livestream_id: &str, order_id: &str) {
    sqlx::query("INSERT INTO livestreams (livestream_id, livestream_title, stream_date) VALUES (?, 'Sunday Breaks', '2026-02-01')")
        .bind(livestream_id)
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO auction_line_items (livestream_id, order_id, buyer_name, item_title, sale_price) VALUES (?, ?, 'dave', 'Judge refractor', 45.0)")
        .bind(livestream_id)
        .bind(order_id)
        .execute(pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_create_transaction_classifies_and_extracts_order() {
    let (app, _pool) = test_app().await;

    let (status, body) = post(
        &app,
        "/api/paypal/transactions",
        json!({
            "transaction_date": "2026-02-03",
            "type": "Express Checkout Payment",
            "amount": "-45.50",
            "paypal_txn_id": "9XK12345AB",
            "item_title": "Whatnot purchase Order Number : 12-34567-89012",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Transaction recorded");
    assert_eq!(body["charge_category"], "purchase");
    assert_eq!(body["order_number"], "12-34567-89012");
    let id = body["id"].as_i64().unwrap();

    let (status, body) = get(&app, &format!("/api/paypal/transactions/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transaction"]["type"], "Express Checkout Payment");
    assert_eq!(body["transaction"]["currency"], "USD");
    assert_eq!(body["transaction"]["amount"], -45.5);
    assert_eq!(body["allocations"].as_array().unwrap().len(), 0);

    let (status, _) = post(
        &app,
        "/api/paypal/transactions",
        json!({ "transaction_date": "2026-02-04", "type": "Mobile Payment", "amount": 1.0, "paypal_txn_id": "9XK12345AB" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = post(
        &app,
        "/api/paypal/transactions",
        json!({ "transaction_date": "2026-02-04", "amount": 1.0 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Missing required field: type");

    let id = record(
        &app,
        json!({ "transaction_date": "2026-02-05", "type": "Mobile Payment", "amount": 20.0 }),
    )
    .await;
    let (_, body) = get(&app, &format!("/api/paypal/transactions/{}", id)).await;
    assert_eq!(body["transaction"]["charge_category"], "income");
}

#[tokio::test]
async fn test_allocation_rules() {
    let (app, _pool) = test_app().await;
    let txn = purchase(&app, "2026-02-10", -100.0, None).await;

    let (status, body) = allocate(&app, txn, 25.0).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["message"],
        "Allocation sign must match transaction (negative for purchases, positive for income)"
    );

    let (status, body) = allocate(&app, txn, -60.0).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Allocation created");
    let first = body["id"].as_i64().unwrap();

    let (status, body) = allocate(&app, txn, -50.0).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["message"],
        "Over-allocation: only $40.00 remaining, cannot allocate $50.00"
    );

    // Within a penny of the remainder snaps to it exactly
    let (status, _) = post(
        &app,
        "/api/paypal/allocations",
        json!({ "pp_transaction_id": txn, "amount_allocated": -39.995, "sales_source": "eBay" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = get(&app, &format!("/api/paypal/transactions/{}", txn)).await;
    let allocations = body["allocations"].as_array().unwrap();
    assert_eq!(allocations.len(), 2);
    let total: f64 = allocations.iter().map(|a| a["amount_allocated"].as_f64().unwrap()).sum();
    assert!((total + 100.0).abs() < 1e-9);

    let (_, body) = get(&app, "/api/paypal/transactions?assignment_status=assigned").await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["assignment_status"], "assigned");

    // Updating excludes the allocation's own amount from the remainder
    let (status, body) = put(
        &app,
        &format!("/api/paypal/allocations/{}", first),
        json!({ "amount_allocated": -70.0 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["message"],
        "Over-allocation: only $60.00 available, cannot allocate $70.00"
    );

    let (status, _) = put(
        &app,
        &format!("/api/paypal/allocations/{}", first),
        json!({ "amount_allocated": -30.0, "notes": "split with a friend" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get(&app, "/api/paypal/transactions?assignment_status=partial").await;
    assert_eq!(body["total"], 1);

    let (status, body) = put(&app, &format!("/api/paypal/allocations/{}", first), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "No fields to update");

    let (status, _) = post(
        &app,
        "/api/paypal/allocations",
        json!({ "pp_transaction_id": txn, "amount_allocated": -1.0, "sales_source": "Garage Sale" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = allocate(&app, 424242, -1.0).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&app, "/api/paypal/transactions?assignment_status=sideways").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_lock_and_unlock_range() {
    let (app, _pool) = test_app().await;
    let january = purchase(&app, "2026-01-15", -20.0, None).await;
    let february = purchase(&app, "2026-02-15", -30.0, None).await;
    let (_, body) = allocate(&app, january, -20.0).await;
    let locked_id = body["id"].as_i64().unwrap();
    allocate(&app, february, -10.0).await;

    let (status, body) = post(&app, "/api/paypal/lock", json!({ "date_from": "2026-01-01" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "date_from and date_to are required");

    let (status, body) = post(
        &app,
        "/api/paypal/lock",
        json!({ "date_from": "2026-01-01", "date_to": "2026-01-31" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["locked_count"], 1);

    let (status, _) = put(
        &app,
        &format!("/api/paypal/allocations/{}", locked_id),
        json!({ "notes": "too late" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = delete(&app, &format!("/api/paypal/allocations/{}", locked_id)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = get(&app, "/api/paypal/transactions?assignment_status=locked").await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["pp_transaction_id"], january);

    let (_, body) = post(
        &app,
        "/api/paypal/unlock",
        json!({ "date_from": "2026-01-01", "date_to": "2026-01-31" }),
    )
    .await;
    assert_eq!(body["unlocked_count"], 1);

    let (status, body) = delete(&app, &format!("/api/paypal/allocations/{}", locked_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Allocation deleted");
}

#[tokio::test]
async fn test_auto_assign_by_order_number() {
    let (app, pool) = test_app().await;
    seed_livestream(&pool, "LS-100", "12-34567-89012").await;

    let matched = purchase(&app, "2026-02-01", -45.0, Some("Order Number : 12-34567-89012")).await;
    let unmatched = purchase(&app, "2026-02-02", -12.0, Some("Order Number : 99-99999-99999")).await;
    purchase(&app, "2026-02-03", -8.0, None).await;

    let (status, body) = post(&app, "/api/paypal/auto-assign", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched"], 1);
    assert_eq!(body["unmatched"], 1);

    let (_, body) = get(&app, &format!("/api/paypal/transactions/{}", matched)).await;
    let allocation = &body["allocations"][0];
    assert_eq!(allocation["livestream_id"], "LS-100");
    assert_eq!(allocation["livestream_title"], "Sunday Breaks");
    assert_eq!(allocation["sales_source"], "Auction");
    assert_eq!(allocation["amount_allocated"], -45.0);

    let (_, body) = get(&app, &format!("/api/paypal/transactions/{}", unmatched)).await;
    assert_eq!(body["allocations"].as_array().unwrap().len(), 0);

    // Already-allocated purchases are not candidates again
    let (_, body) = post(&app, "/api/paypal/auto-assign", json!({})).await;
    assert_eq!(body["matched"], 0);
    assert_eq!(body["unmatched"], 1);
}

#[tokio::test]
async fn test_auto_assign_matches_line_item_without_livestream() {
    let (app, pool) = test_app().await;
    sqlx::query("INSERT INTO auction_line_items (livestream_id, order_id, buyer_name) VALUES (NULL, '55-1', 'sam')")
        .execute(&pool)
        .await
        .unwrap();
    let txn = purchase(&app, "2026-03-01", -10.0, Some("Order Number : 55-1")).await;

    let (status, body) = post(&app, "/api/paypal/auto-assign", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched"], 1);
    assert_eq!(body["unmatched"], 0);

    let (_, body) = get(&app, &format!("/api/paypal/transactions/{}", txn)).await;
    let allocation = &body["allocations"][0];
    assert!(allocation["livestream_id"].is_null());
    assert_eq!(allocation["sales_source"], "Auction");
    assert_eq!(allocation["amount_allocated"], -10.0);
    assert_eq!(allocation["notes"], "Auto-assigned by order number");
}

#[tokio::test]
async fn test_summaries_and_types() {
    let (app, _pool) = test_app().await;
    let spend = purchase(&app, "2026-01-10", -50.0, None).await;
    record(
        &app,
        json!({ "transaction_date": "2026-01-20", "type": "Mass Pay Payment", "amount": 80.0 }),
    )
    .await;
    record(
        &app,
        json!({ "transaction_date": "2026-02-01", "type": "Bank Deposit to PP Account", "amount": 100.0 }),
    )
    .await;
    allocate(&app, spend, -50.0).await;

    let (status, body) = get(&app, "/api/paypal/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_transactions"], 3);
    assert_eq!(body["purchase_count"], 1);
    assert_eq!(body["income_count"], 1);
    assert_eq!(body["assignable_count"], 2);
    assert_eq!(body["assigned_count"], 1);
    assert_eq!(body["unassigned_count"], 1);
    assert_eq!(body["total_debits"], -50.0);
    assert_eq!(body["total_credits"], 180.0);

    let (_, body) = get(&app, "/api/paypal/summary?date_from=2026-01-01&date_to=2026-01-31").await;
    assert_eq!(body["total_transactions"], 2);

    let (status, body) = get(&app, "/api/paypal/assignments/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["by_source"][0]["sales_source"], "Auction");
    assert_eq!(body["by_source"][0]["allocation_count"], 1);
    assert!(!body["by_month"].as_array().unwrap().is_empty());

    let (_, body) = get(&app, "/api/paypal/types").await;
    let types = body["data"].as_array().unwrap();
    assert_eq!(types.len(), 3);
    assert!(types.contains(&json!("Mass Pay Payment")));

    let (status, body) = delete(&app, &format!("/api/paypal/transactions/{}", spend)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Deleted");
    let (status, _) = get(&app, &format!("/api/paypal/transactions/{}", spend)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
