use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::json;

use super::{
    helpers::{get, post_text, TestServer},
    mocks::{generous_authority, offline_authority},
};

const ORDERS: &str = "/api/user/orders";

#[actix_web::test]
async fn submit_new_order() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::new(offline_authority());
    let (_, token) = server.user_with_balance("alice", 0).await;
    let res = server.call(post_text(ORDERS, &token, "12345678903")).await;
    assert_eq!(res.status, StatusCode::ACCEPTED);
    let order = res.json();
    assert_eq!(order["number"], "12345678903");
    assert_eq!(order["status"], "NEW");
    assert!(order.get("accrual").is_none());
    assert!(order["uploaded_at"].as_str().is_some());
}

#[actix_web::test]
async fn resubmission_and_foreign_orders() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::new(offline_authority());
    let (_, alice) = server.user_with_balance("alice", 0).await;
    let (_, bob) = server.user_with_balance("bob", 0).await;
    let res = server.call(post_text(ORDERS, &alice, "79927398713")).await;
    assert_eq!(res.status, StatusCode::ACCEPTED);
    // Surrounding whitespace is ignored
    let res = server.call(post_text(ORDERS, &alice, " 79927398713\n")).await;
    assert_eq!(res.status, StatusCode::OK);
    let res = server.call(post_text(ORDERS, &bob, "79927398713")).await;
    assert_eq!(res.status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn malformed_order_numbers() {
    let server = TestServer::new(offline_authority());
    let (_, token) = server.user_with_balance("carol", 0).await;
    let res = server.call(post_text(ORDERS, &token, "")).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let res = server.call(post_text(ORDERS, &token, "79927398710")).await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    let res = server.call(post_text(ORDERS, &token, "abc")).await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    let res = server.call(get(ORDERS, &token)).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    assert!(res.body.is_empty());
}

#[actix_web::test]
async fn list_orders() {
    let server = TestServer::new(offline_authority());
    let (_, token) = server.user_with_balance("dave", 0).await;
    for number in ["9278923470", "12345678903"] {
        let res = server.call(post_text(ORDERS, &token, number)).await;
        assert_eq!(res.status, StatusCode::ACCEPTED);
    }
    server.settle(2).await;
    let res = server.call(get(ORDERS, &token)).await;
    assert_eq!(res.status, StatusCode::OK);
    let orders = res.json();
    let numbers = orders.as_array().unwrap().iter().map(|o| o["number"].as_str().unwrap()).collect::<Vec<_>>();
    assert_eq!(numbers, ["9278923470", "12345678903"]);
    // The authority was unreachable, so nothing changed
    assert!(orders.as_array().unwrap().iter().all(|o| o["status"] == "NEW"));
}

#[actix_web::test]
async fn processed_orders_credit_the_balance() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::new(generous_authority(500));
    let (_, token) = server.user_with_balance("erin", 0).await;
    let res = server.call(post_text(ORDERS, &token, "9278923470")).await;
    assert_eq!(res.status, StatusCode::ACCEPTED);
    server.settle(1).await;

    let res = server.call(get(ORDERS, &token)).await;
    assert_eq!(res.status, StatusCode::OK);
    let orders = res.json();
    let order = &orders[0];
    assert_eq!(order["status"], "PROCESSED");
    assert_eq!(order["accrual"], json!(500.0));
    let res = server.call(get("/api/user/balance", &token)).await;
    assert_eq!(res.json(), json!({ "current": 500.0, "withdrawn": 0.0 }));
}

#[actix_web::test]
async fn wrong_method() {
    let server = TestServer::new(offline_authority());
    let res = server.call(TestRequest::delete().uri(ORDERS)).await;
    assert!(res.status.is_client_error());
}
