use actix_web::http::StatusCode;
use serde_json::json;

use super::{
    helpers::{get, post_json, post_text, TestServer},
    mocks::offline_authority,
};

const WITHDRAW: &str = "/api/user/balance/withdraw";

#[actix_web::test]
async fn fetch_balance() {
    let server = TestServer::new(offline_authority());
    let (_, token) = server.user_with_balance("alice", 25).await;
    let res = server.call(get("/api/user/balance", &token)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json(), json!({ "current": 25.0, "withdrawn": 0.0 }));
}

#[actix_web::test]
async fn withdraw_and_list_withdrawals() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::new(offline_authority());
    let (_, token) = server.user_with_balance("bob", 1000).await;
    let res = server.call(get("/api/user/withdrawals", &token)).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let res = server.call(post_json(WITHDRAW, &token, json!({ "order": "2377225624", "sum": 751 }))).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["success"], true);

    let res = server.call(get("/api/user/balance", &token)).await;
    assert_eq!(res.json(), json!({ "current": 249.0, "withdrawn": 751.0 }));

    let res = server.call(get("/api/user/withdrawals", &token)).await;
    assert_eq!(res.status, StatusCode::OK);
    let withdrawals = res.json();
    assert_eq!(withdrawals.as_array().unwrap().len(), 1);
    assert_eq!(withdrawals[0]["order"], "2377225624");
    assert_eq!(withdrawals[0]["sum"], json!(751.0));
    assert!(withdrawals[0]["processed_at"].as_str().is_some());
}

#[actix_web::test]
async fn insufficient_balance() {
    let server = TestServer::new(offline_authority());
    let (_, token) = server.user_with_balance("carol", 100).await;
    let res = server.call(post_json(WITHDRAW, &token, json!({ "order": "2377225624", "sum": 150 }))).await;
    assert_eq!(res.status, StatusCode::PAYMENT_REQUIRED);
    let res = server.call(get("/api/user/balance", &token)).await;
    assert_eq!(res.json(), json!({ "current": 100.0, "withdrawn": 0.0 }));
}

#[actix_web::test]
async fn withdrawal_numbers_are_checked() {
    let server = TestServer::new(offline_authority());
    let (_, token) = server.user_with_balance("dave", 100).await;
    let res = server.call(post_json(WITHDRAW, &token, json!({ "order": "2377225625", "sum": 10 }))).await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);

    // An accrual order's number cannot be reused for a withdrawal
    let res = server.call(post_text("/api/user/orders", &token, "9278923470")).await;
    assert_eq!(res.status, StatusCode::ACCEPTED);
    let res = server.call(post_json(WITHDRAW, &token, json!({ "order": "9278923470", "sum": 10 }))).await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);

    // Neither can an earlier withdrawal's
    let res = server.call(post_json(WITHDRAW, &token, json!({ "order": "2377225624", "sum": 10 }))).await;
    assert_eq!(res.status, StatusCode::OK);
    let res = server.call(post_json(WITHDRAW, &token, json!({ "order": "2377225624", "sum": 10 }))).await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);

    let res = server.call(get("/api/user/balance", &token)).await;
    assert_eq!(res.json(), json!({ "current": 90.0, "withdrawn": 10.0 }));
}

#[actix_web::test]
async fn withdrawal_amounts_must_be_positive() {
    let server = TestServer::new(offline_authority());
    let (_, token) = server.user_with_balance("erin", 100).await;
    for sum in [json!(0), json!(-5), json!("ten")] {
        let res = server.call(post_json(WITHDRAW, &token, json!({ "order": "2377225624", "sum": sum }))).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST, "{sum}");
    }
}
