use actix_web::{http::StatusCode, test::TestRequest};
use loyalty_engine::{db_types::NewUser, LedgerStore};
use serde_json::json;

use super::{
    helpers::{get, post_json, TestServer},
    mocks::offline_authority,
};
use crate::{
    auth::{hash_password, TokenIssuer, SESSION_COOKIE},
    config::AuthConfig,
};

fn credentials(login: &str, password: &str) -> serde_json::Value {
    json!({ "login": login, "password": password })
}

fn session_cookie(headers: &actix_web::http::header::HeaderMap) -> Option<String> {
    headers
        .get_all("set-cookie")
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{SESSION_COOKIE}=")))
        .map(|v| v.to_string())
}

#[actix_web::test]
async fn health_check() {
    let server = TestServer::new(offline_authority());
    let res = server.call(TestRequest::get().uri("/health")).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[actix_web::test]
async fn register_starts_a_session() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::new(offline_authority());
    let res = server.call(post_json("/api/user/register", "", credentials("alice", "s3cret"))).await;
    assert_eq!(res.status, StatusCode::OK);
    let cookie = session_cookie(&res.headers).expect("No session cookie");
    assert!(cookie.contains("HttpOnly"));
    let bearer = res.headers.get("authorization").and_then(|v| v.to_str().ok()).unwrap();
    assert!(bearer.starts_with("Bearer "));

    let account = server.ledger.fetch_user_by_login("alice").await.unwrap().unwrap();
    assert!(account.password_hash.starts_with("$argon2"));
    assert!(!account.password_hash.contains("s3cret"));
    let claims = server.issuer.validate(&bearer["Bearer ".len()..]).unwrap();
    assert_eq!(claims.user_id(), account.id);
}

#[actix_web::test]
async fn register_twice_is_a_conflict() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::new(offline_authority());
    let res = server.call(post_json("/api/user/register", "", credentials("bob", "pw"))).await;
    assert_eq!(res.status, StatusCode::OK);
    let res = server.call(post_json("/api/user/register", "", credentials("bob", "other"))).await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.json(), json!({ "error": "The login 'bob' is already taken" }));
}

#[actix_web::test]
async fn register_rejects_bad_bodies() {
    let server = TestServer::new(offline_authority());
    let res = server.call(post_json("/api/user/register", "", credentials("", "pw"))).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let res = server.call(post_json("/api/user/register", "", credentials("carol", ""))).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let res = server.call(post_json("/api/user/register", "", json!({ "login": "carol" }))).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.json()["error"].as_str().unwrap().starts_with("Could not read request body"));
}

#[actix_web::test]
async fn login() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::new(offline_authority());
    let hash = hash_password("letmein").unwrap();
    server.ledger.create_user(NewUser::new("dave".to_string(), hash)).await.unwrap();

    let res = server.call(post_json("/api/user/login", "", credentials("dave", "letmein"))).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(session_cookie(&res.headers).is_some());

    let res = server.call(post_json("/api/user/login", "", credentials("dave", "wrong"))).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert!(session_cookie(&res.headers).is_none());

    let res = server.call(post_json("/api/user/login", "", credentials("nobody", "letmein"))).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.json(), json!({ "error": "Authentication Error. Invalid login or password" }));
}

#[actix_web::test]
async fn protected_routes_need_a_session() {
    let server = TestServer::new(offline_authority());
    for path in ["/api/user/orders", "/api/user/balance", "/api/user/withdrawals"] {
        let res = server.call(TestRequest::get().uri(path)).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED, "{path}");
        let res = server.call(get(path, "not.a.token")).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED, "{path}");
    }
}

#[actix_web::test]
async fn tokens_from_another_secret_are_rejected() {
    let server = TestServer::new(offline_authority());
    let (account, _) = server.user_with_balance("erin", 0).await;
    let forger = TokenIssuer::new(&AuthConfig::new("guessed-secret", std::time::Duration::from_secs(3600)));
    let token = forger.issue_token(&account).unwrap();
    let res = server.call(get("/api/user/balance", &token)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}
