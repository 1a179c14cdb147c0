use std::time::Duration;

use actix_web::{
    cookie::Cookie,
    http::{header::HeaderMap, StatusCode},
    test,
    test::TestRequest,
    web,
    App,
};
use log::debug;
use loyalty_engine::{
    db_types::{NewUser, Points, UserAccount},
    AccountApi,
    DispatcherConfig,
    LedgerStore,
    MemoryLedger,
    OrderService,
    ReconciliationDispatcher,
};

use super::mocks::MockAuthority;
use crate::{
    auth::{TokenIssuer, SESSION_COOKIE},
    config::AuthConfig,
    routes::health,
    server::{json_config, user_scope},
};

pub fn auth_config() -> AuthConfig {
    AuthConfig::new("endpoint-test-secret", Duration::from_secs(3600))
}

pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl Response {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap_or_else(|e| panic!("Body is not JSON ({e}): {}", self.body))
    }
}

/// The server's routes wired to an in-memory ledger and a mocked accrual authority.
pub struct TestServer {
    pub ledger: MemoryLedger,
    pub issuer: TokenIssuer,
    orders: OrderService<MemoryLedger>,
    dispatcher: ReconciliationDispatcher,
}

impl TestServer {
    pub fn new(authority: MockAuthority) -> Self {
        let ledger = MemoryLedger::new();
        let config = DispatcherConfig {
            workers: 2,
            accrual_timeout: Duration::from_secs(1),
            max_polls: 1,
            poll_interval: Duration::from_millis(10),
        };
        let (dispatcher, handle) = ReconciliationDispatcher::start(ledger.clone(), authority, config);
        let orders = OrderService::new(ledger.clone(), handle);
        Self { ledger, issuer: TokenIssuer::new(&auth_config()), orders, dispatcher }
    }

    pub async fn call(&self, req: TestRequest) -> Response {
        let app = App::new()
            .app_data(json_config())
            .app_data(web::Data::new(AccountApi::new(self.ledger.clone())))
            .app_data(web::Data::new(self.orders.clone()))
            .app_data(web::Data::new(self.issuer.clone()))
            .service(health)
            .service(user_scope::<MemoryLedger>());
        let service = test::init_service(app).await;
        debug!("Making request");
        let res = test::call_service(&service, req.to_request()).await;
        let status = res.status();
        let headers = res.headers().clone();
        let body = String::from_utf8_lossy(&test::read_body(res).await).into_owned();
        Response { status, headers, body }
    }

    /// Creates a user directly in the ledger and returns a valid session token for them.
    pub async fn user_with_balance(&self, login: &str, balance: i64) -> (UserAccount, String) {
        let account = self.ledger.create_user(NewUser::new(login, "$argon2id$unused")).await.unwrap();
        self.ledger.set_balance(account.id, Points::from_whole(balance)).await.unwrap();
        let token = self.issuer.issue_token(&account).unwrap();
        (account, token)
    }

    /// Waits until the reconciliation workers have settled `count` jobs.
    pub async fn settle(&self, count: u64) {
        let stats = self.dispatcher.stats();
        for _ in 0..300 {
            if stats.finished() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("Timed out waiting for reconciliation. {stats:?}");
    }
}

pub fn get(path: &str, token: &str) -> TestRequest {
    TestRequest::get().uri(path).cookie(Cookie::new(SESSION_COOKIE, token.to_string()))
}

pub fn post_text(path: &str, token: &str, body: &str) -> TestRequest {
    TestRequest::post()
        .uri(path)
        .insert_header(("Content-Type", "text/plain"))
        .cookie(Cookie::new(SESSION_COOKIE, token.to_string()))
        .set_payload(body.to_string())
}

pub fn post_json(path: &str, token: &str, body: serde_json::Value) -> TestRequest {
    let req = TestRequest::post().uri(path).set_json(body);
    if token.is_empty() {
        req
    } else {
        req.insert_header(("Authorization", format!("Bearer {token}")))
    }
}
