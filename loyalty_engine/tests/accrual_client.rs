use std::time::Duration;

use loyalty_engine::{db_types::*, AccrualApi, AccrualClient, AccrualError, AccrualStatus};
use wiremock::{
    matchers::{method, path},
    Mock,
    MockServer,
    ResponseTemplate,
};

const DEADLINE: Duration = Duration::from_secs(2);

async fn client_for(server: &MockServer) -> AccrualClient {
    let _ = env_logger::try_init();
    AccrualClient::new(&server.uri(), Duration::from_secs(5)).expect("Error creating client")
}

#[tokio::test]
async fn processed_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/orders/79927398713"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "order": "79927398713",
            "status": "PROCESSED",
            "accrual": 729.98
        })))
        .expect(1)
        .mount(&server)
        .await;
    let client = client_for(&server).await;
    let result = client.fetch_accrual(&OrderNumber::from("79927398713"), DEADLINE).await.unwrap();
    assert_eq!(result.status, AccrualStatus::Processed);
    assert_eq!(result.accrual, Points::from(72_998));
}

#[tokio::test]
async fn registered_order_has_no_accrual() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/orders/79927398713"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "order": "79927398713", "status": "REGISTERED" })),
        )
        .mount(&server)
        .await;
    let client = client_for(&server).await;
    let result = client.fetch_accrual(&OrderNumber::from("79927398713"), DEADLINE).await.unwrap();
    assert_eq!(result.status, AccrualStatus::Registered);
    assert_eq!(result.accrual, Points::default());
}

#[tokio::test]
async fn unregistered_order_is_an_authority_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/orders/79927398713"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    let client = client_for(&server).await;
    let err = client.fetch_accrual(&OrderNumber::from("79927398713"), DEADLINE).await.unwrap_err();
    assert!(matches!(err, AccrualError::Authority { status: 204, retry_after: None }), "{err:?}");
}

#[tokio::test]
async fn rate_limit_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/orders/79927398713"))
        .respond_with(
            ResponseTemplate::new(429).insert_header("Retry-After", "60").set_body_string("No more than N requests"),
        )
        .mount(&server)
        .await;
    let client = client_for(&server).await;
    let err = client.fetch_accrual(&OrderNumber::from("79927398713"), DEADLINE).await.unwrap_err();
    match err {
        AccrualError::Authority { status, retry_after } => {
            assert_eq!(status, 429);
            assert_eq!(retry_after, Some(Duration::from_secs(60)));
        },
        e => panic!("Unexpected error: {e:?}"),
    }
}

#[tokio::test]
async fn server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(500)).mount(&server).await;
    let client = client_for(&server).await;
    let err = client.fetch_accrual(&OrderNumber::from("79927398713"), DEADLINE).await.unwrap_err();
    assert!(matches!(err, AccrualError::Authority { status: 500, .. }));
}

#[tokio::test]
async fn slow_authority_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "order": "79927398713", "status": "PROCESSED", "accrual": 1 }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;
    let client = client_for(&server).await;
    let deadline = Duration::from_millis(50);
    let err = client.fetch_accrual(&OrderNumber::from("79927398713"), deadline).await.unwrap_err();
    assert!(matches!(err, AccrualError::Timeout(d) if d == deadline), "{err:?}");
}

#[tokio::test]
async fn garbage_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;
    let client = client_for(&server).await;
    let err = client.fetch_accrual(&OrderNumber::from("79927398713"), DEADLINE).await.unwrap_err();
    assert!(matches!(err, AccrualError::Decode(_)), "{err:?}");
}

#[tokio::test]
async fn unreachable_authority_is_a_transport_error() {
    // Nothing listens on port 9 on the loopback interface
    let client = AccrualClient::new("http://127.0.0.1:9", Duration::from_secs(5)).unwrap();
    let err = client.fetch_accrual(&OrderNumber::from("79927398713"), DEADLINE).await.unwrap_err();
    assert!(matches!(err, AccrualError::Transport(_)), "{err:?}");
}
