use std::time::Duration;

use actix_web::{
    dev::Server,
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
    Scope,
};
use log::*;
use loyalty_engine::{
    AccountApi,
    AccrualClient,
    LedgerStore,
    OrderService,
    PostgresDatabase,
    ReconciliationDispatcher,
};

use crate::{
    auth::TokenIssuer,
    config::ServerConfig,
    errors::ServerError,
    routes::{
        health,
        LoginRoute,
        MyBalanceRoute,
        MyOrdersRoute,
        MyWithdrawalsRoute,
        RegisterRoute,
        SubmitOrderRoute,
        WithdrawRoute,
    },
};

/// Connects to the database, starts the reconciliation workers and serves requests until the process is told to stop.
///
/// On the way out the dispatcher is drained before the connection pool is closed, so jobs already queued still get
/// to write their results.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = PostgresDatabase::new_with_url(config.database_url.reveal(), config.database_max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    info!("🚀️ Database is ready");
    // The per-call deadline is enforced by the workers. This is only a backstop.
    let accrual = AccrualClient::new(&config.accrual_url, config.accrual_client_timeout())
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let (dispatcher, handle) = ReconciliationDispatcher::start(db.clone(), accrual, config.dispatcher.clone());
    info!(
        "🚀️ Started {} reconciliation workers against {}",
        dispatcher.worker_count(),
        config.accrual_url
    );
    let orders = OrderService::new(db.clone(), handle);
    if config.resume_unsettled {
        match orders.resume_unsettled_orders().await {
            Ok(n) => info!("🚀️ Resumed {n} unsettled orders"),
            Err(e) => warn!("🚀️ Could not resume unsettled orders. {e}"),
        }
    }
    let srv = create_server_instance(&config, db.clone(), orders)?;
    let result = srv.await.map_err(ServerError::from);
    info!("🚀️ HTTP server stopped. Waiting for the reconciliation workers to finish.");
    dispatcher.shutdown().await;
    db.close().await;
    result
}

pub fn create_server_instance<S: LedgerStore>(
    config: &ServerConfig,
    store: S,
    orders: OrderService<S>,
) -> Result<Server, ServerError> {
    let auth = config.auth.clone();
    let srv = HttpServer::new(move || {
        let accounts_api = AccountApi::new(store.clone());
        let issuer = TokenIssuer::new(&auth);
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("lps::access_log"))
            .app_data(json_config())
            .app_data(web::Data::new(accounts_api))
            .app_data(web::Data::new(orders.clone()))
            .app_data(web::Data::new(issuer))
            .service(health)
            .service(user_scope::<S>())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Every route under `/api/user`. Authentication is enforced per handler by the [`crate::auth::JwtClaims`] extractor.
pub fn user_scope<S: LedgerStore>() -> Scope {
    web::scope("/api/user")
        .service(RegisterRoute::<S>::new())
        .service(LoginRoute::<S>::new())
        .service(SubmitOrderRoute::<S>::new())
        .service(MyOrdersRoute::<S>::new())
        .service(MyBalanceRoute::<S>::new())
        .service(WithdrawRoute::<S>::new())
        .service(MyWithdrawalsRoute::<S>::new())
}

/// Malformed JSON bodies are reported in the same `{"error": ...}` shape as every other failure.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| ServerError::InvalidRequestBody(err.to_string()).into())
}
