//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Password hashing is CPU-bound, so it runs on the blocking thread
//! pool via [`web::block`]. Everything else is expressed as futures.
use actix_web::{get, http::header::AUTHORIZATION, web, HttpResponse, Responder};
use log::*;
use loyalty_engine::{
    db_types::{NewUser, UserAccount},
    AccountApi,
    LedgerStore,
    OrderService,
    SubmitOrderResult,
};

use crate::{
    auth::{hash_password, verify_password, JwtClaims, TokenIssuer},
    data_objects::{Credentials, JsonResponse, WithdrawalRequest},
    errors::{AuthError, ServerError},
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Accounts  ----------------------------------------------------
route!(register => Post "/register" impl LedgerStore);
/// Creates an account and logs the new user straight in.
///
/// The body is `{"login": "...", "password": "..."}`. Empty credentials are a 400, a login that is already taken
/// is a 409.
pub async fn register<S: LedgerStore>(
    body: web::Json<Credentials>,
    api: web::Data<AccountApi<S>>,
    issuer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, ServerError> {
    let Credentials { login, password } = body.into_inner();
    debug!("💻️ Registration request for '{login}'");
    if login.trim().is_empty() || password.is_empty() {
        return Err(ServerError::InvalidRequestBody("Empty credentials".into()));
    }
    let hash = web::block(move || hash_password(&password))
        .await
        .map_err(|e| ServerError::BackendError(e.to_string()))??;
    let account = api.register(NewUser::new(login, hash)).await?;
    session_response(&issuer, &account, "User registered and logged in")
}

route!(login => Post "/login" impl LedgerStore);
/// Checks the credentials and starts a new session. Unknown logins and wrong passwords are both a 401.
pub async fn login<S: LedgerStore>(
    body: web::Json<Credentials>,
    api: web::Data<AccountApi<S>>,
    issuer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, ServerError> {
    let creds = body.into_inner();
    if creds.is_empty() {
        return Err(ServerError::InvalidRequestBody("Empty credentials".into()));
    }
    debug!("💻️ Login request for '{}'", creds.login);
    let account = api.user_by_login(&creds.login).await?.ok_or(AuthError::InvalidCredentials)?;
    let hash = account.password_hash.clone();
    let verified = web::block(move || verify_password(&creds.password, &hash))
        .await
        .map_err(|e| ServerError::BackendError(e.to_string()))?;
    if !verified {
        info!("💻️ Failed login attempt for '{}'", account.login);
        return Err(AuthError::InvalidCredentials.into());
    }
    session_response(&issuer, &account, "Logged in")
}

fn session_response(issuer: &TokenIssuer, account: &UserAccount, message: &str) -> Result<HttpResponse, ServerError> {
    let token = issuer.issue_token(account)?;
    Ok(HttpResponse::Ok()
        .insert_header((AUTHORIZATION, format!("Bearer {token}")))
        .cookie(issuer.session_cookie(token))
        .json(JsonResponse::success(message)))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(submit_order => Post "/orders" impl LedgerStore);
/// Uploads an order number for accrual. The body is the bare order number as `text/plain`.
///
/// * 202: the order is new and has been queued for reconciliation.
/// * 200: the caller had already uploaded this order.
/// * 409: somebody else uploaded this order.
/// * 422: the number fails the Luhn check.
pub async fn submit_order<S: LedgerStore>(
    claims: JwtClaims,
    body: String,
    api: web::Data<OrderService<S>>,
) -> Result<HttpResponse, ServerError> {
    let number = body.trim();
    debug!("💻️ POST order '{number}' for user {}", claims.uid);
    match api.submit_order(number, claims.user_id()).await? {
        SubmitOrderResult::Created(order) => Ok(HttpResponse::Accepted().json(order)),
        SubmitOrderResult::AlreadySubmitted(order) => Ok(HttpResponse::Ok().json(order)),
    }
}

route!(my_orders => Get "/orders" impl LedgerStore);
/// The caller's orders, oldest first. 204 if there are none.
pub async fn my_orders<S: LedgerStore>(
    claims: JwtClaims,
    api: web::Data<OrderService<S>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET orders for user {}", claims.uid);
    let orders = api.orders_for_user(claims.user_id()).await?;
    if orders.is_empty() {
        return Ok(HttpResponse::NoContent().finish());
    }
    Ok(HttpResponse::Ok().json(orders))
}

//----------------------------------------------   Balance  ----------------------------------------------------
route!(my_balance => Get "/balance" impl LedgerStore);
pub async fn my_balance<S: LedgerStore>(
    claims: JwtClaims,
    api: web::Data<OrderService<S>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET balance for user {}", claims.uid);
    let balance = api.balance_for_user(claims.user_id()).await?;
    Ok(HttpResponse::Ok().json(balance))
}

route!(withdraw => Post "/balance/withdraw" impl LedgerStore);
/// Spends points against a new order number. `{"order": "...", "sum": 751}`.
///
/// 402 if the balance is too low, 422 if the order number is malformed or has been used before.
pub async fn withdraw<S: LedgerStore>(
    claims: JwtClaims,
    body: web::Json<WithdrawalRequest>,
    api: web::Data<OrderService<S>>,
) -> Result<HttpResponse, ServerError> {
    let WithdrawalRequest { order, sum } = body.into_inner();
    debug!("💻️ POST withdrawal of {sum} against order '{order}' for user {}", claims.uid);
    let withdrawal = api.withdraw(claims.user_id(), order.trim(), sum).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!(
        "Withdrew {} points against order {}",
        withdrawal.sum, withdrawal.order_number
    ))))
}

route!(my_withdrawals => Get "/withdrawals" impl LedgerStore);
/// The caller's withdrawals, oldest first. 204 if there are none.
pub async fn my_withdrawals<S: LedgerStore>(
    claims: JwtClaims,
    api: web::Data<OrderService<S>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET withdrawals for user {}", claims.uid);
    let withdrawals = api.withdrawals_for_user(claims.user_id()).await?;
    if withdrawals.is_empty() {
        return Ok(HttpResponse::NoContent().finish());
    }
    Ok(HttpResponse::Ok().json(withdrawals))
}
