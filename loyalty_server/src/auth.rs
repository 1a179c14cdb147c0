//! Session tokens and password hashing.
//!
//! Sessions are HS256 JWTs. The token is handed out in the `lps_session` cookie on register and login, and is accepted
//! back from that cookie or from an `Authorization: Bearer` header. [`JwtClaims`] is an actix extractor, so a handler
//! that takes a `JwtClaims` argument is only ever called for authenticated requests.
use std::{
    future::{ready, Ready},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use actix_web::{
    cookie::{time::Duration as CookieDuration, Cookie},
    dev::Payload,
    http::header::AUTHORIZATION,
    web,
    FromRequest,
    HttpRequest,
};
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2,
    PasswordHash,
    PasswordHasher,
    PasswordVerifier,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use loyalty_engine::db_types::{UserAccount, UserId};
use serde::{Deserialize, Serialize};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

pub const SESSION_COOKIE: &str = "lps_session";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The login of the session owner.
    pub sub: String,
    pub uid: UserId,
    pub iat: u64,
    pub exp: u64,
}

impl JwtClaims {
    pub fn user_id(&self) -> UserId {
        self.uid
    }
}

/// Signs and verifies session tokens with the configured secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime: Duration,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.reveal().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            lifetime: config.token_lifetime,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issue a new session token for the given account.
    /// This method DOES NOT check the password. That must be done prior to calling `issue_token`.
    pub fn issue_token(&self, account: &UserAccount) -> Result<String, AuthError> {
        let iat = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default();
        let claims = JwtClaims { sub: account.login.clone(), uid: account.id, iat, exp: iat + self.lifetime.as_secs() };
        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AuthError::TokenIssue(e.to_string()))
    }

    /// Checks the signature and expiry of `token` and returns its claims.
    pub fn validate(&self, token: &str) -> Result<JwtClaims, AuthError> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    /// Builds the session cookie that carries `token`.
    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        let max_age = CookieDuration::seconds(i64::try_from(self.lifetime.as_secs()).unwrap_or(i64::MAX));
        Cookie::build(SESSION_COOKIE, token).path("/").http_only(true).max_age(max_age).finish()
    }
}

fn session_token(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
}

impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let Some(issuer) = req.app_data::<web::Data<TokenIssuer>>() else {
            return ready(Err(ServerError::ConfigurationError("No token issuer has been registered".into())));
        };
        let result = match session_token(req) {
            Some(token) => issuer.validate(&token).map_err(|e| {
                debug!("💻️ Rejected session token. {e}");
                ServerError::from(e)
            }),
            None => Err(AuthError::MissingToken.into()),
        };
        ready(result)
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::TokenIssue(format!("Could not hash password. {e}")))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}
