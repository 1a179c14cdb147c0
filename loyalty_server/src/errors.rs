use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use loyalty_engine::{LedgerError, OrderServiceError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The login '{0}' is already taken")]
    LoginTaken(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    UnprocessableOrderNumber(String),
    #[error("Insufficient balance")]
    InsufficientBalance,
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::TokenIssue(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::UNAUTHORIZED,
            },
            Self::LoginTaken(_) => StatusCode::CONFLICT,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::UnprocessableOrderNumber(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InsufficientBalance => StatusCode::PAYMENT_REQUIRED,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        // Backend details stay in the log
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("💻️ {self}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(status)
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": message }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No session token was found in the request. Please log in first.")]
    MissingToken,
    #[error("The session token is invalid. {0}")]
    InvalidToken(String),
    #[error("Invalid login or password")]
    InvalidCredentials,
    #[error("Could not issue a session token. {0}")]
    TokenIssue(String),
}

impl From<LedgerError> for ServerError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::LoginTaken(login) => Self::LoginTaken(login),
            LedgerError::DuplicateOrder(n) => Self::Conflict(format!("Order {n} has already been uploaded")),
            LedgerError::InsufficientBalance { .. } => Self::InsufficientBalance,
            LedgerError::WithdrawalNumberInUse(n) => {
                Self::UnprocessableOrderNumber(format!("Order number {n} cannot be used for a withdrawal"))
            },
            LedgerError::InvalidAmount(p) => Self::InvalidRequestBody(format!("The amount must be positive, not {p}")),
            e => Self::BackendError(e.to_string()),
        }
    }
}

impl From<OrderServiceError> for ServerError {
    fn from(e: OrderServiceError) -> Self {
        match e {
            OrderServiceError::EmptyOrderNumber => Self::InvalidRequestBody(e.to_string()),
            OrderServiceError::InvalidOrderNumber(_) => Self::UnprocessableOrderNumber(e.to_string()),
            OrderServiceError::OrderOwnedByAnotherUser(_) => Self::Conflict(e.to_string()),
            OrderServiceError::InvalidAmount(_) => Self::InvalidRequestBody(e.to_string()),
            OrderServiceError::Dispatch(_) => Self::BackendError(e.to_string()),
            OrderServiceError::Ledger(e) => e.into(),
        }
    }
}
