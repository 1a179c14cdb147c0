use thiserror::Error;

use crate::{db_types::Points, reconciliation::DispatchError, LedgerError};

#[derive(Debug, Clone, Error)]
pub enum OrderServiceError {
    #[error("The order number is empty")]
    EmptyOrderNumber,
    #[error("'{0}' is not a valid order number")]
    InvalidOrderNumber(String),
    #[error("Order {0} has already been uploaded by another user")]
    OrderOwnedByAnotherUser(String),
    #[error("The amount must be positive, not {0}")]
    InvalidAmount(Points),
    #[error("Could not queue the order for reconciliation. {0}")]
    Dispatch(#[from] DispatchError),
    #[error("{0}")]
    Ledger(#[from] LedgerError),
}
