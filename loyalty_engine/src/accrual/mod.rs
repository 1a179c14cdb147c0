//! # Accrual authority adapter
//!
//! The accrual authority is the external service that calculates how many points a purchase order is worth. It is
//! queried with `GET <base>/api/orders/<number>` and answers with `{"order", "status", "accrual"}`.
//!
//! [`AccrualApi`] is the seam the reconciliation workers depend on. [`AccrualClient`] is the HTTP implementation. The
//! adapter knows nothing about users, balances or the ledger.
mod client;

use std::{fmt::Display, time::Duration};

use async_trait::async_trait;
pub use client::AccrualClient;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{OrderNumber, Points};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccrualStatus {
    /// The authority knows about the order but has not started calculating the reward.
    Registered,
    /// The calculation is in progress.
    Processing,
    /// The order will never earn points.
    Invalid,
    /// The calculation is complete and `accrual` holds the reward.
    Processed,
}

impl AccrualStatus {
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Invalid | Self::Processed)
    }
}

impl Display for AccrualStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccrualStatus::Registered => write!(f, "REGISTERED"),
            AccrualStatus::Processing => write!(f, "PROCESSING"),
            AccrualStatus::Invalid => write!(f, "INVALID"),
            AccrualStatus::Processed => write!(f, "PROCESSED"),
        }
    }
}

/// A completed answer from the accrual authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualResult {
    #[serde(rename = "order")]
    pub order_number: OrderNumber,
    pub status: AccrualStatus,
    /// The authority omits the field until the order is processed.
    #[serde(default)]
    pub accrual: Points,
}

#[derive(Debug, Clone, Error)]
pub enum AccrualError {
    #[error("The accrual authority did not answer within {0:?}")]
    Timeout(Duration),
    #[error("Could not reach the accrual authority: {0}")]
    Transport(String),
    #[error("The accrual authority responded with status {status}")]
    Authority { status: u16, retry_after: Option<Duration> },
    #[error("Could not decode the accrual authority response: {0}")]
    Decode(String),
    #[error("Could not initialize the accrual client: {0}")]
    Initialization(String),
}

#[async_trait]
pub trait AccrualApi: Send + Sync + 'static {
    /// Asks the authority for the reward of a single order. The call is abandoned with [`AccrualError::Timeout`] if
    /// it does not complete within `deadline`.
    async fn fetch_accrual(&self, number: &OrderNumber, deadline: Duration) -> Result<AccrualResult, AccrualError>;
}
