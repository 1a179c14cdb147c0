use std::time::Duration;

use log::*;
use thiserror::Error;

use crate::{
    accrual::{AccrualApi, AccrualError, AccrualStatus},
    db_types::{AccrualUpdate, Order, OrderNumber, OrderStatusType, Points, UserId},
    LedgerError,
    LedgerStore,
};

/// A request to reconcile one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileJob {
    pub order_id: i64,
    pub number: OrderNumber,
    pub user_id: UserId,
    /// 1 for the first fetch, incremented on every re-poll.
    pub attempt: u32,
}

impl ReconcileJob {
    pub fn next_attempt(self) -> Self {
        Self { attempt: self.attempt + 1, ..self }
    }
}

impl From<&Order> for ReconcileJob {
    fn from(order: &Order) -> Self {
        Self { order_id: order.id, number: order.number.clone(), user_id: order.user_id, attempt: 1 }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    #[error("{0}")]
    Accrual(#[from] AccrualError),
    #[error("{0}")]
    Ledger(#[from] LedgerError),
}

fn ledger_status(status: AccrualStatus) -> OrderStatusType {
    match status {
        AccrualStatus::Registered | AccrualStatus::Processing => OrderStatusType::Processing,
        AccrualStatus::Invalid => OrderStatusType::Invalid,
        AccrualStatus::Processed => OrderStatusType::Processed,
    }
}

/// Fetches the accrual for the job's order, waiting at most `deadline` for the authority, and applies the answer to the
/// ledger. Returns the order as it is after the update.
///
/// The ledger transaction is not subject to the deadline. Once started it runs to completion.
pub async fn reconcile_order<S, A>(
    store: &S,
    accrual: &A,
    job: &ReconcileJob,
    deadline: Duration,
) -> Result<Order, ReconcileError>
where
    S: LedgerStore,
    A: AccrualApi + ?Sized,
{
    let result = accrual.fetch_accrual(&job.number, deadline).await?;
    let status = ledger_status(result.status);
    let points = if status == OrderStatusType::Processed { result.accrual } else { Points::default() };
    trace!("🧮️ Order {} (attempt {}): authority says {}, {points}", job.number, job.attempt, result.status);
    let update = AccrualUpdate { order_id: job.order_id, user_id: job.user_id, points, status };
    let order = store.apply_accrual(update).await?;
    Ok(order)
}
