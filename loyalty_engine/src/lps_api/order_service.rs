use std::fmt::Debug;

use log::*;

use super::errors::OrderServiceError;
use crate::{
    db_types::{Balance, Order, OrderNumber, Points, UserId, Withdrawal},
    helpers::is_valid_order_number,
    reconciliation::{DispatcherHandle, ReconcileJob},
    LedgerError,
    LedgerStore,
};

/// The outcome of a successful order submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOrderResult {
    /// The order is new. It has been stored and queued for reconciliation.
    Created(Order),
    /// The caller had already submitted this order. Nothing was changed.
    AlreadySubmitted(Order),
}

impl SubmitOrderResult {
    pub fn order(&self) -> &Order {
        match self {
            SubmitOrderResult::Created(o) | SubmitOrderResult::AlreadySubmitted(o) => o,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, SubmitOrderResult::Created(_))
    }
}

/// `OrderService` is the primary API for the order lifecycle and the balance ledger.
///
/// New orders are stored and then handed to the reconciliation dispatcher; callers never wait for the accrual
/// authority.
#[derive(Clone)]
pub struct OrderService<S> {
    store: S,
    dispatcher: DispatcherHandle,
}

impl<S> Debug for OrderService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderService")
    }
}

impl<S> OrderService<S> {
    pub fn new(store: S, dispatcher: DispatcherHandle) -> Self {
        Self { store, dispatcher }
    }
}

fn validate_order_number(number: &str) -> Result<OrderNumber, OrderServiceError> {
    if number.is_empty() {
        return Err(OrderServiceError::EmptyOrderNumber);
    }
    if !is_valid_order_number(number) {
        return Err(OrderServiceError::InvalidOrderNumber(number.to_string()));
    }
    Ok(OrderNumber::from(number))
}

impl<S> OrderService<S>
where S: LedgerStore
{
    /// Uploads an order number on behalf of `user_id`.
    ///
    /// Malformed numbers are rejected before the ledger is touched. A number that the same user has already uploaded
    /// is reported as [`SubmitOrderResult::AlreadySubmitted`]; one uploaded by anybody else is a conflict.
    pub async fn submit_order(&self, number: &str, user_id: UserId) -> Result<SubmitOrderResult, OrderServiceError> {
        let number = validate_order_number(number)?;
        if let Some(existing) = self.store.fetch_order_by_number(&number).await? {
            return classify_existing(existing, user_id);
        }
        let order = match self.store.create_order(&number, user_id).await {
            Ok(order) => order,
            Err(LedgerError::DuplicateOrder(_)) => {
                // Lost a race with a concurrent submission of the same number
                debug!("🔄️📦️ Order {number} was created concurrently. Re-reading it.");
                let existing = self
                    .store
                    .fetch_order_by_number(&number)
                    .await?
                    .ok_or_else(|| LedgerError::NotFound(format!("order {number}")))?;
                return classify_existing(existing, user_id);
            },
            Err(e) => return Err(e.into()),
        };
        info!("🔄️📦️ Order {number} uploaded by user {user_id}");
        self.dispatcher.submit(ReconcileJob::from(&order))?;
        Ok(SubmitOrderResult::Created(order))
    }

    /// Spends `sum` points from the user's balance against the order number `number`.
    pub async fn withdraw(&self, user_id: UserId, number: &str, sum: Points) -> Result<Withdrawal, OrderServiceError> {
        let number = validate_order_number(number)?;
        if !sum.is_positive() {
            return Err(OrderServiceError::InvalidAmount(sum));
        }
        let withdrawal = self.store.withdraw(user_id, &number, sum).await?;
        info!("🔄️💰️ User {user_id} withdrew {sum} against order {number}");
        Ok(withdrawal)
    }

    pub async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, OrderServiceError> {
        let orders = self.store.fetch_orders_for_user(user_id).await?;
        trace!("🔄️📦️ User {user_id} has {} orders", orders.len());
        Ok(orders)
    }

    pub async fn balance_for_user(&self, user_id: UserId) -> Result<Balance, OrderServiceError> {
        Ok(self.store.fetch_balance(user_id).await?)
    }

    pub async fn withdrawals_for_user(&self, user_id: UserId) -> Result<Vec<Withdrawal>, OrderServiceError> {
        Ok(self.store.fetch_withdrawals_for_user(user_id).await?)
    }

    /// Queues every order that is still `NEW` or `PROCESSING` for reconciliation, oldest first. Used at startup to
    /// pick up orders a previous process never settled. Returns the number of jobs queued.
    pub async fn resume_unsettled_orders(&self) -> Result<usize, OrderServiceError> {
        let orders = self.store.fetch_unsettled_orders().await?;
        for order in &orders {
            self.dispatcher.submit(ReconcileJob::from(order))?;
        }
        if !orders.is_empty() {
            info!("🔄️📦️ {} unsettled orders queued for reconciliation", orders.len());
        }
        Ok(orders.len())
    }
}

fn classify_existing(existing: Order, user_id: UserId) -> Result<SubmitOrderResult, OrderServiceError> {
    if existing.user_id == user_id {
        debug!("🔄️📦️ User {user_id} re-uploaded order {}", existing.number);
        Ok(SubmitOrderResult::AlreadySubmitted(existing))
    } else {
        debug!("🔄️📦️ User {user_id} tried to upload order {}, which belongs to someone else", existing.number);
        Err(OrderServiceError::OrderOwnedByAnotherUser(existing.number.as_str().to_string()))
    }
}
