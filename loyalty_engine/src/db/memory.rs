//! An in-process [`LedgerStore`].
//!
//! `MemoryLedger` keeps users, orders and withdrawals behind a single async mutex. Holding the mutex for the whole
//! of an operation gives every operation the same all-or-nothing, serialized behaviour the Postgres backend gets from
//! transactions and row locks, which makes it suitable for deterministic concurrency tests.
use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use log::*;
use tokio::sync::Mutex;

use crate::{
    db_types::{
        AccrualUpdate,
        Balance,
        NewUser,
        Order,
        OrderNumber,
        OrderStatusType,
        Points,
        UserAccount,
        UserId,
        Withdrawal,
    },
    LedgerError,
    LedgerStore,
};

#[derive(Debug, Default)]
struct LedgerState {
    users: Vec<UserAccount>,
    orders: Vec<Order>,
    withdrawals: Vec<Withdrawal>,
    order_index: HashMap<OrderNumber, usize>,
}

impl LedgerState {
    fn user(&self, user_id: UserId) -> Option<&UserAccount> {
        self.users.iter().find(|u| u.id == user_id)
    }

    fn user_mut(&mut self, user_id: UserId) -> Result<&mut UserAccount, LedgerError> {
        self.users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| LedgerError::NotFound(format!("user {user_id}")))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a user's balance directly. Intended for test setup.
    pub async fn set_balance(&self, user_id: UserId, balance: Points) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        state.user_mut(user_id)?.balance = balance;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn create_user(&self, user: NewUser) -> Result<UserAccount, LedgerError> {
        let mut state = self.state.lock().await;
        if state.users.iter().any(|u| u.login == user.login) {
            return Err(LedgerError::LoginTaken(user.login));
        }
        let account = UserAccount {
            id: state.users.len() as i64 + 1,
            login: user.login,
            password_hash: user.password_hash,
            balance: Points::default(),
            withdrawn: Points::default(),
            created_at: Utc::now(),
        };
        state.users.push(account.clone());
        trace!("🗃️ User '{}' created with id {}", account.login, account.id);
        Ok(account)
    }

    async fn fetch_user(&self, user_id: UserId) -> Result<Option<UserAccount>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state.user(user_id).cloned())
    }

    async fn fetch_user_by_login(&self, login: &str) -> Result<Option<UserAccount>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.login == login).cloned())
    }

    async fn fetch_balance(&self, user_id: UserId) -> Result<Balance, LedgerError> {
        let state = self.state.lock().await;
        state.user(user_id).map(Balance::from).ok_or_else(|| LedgerError::NotFound(format!("user {user_id}")))
    }

    async fn create_order(&self, number: &OrderNumber, user_id: UserId) -> Result<Order, LedgerError> {
        let mut state = self.state.lock().await;
        if state.user(user_id).is_none() {
            return Err(LedgerError::NotFound(format!("user {user_id}")));
        }
        if state.order_index.contains_key(number) {
            return Err(LedgerError::DuplicateOrder(number.clone()));
        }
        let order = Order {
            id: state.orders.len() as i64 + 1,
            number: number.clone(),
            user_id,
            status: OrderStatusType::New,
            accrual: None,
            uploaded_at: Utc::now(),
        };
        let idx = state.orders.len();
        state.orders.push(order.clone());
        state.order_index.insert(number.clone(), idx);
        debug!("🗃️ Order {number} saved for user {user_id} with id {}", order.id);
        Ok(order)
    }

    async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state.order_index.get(number).map(|&idx| state.orders[idx].clone()))
    }

    async fn apply_accrual(&self, update: AccrualUpdate) -> Result<Order, LedgerError> {
        let mut state = self.state.lock().await;
        let idx = state
            .orders
            .iter()
            .position(|o| o.id == update.order_id)
            .ok_or_else(|| LedgerError::NotFound(format!("order id {}", update.order_id)))?;
        let order = &state.orders[idx];
        if order.user_id != update.user_id {
            return Err(LedgerError::OrderOwnerMismatch { order_id: order.id, user_id: update.user_id });
        }
        if order.status.is_terminal() {
            return Err(LedgerError::OrderAlreadySettled(order.number.clone()));
        }
        if update.status == OrderStatusType::New {
            return Err(LedgerError::IllegalStatusTransition { from: order.status, to: update.status });
        }
        let credit = update.credits_balance().then_some(update.points);
        if let Some(points) = credit {
            let user = state.user_mut(update.user_id)?;
            user.balance = user.balance.checked_add(points).ok_or_else(|| {
                LedgerError::Storage(format!("Crediting {points} to user {} overflows the balance", update.user_id))
            })?;
        }
        let order = &mut state.orders[idx];
        order.status = update.status;
        order.accrual = credit;
        Ok(order.clone())
    }

    async fn withdraw(&self, user_id: UserId, number: &OrderNumber, amount: Points) -> Result<Withdrawal, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let mut state = self.state.lock().await;
        if state.order_index.contains_key(number) || state.withdrawals.iter().any(|w| w.order_number == *number) {
            return Err(LedgerError::WithdrawalNumberInUse(number.clone()));
        }
        let id = state.withdrawals.len() as i64 + 1;
        let user = state.user_mut(user_id)?;
        if user.balance < amount {
            return Err(LedgerError::InsufficientBalance { balance: user.balance, required: amount });
        }
        let withdrawn = user.withdrawn.checked_add(amount).ok_or_else(|| {
            LedgerError::Storage(format!("Withdrawing {amount} overflows the withdrawn total of user {user_id}"))
        })?;
        user.balance -= amount;
        user.withdrawn = withdrawn;
        let withdrawal =
            Withdrawal { id, user_id, order_number: number.clone(), sum: amount, processed_at: Utc::now() };
        state.withdrawals.push(withdrawal.clone());
        Ok(withdrawal)
    }

    async fn fetch_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state.orders.iter().filter(|o| o.user_id == user_id).cloned().collect())
    }

    async fn fetch_withdrawals_for_user(&self, user_id: UserId) -> Result<Vec<Withdrawal>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state.withdrawals.iter().filter(|w| w.user_id == user_id).cloned().collect())
    }

    async fn fetch_unsettled_orders(&self) -> Result<Vec<Order>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state.orders.iter().filter(|o| !o.status.is_terminal()).cloned().collect())
    }

    async fn close(&self) {}
}
