use std::fmt::Debug;

use async_trait::async_trait;
use log::*;
use sqlx::PgPool;

use super::{db_url, new_pool, orders, users, withdrawals};
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

#[derive(Clone)]
pub struct PostgresDatabase {
    url: String,
    pool: PgPool,
}

impl Debug for PostgresDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PostgresDatabase ({:?})", self.pool)
    }
}

impl PostgresDatabase {
    /// Creates a new database API object using the URL in `LPS_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, LedgerError> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, LedgerError> {
        let pool = new_pool(url, max_connections).await?;
        debug!("🗃️ Connected to Postgres with a pool of {max_connections} connections");
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies the schema migrations bundled with the engine.
    pub async fn run_migrations(&self) -> Result<(), LedgerError> {
        sqlx::migrate!("./src/db/postgres/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| LedgerError::Storage(format!("Migration failed. {e}")))?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PostgresDatabase {
    async fn create_user(&self, user: NewUser) -> Result<UserAccount, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        users::insert_user(user, &mut conn).await
    }

    async fn fetch_user(&self, user_id: UserId) -> Result<Option<UserAccount>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        users::fetch_user_by_id(user_id, &mut conn).await
    }

    async fn fetch_user_by_login(&self, login: &str) -> Result<Option<UserAccount>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        users::fetch_user_by_login(login, &mut conn).await
    }

    async fn fetch_balance(&self, user_id: UserId) -> Result<Balance, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let account = users::fetch_user_by_id(user_id, &mut conn)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("user {user_id}")))?;
        Ok(Balance::from(&account))
    }

    async fn create_order(&self, number: &OrderNumber, user_id: UserId) -> Result<Order, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(number, user_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {number} saved for user {user_id} with id {}", order.id);
        Ok(order)
    }

    async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_number(number, &mut conn).await
    }

    async fn apply_accrual(&self, update: AccrualUpdate) -> Result<Order, LedgerError> {
        let mut tx = self.pool.begin().await?;
        // Order row first, then the user row
        let order = orders::lock_order(update.order_id, &mut tx)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("order id {}", update.order_id)))?;
        if order.user_id != update.user_id {
            return Err(LedgerError::OrderOwnerMismatch { order_id: order.id, user_id: update.user_id });
        }
        if order.status.is_terminal() {
            debug!("🗃️ Order {} is already {}. The accrual update is ignored.", order.number, order.status);
            return Err(LedgerError::OrderAlreadySettled(order.number));
        }
        if update.status == OrderStatusType::New {
            return Err(LedgerError::IllegalStatusTransition { from: order.status, to: update.status });
        }
        let credit = update.credits_balance().then_some(update.points);
        let updated = orders::update_order_status(order.id, update.status, credit, &mut tx).await?;
        if let Some(points) = credit {
            let user = users::lock_user(update.user_id, &mut tx)
                .await?
                .ok_or_else(|| LedgerError::NotFound(format!("user {}", update.user_id)))?;
            users::credit_balance(user.id, points, &mut tx).await?;
            debug!("🗃️ Order {} accrued {points} for user {}", updated.number, user.id);
        }
        tx.commit().await?;
        Ok(updated)
    }

    async fn withdraw(&self, user_id: UserId, number: &OrderNumber, amount: Points) -> Result<Withdrawal, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let mut tx = self.pool.begin().await?;
        if orders::fetch_order_by_number(number, &mut tx).await?.is_some() {
            return Err(LedgerError::WithdrawalNumberInUse(number.clone()));
        }
        let user = users::lock_user(user_id, &mut tx)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("user {user_id}")))?;
        if user.balance < amount {
            debug!("🗃️ User {user_id} cannot withdraw {amount}. Balance is {}", user.balance);
            return Err(LedgerError::InsufficientBalance { balance: user.balance, required: amount });
        }
        users::debit_balance(user_id, amount, &mut tx).await?;
        let withdrawal = withdrawals::insert_withdrawal(user_id, number, amount, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ User {user_id} withdrew {amount} against order {number}");
        Ok(withdrawal)
    }

    async fn fetch_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_orders_for_user(user_id, &mut conn).await
    }

    async fn fetch_withdrawals_for_user(&self, user_id: UserId) -> Result<Vec<Withdrawal>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        withdrawals::fetch_withdrawals_for_user(user_id, &mut conn).await
    }

    async fn fetch_unsettled_orders(&self) -> Result<Vec<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_unsettled_orders(&mut conn).await
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("🗃️ Database connection pool closed");
    }
}
