use async_trait::async_trait;
use thiserror::Error;

use crate::db_types::{
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
};

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Order {0} has already been uploaded")]
    DuplicateOrder(OrderNumber),
    #[error("The login '{0}' is already taken")]
    LoginTaken(String),
    #[error("Insufficient balance. Balance: {balance}, required: {required}")]
    InsufficientBalance { balance: Points, required: Points },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Order {0} has already been settled")]
    OrderAlreadySettled(OrderNumber),
    #[error("Order {order_id} does not belong to user {user_id}")]
    OrderOwnerMismatch { order_id: i64, user_id: UserId },
    #[error("An order cannot move from {from} to {to}")]
    IllegalStatusTransition { from: OrderStatusType, to: OrderStatusType },
    #[error("Order number {0} cannot be used for a withdrawal")]
    WithdrawalNumberInUse(OrderNumber),
    #[error("Invalid amount: {0}")]
    InvalidAmount(Points),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::Storage(e.to_string())
    }
}

/// The `LedgerStore` trait defines the transactional operations on users, orders and withdrawals.
///
/// Every operation that reads and then writes a balance or an order status does so in a single transaction, holding an
/// exclusive lock on each row involved. When both an order and its owner are touched, the order is locked first.
#[async_trait]
pub trait LedgerStore: Clone + Send + Sync + 'static {
    /// Creates a new user with a zero balance. Fails with [`LedgerError::LoginTaken`] if the login exists.
    async fn create_user(&self, user: NewUser) -> Result<UserAccount, LedgerError>;

    async fn fetch_user(&self, user_id: UserId) -> Result<Option<UserAccount>, LedgerError>;

    async fn fetch_user_by_login(&self, login: &str) -> Result<Option<UserAccount>, LedgerError>;

    async fn fetch_balance(&self, user_id: UserId) -> Result<Balance, LedgerError>;

    /// Stores a new order in the `NEW` state.
    ///
    /// Uniqueness of the order number is enforced by the store itself, not by a prior lookup, so that exactly one of
    /// several concurrent submissions of the same number succeeds. The others receive [`LedgerError::DuplicateOrder`].
    async fn create_order(&self, number: &OrderNumber, user_id: UserId) -> Result<Order, LedgerError>;

    /// An unlocked read. The answer may be stale by the time the caller acts on it.
    async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, LedgerError>;

    /// Applies the result of a reconciliation to an order and, for a positive `PROCESSED` reward, to its owner's
    /// balance.
    ///
    /// An order that is already terminal is never touched again; the call fails with
    /// [`LedgerError::OrderAlreadySettled`], so a duplicate application can never credit the balance twice.
    async fn apply_accrual(&self, update: AccrualUpdate) -> Result<Order, LedgerError>;

    /// Debits `amount` from the user's balance, adds it to the lifetime `withdrawn` total and records the withdrawal.
    ///
    /// The balance check and the debit happen under the same row lock. Nothing changes if the balance is too low.
    async fn withdraw(&self, user_id: UserId, number: &OrderNumber, amount: Points) -> Result<Withdrawal, LedgerError>;

    /// The user's orders, oldest first.
    async fn fetch_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, LedgerError>;

    /// The user's withdrawals, oldest first.
    async fn fetch_withdrawals_for_user(&self, user_id: UserId) -> Result<Vec<Withdrawal>, LedgerError>;

    /// All orders still in `NEW` or `PROCESSING`, oldest first.
    async fn fetch_unsettled_orders(&self) -> Result<Vec<Order>, LedgerError>;

    async fn close(&self);
}
