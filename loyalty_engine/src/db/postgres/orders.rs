use log::trace;
use sqlx::PgConnection;

use super::on_unique_violation;
use crate::{
    db_types::{Order, OrderNumber, OrderStatusType, Points, UserId},
    LedgerError,
};

const ORDER_COLUMNS: &str = "id, number, user_id, status, accrual, uploaded_at";

/// Inserts a new order in the `NEW` state. The unique index on `number` decides which of several concurrent inserts of
/// the same number wins. The losers get [`LedgerError::DuplicateOrder`].
pub async fn insert_order(
    number: &OrderNumber,
    user_id: UserId,
    conn: &mut PgConnection,
) -> Result<Order, LedgerError> {
    let sql = format!("INSERT INTO orders (number, user_id) VALUES ($1, $2) RETURNING {ORDER_COLUMNS}");
    let order = sqlx::query_as::<_, Order>(&sql)
        .bind(number.as_str())
        .bind(user_id)
        .fetch_one(conn)
        .await
        .map_err(|e| {
            if matches!(&e, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation()) {
                LedgerError::NotFound(format!("user {user_id}"))
            } else {
                on_unique_violation(e, || LedgerError::DuplicateOrder(number.clone()))
            }
        })?;
    trace!("🗃️ Order {number} inserted with id {}", order.id);
    Ok(order)
}

pub async fn fetch_order_by_number(
    number: &OrderNumber,
    conn: &mut PgConnection,
) -> Result<Option<Order>, LedgerError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE number = $1");
    let order = sqlx::query_as::<_, Order>(&sql).bind(number.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

/// Reads the order and holds an exclusive lock on its row until the surrounding transaction ends.
pub async fn lock_order(order_id: i64, conn: &mut PgConnection) -> Result<Option<Order>, LedgerError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE");
    let order = sqlx::query_as::<_, Order>(&sql).bind(order_id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn update_order_status(
    order_id: i64,
    status: OrderStatusType,
    accrual: Option<Points>,
    conn: &mut PgConnection,
) -> Result<Order, LedgerError> {
    let sql = format!("UPDATE orders SET status = $2, accrual = $3 WHERE id = $1 RETURNING {ORDER_COLUMNS}");
    let order = sqlx::query_as::<_, Order>(&sql)
        .bind(order_id)
        .bind(status.to_string())
        .bind(accrual)
        .fetch_one(conn)
        .await?;
    trace!("🗃️ Order {} is now {status}", order.number);
    Ok(order)
}

/// The user's orders, ordered by upload time, oldest first.
pub async fn fetch_orders_for_user(user_id: UserId, conn: &mut PgConnection) -> Result<Vec<Order>, LedgerError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY uploaded_at ASC, id ASC");
    let orders = sqlx::query_as::<_, Order>(&sql).bind(user_id).fetch_all(conn).await?;
    Ok(orders)
}

pub async fn fetch_unsettled_orders(conn: &mut PgConnection) -> Result<Vec<Order>, LedgerError> {
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE status IN ('NEW', 'PROCESSING') ORDER BY uploaded_at ASC, id ASC"
    );
    let orders = sqlx::query_as::<_, Order>(&sql).fetch_all(conn).await?;
    Ok(orders)
}
