use sqlx::PgConnection;

use super::on_unique_violation;
use crate::{
    db_types::{OrderNumber, Points, UserId, Withdrawal},
    LedgerError,
};

const WITHDRAWAL_COLUMNS: &str = "id, user_id, order_number, sum, processed_at";

pub async fn insert_withdrawal(
    user_id: UserId,
    number: &OrderNumber,
    sum: Points,
    conn: &mut PgConnection,
) -> Result<Withdrawal, LedgerError> {
    let sql = format!(
        "INSERT INTO withdrawals (user_id, order_number, sum) VALUES ($1, $2, $3) RETURNING {WITHDRAWAL_COLUMNS}"
    );
    sqlx::query_as::<_, Withdrawal>(&sql)
        .bind(user_id)
        .bind(number.as_str())
        .bind(sum)
        .fetch_one(conn)
        .await
        .map_err(|e| on_unique_violation(e, || LedgerError::WithdrawalNumberInUse(number.clone())))
}

pub async fn fetch_withdrawals_for_user(
    user_id: UserId,
    conn: &mut PgConnection,
) -> Result<Vec<Withdrawal>, LedgerError> {
    let sql =
        format!("SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals WHERE user_id = $1 ORDER BY processed_at ASC, id ASC");
    let withdrawals = sqlx::query_as::<_, Withdrawal>(&sql).bind(user_id).fetch_all(conn).await?;
    Ok(withdrawals)
}
