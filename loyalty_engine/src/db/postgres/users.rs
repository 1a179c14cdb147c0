use log::trace;
use sqlx::PgConnection;

use super::on_unique_violation;
use crate::{
    db_types::{NewUser, Points, UserAccount, UserId},
    LedgerError,
};

const USER_COLUMNS: &str = "id, login, password_hash, balance, withdrawn, created_at";

pub async fn insert_user(user: NewUser, conn: &mut PgConnection) -> Result<UserAccount, LedgerError> {
    let sql = format!("INSERT INTO users (login, password_hash) VALUES ($1, $2) RETURNING {USER_COLUMNS}");
    let account = sqlx::query_as::<_, UserAccount>(&sql)
        .bind(&user.login)
        .bind(&user.password_hash)
        .fetch_one(conn)
        .await
        .map_err(|e| on_unique_violation(e, || LedgerError::LoginTaken(user.login.clone())))?;
    trace!("🗃️ User '{}' created with id {}", account.login, account.id);
    Ok(account)
}

pub async fn fetch_user_by_id(user_id: UserId, conn: &mut PgConnection) -> Result<Option<UserAccount>, LedgerError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
    let account = sqlx::query_as::<_, UserAccount>(&sql).bind(user_id).fetch_optional(conn).await?;
    Ok(account)
}

pub async fn fetch_user_by_login(login: &str, conn: &mut PgConnection) -> Result<Option<UserAccount>, LedgerError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE login = $1");
    let account = sqlx::query_as::<_, UserAccount>(&sql).bind(login).fetch_optional(conn).await?;
    Ok(account)
}

/// Reads the user and holds an exclusive lock on the row until the surrounding transaction ends.
pub async fn lock_user(user_id: UserId, conn: &mut PgConnection) -> Result<Option<UserAccount>, LedgerError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE");
    let account = sqlx::query_as::<_, UserAccount>(&sql).bind(user_id).fetch_optional(conn).await?;
    Ok(account)
}

pub async fn credit_balance(user_id: UserId, amount: Points, conn: &mut PgConnection) -> Result<(), LedgerError> {
    sqlx::query("UPDATE users SET balance = balance + $2 WHERE id = $1")
        .bind(user_id)
        .bind(amount)
        .execute(conn)
        .await?;
    trace!("🗃️ Credited {amount} to user {user_id}");
    Ok(())
}

/// Moves `amount` from the spendable balance to the lifetime withdrawn total.
pub async fn debit_balance(user_id: UserId, amount: Points, conn: &mut PgConnection) -> Result<(), LedgerError> {
    sqlx::query("UPDATE users SET balance = balance - $2, withdrawn = withdrawn + $2 WHERE id = $1")
        .bind(user_id)
        .bind(amount)
        .execute(conn)
        .await?;
    trace!("🗃️ Debited {amount} from user {user_id}");
    Ok(())
}
