//! Registration and lookup of user accounts.
use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewUser, UserAccount, UserId},
    LedgerError,
    LedgerStore,
};

pub struct AccountApi<S> {
    store: S,
}

impl<S: Debug> Debug for AccountApi<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccountApi ({:?})", self.store)
    }
}

impl<S> AccountApi<S>
where S: LedgerStore
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates a new account. The password must already be hashed.
    pub async fn register(&self, user: NewUser) -> Result<UserAccount, LedgerError> {
        let account = self.store.create_user(user).await?;
        info!("🔄️👤️ New user '{}' registered with id {}", account.login, account.id);
        Ok(account)
    }

    pub async fn user_by_login(&self, login: &str) -> Result<Option<UserAccount>, LedgerError> {
        self.store.fetch_user_by_login(login).await
    }

    pub async fn user_by_id(&self, user_id: UserId) -> Result<Option<UserAccount>, LedgerError> {
        self.store.fetch_user(user_id).await
    }
}
