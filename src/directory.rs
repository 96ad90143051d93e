//! Directory server seam: the component that actually owns credentials.
//! Used by: handlers, state.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{lock_err, Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub username: String,
    pub email: String,
}

#[async_trait]
pub trait Directory: Send + Sync {
    /// Changes a password the user already knows.
    async fn change_password(&self, username: &str, current: &str, new: &str) -> Result<()>;

    /// Resolves a contact address to an account, if one exists.
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// Sets a new password for an identity already verified by a reset token.
    async fn reset_password(&self, username: &str, new: &str) -> Result<()>;
}

struct StoredAccount {
    email: String,
    password: String,
}

/// Process-local directory for development and tests.
#[derive(Default)]
pub struct MemoryDirectory {
    accounts: RwLock<HashMap<Box<str>, StoredAccount>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(self, username: &str, email: &str, password: &str) -> Self {
        if let Ok(mut accounts) = self.accounts.write() {
            accounts.insert(
                username.into(),
                StoredAccount { email: email.to_owned(), password: password.to_owned() },
            );
        }
        self
    }

    pub fn password_matches(&self, username: &str, password: &str) -> bool {
        self.accounts
            .read()
            .map(|a| a.get(username).is_some_and(|acct| acct.password == password))
            .unwrap_or(false)
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn change_password(&self, username: &str, current: &str, new: &str) -> Result<()> {
        let mut accounts = self.accounts.write().map_err(lock_err("directory"))?;
        match accounts.get_mut(username) {
            Some(account) if account.password == current => {
                account.password = new.to_owned();
                Ok(())
            }
            _ => Err(Error::InvalidCredentials),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let accounts = self.accounts.read().map_err(lock_err("directory"))?;
        Ok(accounts
            .iter()
            .find(|(_, acct)| acct.email.eq_ignore_ascii_case(email))
            .map(|(username, acct)| Account {
                username: username.to_string(),
                email: acct.email.clone(),
            }))
    }

    async fn reset_password(&self, username: &str, new: &str) -> Result<()> {
        let mut accounts = self.accounts.write().map_err(lock_err("directory"))?;
        let account = accounts
            .get_mut(username)
            .ok_or_else(|| Error::Directory(format!("no such account: {username}")))?;
        account.password = new.to_owned();
        Ok(())
    }
}
