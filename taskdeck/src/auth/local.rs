//! In-process email/password identity provider.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use tokio::sync::watch;
use uuid::Uuid;

use super::{AuthProvider, Identity, MIN_PASSWORD_LENGTH};
use crate::error::AuthError;

struct Account {
    uid: String,
    email: String,
    salt: [u8; 16],
    hash: blake3::Hash,
}

fn hash_password(salt: &[u8; 16], password: &str) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize()
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.contains(char::is_whitespace) =>
        {
            Ok(email)
        }
        _ => Err(AuthError::InvalidEmail),
    }
}

/// Identity provider that keeps salted credential hashes in memory.
///
/// Emails are matched case-insensitively. Unknown emails and wrong
/// passwords both fail with [`AuthError::InvalidCredential`].
pub struct LocalAuth {
    accounts: RwLock<HashMap<String, Account>>,
    state: watch::Sender<Option<Identity>>,
}

impl Default for LocalAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalAuth {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            accounts: RwLock::new(HashMap::new()),
            state,
        }
    }

    pub fn account_count(&self) -> usize {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl AuthProvider for LocalAuth {
    async fn register(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::WeakPassword);
        }

        let identity = {
            let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
            if accounts.contains_key(&email) {
                return Err(AuthError::EmailAlreadyInUse);
            }
            let salt = Uuid::new_v4().into_bytes();
            let account = Account {
                uid: Uuid::new_v4().simple().to_string(),
                email: email.clone(),
                salt,
                hash: hash_password(&salt, password),
            };
            let identity = Identity {
                uid: account.uid.clone(),
                email: account.email.clone(),
            };
            accounts.insert(email, account);
            identity
        };

        log::info!("Registered account {}", identity.uid);
        self.state.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = normalize_email(email).map_err(|_| AuthError::InvalidCredential)?;
        let identity = {
            let accounts = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
            let account = accounts.get(&email).ok_or(AuthError::InvalidCredential)?;
            if hash_password(&account.salt, password) != account.hash {
                return Err(AuthError::InvalidCredential);
            }
            Identity {
                uid: account.uid.clone(),
                email: account.email.clone(),
            }
        };

        log::info!("Signed in {}", identity.uid);
        self.state.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if let Some(previous) = self.state.send_replace(None) {
            log::info!("Signed out {}", previous.uid);
        }
        Ok(())
    }

    fn current(&self) -> Option<Identity> {
        self.state.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_then_sign_in() {
        let auth = LocalAuth::new();
        let registered = auth.register("Ada@Example.com", "secret1").await.unwrap();
        assert_eq!(registered.email, "ada@example.com");
        assert_eq!(auth.current(), Some(registered.clone()));

        auth.sign_out().await.unwrap();
        assert_eq!(auth.current(), None);

        let signed_in = auth.sign_in("ada@example.com ", "secret1").await.unwrap();
        assert_eq!(signed_in, registered);
    }

    #[tokio::test]
    async fn provider_errors() {
        let auth = LocalAuth::new();
        assert_eq!(
            auth.register("not-an-email", "secret1").await,
            Err(AuthError::InvalidEmail)
        );
        assert_eq!(
            auth.register("ada@example.com", "12345").await,
            Err(AuthError::WeakPassword)
        );
        auth.register("ada@example.com", "secret1").await.unwrap();
        assert_eq!(
            auth.register("ADA@example.com", "another1").await,
            Err(AuthError::EmailAlreadyInUse)
        );
        assert_eq!(
            auth.sign_in("ada@example.com", "wrong-pass").await,
            Err(AuthError::InvalidCredential)
        );
        assert_eq!(
            auth.sign_in("bob@example.com", "secret1").await,
            Err(AuthError::InvalidCredential)
        );
        assert_eq!(auth.account_count(), 1);
    }

    #[tokio::test]
    async fn transitions_are_observable() {
        let auth = LocalAuth::new();
        let mut rx = auth.watch();
        assert!(rx.borrow().is_none());

        let identity = auth.register("ada@example.com", "secret1").await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().as_ref(), Some(&identity));

        auth.sign_out().await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_none());
    }
}
