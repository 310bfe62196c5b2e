//! Authentication boundary.
//!
//! An [`AuthProvider`] issues and tracks the signed-in identity and
//! publishes every sign-in/sign-out transition on a watch channel.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::AuthError;

mod local;

pub use local::LocalAuth;

/// Minimum password length enforced by the provider.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// A signed-in identity as issued by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: String,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Create an account and sign it in.
    async fn register(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// The currently signed-in identity, if any.
    fn current(&self) -> Option<Identity>;

    /// Observe identity transitions. The receiver starts at the current value.
    fn watch(&self) -> watch::Receiver<Option<Identity>>;
}
