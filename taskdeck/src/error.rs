//! Error kinds for every boundary the dashboard touches.
//!
//! Provider failures arrive as string codes; they are mapped into closed
//! enumerations here and never travel through the crate untyped.

use thiserror::Error;

use crate::model::Role;

/// Rejected input, caught before any network call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    EmptyField(&'static str),

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("Passwords do not match")]
    PasswordMismatch,
}

/// Failures reported by the authentication provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("An account already exists for this email")]
    EmailAlreadyInUse,

    #[error("Password is too weak")]
    WeakPassword,

    #[error("Invalid email or password")]
    InvalidCredential,

    #[error("Email address is malformed")]
    InvalidEmail,

    #[error("No account exists for this email")]
    UserNotFound,

    #[error("Too many attempts, try again later")]
    TooManyRequests,

    #[error("Network request to the authentication service failed")]
    Network,

    #[error("Authentication failed ({0})")]
    Unknown(String),
}

impl AuthError {
    /// Map a provider error code (`auth/...`) onto a known kind.
    pub fn from_code(code: &str) -> Self {
        match code.trim_start_matches("auth/") {
            "email-already-in-use" => AuthError::EmailAlreadyInUse,
            "weak-password" => AuthError::WeakPassword,
            "invalid-credential" | "wrong-password" => AuthError::InvalidCredential,
            "invalid-email" => AuthError::InvalidEmail,
            "user-not-found" => AuthError::UserNotFound,
            "too-many-requests" => AuthError::TooManyRequests,
            "network-request-failed" => AuthError::Network,
            _ => AuthError::Unknown(code.to_string()),
        }
    }

    /// The provider code for this kind.
    pub fn code(&self) -> String {
        match self {
            AuthError::EmailAlreadyInUse => "auth/email-already-in-use".into(),
            AuthError::WeakPassword => "auth/weak-password".into(),
            AuthError::InvalidCredential => "auth/invalid-credential".into(),
            AuthError::InvalidEmail => "auth/invalid-email".into(),
            AuthError::UserNotFound => "auth/user-not-found".into(),
            AuthError::TooManyRequests => "auth/too-many-requests".into(),
            AuthError::Network => "auth/network-request-failed".into(),
            AuthError::Unknown(code) => code.clone(),
        }
    }
}

/// Failures reported by the document store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Permission denied on collection {0}")]
    PermissionDenied(String),

    #[error("Document {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("Document {collection}/{id} already exists")]
    AlreadyExists { collection: String, id: String },

    #[error("Document store is unavailable")]
    Unavailable,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Malformed document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Document store error ({0})")]
    Unknown(String),
}

impl StoreError {
    /// Map a store status code onto a known kind. `collection` and `id`
    /// describe the document the failed call targeted.
    pub fn from_code(code: &str, collection: &str, id: &str) -> Self {
        match code {
            "permission-denied" => StoreError::PermissionDenied(collection.to_string()),
            "not-found" => StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            },
            "already-exists" => StoreError::AlreadyExists {
                collection: collection.to_string(),
                id: id.to_string(),
            },
            "unavailable" | "deadline-exceeded" => StoreError::Unavailable,
            "invalid-argument" => StoreError::InvalidArgument(format!("{collection}/{id}")),
            other => StoreError::Unknown(other.to_string()),
        }
    }
}

/// Crate-level error.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("You must be signed in")]
    NotSignedIn,

    #[error("{action} requires the {required} role")]
    Forbidden { action: &'static str, required: Role },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
