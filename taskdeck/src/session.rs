//! Session/identity resolution.
//!
//! A [`SessionContext`] is created once per running dashboard and owned by
//! the caller. It follows the authentication provider's identity
//! transitions and, for each signed-in identity, loads the matching
//! `users/{uid}` profile so the rest of the dashboard can filter and
//! authorize by role.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};

use crate::auth::{AuthProvider, Identity};
use crate::error::{Error, StoreError};
use crate::model::{Entity, Role, User};
use crate::notice::Notices;
use crate::store::{ChangeNotification, DocumentStore};

/// The resolved session as seen by the rest of the dashboard.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub identity: Option<Identity>,
    /// Profile of the signed-in user, once fetched.
    pub profile: Option<User>,
    /// A profile fetch is in flight.
    pub resolving: bool,
    /// Why the last profile fetch failed.
    pub error: Option<String>,
}

impl Session {
    pub fn user_id(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.uid.as_str())
    }

    /// The signed-in user's id, or [`Error::NotSignedIn`].
    pub fn require_user(&self) -> Result<&str, Error> {
        self.user_id().ok_or(Error::NotSignedIn)
    }

    /// The signed-in user's profile, or [`Error::NotSignedIn`] while it has
    /// not resolved.
    pub fn require_profile(&self) -> Result<&User, Error> {
        self.identity
            .as_ref()
            .and(self.profile.as_ref())
            .ok_or(Error::NotSignedIn)
    }

    pub fn role(&self) -> Option<Role> {
        self.profile.as_ref().map(|p| p.role)
    }

    /// Managers and admins.
    pub fn is_manager(&self) -> bool {
        matches!(self.role(), Some(Role::Manager | Role::Admin))
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some(Role::Admin)
    }

    /// Fail with [`Error::Forbidden`] unless the user holds at least `required`.
    pub(crate) fn require_role(&self, action: &'static str, required: Role) -> Result<(), Error> {
        self.require_user()?;
        let allowed = match required {
            Role::User => self.profile.is_some(),
            Role::Manager => self.is_manager(),
            Role::Admin => self.is_admin(),
        };
        if allowed {
            Ok(())
        } else {
            Err(Error::Forbidden { action, required })
        }
    }
}

/// How long a signed-in identity waits for its profile document to be
/// written before the session gives up on it.
pub const DEFAULT_PROFILE_WAIT: Duration = Duration::from_secs(10);

/// Fetch the profile document for `identity`.
pub async fn fetch_profile(
    store: &dyn DocumentStore,
    identity: &Identity,
) -> Result<User, StoreError> {
    let doc = store
        .get(User::COLLECTION, &identity.uid)
        .await?
        .ok_or_else(|| StoreError::NotFound {
            collection: User::COLLECTION.to_string(),
            id: identity.uid.clone(),
        })?;
    Ok(User::from_document(&doc.id, &doc.fields, Utc::now()))
}

/// Wait for a write to `users/{uid}`. A lagged receiver may have missed it,
/// so that counts too. `false` once the store stops publishing.
async fn profile_written(
    changes: &mut broadcast::Receiver<ChangeNotification>,
    uid: &str,
) -> bool {
    loop {
        match changes.recv().await {
            Ok(change) if change.collection == User::COLLECTION && change.id == uid => {
                return true;
            }
            Ok(_) => continue,
            Err(RecvError::Lagged(_)) => return true,
            Err(RecvError::Closed) => return false,
        }
    }
}

/// Owned session state, kept in step with the authentication provider.
///
/// Dropping the context stops following the provider.
pub struct SessionContext {
    state: watch::Receiver<Session>,
    handle: JoinHandle<()>,
}

impl SessionContext {
    /// Start following `auth`. Must be called from within a tokio runtime.
    pub fn start(auth: &dyn AuthProvider, store: Arc<dyn DocumentStore>, notices: Notices) -> Self {
        Self::with_profile_wait(auth, store, notices, DEFAULT_PROFILE_WAIT)
    }

    /// Like [`start`](Self::start), giving up on a missing profile after
    /// `profile_wait`.
    pub fn with_profile_wait(
        auth: &dyn AuthProvider,
        store: Arc<dyn DocumentStore>,
        notices: Notices,
        profile_wait: Duration,
    ) -> Self {
        let mut auth_rx = auth.watch();
        let (tx, state) = watch::channel(Session::default());

        let handle = tokio::spawn(async move {
            'transitions: loop {
                let identity = auth_rx.borrow_and_update().clone();
                if let Some(identity) = identity {
                    tx.send_replace(Session {
                        identity: Some(identity.clone()),
                        profile: None,
                        resolving: true,
                        error: None,
                    });
                    let mut writes = store.changes();
                    let deadline = Instant::now() + profile_wait;
                    loop {
                        tokio::select! {
                            result = fetch_profile(store.as_ref(), &identity) => {
                                match result {
                                    Ok(profile) => {
                                        log::info!(
                                            "Session resolved for {} as {}",
                                            profile.id,
                                            profile.role
                                        );
                                        tx.send_modify(|s| {
                                            s.profile = Some(profile);
                                            s.resolving = false;
                                        });
                                        break;
                                    }
                                    Err(e @ StoreError::NotFound { .. }) => {
                                        // Registration writes the profile after the
                                        // identity appears.
                                        log::debug!("No profile for {} yet", identity.uid);
                                        let written = timeout_at(
                                            deadline,
                                            profile_written(&mut writes, &identity.uid),
                                        );
                                        tokio::select! {
                                            written = written => {
                                                if matches!(written, Ok(true)) {
                                                    continue;
                                                }
                                                notices.error(format!(
                                                    "Failed to load your profile: {e}"
                                                ));
                                                tx.send_modify(|s| {
                                                    s.resolving = false;
                                                    s.error = Some(e.to_string());
                                                });
                                                break;
                                            }
                                            changed = auth_rx.changed() => {
                                                if changed.is_err() {
                                                    return;
                                                }
                                                continue 'transitions;
                                            }
                                        }
                                    }
                                    Err(e) => {
                                        notices.error(format!("Failed to load your profile: {e}"));
                                        tx.send_modify(|s| {
                                            s.resolving = false;
                                            s.error = Some(e.to_string());
                                        });
                                        break;
                                    }
                                }
                            }
                            changed = auth_rx.changed() => {
                                // Superseded by a newer transition; drop this fetch.
                                if changed.is_err() {
                                    return;
                                }
                                continue 'transitions;
                            }
                        }
                    }
                } else if tx.send_replace(Session::default()).identity.is_some() {
                    log::info!("Session cleared");
                }
                if auth_rx.changed().await.is_err() {
                    return;
                }
            }
        });

        Self { state, handle }
    }

    /// The session as currently resolved.
    pub fn current(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Session> {
        self.state.clone()
    }

    /// Wait until the session satisfies `pred` and return it. `None` if the
    /// context stopped first.
    pub async fn wait_until(&self, mut pred: impl FnMut(&Session) -> bool) -> Option<Session> {
        let mut rx = self.state.clone();
        let session = rx.wait_for(|s| pred(s)).await.ok()?;
        Some(session.clone())
    }

    /// Wait for the current transition to settle: either signed out, or
    /// signed in with the profile fetch finished.
    pub async fn settled(&self) -> Option<Session> {
        self.wait_until(|s| !s.resolving).await
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
