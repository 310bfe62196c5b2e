#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use taskdeck::{
    AuthProvider, Dashboard, DocumentStore, LocalAuth, MemoryStore, Registration, Role, Session,
    SessionContext,
};

pub const PASSWORD: &str = "secret1";

/// Fail the test instead of hanging when a live update never arrives.
pub async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(3), fut)
        .await
        .expect("Timed out waiting for a live update")
}

pub struct Harness {
    pub dashboard: Dashboard,
    pub store: Arc<MemoryStore>,
    pub auth: Arc<LocalAuth>,
    pub session: SessionContext,
}

pub async fn harness() -> Harness {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = Arc::new(MemoryStore::new());
    let auth = Arc::new(LocalAuth::new());
    let dashboard = Dashboard::builder()
        .with_store(store.clone())
        .with_auth(auth.clone())
        .build()
        .await
        .expect("Failed to build dashboard");
    let session = dashboard.session();
    Harness {
        dashboard,
        store,
        auth,
        session,
    }
}

impl Harness {
    /// Register an account and wait until its session has resolved.
    pub async fn register(&self, name: &str, email: &str) -> Session {
        let user = self
            .dashboard
            .register(Registration::new(name, email, PASSWORD))
            .await
            .expect("Failed to register");
        self.settled_as(&user.id, Role::User).await
    }

    /// Sign in again and wait for the profile to show `role`.
    pub async fn sign_in(&self, email: &str, role: Role) -> Session {
        self.dashboard
            .sign_in(email, PASSWORD)
            .await
            .expect("Failed to sign in");
        let uid = self
            .auth
            .current()
            .map(|i| i.uid)
            .expect("No identity after sign-in");
        self.settled_as(&uid, role).await
    }

    /// Give an account a role directly in the store, as an operator
    /// bootstrapping the first admin would.
    pub async fn grant(&self, uid: &str, role: Role) {
        let fields = json!({ "role": role.as_str() });
        self.store
            .update("users", uid, fields.as_object().cloned().unwrap_or_default())
            .await
            .expect("Failed to grant role");
    }

    /// Register an account holding `role` and return its resolved session.
    pub async fn register_as(&self, name: &str, email: &str, role: Role) -> Session {
        let session = self.register(name, email).await;
        if role == Role::User {
            return session;
        }
        let uid = session.user_id().expect("Registered session has no user");
        self.grant(uid, role).await;
        self.sign_in(email, role).await
    }

    async fn settled_as(&self, uid: &str, role: Role) -> Session {
        within(self.session.wait_until(|s| {
            s.profile
                .as_ref()
                .is_some_and(|p| p.id == uid && p.role == role)
        }))
        .await
        .expect("Session stopped")
    }
}
