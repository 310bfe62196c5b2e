use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::broadcast;

use crate::auth::{AuthProvider, LocalAuth, MIN_PASSWORD_LENGTH};
use crate::clock::MonotonicClock;
use crate::controller::{
    LiveList, NotificationList, ProjectList, TaskList, TaskScope, TodoList, Writer,
};
use crate::error::{Error, StoreError};
use crate::model::{Entity, NewNotification, Role, User};
use crate::notice::{Notice, Notices};
use crate::session::{Session, SessionContext};
use crate::store::{DocumentStore, MemoryStore, Query, SqliteStore};

/// Tunables that do not depend on the chosen backends.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Shortest password accepted at registration.
    pub min_password_length: usize,
    /// How many notices a slow listener may fall behind before losing some.
    pub notice_capacity: usize,
    /// How long a signed-in session waits for a profile document that does
    /// not exist yet, in milliseconds.
    pub profile_wait_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_password_length: MIN_PASSWORD_LENGTH,
            notice_capacity: 64,
            profile_wait_ms: 10_000,
        }
    }
}

/// Configures and builds a [`Dashboard`].
///
/// Without an explicit store the dashboard uses a SQLite database when a
/// URL was given and an in-memory store otherwise. Without an explicit
/// provider it uses [`LocalAuth`].
#[derive(Default)]
pub struct DashboardBuilder {
    config: Config,
    store: Option<Arc<dyn DocumentStore>>,
    database_url: Option<String>,
    auth: Option<Arc<dyn AuthProvider>>,
}

impl DashboardBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Store documents in the SQLite database at `url`.
    pub fn with_database_url(mut self, url: &str) -> Self {
        self.database_url = Some(url.to_string());
        self
    }

    pub fn with_auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_min_password_length(mut self, len: usize) -> Self {
        self.config.min_password_length = len;
        self
    }

    pub fn with_notice_capacity(mut self, capacity: usize) -> Self {
        self.config.notice_capacity = capacity;
        self
    }

    pub fn with_profile_wait(mut self, wait: Duration) -> Self {
        self.config.profile_wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub async fn build(self) -> Result<Dashboard, StoreError> {
        let store: Arc<dyn DocumentStore> = match (self.store, self.database_url) {
            (Some(store), _) => store,
            (None, Some(url)) => Arc::new(SqliteStore::connect(&url).await?),
            (None, None) => Arc::new(MemoryStore::new()),
        };
        let auth = self.auth.unwrap_or_else(|| Arc::new(LocalAuth::new()));
        log::info!(
            "Dashboard ready (min password length {}, notice capacity {})",
            self.config.min_password_length,
            self.config.notice_capacity
        );
        Ok(Dashboard {
            store,
            auth,
            notices: Notices::new(self.config.notice_capacity),
            clock: Arc::new(MonotonicClock::new()),
            config: self.config,
        })
    }
}

/// Entry point tying the store, the identity provider and the notice
/// stream together.
pub struct Dashboard {
    pub(crate) store: Arc<dyn DocumentStore>,
    pub(crate) auth: Arc<dyn AuthProvider>,
    pub(crate) notices: Notices,
    pub(crate) clock: Arc<MonotonicClock>,
    pub(crate) config: Config,
}

impl Dashboard {
    pub fn builder() -> DashboardBuilder {
        DashboardBuilder::new()
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn auth(&self) -> &Arc<dyn AuthProvider> {
        &self.auth
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Listen for success and failure notices.
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Start resolving the signed-in user's session.
    pub fn session(&self) -> SessionContext {
        SessionContext::with_profile_wait(
            self.auth.as_ref(),
            self.store.clone(),
            self.notices.clone(),
            Duration::from_millis(self.config.profile_wait_ms),
        )
    }

    pub(crate) fn writer(&self) -> Writer {
        Writer::new(self.store.clone(), self.notices.clone(), self.clock.clone())
    }

    pub fn todos(&self, session: &Session) -> Result<TodoList, Error> {
        let profile = session.require_profile()?;
        Ok(TodoList::open(self.writer(), &profile.id))
    }

    pub fn projects(&self, session: &Session) -> Result<ProjectList, Error> {
        ProjectList::open(self.writer(), session)
    }

    pub fn tasks(&self, session: &Session, scope: TaskScope) -> Result<TaskList, Error> {
        TaskList::open(self.writer(), session, scope)
    }

    /// Tasks assigned to the signed-in user.
    pub fn my_tasks(&self, session: &Session) -> Result<TaskList, Error> {
        let scope = TaskScope::AssignedTo(session.require_profile()?.id.clone());
        self.tasks(session, scope)
    }

    pub fn notifications(&self, session: &Session) -> Result<NotificationList, Error> {
        let profile = session.require_profile()?;
        Ok(NotificationList::open(self.writer(), &profile.id))
    }

    /// Every registered user, for picking assignees. Managers only.
    pub fn users(&self, session: &Session) -> Result<LiveList<User>, Error> {
        session.require_role("Listing users", Role::Manager)?;
        Ok(LiveList::open(
            self.store.clone(),
            Query::collection(User::COLLECTION),
            self.notices.clone(),
        ))
    }

    /// Send a notification to another user. Managers only.
    pub async fn notify(
        &self,
        session: &Session,
        notification: NewNotification,
    ) -> Result<String, Error> {
        let writer = self.writer();
        writer.refuse(session.require_role("Sending a notification", Role::Manager))?;
        let id = writer.notify(notification).await?;
        self.notices.success("Notification sent");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Identity;
    use crate::controller::ProjectScope;

    #[test]
    fn config_defaults_fill_missing_keys() {
        let config: Config = serde_json::from_str(r#"{ "noticeCapacity": 8 }"#).unwrap();
        assert_eq!(config.notice_capacity, 8);
        assert_eq!(config.min_password_length, 6);
        assert_eq!(Config::default().notice_capacity, 64);
        assert_eq!(config.profile_wait_ms, 10_000);
    }

    #[tokio::test]
    async fn builds_with_in_memory_defaults() {
        let dashboard = Dashboard::builder()
            .with_min_password_length(8)
            .build()
            .await
            .unwrap();
        assert_eq!(dashboard.config().min_password_length, 8);
        assert!(dashboard.auth().current().is_none());
    }

    #[tokio::test]
    async fn lists_require_a_signed_in_user() {
        let dashboard = Dashboard::builder().build().await.unwrap();
        let signed_out = Session::default();
        assert!(matches!(dashboard.todos(&signed_out), Err(Error::NotSignedIn)));
        assert!(matches!(dashboard.projects(&signed_out), Err(Error::NotSignedIn)));
        assert!(matches!(dashboard.my_tasks(&signed_out), Err(Error::NotSignedIn)));
        assert!(matches!(
            dashboard.notifications(&signed_out),
            Err(Error::NotSignedIn)
        ));
    }

    #[tokio::test]
    async fn lists_wait_for_the_profile() {
        let dashboard = Dashboard::builder().build().await.unwrap();
        let loading = Session {
            identity: Some(Identity {
                uid: "root".into(),
                email: "root@example.com".into(),
            }),
            profile: None,
            resolving: true,
            error: None,
        };
        assert!(matches!(dashboard.todos(&loading), Err(Error::NotSignedIn)));
        assert!(matches!(dashboard.projects(&loading), Err(Error::NotSignedIn)));
        assert!(matches!(dashboard.my_tasks(&loading), Err(Error::NotSignedIn)));
        assert!(matches!(
            dashboard.tasks(&loading, TaskScope::Project("p1".into())),
            Err(Error::NotSignedIn)
        ));
        assert!(matches!(
            dashboard.notifications(&loading),
            Err(Error::NotSignedIn)
        ));
        assert!(matches!(
            ProjectScope::for_session(&loading),
            Err(Error::NotSignedIn)
        ));

        let admin = Session {
            profile: Some(User {
                id: "root".into(),
                email: "root@example.com".into(),
                name: "Root".into(),
                role: Role::Admin,
                created_at: chrono::Utc::now(),
            }),
            resolving: false,
            ..loading
        };
        assert_eq!(ProjectScope::for_session(&admin).unwrap(), ProjectScope::All);
        assert!(dashboard.todos(&admin).is_ok());
    }
}
