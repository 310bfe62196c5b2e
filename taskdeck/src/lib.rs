//! # Taskdeck
//!
//! Live task and project dashboard over a document store.
//!
//! Every list in the dashboard is a live query: the store pushes a fresh
//! snapshot after each write to the queried collection and the list is
//! replaced wholesale, so writes never touch local state directly. Users,
//! projects, tasks, personal todos and notifications live in separate
//! collections; role-based behavior keys off the signed-in user's profile.
//!
//! ## Quick start
//!
//! ```ignore
//! use taskdeck::{Dashboard, NewTodo, Priority, Registration};
//!
//! let dashboard = Dashboard::builder()
//!     .with_database_url("sqlite:./taskdeck.db?mode=rwc")
//!     .build()
//!     .await?;
//! let session = dashboard.session();
//! dashboard
//!     .register(Registration::new("Ada", "ada@example.com", "secret1"))
//!     .await?;
//!
//! let signed_in = session.wait_until(|s| s.profile.is_some()).await.unwrap();
//! let todos = dashboard.todos(&signed_in)?;
//! todos
//!     .create(NewTodo::titled("Buy milk").with_priority(Priority::High))
//!     .await?;
//! ```
//!
//! ## Key types
//!
//! - [`Dashboard`] / [`DashboardBuilder`]: wires the store, the identity
//!   provider and the notice stream together
//! - [`DocumentStore`]: document collections with change notifications,
//!   backed by [`MemoryStore`] or [`SqliteStore`]
//! - [`live::subscribe`]: push-based live queries with scoped release
//! - [`SessionContext`]: the signed-in identity and profile
//! - [`TodoList`], [`ProjectList`], [`TaskList`], [`NotificationList`]:
//!   live lists with their write operations

pub mod accounts;
pub mod auth;
pub mod clock;
pub mod controller;
pub mod dashboard;
pub mod document;
pub mod error;
pub mod live;
pub mod model;
pub mod notice;
pub mod session;
pub mod store;
pub mod validation;

pub use accounts::Registration;
pub use auth::{AuthProvider, Identity, LocalAuth};
pub use controller::{
    ListState, LiveList, NotificationList, ProjectList, ProjectScope, TaskList, TaskScope,
    TaskStats, TodoList,
};
pub use dashboard::{Config, Dashboard, DashboardBuilder};
pub use document::{Document, StoredDocument};
pub use error::{AuthError, Error, Result, StoreError, ValidationError};
pub use live::Subscription;
pub use model::{
    Entity, NewNotification, NewProject, NewTask, NewTodo, Notification, NotificationKind,
    PersonalTodo, Priority, Project, ProjectPatch, ProjectStatus, Role, Task, TaskPatch,
    TaskStatus, TodoPatch, User,
};
pub use notice::{Notice, NoticeLevel, Notices};
pub use session::{Session, SessionContext};
pub use store::{
    ChangeNotification, DocumentStore, Filter, MemoryStore, Query, SqliteStore, WriteKind,
};

// Re-export sea-orm for callers sharing the SQLite connection
pub use sea_orm;
