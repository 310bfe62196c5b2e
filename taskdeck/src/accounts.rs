//! Registration, sign-in and role management.
//!
//! Forms are validated before the identity provider or the store is
//! touched. A self-registered profile always starts with the `user` role;
//! [`Dashboard::set_role`] is the only way to elevate it.

use crate::dashboard::Dashboard;
use crate::document::{self, Document};
use crate::error::{AuthError, Error};
use crate::model::{Entity, Role, User};
use crate::session::Session;
use crate::validation::{require_non_empty, validate_password};

/// Self-registration form.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    /// Requested role. Ignored: new accounts are always created as `user`.
    pub role: Option<Role>,
}

impl Registration {
    pub fn new(name: &str, email: &str, password: &str) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            confirm_password: password.to_string(),
            role: None,
        }
    }
}

impl Dashboard {
    /// Create an account, sign it in and write its profile.
    pub async fn register(&self, form: Registration) -> Result<User, Error> {
        let writer = self.writer();
        writer.check(require_non_empty("Name", &form.name))?;
        writer.check(require_non_empty("Email", &form.email))?;
        writer.check(validate_password(
            &form.password,
            &form.confirm_password,
            self.config.min_password_length,
        ))?;
        if let Some(role) = form.role.filter(|r| *r != Role::User) {
            log::warn!("Ignoring requested role {role} at registration");
        }

        let identity = self
            .auth
            .register(form.email.trim(), &form.password)
            .await
            .map_err(|e| self.auth_failed(e))?;

        let name = form.name.trim();
        let now = self.clock.now();
        let doc = User::registration_document(&identity.email, name, now);
        if let Err(e) = self.store.set(User::COLLECTION, &identity.uid, doc).await {
            self.notices
                .error(format!("Failed to save your profile: {e}"));
            return Err(e.into());
        }

        log::info!("Registered {} as {}", identity.uid, Role::User);
        self.notices.success("Account created");
        Ok(User {
            id: identity.uid,
            email: identity.email,
            name: name.to_string(),
            role: Role::User,
            created_at: now,
        })
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), Error> {
        let writer = self.writer();
        writer.check(require_non_empty("Email", email))?;
        writer.check(require_non_empty("Password", password))?;
        let identity = self
            .auth
            .sign_in(email.trim(), password)
            .await
            .map_err(|e| self.auth_failed(e))?;
        log::info!("{} signed in", identity.uid);
        self.notices.success("Signed in");
        Ok(())
    }

    pub async fn sign_out(&self) -> Result<(), Error> {
        self.auth.sign_out().await.map_err(|e| self.auth_failed(e))?;
        self.notices.success("Signed out");
        Ok(())
    }

    /// Change another user's role. Admins only.
    pub async fn set_role(&self, actor: &Session, user_id: &str, role: Role) -> Result<(), Error> {
        let writer = self.writer();
        writer.refuse(actor.require_role("Changing a role", Role::Admin))?;
        let mut fields = Document::new();
        fields.insert(User::ROLE.into(), document::enum_value(&role));
        writer
            .update(User::COLLECTION, user_id, fields, "role")
            .await?;
        log::info!("{user_id} is now {role}");
        Ok(())
    }

    fn auth_failed(&self, e: AuthError) -> Error {
        self.notices.error(e.to_string());
        e.into()
    }
}
