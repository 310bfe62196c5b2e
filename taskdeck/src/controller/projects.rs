use crate::document;
use crate::error::Error;
use crate::model::{
    Entity, NewNotification, NewProject, NotificationKind, Project, ProjectPatch, ProjectStatus,
    Role,
};
use crate::session::Session;
use crate::store::{Filter, Query};
use crate::validation::require_non_empty;

use super::{ListState, LiveList, Writer};

/// Which projects a [`ProjectList`] shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectScope {
    All,
    ManagedBy(String),
}

impl ProjectScope {
    /// Admins see every project, everyone else the ones they manage.
    pub fn for_session(session: &Session) -> Result<Self, Error> {
        let profile = session.require_profile()?;
        Ok(if profile.role == Role::Admin {
            ProjectScope::All
        } else {
            ProjectScope::ManagedBy(profile.id.clone())
        })
    }

    fn query(&self) -> Query {
        let query = Query::collection(Project::COLLECTION);
        match self {
            ProjectScope::All => query,
            ProjectScope::ManagedBy(uid) => {
                query.filter(Filter::eq(Project::MANAGER_ID, uid.as_str()))
            }
        }
    }
}

pub struct ProjectList {
    list: LiveList<Project>,
    writer: Writer,
    actor: Session,
}

impl ProjectList {
    pub(crate) fn open(writer: Writer, actor: &Session) -> Result<Self, Error> {
        let scope = ProjectScope::for_session(actor)?;
        let list = LiveList::open(writer.store(), scope.query(), writer.notices().clone());
        Ok(Self {
            list,
            writer,
            actor: actor.clone(),
        })
    }

    pub fn list(&self) -> &LiveList<Project> {
        &self.list
    }

    pub fn items(&self) -> Vec<Project> {
        self.list.items()
    }

    pub async fn wait_until(
        &self,
        pred: impl FnMut(&ListState<Project>) -> bool,
    ) -> Option<ListState<Project>> {
        self.list.wait_until(pred).await
    }

    /// Create a project managed by the actor.
    pub async fn create(&self, project: NewProject) -> Result<String, Error> {
        self.writer
            .refuse(self.actor.require_role("Creating a project", Role::Manager))?;
        self.writer.check(require_non_empty("Project name", &project.name))?;
        let manager_id = self.actor.require_user()?;
        let doc = project.into_document(manager_id, self.writer.now());
        let id = self
            .writer
            .create(Project::COLLECTION, doc, "project")
            .await?;
        log::info!("Created project {id} managed by {manager_id}");
        Ok(id)
    }

    pub async fn edit(&self, id: &str, patch: ProjectPatch) -> Result<(), Error> {
        if let Some(name) = &patch.name {
            self.writer.check(require_non_empty("Project name", name))?;
        }
        let project = self.managed(id).await?;
        let status = patch.status;
        self.writer
            .update(Project::COLLECTION, id, patch.into_document(), "project")
            .await?;
        if let Some(status) = status.filter(|s| *s != project.status) {
            self.tell_manager(&project, status).await;
        }
        Ok(())
    }

    pub async fn set_status(&self, id: &str, status: ProjectStatus) -> Result<(), Error> {
        self.edit(
            id,
            ProjectPatch {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
    }

    /// Delete the project. Its tasks are left in place.
    pub async fn delete(&self, id: &str) -> Result<(), Error> {
        self.managed(id).await?;
        self.writer
            .delete(Project::COLLECTION, id, "project")
            .await
    }

    /// Load a project the actor may change: one they manage, or any for admins.
    async fn managed(&self, id: &str) -> Result<Project, Error> {
        self.writer
            .refuse(self.actor.require_role("Changing a project", Role::Manager))?;
        let project: Project = self.writer.fetch(id).await?;
        if !self.actor.is_admin() && self.actor.user_id() != Some(project.manager_id.as_str()) {
            return self.writer.refuse(Err(Error::Forbidden {
                action: "Changing another manager's project",
                required: Role::Admin,
            }));
        }
        Ok(project)
    }

    async fn tell_manager(&self, project: &Project, status: ProjectStatus) {
        if self.actor.user_id() == Some(project.manager_id.as_str()) {
            return;
        }
        let status = document::enum_value(&status);
        let notification = NewNotification::new(
            &project.manager_id,
            NotificationKind::ProjectUpdate,
            "Project updated",
            format!(
                "{} is now {}",
                project.name,
                status.as_str().unwrap_or_default()
            ),
        )
        .with_link(format!("/projects/{}", project.id));
        // Failure is announced by the writer; the status change stands.
        let _ = self.writer.notify(notification).await;
    }
}
