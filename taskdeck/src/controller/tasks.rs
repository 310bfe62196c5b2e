use chrono::{DateTime, Duration, Utc};

use crate::document::{self, Document};
use crate::error::Error;
use crate::model::{
    Entity, NewNotification, NewTask, NotificationKind, Project, Role, Task, TaskPatch,
    TaskStatus,
};
use crate::session::Session;
use crate::store::{Filter, Query};
use crate::validation::require_non_empty;

use super::{ListState, LiveList, Writer};

/// Which tasks a [`TaskList`] shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskScope {
    /// Every task of one project.
    Project(String),
    /// Every task the user is assigned to, across projects.
    AssignedTo(String),
}

impl TaskScope {
    fn query(&self) -> Query {
        let query = Query::collection(Task::COLLECTION);
        match self {
            TaskScope::Project(id) => query.filter(Filter::eq(Task::PROJECT_ID, id.as_str())),
            TaskScope::AssignedTo(uid) => {
                query.filter(Filter::array_contains(Task::ASSIGNED_TO, uid.as_str()))
            }
        }
    }
}

/// Task counts for a dashboard summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub total: usize,
    pub todo: usize,
    pub in_progress: usize,
    pub review: usize,
    pub completed: usize,
    pub overdue: usize,
}

impl TaskStats {
    pub fn from_tasks(tasks: &[Task], now: DateTime<Utc>) -> Self {
        let mut stats = TaskStats {
            total: tasks.len(),
            ..Default::default()
        };
        for task in tasks {
            match task.status {
                TaskStatus::Todo => stats.todo += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Review => stats.review += 1,
                TaskStatus::Completed => stats.completed += 1,
            }
            if task.is_overdue(now) {
                stats.overdue += 1;
            }
        }
        stats
    }

    /// Completed share of all tasks, `0.0` when there are none.
    pub fn completion_ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64
    }
}

pub struct TaskList {
    list: LiveList<Task>,
    writer: Writer,
    actor: Session,
    scope: TaskScope,
}

impl TaskList {
    pub(crate) fn open(writer: Writer, actor: &Session, scope: TaskScope) -> Result<Self, Error> {
        actor.require_profile()?;
        let list = LiveList::open(writer.store(), scope.query(), writer.notices().clone());
        Ok(Self {
            list,
            writer,
            actor: actor.clone(),
            scope,
        })
    }

    pub fn scope(&self) -> &TaskScope {
        &self.scope
    }

    pub fn list(&self) -> &LiveList<Task> {
        &self.list
    }

    pub fn items(&self) -> Vec<Task> {
        self.list.items()
    }

    pub async fn wait_until(
        &self,
        pred: impl FnMut(&ListState<Task>) -> bool,
    ) -> Option<ListState<Task>> {
        self.list.wait_until(pred).await
    }

    /// Counts over the currently shown tasks.
    pub fn stats(&self) -> TaskStats {
        TaskStats::from_tasks(&self.list.items(), Utc::now())
    }

    /// Create a task assigned by the actor and notify its assignees.
    pub async fn create(&self, task: NewTask) -> Result<String, Error> {
        self.writer
            .refuse(self.actor.require_role("Creating a task", Role::Manager))?;
        self.writer.check(require_non_empty("Title", &task.title))?;
        self.writer.check(require_non_empty("Project", &task.project_id))?;
        let actor = self.actor.require_user()?;
        let title = task.title.trim().to_string();
        let doc = task.into_document(actor);
        let assignees = document::string_list_field(&doc, Task::ASSIGNED_TO);

        let id = self.writer.create(Task::COLLECTION, doc, "task").await?;
        log::info!("Created task {id} with {} assignee(s)", assignees.len());
        self.tell_assignees(&id, &title, assignees.iter()).await;
        Ok(id)
    }

    /// Edit a task. Newly added assignees are notified.
    pub async fn edit(&self, id: &str, patch: TaskPatch) -> Result<(), Error> {
        self.writer
            .refuse(self.actor.require_role("Editing a task", Role::Manager))?;
        if let Some(title) = &patch.title {
            self.writer.check(require_non_empty("Title", title))?;
        }
        let before = self.managed(id, "Editing a task").await?;
        let status = patch.status;
        let doc = patch.into_document();
        let added: Vec<String> = doc
            .contains_key(Task::ASSIGNED_TO)
            .then(|| document::string_list_field(&doc, Task::ASSIGNED_TO))
            .unwrap_or_default()
            .into_iter()
            .filter(|uid| !before.assigned_to.contains(uid))
            .collect();
        let title =
            document::opt_string_field(&doc, "title").unwrap_or_else(|| before.title.clone());

        self.writer.update(Task::COLLECTION, id, doc, "task").await?;
        self.tell_assignees(id, &title, added.iter()).await;
        if let Some(status) = status {
            self.tell_assigner(&before, status).await;
        }
        Ok(())
    }

    /// Move a task along the board. Managers may move any task, others only
    /// tasks assigned to them.
    pub async fn set_status(&self, id: &str, status: TaskStatus) -> Result<(), Error> {
        let actor = self.writer.refuse(self.actor.require_user())?;
        let task: Task = self.writer.fetch(id).await?;
        if !self.actor.is_manager() && !task.assigned_to.iter().any(|uid| uid == actor) {
            return self.writer.refuse(Err(Error::Forbidden {
                action: "Changing a task you are not assigned to",
                required: Role::Manager,
            }));
        }
        let mut fields = Document::new();
        fields.insert(Task::STATUS.into(), document::enum_value(&status));
        self.writer
            .update(Task::COLLECTION, id, fields, "task")
            .await?;
        self.tell_assigner(&task, status).await;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), Error> {
        self.managed(id, "Deleting a task").await?;
        self.writer.delete(Task::COLLECTION, id, "task").await
    }

    /// Remind assignees of open tasks due within `window` from now. Returns
    /// how many reminders were written.
    pub async fn send_deadline_reminders(&self, window: Duration) -> Result<usize, Error> {
        self.writer.refuse(
            self.actor
                .require_role("Sending deadline reminders", Role::Manager),
        )?;
        let now = Utc::now();
        let horizon = now + window;
        let mut sent = 0;
        for task in self.list.items() {
            let Some(due) = task.due_date else { continue };
            if task.status == TaskStatus::Completed || due < now || due > horizon {
                continue;
            }
            for uid in &task.assigned_to {
                let reminder = NewNotification::new(
                    uid,
                    NotificationKind::DeadlineReminder,
                    "Deadline approaching",
                    format!("{} is due {}", task.title, due.format("%Y-%m-%d %H:%M UTC")),
                )
                .with_link(task_link(&task.id));
                self.writer.notify(reminder).await?;
                sent += 1;
            }
        }
        if sent > 0 {
            self.writer
                .notices()
                .success(format!("Sent {sent} deadline reminder(s)"));
        }
        Ok(sent)
    }

    /// Load a task the actor may change: one in a project they manage, any
    /// for admins. A task whose project is gone belongs to its assigner.
    async fn managed(&self, id: &str, action: &'static str) -> Result<Task, Error> {
        self.writer
            .refuse(self.actor.require_role(action, Role::Manager))?;
        let task: Task = self.writer.fetch(id).await?;
        if self.actor.is_admin() {
            return Ok(task);
        }
        let owner = match self
            .writer
            .store()
            .get(Project::COLLECTION, &task.project_id)
            .await
        {
            Ok(Some(project)) => document::string_field(&project.fields, Project::MANAGER_ID),
            Ok(None) => task.assigned_by.clone(),
            Err(e) => return self.writer.refuse(Err(e.into())),
        };
        if self.actor.user_id() != Some(owner.as_str()) {
            return self.writer.refuse(Err(Error::Forbidden {
                action: "Changing a task in another manager's project",
                required: Role::Admin,
            }));
        }
        Ok(task)
    }

    async fn tell_assignees<'a>(
        &self,
        task_id: &str,
        title: &str,
        assignees: impl Iterator<Item = &'a String>,
    ) {
        for uid in assignees {
            if self.actor.user_id() == Some(uid.as_str()) {
                continue;
            }
            let notification = NewNotification::new(
                uid,
                NotificationKind::TaskAssigned,
                "New task assigned",
                format!("You have been assigned to {title}"),
            )
            .with_link(task_link(task_id));
            // A failed notification never undoes the task write.
            let _ = self.writer.notify(notification).await;
        }
    }

    async fn tell_assigner(&self, before: &Task, status: TaskStatus) {
        if status != TaskStatus::Completed
            || before.status == TaskStatus::Completed
            || before.assigned_by.is_empty()
            || self.actor.user_id() == Some(before.assigned_by.as_str())
        {
            return;
        }
        let notification = NewNotification::new(
            &before.assigned_by,
            NotificationKind::TaskCompleted,
            "Task completed",
            format!("{} has been completed", before.title),
        )
        .with_link(task_link(&before.id));
        let _ = self.writer.notify(notification).await;
    }
}

fn task_link(id: &str) -> String {
    format!("/tasks/{id}")
}
