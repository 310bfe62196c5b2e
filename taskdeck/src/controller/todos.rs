use crate::document::Document;
use crate::error::{Error, StoreError};
use crate::model::{Entity, NewTodo, PersonalTodo, TodoPatch};
use crate::store::{Filter, Query};
use crate::validation::require_non_empty;

use super::{ListState, LiveList, Writer};

/// The signed-in user's personal todos, kept live.
pub struct TodoList {
    list: LiveList<PersonalTodo>,
    writer: Writer,
    user_id: String,
}

impl TodoList {
    pub(crate) fn open(writer: Writer, user_id: &str) -> Self {
        let query = Query::collection(PersonalTodo::COLLECTION)
            .filter(Filter::eq(PersonalTodo::USER_ID, user_id));
        let list = LiveList::open(writer.store(), query, writer.notices().clone());
        Self {
            list,
            writer,
            user_id: user_id.to_string(),
        }
    }

    pub fn list(&self) -> &LiveList<PersonalTodo> {
        &self.list
    }

    pub fn items(&self) -> Vec<PersonalTodo> {
        self.list.items()
    }

    pub async fn wait_until(
        &self,
        pred: impl FnMut(&ListState<PersonalTodo>) -> bool,
    ) -> Option<ListState<PersonalTodo>> {
        self.list.wait_until(pred).await
    }

    /// Add a todo for the signed-in user. Returns the new document id.
    pub async fn create(&self, todo: NewTodo) -> Result<String, Error> {
        self.writer.check(require_non_empty("Title", &todo.title))?;
        let id = self
            .writer
            .create(
                PersonalTodo::COLLECTION,
                todo.into_document(&self.user_id),
                "todo",
            )
            .await?;
        log::info!("Created todo {id} for {}", self.user_id);
        Ok(id)
    }

    pub async fn edit(&self, id: &str, patch: TodoPatch) -> Result<(), Error> {
        if let Some(title) = patch.title() {
            self.writer.check(require_non_empty("Title", title))?;
        }
        self.owned(id).await?;
        self.writer
            .update(PersonalTodo::COLLECTION, id, patch.into_document(), "todo")
            .await
    }

    pub async fn set_completed(&self, id: &str, completed: bool) -> Result<(), Error> {
        self.owned(id).await?;
        self.write_completed(id, completed).await
    }

    /// Flip `completed` based on the stored value. Returns the new value.
    pub async fn toggle(&self, id: &str) -> Result<bool, Error> {
        let completed = !self.owned(id).await?.completed;
        self.write_completed(id, completed).await?;
        Ok(completed)
    }

    pub async fn delete(&self, id: &str) -> Result<(), Error> {
        self.owned(id).await?;
        self.writer
            .delete(PersonalTodo::COLLECTION, id, "todo")
            .await
    }

    async fn write_completed(&self, id: &str, completed: bool) -> Result<(), Error> {
        let mut fields = Document::new();
        fields.insert(PersonalTodo::COMPLETED.into(), completed.into());
        self.writer
            .update(PersonalTodo::COLLECTION, id, fields, "todo")
            .await
    }

    /// Load the todo, refusing ones that belong to someone else.
    async fn owned(&self, id: &str) -> Result<PersonalTodo, Error> {
        let todo: PersonalTodo = self.writer.fetch(id).await?;
        if todo.user_id != self.user_id {
            log::warn!("{} tried to change todo {id} owned by {}", self.user_id, todo.user_id);
            let denied = StoreError::PermissionDenied(PersonalTodo::COLLECTION.to_string());
            return self.writer.refuse(Err(denied.into()));
        }
        Ok(todo)
    }
}
