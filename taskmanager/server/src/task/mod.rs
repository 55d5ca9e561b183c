use crate::entities::*;
use crate::user::{DEFAULT_USER_ID, UserRepository, UserRepositoryError};
use chrono::{NaiveDate, NaiveDateTime, SubsecRound, Utc};
use sea_orm::sea_query::{Expr, Func, LikeExpr};
use sea_orm::*;

pub mod web;

/// A unit of work with a title, a free-form status and ownership metadata.
///
/// `created_by` and `last_updated_by` hold user IDs; the task does not own
/// the referenced users.
#[derive(Debug, PartialEq, Clone, Eq)]
pub struct Task {
    pub id: Option<i32>,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: String,
    pub remarks: Option<String>,
    pub created_on: NaiveDateTime,
    pub last_updated_on: Option<NaiveDateTime>,
    pub created_by: i32,
    pub last_updated_by: Option<i32>,
}

impl Task {
    /// Builds a task that has not been stored yet, created and last updated
    /// by `user_id` at `now`.
    pub fn new(details: TaskDetails, user_id: i32, now: NaiveDateTime) -> Self {
        Self {
            id: None,
            title: details.title,
            description: details.description,
            due_date: details.due_date,
            status: details.status,
            remarks: details.remarks,
            created_on: now,
            last_updated_on: Some(now),
            created_by: user_id,
            last_updated_by: Some(user_id),
        }
    }

    /// Overwrites the user-editable fields and records who edited the task and when.
    pub fn apply_edit(&mut self, details: TaskDetails, user_id: i32, now: NaiveDateTime) {
        self.title = details.title;
        self.description = details.description;
        self.due_date = details.due_date;
        self.status = details.status;
        self.remarks = details.remarks;
        self.last_updated_on = Some(now);
        self.last_updated_by = Some(user_id);
    }

    /// Returns the user-editable fields of the task.
    pub fn details(&self) -> TaskDetails {
        TaskDetails {
            title: self.title.clone(),
            description: self.description.clone(),
            due_date: self.due_date,
            status: self.status.clone(),
            remarks: self.remarks.clone(),
        }
    }
}

impl From<task::Model> for Task {
    fn from(model: task::Model) -> Self {
        Self {
            id: Some(model.id),
            title: model.title,
            description: model.description,
            due_date: model.due_date,
            status: model.status,
            remarks: model.remarks,
            created_on: model.created_on,
            last_updated_on: model.last_updated_on,
            created_by: model.created_by,
            last_updated_by: model.last_updated_by,
        }
    }
}

impl From<Task> for task::ActiveModel {
    fn from(task: Task) -> Self {
        Self {
            id: match task.id {
                Some(id) => ActiveValue::Unchanged(id),
                None => ActiveValue::NotSet,
            },
            title: ActiveValue::Set(task.title),
            description: ActiveValue::Set(task.description),
            due_date: ActiveValue::Set(task.due_date),
            status: ActiveValue::Set(task.status),
            remarks: ActiveValue::Set(task.remarks),
            created_on: ActiveValue::Set(task.created_on),
            last_updated_on: ActiveValue::Set(task.last_updated_on),
            created_by: ActiveValue::Set(task.created_by),
            last_updated_by: ActiveValue::Set(task.last_updated_by),
        }
    }
}

/// The fields of a task a user submits when creating or editing it.
#[derive(Debug, PartialEq, Clone, Eq, Default)]
pub struct TaskDetails {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: String,
    pub remarks: Option<String>,
}

/// Error type for TaskRepository operations.
#[derive(Debug, thiserror::Error)]
pub enum TaskRepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Read and write access to the `tasks` table.
pub struct TaskRepository<'a> {
    db: &'a sea_orm::DatabaseConnection,
}

impl TaskRepository<'_> {
    pub fn new(db: &sea_orm::DatabaseConnection) -> TaskRepository<'_> {
        TaskRepository { db }
    }

    /// Retrieves all tasks in insertion order.
    #[tracing::instrument(skip(self))]
    pub async fn find_all(&self) -> Result<Vec<Task>, TaskRepositoryError> {
        let tasks = task::Entity::find()
            .order_by_asc(task::Column::Id)
            .all(self.db)
            .await?
            .into_iter()
            .map(Task::from)
            .collect();
        Ok(tasks)
    }

    /// Retrieves a task by its ID.
    ///
    /// # Returns
    ///
    /// `Ok(None)` when no task has the given ID.
    #[tracing::instrument(skip(self))]
    pub async fn find_by_id(&self, id: i32) -> Result<Option<Task>, TaskRepositoryError> {
        let task = task::Entity::find_by_id(id)
            .one(self.db)
            .await?
            .map(Task::from);
        Ok(task)
    }

    /// Stores a task: inserts it when it has no ID yet, updates the existing
    /// row otherwise.
    ///
    /// # Returns
    ///
    /// The stored `Task` with its ID assigned.
    #[tracing::instrument(skip(self))]
    pub async fn save(&self, task: Task) -> Result<Task, TaskRepositoryError> {
        let is_new = task.id.is_none();
        let active_model = task::ActiveModel::from(task);
        let saved_model = if is_new {
            active_model.insert(self.db).await?
        } else {
            active_model.update(self.db).await?
        };
        Ok(Task::from(saved_model))
    }

    /// Deletes a task by its ID. Deleting an ID that does not exist is not an error.
    #[tracing::instrument(skip(self))]
    pub async fn delete_by_id(&self, id: i32) -> Result<(), TaskRepositoryError> {
        let result = task::Entity::delete_by_id(id).exec(self.db).await?;
        if result.rows_affected == 0 {
            tracing::debug!("No task with ID {} to delete", id);
        }
        Ok(())
    }

    /// Retrieves the tasks whose title contains `term`, ignoring case.
    ///
    /// `%`, `_` and `!` in the term match literally. A blank term matches
    /// every task.
    #[tracing::instrument(skip(self))]
    pub async fn find_by_title_containing_ignore_case(
        &self,
        term: &str,
    ) -> Result<Vec<Task>, TaskRepositoryError> {
        if term.trim().is_empty() {
            return self.find_all().await;
        }

        let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
        let tasks = task::Entity::find()
            .filter(
                Expr::expr(Func::lower(Expr::col((task::Entity, task::Column::Title))))
                    .like(LikeExpr::new(pattern).escape(LIKE_ESCAPE)),
            )
            .order_by_asc(task::Column::Id)
            .all(self.db)
            .await?
            .into_iter()
            .map(Task::from)
            .collect();
        Ok(tasks)
    }
}

/// Escape character for LIKE patterns.
const LIKE_ESCAPE: char = '!';

/// Escapes the LIKE wildcards in `term` with [`LIKE_ESCAPE`].
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// Error type for TaskService operations.
#[derive(Debug, thiserror::Error)]
pub enum TaskServiceError {
    #[error("Task with ID {0} not found")]
    TaskNotFound(i64),
    #[error("User with ID {0} not found")]
    UserNotFound(i32),
    #[error(transparent)]
    TaskRepository(#[from] TaskRepositoryError),
    #[error(transparent)]
    UserRepository(#[from] UserRepositoryError),
}

/// The task operations exposed to the request handlers.
pub struct TaskService<'a> {
    tasks: TaskRepository<'a>,
    users: UserRepository<'a>,
}

impl TaskService<'_> {
    pub fn new(db: &sea_orm::DatabaseConnection) -> TaskService<'_> {
        TaskService {
            tasks: TaskRepository::new(db),
            users: UserRepository::new(db),
        }
    }

    /// Retrieves all tasks.
    #[tracing::instrument(skip(self))]
    pub async fn list_tasks(&self) -> Result<Vec<Task>, TaskServiceError> {
        Ok(self.tasks.find_all().await?)
    }

    /// Retrieves a task by its ID.
    ///
    /// # Errors
    ///
    /// `TaskServiceError::TaskNotFound` when no task has the given ID.
    #[tracing::instrument(skip(self))]
    pub async fn get_task(&self, id: i32) -> Result<Task, TaskServiceError> {
        self.tasks
            .find_by_id(id)
            .await?
            .ok_or(TaskServiceError::TaskNotFound(id.into()))
    }

    /// Creates a task owned by the default user, creating that user first if
    /// it does not exist yet.
    #[tracing::instrument(skip(self))]
    pub async fn create_task(&self, details: TaskDetails) -> Result<Task, TaskServiceError> {
        self.users.ensure_default_user().await?;
        let task = Task::new(details, DEFAULT_USER_ID, now());
        let created = self.tasks.save(task).await?;
        tracing::info!("Created task {:?} '{}'", created.id, created.title);
        Ok(created)
    }

    /// Overwrites the editable fields of an existing task and marks it as
    /// last updated by the default user.
    ///
    /// # Errors
    ///
    /// `TaskServiceError::TaskNotFound` when the task does not exist and
    /// `TaskServiceError::UserNotFound` when the default user does not exist.
    /// The default user is never created here.
    #[tracing::instrument(skip(self))]
    pub async fn edit_task(&self, id: i32, details: TaskDetails) -> Result<Task, TaskServiceError> {
        let mut task = self.get_task(id).await?;
        if self.users.find_by_id(DEFAULT_USER_ID).await?.is_none() {
            return Err(TaskServiceError::UserNotFound(DEFAULT_USER_ID));
        }

        task.apply_edit(details, DEFAULT_USER_ID, now());
        let updated = self.tasks.save(task).await?;
        tracing::info!("Updated task {}", id);
        Ok(updated)
    }

    /// Deletes a task. Deleting a task that does not exist is not an error.
    #[tracing::instrument(skip(self))]
    pub async fn delete_task(&self, id: i32) -> Result<(), TaskServiceError> {
        self.tasks.delete_by_id(id).await?;
        Ok(())
    }

    /// Retrieves the tasks whose title contains `term`, ignoring case.
    #[tracing::instrument(skip(self))]
    pub async fn search_tasks(&self, term: &str) -> Result<Vec<Task>, TaskServiceError> {
        Ok(self.tasks.find_by_title_containing_ignore_case(term).await?)
    }

    /// Retrieves the display names of the users referenced by `tasks`, keyed by user ID.
    #[tracing::instrument(skip(self, tasks))]
    pub async fn user_names_for(
        &self,
        tasks: &[Task],
    ) -> Result<std::collections::HashMap<i32, String>, TaskServiceError> {
        let mut ids: Vec<i32> = tasks
            .iter()
            .flat_map(|task| std::iter::once(task.created_by).chain(task.last_updated_by))
            .collect();
        ids.sort_unstable();
        ids.dedup();

        let names = self
            .users
            .find_by_ids(&ids)
            .await?
            .into_iter()
            .filter_map(|user| user.id().map(|id| (id, user.name().to_string())))
            .collect();
        Ok(names)
    }
}

/// Current UTC time truncated to the microsecond precision the database keeps.
fn now() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(6)
}
