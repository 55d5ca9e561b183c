use askama::Template;
use axum::{
    Form, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, de};
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use crate::task::{Task, TaskDetails, TaskService, TaskServiceError};

const TASK_LIST_PATH: &str = "/tasks";
const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Form fields submitted when creating or editing a task.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskForm {
    title: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    description: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    due_date: Option<NaiveDate>,
    status: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    remarks: Option<String>,
}

impl TaskForm {
    pub fn description_value(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }

    pub fn due_date_value(&self) -> String {
        format_date(self.due_date)
    }

    pub fn remarks_value(&self) -> &str {
        self.remarks.as_deref().unwrap_or_default()
    }
}

impl From<TaskForm> for TaskDetails {
    fn from(form: TaskForm) -> Self {
        Self {
            title: form.title,
            description: form.description,
            due_date: form.due_date,
            status: form.status,
            remarks: form.remarks,
        }
    }
}

impl From<TaskDetails> for TaskForm {
    fn from(details: TaskDetails) -> Self {
        Self {
            title: details.title,
            description: details.description,
            due_date: details.due_date,
            status: details.status,
            remarks: details.remarks,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchForm {
    #[serde(rename = "searchTerm", default)]
    search_term: String,
}

/// Treats a missing or blank form value as `None` and parses anything else.
fn empty_string_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let value = Option::<String>::deserialize(deserializer)?;
    match value.as_deref() {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(de::Error::custom),
    }
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|date| date.format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}

fn format_date_time(date_time: Option<NaiveDateTime>) -> String {
    date_time
        .map(|date_time| date_time.format(DATE_TIME_FORMAT).to_string())
        .unwrap_or_default()
}

/// A task prepared for display in a table row.
#[derive(Debug)]
pub struct TaskRow {
    id: i32,
    title: String,
    status: String,
    due_date: String,
    created_by: String,
    created_on: String,
    last_updated_on: String,
}

/// Turns stored tasks into table rows, resolving creator names from `user_names`.
fn task_rows(tasks: Vec<Task>, user_names: &HashMap<i32, String>) -> Vec<TaskRow> {
    tasks
        .into_iter()
        .filter_map(|task| {
            let id = task.id?;
            Some(TaskRow {
                id,
                created_by: user_names
                    .get(&task.created_by)
                    .cloned()
                    .unwrap_or_else(|| format!("User #{}", task.created_by)),
                due_date: format_date(task.due_date),
                created_on: format_date_time(Some(task.created_on)),
                last_updated_on: format_date_time(task.last_updated_on),
                title: task.title,
                status: task.status,
            })
        })
        .collect()
}

/// Custom error type for task handler operations.
#[derive(Debug, thiserror::Error)]
enum TaskError {
    /// Represents an error during template rendering.
    #[error("Template rendering failed")]
    Template(#[from] askama::Error),
    /// Represents a task service error.
    #[error("Task service error: {0}")]
    Service(#[from] TaskServiceError),
}

impl IntoResponse for TaskError {
    fn into_response(self) -> Response {
        let (status_code, user_facing_error_message) = match &self {
            TaskError::Service(TaskServiceError::TaskNotFound(id)) => {
                tracing::warn!("Task {} not found", id);
                (
                    StatusCode::NOT_FOUND,
                    "The requested task does not exist.".to_string(),
                )
            }
            TaskError::Service(TaskServiceError::UserNotFound(id)) => {
                tracing::warn!("User {} not found", id);
                (
                    StatusCode::NOT_FOUND,
                    "The user recorded as the editor of this task does not exist.".to_string(),
                )
            }
            _ => {
                tracing::error!("Request failed: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred while processing your request. Please try again later."
                        .to_string(),
                )
            }
        };

        let error_template = ErrorMessageTemplate::new(user_facing_error_message);
        let Ok(rendered) = error_template.render() else {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        };
        (status_code, Html(rendered)).into_response()
    }
}

#[derive(Template)]
#[template(path = "tasks/list.html")]
struct TaskListTemplate {
    tasks: Vec<TaskRow>,
}

#[derive(Template)]
#[template(path = "tasks/create.html")]
struct CreateTaskTemplate {
    form: TaskForm,
}

#[derive(Template)]
#[template(path = "tasks/edit.html")]
struct EditTaskTemplate {
    id: i32,
    form: TaskForm,
}

#[derive(Template)]
#[template(path = "tasks/search.html")]
struct SearchTasksTemplate {
    tasks: Vec<TaskRow>,
    search_term: String,
    searched: bool,
}

#[derive(Template)]
#[template(path = "tasks/error_message.html")]
struct ErrorMessageTemplate {
    message: String,
}

impl ErrorMessageTemplate {
    pub fn new(message: String) -> Self {
        Self { message }
    }
}

#[derive(Clone, Debug)]
pub struct TaskState {
    pub db: Arc<sea_orm::DatabaseConnection>,
}

/// Narrows an ID taken from the path to the stored ID type. IDs outside that
/// range cannot belong to any task.
fn stored_task_id(id: i64) -> Result<i32, TaskServiceError> {
    i32::try_from(id).map_err(|_| TaskServiceError::TaskNotFound(id))
}

fn redirect_to_task_list() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, TASK_LIST_PATH)]).into_response()
}

/// Loads the creator names for `tasks` and renders them as table rows.
async fn rows_for(
    task_service: &TaskService<'_>,
    tasks: Vec<Task>,
) -> Result<Vec<TaskRow>, TaskError> {
    let user_names = task_service.user_names_for(&tasks).await?;
    Ok(task_rows(tasks, &user_names))
}

/// Handler for GET /tasks that lists every task.
#[tracing::instrument(skip(state))]
async fn list_tasks_handler(State(state): State<Arc<TaskState>>) -> Result<Html<String>, TaskError> {
    let task_service = TaskService::new(&state.db);
    let tasks = task_service.list_tasks().await?;
    let template = TaskListTemplate {
        tasks: rows_for(&task_service, tasks).await?,
    };
    template.render().map(Html).map_err(TaskError::from)
}

/// Handler for GET /create that serves an empty task form.
#[tracing::instrument]
async fn create_task_form_handler() -> Result<Html<String>, TaskError> {
    let template = CreateTaskTemplate {
        form: TaskForm::default(),
    };
    template.render().map(Html).map_err(TaskError::from)
}

/// Handler for POST /create.
#[tracing::instrument(skip(state))]
async fn create_task_handler(
    State(state): State<Arc<TaskState>>,
    Form(form): Form<TaskForm>,
) -> Result<Response, TaskError> {
    let task_service = TaskService::new(&state.db);
    task_service.create_task(form.into()).await?;
    Ok(redirect_to_task_list())
}

/// Handler for GET /edit/{id} that serves the form bound to an existing task.
#[tracing::instrument(skip(state))]
async fn edit_task_form_handler(
    State(state): State<Arc<TaskState>>,
    Path(id): Path<i64>,
) -> Result<Html<String>, TaskError> {
    let id = stored_task_id(id)?;
    let task_service = TaskService::new(&state.db);
    let task = task_service.get_task(id).await?;
    let template = EditTaskTemplate {
        id,
        form: TaskForm::from(task.details()),
    };
    template.render().map(Html).map_err(TaskError::from)
}

/// Handler for POST /edit/{id}.
#[tracing::instrument(skip(state))]
async fn edit_task_handler(
    State(state): State<Arc<TaskState>>,
    Path(id): Path<i64>,
    Form(form): Form<TaskForm>,
) -> Result<Response, TaskError> {
    let id = stored_task_id(id)?;
    let task_service = TaskService::new(&state.db);
    task_service.edit_task(id, form.into()).await?;
    Ok(redirect_to_task_list())
}

/// Handler for GET /delete/{id}.
#[tracing::instrument(skip(state))]
async fn delete_task_handler(
    State(state): State<Arc<TaskState>>,
    Path(id): Path<i64>,
) -> Result<Response, TaskError> {
    // Nothing is stored under an ID the column cannot hold.
    if let Ok(id) = stored_task_id(id) {
        let task_service = TaskService::new(&state.db);
        task_service.delete_task(id).await?;
    }
    Ok(redirect_to_task_list())
}

/// Handler for GET /search that serves the search form with no results.
#[tracing::instrument]
async fn search_form_handler() -> Result<Html<String>, TaskError> {
    let template = SearchTasksTemplate {
        tasks: Vec::new(),
        search_term: String::new(),
        searched: false,
    };
    template.render().map(Html).map_err(TaskError::from)
}

/// Handler for POST /search.
#[tracing::instrument(skip(state))]
async fn search_tasks_handler(
    State(state): State<Arc<TaskState>>,
    Form(form): Form<SearchForm>,
) -> Result<Html<String>, TaskError> {
    let task_service = TaskService::new(&state.db);
    let tasks = task_service.search_tasks(&form.search_term).await?;
    let template = SearchTasksTemplate {
        tasks: rows_for(&task_service, tasks).await?,
        search_term: form.search_term,
        searched: true,
    };
    template.render().map(Html).map_err(TaskError::from)
}

/// Creates and returns the task router with all task-related routes.
pub fn create_task_router(state: Arc<TaskState>) -> Router {
    Router::new()
        .route(TASK_LIST_PATH, get(list_tasks_handler))
        .route(
            "/create",
            get(create_task_form_handler).post(create_task_handler),
        )
        .route(
            "/edit/{id}",
            get(edit_task_form_handler).post(edit_task_handler),
        )
        .route("/delete/{id}", get(delete_task_handler))
        .route("/search", get(search_form_handler).post(search_tasks_handler))
        .with_state(state)
}
