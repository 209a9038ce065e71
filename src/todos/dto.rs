use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::Todo;

/// Body of `POST /todos`, `PUT /todos/:id` and each `/todos/batch` item.
#[derive(Debug, Default, Deserialize)]
pub struct TodoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchTodoRequest {
    pub todos: Option<Vec<TodoRequest>>,
}

/// Raw list parameters. Parsed leniently: bad values fall back to defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub title: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct TodoResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
}

impl From<Todo> for TodoResponse {
    fn from(t: Todo) -> Self {
        Self {
            id: t.id,
            title: t.title,
            description: t.description,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TodoListResponse {
    pub data: Vec<TodoResponse>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct BatchTodoResponse {
    pub message: String,
    pub data: Vec<TodoResponse>,
}
