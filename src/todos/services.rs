use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{BatchTodoRequest, ListParams, TodoRequest};
use super::repo::TodoRepo;
use super::repo_types::{ListQuery, NewTodo, SortBy, SortOrder, Todo, TodoPage};
use crate::error::AppError;
use crate::validation::{max_chars, required};

pub const DEFAULT_PAGE_LIMIT: i64 = 10;
pub const MAX_PAGE_LIMIT: i64 = 100;
const MAX_TITLE_CHARS: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

fn positive(raw: Option<&str>) -> Option<i64> {
    raw?.trim().parse::<i64>().ok().filter(|v| *v > 0)
}

impl Pagination {
    pub fn parse(page: Option<&str>, limit: Option<&str>) -> Self {
        Self {
            page: positive(page).unwrap_or(1),
            limit: positive(limit)
                .unwrap_or(DEFAULT_PAGE_LIMIT)
                .min(MAX_PAGE_LIMIT),
        }
    }

    pub fn offset(self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// Checks one todo payload. `prefix` names its position inside a batch.
pub fn validate_todo(prefix: &str, req: &TodoRequest) -> Result<NewTodo, AppError> {
    let field = format!("{prefix}title");
    let title = required(&field, req.title.as_deref())?.trim();
    max_chars(&field, title, MAX_TITLE_CHARS)?;
    Ok(NewTodo {
        title: title.to_owned(),
        description: req.description.clone().unwrap_or_default(),
    })
}

/// Loads a todo and checks that `user_id` owns it.
pub async fn load_owned(repo: &dyn TodoRepo, user_id: Uuid, todo_id: Uuid) -> Result<Todo, AppError> {
    let todo = repo
        .find_by_id(todo_id)
        .await?
        .ok_or(AppError::NotFound("Todo"))?;
    if todo.user_id != user_id {
        warn!(%user_id, %todo_id, owner = %todo.user_id, "todo ownership mismatch");
        return Err(AppError::Forbidden);
    }
    Ok(todo)
}

pub async fn list(
    repo: &dyn TodoRepo,
    user_id: Uuid,
    params: &ListParams,
) -> Result<(Pagination, TodoPage), AppError> {
    let pagination = Pagination::parse(params.page.as_deref(), params.limit.as_deref());
    let query = ListQuery {
        limit: pagination.limit,
        offset: pagination.offset(),
        title: params.title.clone().filter(|t| !t.is_empty()),
        sort_by: SortBy::parse(params.sort_by.as_deref()),
        sort_order: SortOrder::parse(params.sort_order.as_deref()),
    };
    let page = repo.list_by_user(user_id, &query).await?;
    Ok((pagination, page))
}

pub async fn create(repo: &dyn TodoRepo, user_id: Uuid, req: &TodoRequest) -> Result<Todo, AppError> {
    let new = validate_todo("", req)?;
    let todo = repo.create(user_id, &new).await?;
    info!(%user_id, todo_id = %todo.id, "todo created");
    Ok(todo)
}

pub async fn batch_create(
    repo: &dyn TodoRepo,
    user_id: Uuid,
    req: &BatchTodoRequest,
) -> Result<Vec<Todo>, AppError> {
    let items = req
        .todos
        .as_ref()
        .ok_or_else(|| AppError::Validation("\"todos\" is required".into()))?;
    if items.is_empty() {
        return Err(AppError::Validation(
            "\"todos\" must contain at least 1 items".into(),
        ));
    }

    // Validate everything before touching storage.
    let new: Vec<NewTodo> = items
        .iter()
        .enumerate()
        .map(|(i, item)| validate_todo(&format!("todos[{i}]."), item))
        .collect::<Result<_, _>>()?;

    let created = repo.create_many(user_id, &new).await?;
    info!(%user_id, count = created.len(), "todos batch created");
    Ok(created)
}

pub async fn update(
    repo: &dyn TodoRepo,
    user_id: Uuid,
    todo_id: Uuid,
    req: &TodoRequest,
) -> Result<Todo, AppError> {
    let changes = validate_todo("", req)?;
    load_owned(repo, user_id, todo_id).await?;
    let todo = repo
        .update(todo_id, user_id, &changes)
        .await?
        .ok_or(AppError::NotFound("Todo"))?;
    info!(%user_id, %todo_id, "todo updated");
    Ok(todo)
}

pub async fn delete(repo: &dyn TodoRepo, user_id: Uuid, todo_id: Uuid) -> Result<(), AppError> {
    load_owned(repo, user_id, todo_id).await?;
    if !repo.delete(todo_id, user_id).await? {
        return Err(AppError::NotFound("Todo"));
    }
    info!(%user_id, %todo_id, "todo deleted");
    Ok(())
}
