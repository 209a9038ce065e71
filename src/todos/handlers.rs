use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{post, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{
    BatchTodoRequest, BatchTodoResponse, ListParams, TodoListResponse, TodoRequest, TodoResponse,
};
use super::services;
use crate::{
    auth::extractors::{require_auth, AuthUser},
    error::AppError,
    state::AppState,
    validation::{AppJson, AppQuery},
};

pub fn todo_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/todos", post(create_todo).get(list_todos))
        .route("/todos/batch", post(batch_create_todos))
        .route("/todos/:id", put(update_todo).delete(delete_todo))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
}

/// Ids that are not UUIDs cannot name an existing todo.
fn parse_todo_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("Todo"))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list_todos(
    State(state): State<AppState>,
    user: AuthUser,
    AppQuery(params): AppQuery<ListParams>,
) -> Result<Json<TodoListResponse>, AppError> {
    let (pagination, page) = services::list(state.todos.as_ref(), user.id, &params).await?;
    Ok(Json(TodoListResponse {
        data: page.todos.into_iter().map(TodoResponse::from).collect(),
        page: pagination.page,
        limit: pagination.limit,
        total: page.total,
    }))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn create_todo(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<TodoRequest>,
) -> Result<(StatusCode, Json<TodoResponse>), AppError> {
    let todo = services::create(state.todos.as_ref(), user.id, &payload).await?;
    Ok((StatusCode::CREATED, Json(todo.into())))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn batch_create_todos(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<BatchTodoRequest>,
) -> Result<(StatusCode, Json<BatchTodoResponse>), AppError> {
    let created = services::batch_create(state.todos.as_ref(), user.id, &payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(BatchTodoResponse {
            message: "Todos created successfully".into(),
            data: created.into_iter().map(TodoResponse::from).collect(),
        }),
    ))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_todo(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    AppJson(payload): AppJson<TodoRequest>,
) -> Result<Json<TodoResponse>, AppError> {
    let todo_id = parse_todo_id(&id)?;
    let todo = services::update(state.todos.as_ref(), user.id, todo_id, &payload).await?;
    Ok(Json(todo.into()))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_todo(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let todo_id = parse_todo_id(&id)?;
    services::delete(state.todos.as_ref(), user.id, todo_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
