use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::repo_types::{ListQuery, NewTodo, Todo, TodoPage};
use crate::error::classify_db_error;

#[async_trait]
pub trait TodoRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Todo>>;
    async fn create(&self, user_id: Uuid, todo: &NewTodo) -> anyhow::Result<Todo>;
    /// All rows are inserted or none are. Returned in input order.
    async fn create_many(&self, user_id: Uuid, todos: &[NewTodo]) -> anyhow::Result<Vec<Todo>>;
    /// `None` when no row with this id belongs to `user_id`.
    async fn update(&self, id: Uuid, user_id: Uuid, todo: &NewTodo)
        -> anyhow::Result<Option<Todo>>;
    /// `false` when no row with this id belongs to `user_id`.
    async fn delete(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<bool>;
    async fn list_by_user(&self, user_id: Uuid, query: &ListQuery) -> anyhow::Result<TodoPage>;
}

#[derive(Clone)]
pub struct PgTodoRepo {
    db: PgPool,
}

impl PgTodoRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const TODO_COLUMNS: &str = "id, title, description, user_id, created_at, updated_at";

/// Insert a todo within a transaction.
async fn insert_todo_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    todo: &NewTodo,
) -> anyhow::Result<Todo> {
    let row = sqlx::query_as::<_, Todo>(
        r#"
        INSERT INTO todos (title, description, user_id)
        VALUES ($1, $2, $3)
        RETURNING id, title, description, user_id, created_at, updated_at
        "#,
    )
    .bind(&todo.title)
    .bind(&todo.description)
    .bind(user_id)
    .fetch_one(&mut **tx)
    .await
    .map_err(classify_db_error)
    .context("insert todo")?;
    Ok(row)
}

#[async_trait]
impl TodoRepo for PgTodoRepo {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Todo>> {
        let sql = format!("SELECT {TODO_COLUMNS} FROM todos WHERE id = $1");
        let row = sqlx::query_as::<_, Todo>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find todo")?;
        Ok(row)
    }

    async fn create(&self, user_id: Uuid, todo: &NewTodo) -> anyhow::Result<Todo> {
        let row = sqlx::query_as::<_, Todo>(
            r#"
            INSERT INTO todos (title, description, user_id)
            VALUES ($1, $2, $3)
            RETURNING id, title, description, user_id, created_at, updated_at
            "#,
        )
        .bind(&todo.title)
        .bind(&todo.description)
        .bind(user_id)
        .fetch_one(&self.db)
        .await
        .map_err(classify_db_error)
        .context("insert todo")?;
        Ok(row)
    }

    async fn create_many(&self, user_id: Uuid, todos: &[NewTodo]) -> anyhow::Result<Vec<Todo>> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let mut created = Vec::with_capacity(todos.len());
        for todo in todos {
            // dropping `tx` on error rolls back everything inserted so far
            created.push(insert_todo_tx(&mut tx, user_id, todo).await?);
        }
        tx.commit().await.context("commit tx")?;
        Ok(created)
    }

    async fn update(
        &self,
        id: Uuid,
        user_id: Uuid,
        todo: &NewTodo,
    ) -> anyhow::Result<Option<Todo>> {
        let row = sqlx::query_as::<_, Todo>(
            r#"
            UPDATE todos
               SET title = $3, description = $4, updated_at = now()
             WHERE id = $1 AND user_id = $2
            RETURNING id, title, description, user_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&todo.title)
        .bind(&todo.description)
        .fetch_optional(&self.db)
        .await
        .map_err(classify_db_error)
        .context("update todo")?;
        Ok(row)
    }

    async fn delete(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM todos WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await
            .context("delete todo")?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_by_user(&self, user_id: Uuid, query: &ListQuery) -> anyhow::Result<TodoPage> {
        // Column and direction come from closed enums, never from raw input.
        let sql = format!(
            r#"
            SELECT {TODO_COLUMNS}
              FROM todos
             WHERE user_id = $1
               AND ($2::text IS NULL OR strpos(title, $2) > 0)
             ORDER BY {col} {dir}, id {dir}
             LIMIT $3 OFFSET $4
            "#,
            col = query.sort_by.column(),
            dir = query.sort_order.keyword(),
        );
        let todos = sqlx::query_as::<_, Todo>(&sql)
            .bind(user_id)
            .bind(query.title.as_deref())
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(&self.db)
            .await
            .context("list todos")?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
              FROM todos
             WHERE user_id = $1
               AND ($2::text IS NULL OR strpos(title, $2) > 0)
            "#,
        )
        .bind(user_id)
        .bind(query.title.as_deref())
        .fetch_one(&self.db)
        .await
        .context("count todos")?;

        Ok(TodoPage { todos, total })
    }
}
