//! In-process stores used by [`AppState::fake`](crate::state::AppState::fake)
//! and the test suites. They mirror the Postgres constraints that matter to
//! the workflows: unique emails and all-or-nothing batch inserts.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::{repo::UserRepo, repo_types::User};
use crate::error::StoreError;
use crate::todos::{
    repo::TodoRepo,
    repo_types::{ListQuery, NewTodo, SortBy, SortOrder, Todo, TodoPage},
};

/// Strictly increasing clock so ordering by timestamp is deterministic.
#[derive(Debug, Default)]
struct Clock {
    last: Mutex<Option<OffsetDateTime>>,
}

impl Clock {
    fn tick(&self) -> OffsetDateTime {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let now = OffsetDateTime::now_utc();
        let next = match *last {
            Some(prev) if now <= prev => prev + Duration::microseconds(1),
            _ => now,
        };
        *last = Some(next);
        next
    }
}

#[derive(Debug, Default)]
pub struct InMemoryUsers {
    rows: RwLock<Vec<User>>,
    clock: Clock,
}

impl InMemoryUsers {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepo for InMemoryUsers {
    async fn create(&self, name: &str, email: &str, password_hash: &str) -> anyhow::Result<User> {
        let mut rows = self.rows.write().await;
        if rows.iter().any(|u| u.email == email) {
            return Err(anyhow::Error::new(StoreError::UniqueViolation).context("insert user"));
        }
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            email: email.to_owned(),
            password_hash: password_hash.to_owned(),
            created_at: self.clock.tick(),
        };
        rows.push(user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.rows.read().await.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.rows.read().await.iter().find(|u| u.id == id).cloned())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTodos {
    rows: RwLock<Vec<Todo>>,
    clock: Clock,
    // 1-based position inside a batch that fails with a unique violation; 0 = off
    fail_batch_at: AtomicUsize,
}

impl InMemoryTodos {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: makes the `n`-th insert of every following batch fail with
    /// a unique-key violation.
    #[doc(hidden)]
    pub fn fail_batch_insert_at(&self, n: usize) {
        self.fail_batch_at.store(n, Ordering::SeqCst);
    }

    pub async fn count_for(&self, user_id: Uuid) -> usize {
        self.rows
            .read()
            .await
            .iter()
            .filter(|t| t.user_id == user_id)
            .count()
    }

    fn build(&self, user_id: Uuid, todo: &NewTodo) -> Todo {
        let now = self.clock.tick();
        Todo {
            id: Uuid::new_v4(),
            title: todo.title.clone(),
            description: todo.description.clone(),
            user_id,
            created_at: now,
            updated_at: now,
        }
    }
}

#[async_trait]
impl TodoRepo for InMemoryTodos {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Todo>> {
        Ok(self.rows.read().await.iter().find(|t| t.id == id).cloned())
    }

    async fn create(&self, user_id: Uuid, todo: &NewTodo) -> anyhow::Result<Todo> {
        let row = self.build(user_id, todo);
        self.rows.write().await.push(row.clone());
        Ok(row)
    }

    async fn create_many(&self, user_id: Uuid, todos: &[NewTodo]) -> anyhow::Result<Vec<Todo>> {
        // Holding the write lock for the whole batch stands in for the transaction.
        let mut rows = self.rows.write().await;
        let fail_at = self.fail_batch_at.load(Ordering::SeqCst);
        let mut staged = Vec::with_capacity(todos.len());
        for (i, todo) in todos.iter().enumerate() {
            if fail_at == i + 1 {
                return Err(anyhow::Error::new(StoreError::UniqueViolation).context("insert todo"));
            }
            staged.push(self.build(user_id, todo));
        }
        rows.extend(staged.iter().cloned());
        Ok(staged)
    }

    async fn update(
        &self,
        id: Uuid,
        user_id: Uuid,
        todo: &NewTodo,
    ) -> anyhow::Result<Option<Todo>> {
        let mut rows = self.rows.write().await;
        let Some(row) = rows.iter_mut().find(|t| t.id == id && t.user_id == user_id) else {
            return Ok(None);
        };
        row.title = todo.title.clone();
        row.description = todo.description.clone();
        row.updated_at = self.clock.tick();
        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|t| !(t.id == id && t.user_id == user_id));
        Ok(rows.len() < before)
    }

    async fn list_by_user(&self, user_id: Uuid, query: &ListQuery) -> anyhow::Result<TodoPage> {
        let rows = self.rows.read().await;
        let mut matching: Vec<Todo> = rows
            .iter()
            .filter(|t| t.user_id == user_id)
            .filter(|t| match &query.title {
                Some(needle) => t.title.contains(needle.as_str()),
                None => true,
            })
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            let ord = match query.sort_by {
                SortBy::CreatedAt => a.created_at.cmp(&b.created_at),
                SortBy::Title => a.title.cmp(&b.title),
            }
            .then_with(|| a.id.cmp(&b.id));
            match query.sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });

        let total = matching.len() as i64;
        let todos = matching
            .into_iter()
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .collect();
        Ok(TodoPage { todos, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_email_is_a_unique_violation() {
        let users = InMemoryUsers::new();
        users.create("A", "a@x.com", "h").await.unwrap();
        let err = users.create("B", "a@x.com", "h").await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<StoreError>(),
            Some(&StoreError::UniqueViolation)
        );
    }

    #[test]
    fn clock_is_strictly_increasing() {
        let clock = Clock::default();
        let a = clock.tick();
        let b = clock.tick();
        let c = clock.tick();
        assert!(a < b && b < c);
    }
}
