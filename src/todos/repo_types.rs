use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Todo record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Todo {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub user_id: Uuid,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Validated title/description pair, used for both inserts and updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTodo {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    CreatedAt,
    Title,
}

impl SortBy {
    /// Unknown columns fall back to `created_at`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("title") => SortBy::Title,
            _ => SortBy::CreatedAt,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            SortBy::CreatedAt => "created_at",
            SortBy::Title => "title",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Anything but `asc` (any case) means descending.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(v) if v.eq_ignore_ascii_case("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Page request against one user's todos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub limit: i64,
    pub offset: i64,
    pub title: Option<String>,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
}

#[derive(Debug, Clone)]
pub struct TodoPage {
    pub todos: Vec<Todo>,
    /// Rows matching the filter, independent of the page slice.
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_params_fall_back_silently() {
        assert_eq!(SortBy::parse(Some("title")), SortBy::Title);
        assert_eq!(SortBy::parse(Some("created_at")), SortBy::CreatedAt);
        assert_eq!(SortBy::parse(Some("password_hash")), SortBy::CreatedAt);
        assert_eq!(SortBy::parse(None), SortBy::CreatedAt);

        assert_eq!(SortOrder::parse(Some("asc")), SortOrder::Asc);
        assert_eq!(SortOrder::parse(Some("ASC")), SortOrder::Asc);
        assert_eq!(SortOrder::parse(Some("desc")), SortOrder::Desc);
        assert_eq!(SortOrder::parse(Some("; DROP TABLE todos")), SortOrder::Desc);
    }
}
