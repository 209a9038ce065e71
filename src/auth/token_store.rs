use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;

const PURGE_EVERY: u64 = 256;

/// Set of refresh tokens that were issued and not yet revoked or expired.
///
/// The in-process implementation forgets everything on restart and is not
/// shared between instances; a deployment with several replicas needs an
/// implementation backed by a shared store.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// `expires_at` is the token's `exp` claim, in unix seconds.
    async fn insert(&self, token: &str, expires_at: i64) -> anyhow::Result<()>;
    /// False for unknown tokens and for tokens past `expires_at`.
    async fn contains(&self, token: &str) -> anyhow::Result<bool>;
    /// Returns whether the token was present. Removing an absent token is not an error.
    async fn remove(&self, token: &str) -> anyhow::Result<bool>;
}

fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[derive(Debug, Default)]
pub struct InMemoryRefreshTokens {
    tokens: DashMap<String, i64>,
    inserts: AtomicU64,
}

impl InMemoryRefreshTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Drops every token whose expiry is at or before `now`.
    pub fn purge_expired(&self, now: i64) {
        self.tokens.retain(|_, expires_at| *expires_at > now);
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokens {
    async fn insert(&self, token: &str, expires_at: i64) -> anyhow::Result<()> {
        if self.inserts.fetch_add(1, Ordering::Relaxed) % PURGE_EVERY == PURGE_EVERY - 1 {
            self.purge_expired(now_unix());
        }
        self.tokens.insert(token.to_owned(), expires_at);
        Ok(())
    }

    async fn contains(&self, token: &str) -> anyhow::Result<bool> {
        let now = now_unix();
        if self
            .tokens
            .remove_if(token, |_, expires_at| *expires_at <= now)
            .is_some()
        {
            return Ok(false);
        }
        Ok(self.tokens.contains_key(token))
    }

    async fn remove(&self, token: &str) -> anyhow::Result<bool> {
        Ok(self.tokens.remove(token).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn later() -> i64 {
        now_unix() + 3600
    }

    #[tokio::test]
    async fn insert_contains_remove() {
        let store = InMemoryRefreshTokens::new();
        store.insert("a", later()).await.unwrap();
        assert!(store.contains("a").await.unwrap());
        assert!(!store.contains("b").await.unwrap());

        assert!(store.remove("a").await.unwrap());
        assert!(!store.remove("a").await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn expired_token_is_dropped_on_lookup() {
        let store = InMemoryRefreshTokens::new();
        store.insert("old", now_unix() - 10).await.unwrap();
        assert_eq!(store.len(), 1);
        assert!(!store.contains("old").await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn purge_keeps_only_live_tokens() {
        let store = InMemoryRefreshTokens::new();
        store.insert("old", now_unix() - 10).await.unwrap();
        store.insert("live", later()).await.unwrap();
        store.purge_expired(now_unix());
        assert_eq!(store.len(), 1);
        assert!(store.contains("live").await.unwrap());
    }

    #[tokio::test]
    async fn inserts_periodically_sweep_expired_tokens() {
        let store = InMemoryRefreshTokens::new();
        for i in 0..PURGE_EVERY - 1 {
            store.insert(&format!("old-{i}"), now_unix() - 10).await.unwrap();
        }
        assert_eq!(store.len(), (PURGE_EVERY - 1) as usize);
        store.insert("live", later()).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_inserts_are_not_lost() {
        let store = Arc::new(InMemoryRefreshTokens::new());
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.insert(&format!("token-{i}"), later()).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(store.len(), 32);
    }
}
