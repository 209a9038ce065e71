use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use tracing::warn;

use crate::error::AppError;

const PURGE_EVERY: u64 = 1024;

/// Sliding-window request counter keyed by client address.
#[derive(Clone)]
pub struct RateLimiter {
    requests: Arc<DashMap<String, Vec<Instant>>>,
    checks: Arc<AtomicU64>,
    max_requests: usize,
    window: Duration,
    message: &'static str,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration, message: &'static str) -> Self {
        Self {
            requests: Arc::new(DashMap::new()),
            checks: Arc::new(AtomicU64::new(0)),
            max_requests,
            window,
            message,
        }
    }

    /// Records one request for `client` and reports whether it is within budget.
    pub fn check(&self, client: &str) -> bool {
        if self.checks.fetch_add(1, Ordering::Relaxed) % PURGE_EVERY == PURGE_EVERY - 1 {
            self.purge_expired();
        }

        let now = Instant::now();
        let mut entry = self.requests.entry(client.to_owned()).or_default();
        entry.retain(|&t| now.duration_since(t) < self.window);

        if entry.len() >= self.max_requests {
            return false;
        }
        entry.push(now);
        true
    }

    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.requests.retain(|_, timestamps| {
            timestamps.retain(|&t| now.duration_since(t) < self.window);
            !timestamps.is_empty()
        });
    }

    pub fn tracked_clients(&self) -> usize {
        self.requests.len()
    }
}

fn client_key(req: &Request) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn enforce(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client = client_key(&req);
    if !limiter.check(&client) {
        warn!(%client, path = %req.uri().path(), "rate limit exceeded");
        return Err(AppError::RateLimited(limiter.message));
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: usize) -> RateLimiter {
        RateLimiter::new(max, Duration::from_secs(60), "Too many requests")
    }

    #[test]
    fn allows_up_to_limit_then_blocks() {
        let l = limiter(3);
        assert!(l.check("10.0.0.1"));
        assert!(l.check("10.0.0.1"));
        assert!(l.check("10.0.0.1"));
        assert!(!l.check("10.0.0.1"));
    }

    #[test]
    fn clients_are_counted_separately() {
        let l = limiter(1);
        assert!(l.check("10.0.0.1"));
        assert!(!l.check("10.0.0.1"));
        assert!(l.check("10.0.0.2"));
    }

    #[test]
    fn window_expiry_frees_budget() {
        let l = RateLimiter::new(1, Duration::from_millis(20), "slow down");
        assert!(l.check("c"));
        assert!(!l.check("c"));
        std::thread::sleep(Duration::from_millis(30));
        assert!(l.check("c"));
    }

    #[test]
    fn purge_drops_idle_clients() {
        let l = RateLimiter::new(5, Duration::from_millis(10), "slow down");
        l.check("a");
        l.check("b");
        assert_eq!(l.tracked_clients(), 2);
        std::thread::sleep(Duration::from_millis(20));
        l.purge_expired();
        assert_eq!(l.tracked_clients(), 0);
    }
}
