//! Fixed-window throttle for the sign-up, sign-in and confirmation routes.
//!
//! Counters live in process memory, so each instance limits independently.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use tokio::sync::Mutex;

use crate::error::AppError;
use crate::AppState;

/// Attempts seen from one client on one route within the current window.
#[derive(Debug, Clone, Copy)]
struct Window {
    opened: Instant,
    used: u32,
}

impl Window {
    fn open(now: Instant) -> Self {
        Self { opened: now, used: 0 }
    }

    fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.opened)
    }
}

#[derive(Clone)]
pub struct RateLimitState {
    windows: Arc<Mutex<HashMap<String, Window>>>,
    allowance: u32,
    length: Duration,
}

impl RateLimitState {
    pub fn new(allowance: u32, window_secs: u64) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            allowance,
            length: Duration::from_secs(window_secs),
        }
    }

    /// Counts one attempt for `key`. `Ok` carries the attempts left in this
    /// window; `Err` carries the time until the window reopens.
    pub async fn check(&self, key: &str) -> Result<u32, Duration> {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let window = windows
            .entry(key.to_owned())
            .or_insert_with(|| Window::open(now));

        if window.age(now) > self.length {
            *window = Window::open(now);
        }
        if window.used >= self.allowance {
            return Err(self.length.saturating_sub(window.age(now)));
        }

        window.used += 1;
        Ok(self.allowance - window.used)
    }

    /// Forgets clients whose last window closed more than one window ago.
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let horizon = self.length * 2;
        self.windows
            .lock()
            .await
            .retain(|_, window| window.age(now) < horizon);
    }

    pub fn spawn_cleanup(&self) {
        let limiter = self.clone();
        let every = self.length.max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                limiter.cleanup().await;
            }
        });
    }

    #[cfg(test)]
    async fn tracked_keys(&self) -> usize {
        self.windows.lock().await.len()
    }
}

/// Each route gets its own allowance per client address.
fn client_key(peer: Option<SocketAddr>, path: &str) -> String {
    match peer {
        Some(addr) => format!("{}:{path}", addr.ip()),
        None => format!("unknown:{path}"),
    }
}

pub async fn rate_limit_auth(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    let key = client_key(peer, req.uri().path());

    match state.rate_limiter.check(&key).await {
        Ok(left) => {
            tracing::debug!(key = %key, left, "Auth attempt allowed");
            Ok(next.run(req).await)
        }
        Err(wait) => {
            tracing::warn!(key = %key, wait_secs = wait.as_secs(), "Auth attempts throttled");
            Err(AppError::RateLimited)
        }
    }
}
