//! Application-layer rate limiting for login and registration routes

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use shared::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::state::AppState;

const WINDOW_SECS: u64 = 60;

/// Per-IP limits for the credential routes
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    /// Requests per minute. `0` disables the limit.
    pub login_per_minute: u32,
    /// Requests per minute. `0` disables the limit.
    pub register_per_minute: u32,
    /// The server sits behind one reverse proxy that appends the peer to
    /// `X-Forwarded-For`. Off: the header is ignored.
    pub trust_proxy: bool,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            login_per_minute: 5,
            register_per_minute: 3,
            trust_proxy: false,
        }
    }
}

struct IpEntry {
    count: u32,
    window_start: Instant,
}

#[derive(Clone)]
pub struct RateLimiter {
    limits: RateLimits,
    /// route name -> (IP -> entry)
    inner: Arc<Mutex<HashMap<&'static str, HashMap<String, IpEntry>>>>,
}

impl RateLimiter {
    pub fn new(limits: RateLimits) -> Self {
        Self {
            limits,
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns `true` if the request is allowed, `false` if rate-limited.
    async fn check(&self, route: &'static str, ip: &str, max_requests: u32) -> bool {
        if max_requests == 0 {
            return true;
        }

        let mut map = self.inner.lock().await;
        let route_map = map.entry(route).or_default();
        let now = Instant::now();

        let entry = route_map.entry(ip.to_owned()).or_insert_with(|| IpEntry {
            count: 0,
            window_start: now,
        });

        // Reset window if expired
        if now.duration_since(entry.window_start).as_secs() >= WINDOW_SECS {
            entry.count = 0;
            entry.window_start = now;
        }

        entry.count += 1;
        entry.count <= max_requests
    }

    /// Remove entries older than 5 minutes
    pub async fn cleanup(&self) {
        let mut map = self.inner.lock().await;
        let cutoff = std::time::Duration::from_secs(300);
        let now = Instant::now();

        for route_map in map.values_mut() {
            route_map.retain(|_, entry| now.duration_since(entry.window_start) < cutoff);
        }

        map.retain(|_, route_map| !route_map.is_empty());
    }
}

/// Extract client IP: peer address, or the hop our proxy recorded when `trust_proxy` is set.
fn extract_ip(request: &Request, trust_proxy: bool) -> String {
    if trust_proxy
        && let Some(forwarded) = request.headers().get("x-forwarded-for")
        && let Ok(val) = forwarded.to_str()
    {
        // Entries left of the last one are client-supplied
        if let Some(last) = val.rsplit(',').next() {
            let ip = last.trim();
            if let Ok(addr) = ip.parse::<std::net::IpAddr>() {
                return addr.to_string();
            }
        }
    }

    // Fallback: peer address from extensions (ConnectInfo)
    request
        .extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_owned())
}

fn too_many_requests(route: &str, ip: &str) -> Response {
    tracing::warn!(route, ip, "Rate limit exceeded");
    AppError::rate_limited().into_response()
}

/// Rate limit middleware for login
pub async fn login_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let limits = state.rate_limiter.limits;
    let ip = extract_ip(&request, limits.trust_proxy);
    let limit = limits.login_per_minute;
    if !state.rate_limiter.check("login", &ip, limit).await {
        return Err(too_many_requests("login", &ip));
    }
    Ok(next.run(request).await)
}

/// Rate limit middleware for registration
pub async fn register_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let limits = state.rate_limiter.limits;
    let ip = extract_ip(&request, limits.trust_proxy);
    let limit = limits.register_per_minute;
    if !state.rate_limiter.check("register", &ip, limit).await {
        return Err(too_many_requests("register", &ip));
    }
    Ok(next.run(request).await)
}
