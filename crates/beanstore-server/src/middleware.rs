use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, RETRY_AFTER},
        HeaderMap, HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

const API_KEYS_VAR: &str = "BEANSTORE_API_KEYS";
const REQUEST_ID_HEADER: &str = "x-request-id";
/// Rate-limit bucket shared by callers that present no bearer token.
const ANONYMOUS_CLIENT: &str = "anonymous";

/// Request ID carried in request extensions.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Accepted bearer tokens. Disabled auth lets every request through.
#[derive(Debug, Clone)]
pub struct AuthState {
    api_keys: Arc<HashSet<String>>,
    pub enabled: bool,
}

impl AuthState {
    /// Reads `BEANSTORE_API_KEYS` (comma-separated bearer tokens).
    ///
    /// Outside development an empty key list is a startup error.
    pub fn from_env(is_development: bool) -> anyhow::Result<Self> {
        let raw = std::env::var(API_KEYS_VAR).unwrap_or_default();
        Self::from_keys(&raw, is_development)
    }

    pub(crate) fn from_keys(raw: &str, is_development: bool) -> anyhow::Result<Self> {
        let api_keys: HashSet<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(ToOwned::to_owned)
            .collect();

        match (api_keys.is_empty(), is_development) {
            (false, _) => Ok(Self {
                api_keys: Arc::new(api_keys),
                enabled: true,
            }),
            (true, true) => {
                tracing::warn!("{API_KEYS_VAR} is empty; bean API is open in development");
                Ok(Self::disabled())
            }
            (true, false) => anyhow::bail!(
                "{API_KEYS_VAR} must list at least one bearer token outside development"
            ),
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self {
            api_keys: Arc::new(HashSet::new()),
            enabled: false,
        }
    }

    fn allows(&self, token: &str) -> bool {
        self.api_keys.contains(token)
    }
}

/// Fixed-window request limit, counted separately for each bearer token.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    clients: Arc<Mutex<HashMap<String, ClientWindow>>>,
}

#[derive(Debug, Clone, Copy)]
struct ClientWindow {
    started_at: Instant,
    count: usize,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Count one request for `client`. On rejection returns how long until
    /// the client's window resets.
    async fn admit(&self, client: &str) -> Result<(), Duration> {
        let now = Instant::now();
        let mut clients = self.clients.lock().await;

        // Expired windows carry no state worth keeping.
        clients.retain(|_, w| now.duration_since(w.started_at) < self.window);

        let window = clients.entry(client.to_owned()).or_insert(ClientWindow {
            started_at: now,
            count: 0,
        });

        if window.count >= self.max_requests {
            return Err(self.window.saturating_sub(now.duration_since(window.started_at)));
        }
        window.count += 1;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct RejectionBody {
    error: Rejection,
}

#[derive(Debug, Serialize)]
struct Rejection {
    code: &'static str,
    message: &'static str,
}

/// Uses the caller's `x-request-id` when present, otherwise a fresh `UUIDv4`,
/// and echoes it on the response.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;
    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert(REQUEST_ID_HEADER, val);
    }
    res
}

pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    req: Request,
    next: Next,
) -> Response {
    if !auth.enabled {
        return next.run(req).await;
    }

    match bearer_token(req.headers()) {
        Some(token) if auth.allows(token) => next.run(req).await,
        _ => reject(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing or invalid bearer token",
        ),
    }
}

pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let client = bearer_token(req.headers()).unwrap_or(ANONYMOUS_CLIENT).to_owned();

    match rate_limit.admit(&client).await {
        Ok(()) => next.run(req).await,
        Err(retry_after) => {
            tracing::warn!(retry_after_secs = retry_after.as_secs(), "rate limit exceeded");
            let mut res = reject(
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "rate limit exceeded",
            );
            let secs = retry_after.as_secs().max(1);
            if let Ok(val) = HeaderValue::from_str(&secs.to_string()) {
                res.headers_mut().insert(RETRY_AFTER, val);
            }
            res
        }
    }
}

fn reject(status: StatusCode, code: &'static str, message: &'static str) -> Response {
    let body = RejectionBody {
        error: Rejection { code, message },
    };
    (status, Json(body)).into_response()
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
