//! Request middleware: authentication, admin gating, rate limiting.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use openmemory_auth::keys::{static_key_matches, verify_hash, KeyManager};
use openmemory_core::OmError;

use crate::error::ApiError;
use crate::state::{AppState, AuthContext};

fn presented_key(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get("authorization") {
        if let Ok(text) = value.to_str() {
            if let Some(token) = text.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }
    headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "local".to_string())
}

/// Resolve caller identity. When no `API_KEY` is configured the instance is
/// open and requests run anonymously; otherwise a static-key or per-user
/// key match is required.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let cfg = state.config.get();
    let headers = request.headers().clone();
    let presented = presented_key(&headers);
    let ip = client_ip(&headers);

    let context = match (&cfg.api_key, presented) {
        (None, presented) => AuthContext::anonymous(presented.unwrap_or(ip)),
        (Some(configured), Some(presented)) => {
            if static_key_matches(&presented, configured) {
                AuthContext {
                    user_id: None,
                    scopes: vec!["memory:*".into(), "temporal:*".into()],
                    caller_key: caller_fingerprint(&presented),
                }
            } else {
                let manager = KeyManager::new(&state.store);
                match manager.verify(&presented).await? {
                    Some(record) => AuthContext {
                        user_id: Some(record.user_id),
                        scopes: record.scopes,
                        caller_key: caller_fingerprint(&presented),
                    },
                    None => {
                        return Err(ApiError(OmError::Unauthorized {
                            message: "invalid API key".into(),
                        }));
                    }
                }
            }
        }
        (Some(_), None) => {
            return Err(ApiError(OmError::Unauthorized {
                message: "missing API key".into(),
            }));
        }
    };

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

/// Rate limit by key fingerprint or client IP, fixed windows in the store.
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let caller = request
        .extensions()
        .get::<AuthContext>()
        .map(|c| c.caller_key.clone())
        .unwrap_or_else(|| client_ip(request.headers()));
    state.limiter.check(&state.store, &caller).await?;
    Ok(next.run(request).await)
}

/// Admin routes need the distinct admin key. `ADMIN_KEY` may hold either an
/// argon2 hash (preferred, produced by `hash-admin-key`) or a raw secret.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let cfg = state.config.get();
    let Some(admin_key) = &cfg.admin_key else {
        return Err(ApiError(OmError::Forbidden {
            message: "admin surface disabled: no ADMIN_KEY configured".into(),
        }));
    };
    let presented = presented_key(request.headers()).ok_or_else(|| {
        ApiError(OmError::Unauthorized {
            message: "missing admin key".into(),
        })
    })?;

    let ok = if admin_key.starts_with("$argon2") {
        verify_hash(&presented, admin_key)
    } else {
        static_key_matches(&presented, admin_key)
    };
    if !ok {
        return Err(ApiError(OmError::Forbidden {
            message: "admin key rejected".into(),
        }));
    }
    Ok(next.run(request).await)
}

/// Stable non-reversible identity for rate-limit windows; never store the
/// raw key.
fn caller_fingerprint(presented: &str) -> String {
    openmemory_core::hash::digest(presented.as_bytes())[..16].to_string()
}
