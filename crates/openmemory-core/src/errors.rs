//! Error taxonomy shared across the workspace.
//!
//! Storage and provider failures are converted into these variants at the
//! subsystem boundary; messages never name the backing database.

/// Result alias used throughout the workspace.
pub type OmResult<T> = Result<T, OmError>;

/// Every failure an externally observable operation can surface.
#[derive(Debug, thiserror::Error)]
pub enum OmError {
    #[error("{resource} '{id}' not found")]
    NotFound { resource: String, id: String },

    #[error("{message}")]
    Validation { message: String },

    #[error("{message}")]
    Unauthorized { message: String },

    #[error("{message}")]
    Forbidden { message: String },

    #[error("{message}")]
    Conflict { message: String },

    #[error("statement touches user-scoped data without a user_id binding")]
    TenantScope { statement: String },

    #[error("unsupported content type '{content_type}'")]
    UnsupportedContentType { content_type: String },

    #[error("payload of {size} bytes exceeds limit of {limit}")]
    FileTooLarge { size: usize, limit: usize },

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("operation '{operation}' exceeded its deadline")]
    Timeout { operation: String },

    #[error("dependency '{dependency}' unavailable: {reason}")]
    DependencyUnavailable { dependency: String, reason: String },

    #[error("storage error: {message}")]
    Storage { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl OmError {
    /// Stable machine-readable code carried in error response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            OmError::NotFound { .. } => "not_found",
            OmError::Validation { .. } => "validation_error",
            OmError::Unauthorized { .. } => "unauthorized",
            OmError::Forbidden { .. } => "forbidden",
            OmError::Conflict { .. } => "conflict",
            OmError::TenantScope { .. } => "tenant_scope_violation",
            OmError::UnsupportedContentType { .. } => "unsupported_media_type",
            OmError::FileTooLarge { .. } => "file_too_large",
            OmError::RateLimited { .. } => "rate_limited",
            OmError::Timeout { .. } => "timeout",
            OmError::DependencyUnavailable { .. } => "dependency_unavailable",
            OmError::Storage { .. } => "internal",
            OmError::Internal { .. } => "internal",
        }
    }

    /// HTTP status the transport layer maps this error to.
    pub fn http_status(&self) -> u16 {
        match self {
            OmError::NotFound { .. } => 404,
            OmError::Validation { .. } => 400,
            OmError::Unauthorized { .. } => 401,
            OmError::Forbidden { .. } => 403,
            OmError::Conflict { .. } => 409,
            OmError::TenantScope { .. } => 400,
            OmError::UnsupportedContentType { .. } => 415,
            OmError::FileTooLarge { .. } => 413,
            OmError::RateLimited { .. } => 429,
            OmError::Timeout { .. } => 504,
            OmError::DependencyUnavailable { .. } => 503,
            OmError::Storage { .. } | OmError::Internal { .. } => 500,
        }
    }

    /// Whether a caller may retry the operation verbatim.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OmError::RateLimited { .. }
                | OmError::Timeout { .. }
                | OmError::DependencyUnavailable { .. }
        )
    }

    pub fn not_found(resource: &str, id: impl Into<String>) -> Self {
        OmError::NotFound {
            resource: resource.to_string(),
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        OmError::Validation {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        OmError::Conflict {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        OmError::Storage {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        OmError::Internal {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(OmError::not_found("memory", "m1").http_status(), 404);
        assert_eq!(OmError::validation("bad").http_status(), 400);
        assert_eq!(
            OmError::UnsupportedContentType {
                content_type: "application/octet-stream".into()
            }
            .http_status(),
            415
        );
        assert_eq!(
            OmError::FileTooLarge {
                size: 2,
                limit: 1
            }
            .http_status(),
            413
        );
        assert_eq!(
            OmError::RateLimited {
                retry_after_secs: 30
            }
            .http_status(),
            429
        );
        assert_eq!(
            OmError::Timeout {
                operation: "embed".into()
            }
            .http_status(),
            504
        );
    }

    #[test]
    fn storage_error_never_leaks_backend_in_code() {
        assert_eq!(OmError::storage("sqlite busy").code(), "internal");
    }
}
