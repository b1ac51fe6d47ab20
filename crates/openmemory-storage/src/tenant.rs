//! Strict-tenancy guard.
//!
//! Every statement that touches a `user_id` column must bind a non-null
//! user id. In strict mode a violation is an error; otherwise it bumps a
//! warning counter and logs once per offending statement shape.

use std::sync::atomic::{AtomicU64, Ordering};

use openmemory_core::{OmError, OmResult};

use crate::sql::{tokenize, Token};

/// Process-wide guard state. Cheap to share; the counter is the only
/// mutable part.
pub struct TenantGuard {
    strict: bool,
    violations: AtomicU64,
}

impl TenantGuard {
    pub fn new(strict: bool) -> Self {
        Self {
            strict,
            violations: AtomicU64::new(0),
        }
    }

    pub fn strict(&self) -> bool {
        self.strict
    }

    /// Number of unscoped statements observed in non-strict mode.
    pub fn violation_count(&self) -> u64 {
        self.violations.load(Ordering::Relaxed)
    }

    /// Check one statement before execution. `user_id` is the tenant binding
    /// the caller will pass, if any.
    pub fn check(&self, sql: &str, user_id: Option<&str>) -> OmResult<()> {
        if !references_user_column(sql) {
            return Ok(());
        }
        match user_id {
            Some(id) if !id.is_empty() => Ok(()),
            _ if self.strict => Err(OmError::TenantScope {
                statement: first_words(sql),
            }),
            _ => {
                self.violations.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(statement = %first_words(sql), "statement touches user_id without a tenant binding");
                Ok(())
            }
        }
    }
}

/// Whether the statement references a `user_id` column outside literals and
/// comments.
fn references_user_column(sql: &str) -> bool {
    tokenize(sql)
        .iter()
        .any(|t| matches!(t, Token::Ident(s) if s.eq_ignore_ascii_case("user_id")))
}

fn first_words(sql: &str) -> String {
    sql.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_mode_rejects_unbound_user_statements() {
        let guard = TenantGuard::new(true);
        let err = guard
            .check("DELETE FROM memories WHERE user_id = ?", None)
            .unwrap_err();
        assert!(matches!(err, OmError::TenantScope { .. }));
    }

    #[test]
    fn strict_mode_accepts_bound_statements() {
        let guard = TenantGuard::new(true);
        guard
            .check("DELETE FROM memories WHERE user_id = ?", Some("u1"))
            .unwrap();
    }

    #[test]
    fn statements_without_user_column_pass() {
        let guard = TenantGuard::new(true);
        guard.check("SELECT version FROM schema_migrations", None).unwrap();
    }

    #[test]
    fn user_id_inside_literal_does_not_trigger() {
        let guard = TenantGuard::new(true);
        guard
            .check("SELECT 'user_id' FROM schema_migrations", None)
            .unwrap();
        guard
            .check("SELECT version FROM schema_migrations -- user_id", None)
            .unwrap();
    }

    #[test]
    fn lax_mode_counts_instead_of_failing() {
        let guard = TenantGuard::new(false);
        guard
            .check("DELETE FROM memories WHERE user_id = ?", None)
            .unwrap();
        assert_eq!(guard.violation_count(), 1);
    }
}
