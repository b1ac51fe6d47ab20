//! Scope strings: `memory:read`, `memory:write`, `admin:*`.

/// Whether a granted scope satisfies a required one. A grant ending in `*`
/// matches any requirement sharing its prefix; `admin:*` implies
/// everything.
pub fn scope_allows(granted: &str, required: &str) -> bool {
    if granted == required || granted == "admin:*" {
        return true;
    }
    match granted.strip_suffix('*') {
        Some(prefix) => required.starts_with(prefix),
        None => false,
    }
}

/// Whether any granted scope satisfies the requirement.
pub fn any_scope_allows<'a>(granted: impl IntoIterator<Item = &'a str>, required: &str) -> bool {
    granted.into_iter().any(|g| scope_allows(g, required))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match() {
        assert!(scope_allows("memory:read", "memory:read"));
        assert!(!scope_allows("memory:read", "memory:write"));
    }

    #[test]
    fn wildcard_prefix() {
        assert!(scope_allows("memory:*", "memory:write"));
        assert!(!scope_allows("memory:*", "admin:users"));
    }

    #[test]
    fn admin_star_implies_all() {
        assert!(scope_allows("admin:*", "memory:write"));
        assert!(scope_allows("admin:*", "admin:backup"));
    }

    #[test]
    fn any_scope_scans_the_grant_set() {
        let grants = ["memory:read", "temporal:write"];
        assert!(any_scope_allows(grants, "temporal:write"));
        assert!(!any_scope_allows(grants, "memory:write"));
    }
}
