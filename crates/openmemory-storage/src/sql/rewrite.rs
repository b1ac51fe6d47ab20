//! Editing operations on the token stream.

use super::tokenizer::{tokenize, Token};

/// Number of parameter placeholders in a statement, ignoring `?` and `$n`
/// sequences inside string literals and comments.
pub fn count_placeholders(sql: &str) -> usize {
    tokenize(sql)
        .iter()
        .filter(|t| matches!(t, Token::Placeholder(_)))
        .count()
}

/// Rewrite `?` placeholders to `$1..$n`. Pre-existing numbered placeholders
/// are left untouched; mixing styles in one statement is a caller bug and is
/// preserved as-is for the database to reject.
pub fn to_numbered(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut n = 0usize;
    for token in tokenize(sql) {
        match token {
            Token::Placeholder("?") => {
                n += 1;
                out.push('$');
                out.push_str(&n.to_string());
            }
            other => out.push_str(other.text()),
        }
    }
    out
}

/// Append a tenancy filter to a statement. The clause must use `?` style;
/// parameter order stays aligned because the clause binds last.
pub fn append_tenant_filter(sql: &str, column: &str) -> String {
    let mut out = String::with_capacity(sql.len() + column.len() + 16);
    out.push_str(sql.trim_end());
    out.push_str(" and ");
    out.push_str(column);
    out.push_str(" = ?");
    out
}

/// Prefix occurrences of the given table names. Only identifier tokens are
/// considered, so a table name inside a literal or comment stays intact.
pub fn prefix_tables(sql: &str, prefix: &str, tables: &[&str]) -> String {
    let mut out = String::with_capacity(sql.len() + 32);
    for token in tokenize(sql) {
        match token {
            Token::Ident(name) if tables.contains(&name) => {
                out.push_str(prefix);
                out.push_str(name);
            }
            other => out.push_str(other.text()),
        }
    }
    out
}

/// Full rewrite for the remote dialect: prefix tables, then number the
/// placeholders.
pub fn for_remote(sql: &str, prefix: &str, tables: &[&str]) -> String {
    to_numbered(&prefix_tables(sql, prefix, tables))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn numbers_only_real_placeholders() {
        let sql = "insert into memories (id, note) values (?, '?') -- ?";
        assert_eq!(
            to_numbered(sql),
            "insert into memories (id, note) values ($1, '?') -- ?"
        );
    }

    #[test]
    fn tenant_filter_adds_exactly_one_placeholder() {
        let sql = "select * from memories where content like '%?%'";
        let appended = append_tenant_filter(sql, "user_id");
        assert_eq!(count_placeholders(sql), 0);
        assert_eq!(count_placeholders(&appended), 1);
        assert!(appended.ends_with("and user_id = ?"));
    }

    #[test]
    fn table_prefix_skips_literals() {
        let sql = "select 'memories' from memories where id = ?";
        assert_eq!(
            prefix_tables(sql, "om_", &["memories"]),
            "select 'memories' from om_memories where id = ?"
        );
    }

    #[test]
    fn remote_rewrite_combines_both() {
        let sql = "delete from waypoints where src_id = ? and user_id = ?";
        assert_eq!(
            for_remote(sql, "om_", &["waypoints"]),
            "delete from om_waypoints where src_id = $1 and user_id = $2"
        );
    }

    // Statement fragments used to synthesize arbitrary-but-plausible SQL.
    fn sql_fragment() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("select x from t".to_string()),
            Just(" where a = ?".to_string()),
            Just(" and b in (?, ?)".to_string()),
            Just(" -- comment with ? and 'quote\n".to_string()),
            Just(" /* block ? $4 */".to_string()),
            Just(" and name = 'it''s ?'".to_string()),
            Just(" or c > 3.25".to_string()),
        ]
    }

    proptest! {
        /// Appending the tenancy clause always yields exactly one more
        /// bindable parameter, whatever the statement contains.
        #[test]
        fn tenant_append_alignment(parts in proptest::collection::vec(sql_fragment(), 1..6)) {
            let sql = parts.concat();
            let before = count_placeholders(&sql);
            let after = count_placeholders(&append_tenant_filter(&sql, "user_id"));
            prop_assert_eq!(after, before + 1);
        }

        /// `?` -> `$n` rewriting preserves the placeholder count and numbers
        /// them densely from 1.
        #[test]
        fn numbering_is_dense(parts in proptest::collection::vec(sql_fragment(), 1..6)) {
            let sql = parts.concat();
            let n = count_placeholders(&sql);
            let rewritten = to_numbered(&sql);
            prop_assert_eq!(count_placeholders(&rewritten), n);
            for i in 1..=n {
                let needle = format!("${}", i);
                prop_assert!(rewritten.contains(&needle));
            }
        }
    }
}
