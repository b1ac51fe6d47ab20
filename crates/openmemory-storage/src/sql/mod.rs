//! Placeholder-aware SQL editing.
//!
//! Statements are written once in embedded (`?`) style; the remote backend
//! rewrites them to `$n` style and prefixes table names. All editing runs on
//! the token stream so placeholders inside string literals and comments are
//! never miscounted.

pub mod rewrite;
pub mod statements;
pub mod tokenizer;

pub use rewrite::{append_tenant_filter, count_placeholders, for_remote, to_numbered};
pub use tokenizer::{tokenize, Token};
