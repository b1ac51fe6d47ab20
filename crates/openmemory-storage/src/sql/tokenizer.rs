//! A small SQL tokenizer.
//!
//! Recognizes whitespace, identifiers, numeric literals, single-quoted
//! strings with doubled `''` escapes, `--` line comments, `/* */` block
//! comments, and `?` / `$n` placeholders. Everything else passes through as
//! single-character symbols.

/// One lexical unit of a SQL string. Tokens borrow from the input; joining
/// them in order reproduces the input exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Whitespace(&'a str),
    Ident(&'a str),
    Number(&'a str),
    /// Includes the surrounding quotes.
    StringLit(&'a str),
    LineComment(&'a str),
    BlockComment(&'a str),
    /// `?` or `$n`.
    Placeholder(&'a str),
    Symbol(&'a str),
}

impl<'a> Token<'a> {
    pub fn text(&self) -> &'a str {
        match self {
            Token::Whitespace(s)
            | Token::Ident(s)
            | Token::Number(s)
            | Token::StringLit(s)
            | Token::LineComment(s)
            | Token::BlockComment(s)
            | Token::Placeholder(s)
            | Token::Symbol(s) => s,
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Tokenize a SQL string. Unterminated strings and block comments extend to
/// the end of the input rather than failing; the rewriter treats them as
/// opaque, which is the safe interpretation.
pub fn tokenize(sql: &str) -> Vec<Token<'_>> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let rest = &sql[i..];
        let c = rest.chars().next().unwrap();

        // Whitespace run.
        if c.is_whitespace() {
            let end = rest
                .char_indices()
                .find(|(_, ch)| !ch.is_whitespace())
                .map(|(idx, _)| idx)
                .unwrap_or(rest.len());
            tokens.push(Token::Whitespace(&rest[..end]));
            i += end;
            continue;
        }

        // Line comment.
        if rest.starts_with("--") {
            let end = rest.find('\n').map(|p| p + 1).unwrap_or(rest.len());
            tokens.push(Token::LineComment(&rest[..end]));
            i += end;
            continue;
        }

        // Block comment (no nesting, per SQL).
        if rest.starts_with("/*") {
            let end = rest[2..].find("*/").map(|p| p + 4).unwrap_or(rest.len());
            tokens.push(Token::BlockComment(&rest[..end]));
            i += end;
            continue;
        }

        // Single-quoted string, '' escapes a quote.
        if c == '\'' {
            let inner = &rest[1..];
            let mut end = rest.len();
            let mut pos = 0;
            let inner_bytes = inner.as_bytes();
            while pos < inner_bytes.len() {
                if inner_bytes[pos] == b'\'' {
                    if inner_bytes.get(pos + 1) == Some(&b'\'') {
                        pos += 2;
                        continue;
                    }
                    end = pos + 2;
                    break;
                }
                pos += 1;
            }
            tokens.push(Token::StringLit(&rest[..end]));
            i += end;
            continue;
        }

        // Positional placeholder.
        if c == '?' {
            tokens.push(Token::Placeholder(&rest[..1]));
            i += 1;
            continue;
        }

        // Numbered placeholder $1, $2, ... A bare `$` is a symbol.
        if c == '$' {
            let digits = rest[1..]
                .char_indices()
                .take_while(|(_, ch)| ch.is_ascii_digit())
                .count();
            if digits > 0 {
                tokens.push(Token::Placeholder(&rest[..1 + digits]));
                i += 1 + digits;
                continue;
            }
            tokens.push(Token::Symbol(&rest[..1]));
            i += 1;
            continue;
        }

        // Identifier or keyword.
        if is_ident_start(c) {
            let end = rest
                .char_indices()
                .find(|(_, ch)| !is_ident_continue(*ch))
                .map(|(idx, _)| idx)
                .unwrap_or(rest.len());
            tokens.push(Token::Ident(&rest[..end]));
            i += end;
            continue;
        }

        // Numeric literal (digits, optional fraction).
        if c.is_ascii_digit() {
            let mut end = rest
                .char_indices()
                .find(|(_, ch)| !ch.is_ascii_digit())
                .map(|(idx, _)| idx)
                .unwrap_or(rest.len());
            if rest[end..].starts_with('.') {
                let frac = rest[end + 1..]
                    .char_indices()
                    .take_while(|(_, ch)| ch.is_ascii_digit())
                    .count();
                if frac > 0 {
                    end += 1 + frac;
                }
            }
            tokens.push(Token::Number(&rest[..end]));
            i += end;
            continue;
        }

        let len = c.len_utf8();
        tokens.push(Token::Symbol(&rest[..len]));
        i += len;
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placeholders(sql: &str) -> usize {
        tokenize(sql)
            .iter()
            .filter(|t| matches!(t, Token::Placeholder(_)))
            .count()
    }

    #[test]
    fn joining_tokens_reproduces_input() {
        let sql = "select id, 'it''s?' from memories -- trailing ?\nwhere user_id = ? /* ? */";
        let joined: String = tokenize(sql).iter().map(|t| t.text()).collect();
        assert_eq!(joined, sql);
    }

    #[test]
    fn placeholders_inside_literals_are_not_placeholders() {
        assert_eq!(placeholders("select '?' , ?"), 1);
        assert_eq!(placeholders("select 'a''?b' where x = ?"), 1);
    }

    #[test]
    fn placeholders_inside_comments_are_not_placeholders() {
        assert_eq!(placeholders("select 1 -- ? ?\n"), 0);
        assert_eq!(placeholders("select /* ? */ ?"), 1);
    }

    #[test]
    fn numbered_placeholders_are_single_tokens() {
        let tokens = tokenize("where a = $1 and b = $23");
        let ph: Vec<_> = tokens
            .iter()
            .filter_map(|t| match t {
                Token::Placeholder(s) => Some(*s),
                _ => None,
            })
            .collect();
        assert_eq!(ph, vec!["$1", "$23"]);
    }

    #[test]
    fn bare_dollar_is_a_symbol() {
        let tokens = tokenize("$ ?");
        assert!(matches!(tokens[0], Token::Symbol("$")));
    }

    #[test]
    fn unterminated_string_extends_to_end() {
        let tokens = tokenize("select 'oops ? ");
        assert!(matches!(tokens.last().unwrap(), Token::StringLit(_)));
    }
}
