//! SQL statement validator.
//!
//! Guards the paths that accept caller-written SQL (ad-hoc queries and
//! query materialization) so they stay read-only. The statement is split
//! into words the way Postgres lexes it: string literals, quoted
//! identifiers, dollar-quoted bodies and comments never count as keywords
//! or statement separators.

use crate::errors::AppError;

/// Validates caller-supplied SQL statements.
pub struct SqlValidator;

/// Keywords that never belong in a read-only statement.
const FORBIDDEN_KEYWORDS: [&str; 9] = [
    "DROP", "TRUNCATE", "DELETE", "ALTER", "INSERT", "UPDATE", "CREATE", "GRANT", "REVOKE",
];

/// Bare word of a statement, uppercased, with its parenthesis depth.
#[derive(Debug, PartialEq)]
struct Word {
    text: String,
    depth: usize,
}

/// Lexical outline of a statement.
#[derive(Debug, Default)]
struct Outline {
    words: Vec<Word>,
    /// `;` outside literals and comments.
    separators: usize,
}

impl SqlValidator {
    /// Validates a SQL statement for forbidden operations.
    ///
    /// # Errors
    /// Returns `AppError::UnsafeSql` if the SQL contains forbidden keywords
    /// or a top-level `INTO`, and `AppError::Validation` for an unterminated
    /// literal or comment.
    pub fn validate(sql: &str) -> Result<(), AppError> {
        check_words(&outline(sql)?)
    }

    /// Validates that `sql` is a single read-only query.
    ///
    /// # Errors
    /// `AppError::Validation` for empty input, multiple statements or a
    /// non-query statement; `AppError::UnsafeSql` for forbidden keywords.
    pub fn validate_select(sql: &str) -> Result<(), AppError> {
        let trimmed = strip_terminator(sql);
        let outline = outline(trimmed)?;
        if outline.words.is_empty() {
            return Err(AppError::Validation("SQL statement is empty".into()));
        }
        if outline.separators > 0 {
            return Err(AppError::Validation(
                "only a single statement is allowed".into(),
            ));
        }
        if !starts_query(&outline) {
            return Err(AppError::Validation(
                "only SELECT or WITH queries are allowed".into(),
            ));
        }
        check_words(&outline)
    }

    /// Checks if the SQL is a SELECT query (including CTEs).
    pub fn is_select(sql: &str) -> bool {
        outline(sql).map(|o| starts_query(&o)).unwrap_or(false)
    }
}

/// Trims whitespace and one trailing `;`.
pub fn strip_terminator(sql: &str) -> &str {
    let trimmed = sql.trim();
    trimmed.strip_suffix(';').map(str::trim_end).unwrap_or(trimmed)
}

fn starts_query(outline: &Outline) -> bool {
    matches!(
        outline.words.first().map(|w| w.text.as_str()),
        Some("SELECT" | "WITH")
    )
}

fn check_words(outline: &Outline) -> Result<(), AppError> {
    for word in &outline.words {
        if FORBIDDEN_KEYWORDS.contains(&word.text.as_str()) {
            return Err(AppError::UnsafeSql(format!(
                "forbidden operation: {}",
                word.text
            )));
        }
        // SELECT ... INTO creates a table.
        if word.text == "INTO" && word.depth == 0 {
            return Err(AppError::UnsafeSql("forbidden operation: SELECT INTO".into()));
        }
    }
    Ok(())
}

fn is_word_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn unterminated(what: &str) -> AppError {
    AppError::Validation(format!("unterminated {}", what))
}

/// Splits `sql` into bare words and counts statement separators.
fn outline(sql: &str) -> Result<Outline, AppError> {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = Outline::default();
    let mut depth = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' => {
                // E'...' strings allow backslash escapes.
                let escapes = i > 0
                    && matches!(chars[i - 1], 'E' | 'e')
                    && (i < 2 || !is_word_char(chars[i - 2]));
                i = skip_quoted(&chars, i + 1, '\'', escapes)
                    .ok_or_else(|| unterminated("string literal"))?;
            }
            '"' => {
                i = skip_quoted(&chars, i + 1, '"', false)
                    .ok_or_else(|| unterminated("quoted identifier"))?;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i = skip_block_comment(&chars, i + 2).ok_or_else(|| unterminated("comment"))?;
            }
            '$' => {
                i = match dollar_tag(&chars, i) {
                    Some(tag) => skip_dollar_body(&chars, i + tag.len(), &tag)
                        .ok_or_else(|| unterminated("dollar-quoted string"))?,
                    None => i + 1,
                };
            }
            '(' => {
                depth += 1;
                i += 1;
            }
            ')' => {
                depth = depth.saturating_sub(1);
                i += 1;
            }
            ';' => {
                out.separators += 1;
                i += 1;
            }
            c if is_word_start(c) => {
                let start = i;
                while i < chars.len() && is_word_char(chars[i]) {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                out.words.push(Word {
                    text: text.to_uppercase(),
                    depth,
                });
            }
            c if c.is_ascii_digit() => {
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.') {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    Ok(out)
}

/// Index just past the closing `quote`, honoring doubled quotes.
fn skip_quoted(chars: &[char], mut i: usize, quote: char, escapes: bool) -> Option<usize> {
    while i < chars.len() {
        match chars[i] {
            '\\' if escapes => i += 2,
            c if c == quote => {
                if chars.get(i + 1) == Some(&quote) {
                    i += 2;
                } else {
                    return Some(i + 1);
                }
            }
            _ => i += 1,
        }
    }
    None
}

/// Index just past the `*/` closing a (possibly nested) block comment.
fn skip_block_comment(chars: &[char], mut i: usize) -> Option<usize> {
    let mut nesting = 1;
    while i < chars.len() {
        if chars[i] == '/' && chars.get(i + 1) == Some(&'*') {
            nesting += 1;
            i += 2;
        } else if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
            nesting -= 1;
            i += 2;
            if nesting == 0 {
                return Some(i);
            }
        } else {
            i += 1;
        }
    }
    None
}

/// `$tag$` opening at `start`, or `None` for a parameter like `$1`.
fn dollar_tag(chars: &[char], start: usize) -> Option<Vec<char>> {
    let mut i = start + 1;
    if chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
        return None;
    }
    while i < chars.len() && chars[i] != '$' {
        if !(chars[i].is_alphanumeric() || chars[i] == '_') {
            return None;
        }
        i += 1;
    }
    (i < chars.len()).then(|| chars[start..=i].to_vec())
}

/// Index just past the closing `tag` of a dollar-quoted body starting at `i`.
fn skip_dollar_body(chars: &[char], mut i: usize, tag: &[char]) -> Option<usize> {
    while i + tag.len() <= chars.len() {
        if chars[i..i + tag.len()] == *tag {
            return Some(i + tag.len());
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_is_allowed() {
        assert!(SqlValidator::validate_select("SELECT * FROM users").is_ok());
        assert!(SqlValidator::validate_select("select datname from pg_database;").is_ok());
    }

    #[test]
    fn test_cte_is_allowed() {
        let sql = "WITH t AS (SELECT 1 AS n) SELECT n FROM t";
        assert!(SqlValidator::validate_select(sql).is_ok());
    }

    #[test]
    fn test_keywords_inside_identifiers_are_allowed() {
        assert!(SqlValidator::validate_select("SELECT last_update FROM orders").is_ok());
        assert!(SqlValidator::validate_select("SELECT * FROM backdrop").is_ok());
        assert!(SqlValidator::validate_select("SELECT created_at, is_deleted FROM t").is_ok());
    }

    #[test]
    fn test_keywords_inside_literals_and_comments_are_allowed() {
        assert!(SqlValidator::validate_select("SELECT 'DROP TABLE x' AS note").is_ok());
        assert!(SqlValidator::validate_select("SELECT \"update\" FROM audit").is_ok());
        assert!(SqlValidator::validate_select("SELECT 1 -- then DELETE everything").is_ok());
        assert!(SqlValidator::validate_select("SELECT /* insert */ 1").is_ok());
        assert!(SqlValidator::validate_select("SELECT $body$ ALTER; $body$ AS s").is_ok());
    }

    #[test]
    fn test_semicolon_inside_literal_is_allowed() {
        assert!(SqlValidator::validate_select("SELECT 'a;b' AS x").is_ok());
        assert!(SqlValidator::validate_select("SELECT 'it''s; fine' AS x;").is_ok());
        assert!(SqlValidator::validate_select(r"SELECT E'a\';b' AS x").is_ok());
    }

    #[test]
    fn test_drop_is_forbidden() {
        assert!(SqlValidator::validate("DROP TABLE users").is_err());
        assert!(SqlValidator::validate("drop\n\ttable users").is_err());
    }

    #[test]
    fn test_stacked_statement_is_rejected() {
        let err = SqlValidator::validate_select("SELECT 1; DROP TABLE users").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = SqlValidator::validate_select("SELECT ';'; SELECT 2").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_select_into_is_rejected() {
        let err = SqlValidator::validate_select("SELECT * INTO stolen FROM users").unwrap_err();
        assert!(matches!(err, AppError::UnsafeSql(_)));
        let err = SqlValidator::validate_select("select id into temp t from users").unwrap_err();
        assert!(matches!(err, AppError::UnsafeSql(_)));
    }

    #[test]
    fn test_writable_cte_is_rejected() {
        let sql = "WITH gone AS (DELETE FROM users RETURNING *) SELECT * FROM gone";
        let err = SqlValidator::validate_select(sql).unwrap_err();
        assert!(matches!(err, AppError::UnsafeSql(_)));
    }

    #[test]
    fn test_unterminated_literal_is_rejected() {
        let err = SqlValidator::validate_select("SELECT 'open").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = SqlValidator::validate_select("SELECT 1 /* open").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_non_query_is_rejected() {
        let err = SqlValidator::validate_select("VACUUM").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(SqlValidator::validate_select("   ").is_err());
        assert!(SqlValidator::validate_select("-- just a comment").is_err());
    }

    #[test]
    fn test_is_select() {
        assert!(SqlValidator::is_select("SELECT * FROM users"));
        assert!(SqlValidator::is_select("/* report */ select 1"));
        assert!(!SqlValidator::is_select("INSERT INTO users"));
    }

    #[test]
    fn test_parameters_are_not_dollar_quotes() {
        assert!(SqlValidator::validate_select("SELECT * FROM t WHERE id = $1").is_ok());
    }

    #[test]
    fn test_strip_terminator() {
        assert_eq!(strip_terminator("  SELECT 1 ;  "), "SELECT 1");
        assert_eq!(strip_terminator("SELECT 1"), "SELECT 1");
    }
}
