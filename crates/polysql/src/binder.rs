//! Parameter binding: SQL text with canonical `?` markers plus ordered values.
//!
//! Every clause compiles into a [`SqlFragment`] that owns both its text and
//! its bindings, and fragments are concatenated in one place. The position of
//! a value in `bindings` therefore always matches the position of its `?` in
//! the text; there is no second pass that collects values separately.

use crate::value::Value;

/// Native placeholder syntax of a dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?` (MySQL)
    Question,
    /// `$1, $2, ...` (Postgres)
    Dollar,
    /// `@p1, @p2, ...` (MSSQL)
    AtP,
    /// `:1, :2, ...` (Oracle)
    Colon,
}

impl PlaceholderStyle {
    /// Render the placeholder for a 1-based index.
    pub fn render(self, index: usize) -> String {
        match self {
            PlaceholderStyle::Question => "?".to_string(),
            PlaceholderStyle::Dollar => format!("${index}"),
            PlaceholderStyle::AtP => format!("@p{index}"),
            PlaceholderStyle::Colon => format!(":{index}"),
        }
    }
}

/// A compiled piece of SQL with canonical `?` markers and its bindings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlFragment {
    sql: String,
    bindings: Vec<Value>,
}

impl SqlFragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fragment with text only.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            bindings: Vec::new(),
        }
    }

    /// A fragment from caller-supplied text with `?` markers and values.
    pub fn with_bindings(sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            bindings,
        }
    }

    /// Append raw SQL (no parameters).
    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Append a `?` marker and bind its value.
    pub fn push_bind(&mut self, value: Value) -> &mut Self {
        self.sql.push('?');
        self.bindings.push(value);
        self
    }

    /// Append a comma-separated list of markers and bind all values.
    pub fn push_bind_list(&mut self, values: impl IntoIterator<Item = Value>) -> &mut Self {
        for (i, value) in values.into_iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.push_bind(value);
        }
        self
    }

    /// Append another fragment, text and bindings together.
    pub fn append(&mut self, other: SqlFragment) -> &mut Self {
        self.sql.push_str(&other.sql);
        self.bindings.extend(other.bindings);
        self
    }

    /// Append `items` joined by `separator`.
    pub fn append_joined(
        &mut self,
        items: impl IntoIterator<Item = SqlFragment>,
        separator: &str,
    ) -> &mut Self {
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                self.sql.push_str(separator);
            }
            self.append(item);
        }
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn bindings(&self) -> &[Value] {
        &self.bindings
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.bindings)
    }
}

/// Opening `$tag$` of a Postgres dollar-quoted body at the start of `s`.
fn dollar_tag(s: &str) -> Option<&str> {
    let end = s[1..].find('$')? + 1;
    let tag = &s[1..end];
    let valid = tag
        .chars()
        .enumerate()
        .all(|(i, c)| c == '_' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit()));
    valid.then(|| &s[..=end])
}

/// Byte offsets of canonical `?` markers outside quoted text and comments.
///
/// Skipped regions are `'...'`, `"..."`, `` `...` ``, `-- ...` and `/* ... */`,
/// plus `[...]` for MSSQL and `$tag$ ... $tag$` bodies for Postgres. A doubled
/// quote (`'it''s'`) closes and reopens the literal, so it needs no special
/// casing. An unterminated region runs to the end of the text.
fn marker_offsets(sql: &str, style: PlaceholderStyle) -> Vec<usize> {
    let bytes = sql.as_bytes();
    let next = |i: usize| bytes.get(i + 1).copied();
    let mut offsets = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let (open, close) = match bytes[i] {
            b'?' => {
                offsets.push(i);
                i += 1;
                continue;
            }
            b'\'' => (1, "'"),
            b'"' => (1, "\""),
            b'`' => (1, "`"),
            b'[' if style == PlaceholderStyle::AtP => (1, "]"),
            b'-' if next(i) == Some(b'-') => (2, "\n"),
            b'/' if next(i) == Some(b'*') => (2, "*/"),
            b'$' if style == PlaceholderStyle::Dollar => match dollar_tag(&sql[i..]) {
                Some(tag) => (tag.len(), tag),
                None => {
                    i += 1;
                    continue;
                }
            },
            _ => {
                i += 1;
                continue;
            }
        };
        let body = i + open;
        i = match sql[body..].find(close) {
            Some(pos) => body + pos + close.len(),
            None => bytes.len(),
        };
    }
    offsets
}

/// Count canonical `?` markers that `style` would rewrite.
pub fn count_placeholders(sql: &str, style: PlaceholderStyle) -> usize {
    marker_offsets(sql, style).len()
}

/// Rewrite canonical `?` markers into `style`, numbering from 1.
///
/// Markers inside quoted text and comments are left untouched.
pub fn rewrite_placeholders(sql: &str, style: PlaceholderStyle) -> String {
    if style == PlaceholderStyle::Question {
        return sql.to_string();
    }
    let offsets = marker_offsets(sql, style);
    let mut out = String::with_capacity(sql.len() + offsets.len() * 3);
    let mut last = 0;
    for (i, off) in offsets.iter().enumerate() {
        out.push_str(&sql[last..*off]);
        out.push_str(&style.render(i + 1));
        last = off + 1;
    }
    out.push_str(&sql[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_keeps_text_and_bindings_aligned() {
        let mut f = SqlFragment::raw("a = ");
        f.push_bind(Value::Int(1));
        f.push(" AND b IN (");
        f.push_bind_list(vec![Value::Int(2), Value::Int(3)]);
        f.push(")");
        assert_eq!(f.sql(), "a = ? AND b IN (?, ?)");
        assert_eq!(
            f.bindings().len(),
            count_placeholders(f.sql(), PlaceholderStyle::Dollar)
        );
    }

    #[test]
    fn rewrite_numbers_left_to_right() {
        let sql = "SELECT * FROM t WHERE a = ? AND b = ? AND c = ?";
        assert_eq!(
            rewrite_placeholders(sql, PlaceholderStyle::Dollar),
            "SELECT * FROM t WHERE a = $1 AND b = $2 AND c = $3"
        );
        assert_eq!(
            rewrite_placeholders(sql, PlaceholderStyle::AtP),
            "SELECT * FROM t WHERE a = @p1 AND b = @p2 AND c = @p3"
        );
        assert_eq!(
            rewrite_placeholders(sql, PlaceholderStyle::Colon),
            "SELECT * FROM t WHERE a = :1 AND b = :2 AND c = :3"
        );
        assert_eq!(rewrite_placeholders(sql, PlaceholderStyle::Question), sql);
    }

    #[test]
    fn rewrite_skips_quoted_markers() {
        let sql = "SELECT '?', \"a?\", `b?` FROM t WHERE x = ? AND y = 'it''s ?'";
        assert_eq!(count_placeholders(sql, PlaceholderStyle::Dollar), 1);
        assert_eq!(
            rewrite_placeholders(sql, PlaceholderStyle::Dollar),
            "SELECT '?', \"a?\", `b?` FROM t WHERE x = $1 AND y = 'it''s ?'"
        );
    }

    #[test]
    fn mssql_brackets_hide_markers() {
        let sql = "SELECT [a?], [b] FROM [t] WHERE [x] = ? AND [y] = ?";
        assert_eq!(count_placeholders(sql, PlaceholderStyle::AtP), 2);
        assert_eq!(
            rewrite_placeholders(sql, PlaceholderStyle::AtP),
            "SELECT [a?], [b] FROM [t] WHERE [x] = @p1 AND [y] = @p2"
        );
        // Postgres array subscripts still take a binding
        assert_eq!(
            rewrite_placeholders("SELECT tags[?] FROM t", PlaceholderStyle::Dollar),
            "SELECT tags[$1] FROM t"
        );
    }

    #[test]
    fn comments_hide_markers() {
        let sql = "SELECT a -- why?\nFROM t /* maybe? */ WHERE a = ?";
        assert_eq!(count_placeholders(sql, PlaceholderStyle::Colon), 1);
        assert_eq!(
            rewrite_placeholders(sql, PlaceholderStyle::Colon),
            "SELECT a -- why?\nFROM t /* maybe? */ WHERE a = :1"
        );
        assert_eq!(count_placeholders("a - ? - ?", PlaceholderStyle::AtP), 2);
    }

    #[test]
    fn dollar_quoted_bodies_hide_markers() {
        let sql = "DO $body$ BEGIN RAISE NOTICE '?'; END $body$; SELECT $$x?$$, ?";
        assert_eq!(
            rewrite_placeholders(sql, PlaceholderStyle::Dollar),
            "DO $body$ BEGIN RAISE NOTICE '?'; END $body$; SELECT $$x?$$, $1"
        );
        assert_eq!(dollar_tag("$1 + ?"), None);
        assert_eq!(dollar_tag("$tag$ x"), Some("$tag$"));
    }

    #[test]
    fn rewrite_round_trip_for_any_count() {
        for n in 0..40 {
            let sql = vec!["?"; n].join(", ");
            for style in [
                PlaceholderStyle::Dollar,
                PlaceholderStyle::AtP,
                PlaceholderStyle::Colon,
            ] {
                let out = rewrite_placeholders(&sql, style);
                let expected: Vec<String> = (1..=n).map(|i| style.render(i)).collect();
                assert_eq!(out, expected.join(", "));
            }
        }
    }
}
