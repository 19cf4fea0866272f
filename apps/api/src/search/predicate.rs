//! Predicate tree for job filters.
//!
//! The matching logic is built once as a tree of AND/OR nodes over column
//! leaves, then rendered at the edge: to SQL for one of three placeholder
//! styles, or evaluated in-process against a row.

use std::cmp::Ordering;

/// Searchable columns of the `jobs` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    TitleNorm,
    Title,
    Description,
    Location,
    City,
    Region,
    Country,
}

impl Column {
    pub fn name(self) -> &'static str {
        match self {
            Column::TitleNorm => "job_title_norm",
            Column::Title => "job_title",
            Column::Description => "job_description",
            Column::Location => "location",
            Column::City => "city",
            Column::Region => "region",
            Column::Country => "country",
        }
    }
}

/// Row access used by in-process evaluation. Missing values read as "".
pub trait Searchable {
    fn column_value(&self, column: Column) -> &str;
    fn posted_date(&self) -> Option<&str>;
    fn row_id(&self) -> i64;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
    /// Case-insensitive LIKE with `\` as escape character. Patterns are built
    /// lowercase from escaped input.
    Like { column: Column, pattern: String },
    Equals { column: Column, value: String },
    In { column: Column, values: Vec<String> },
}

impl Predicate {
    pub fn like(column: Column, pattern: impl Into<String>) -> Self {
        Predicate::Like {
            column,
            pattern: pattern.into(),
        }
    }

    /// One `LIKE pattern` leaf per column, OR'd together.
    pub fn like_any(columns: &[Column], pattern: &str) -> Self {
        Predicate::Any(columns.iter().map(|c| Predicate::like(*c, pattern)).collect())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Predicate::All(p) | Predicate::Any(p) if p.is_empty())
    }

    pub fn matches<R: Searchable + ?Sized>(&self, row: &R) -> bool {
        match self {
            Predicate::All(children) => children.iter().all(|p| p.matches(row)),
            Predicate::Any(children) => children.iter().any(|p| p.matches(row)),
            Predicate::Like { column, pattern } => {
                like_matches(pattern, &row.column_value(*column).to_lowercase())
            }
            Predicate::Equals { column, value } => {
                row.column_value(*column).to_lowercase() == value.to_lowercase()
            }
            Predicate::In { column, values } => {
                let actual = row.column_value(*column).to_lowercase();
                values.iter().any(|v| v.to_lowercase() == actual)
            }
        }
    }

    fn render(&self, out: &mut SqlWriter) {
        match self {
            Predicate::All(children) => out.push_group(children, " AND ", "1=1"),
            Predicate::Any(children) => out.push_group(children, " OR ", "1=0"),
            Predicate::Like { column, pattern } => {
                out.push_column(*column);
                out.sql.push_str(" LIKE ");
                out.push_param(SqlParam::Text(pattern.clone()));
                out.sql.push_str(" ESCAPE '\\'");
            }
            Predicate::Equals { column, value } => {
                out.push_column(*column);
                out.sql.push_str(" = ");
                out.push_param(SqlParam::Text(value.to_lowercase()));
            }
            Predicate::In { column, values } => {
                if values.is_empty() {
                    out.sql.push_str("1=0");
                    return;
                }
                out.push_column(*column);
                out.sql.push_str(" IN (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        out.sql.push_str(", ");
                    }
                    out.push_param(SqlParam::Text(value.to_lowercase()));
                }
                out.sql.push(')');
            }
        }
    }
}

/// Escapes LIKE wildcards so user input only ever matches literally.
pub fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// `%value%` with wildcards in `value` escaped.
pub fn contains_pattern(value: &str) -> String {
    format!("%{}%", escape_like(value))
}

#[derive(Debug, Clone, PartialEq)]
enum LikeToken {
    AnySeq,
    AnyChar,
    Literal(char),
}

fn tokenize_like(pattern: &str) -> Vec<LikeToken> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '\\' => LikeToken::Literal(chars.next().unwrap_or('\\')),
            '%' => LikeToken::AnySeq,
            '_' => LikeToken::AnyChar,
            other => LikeToken::Literal(other),
        });
    }
    tokens
}

/// SQL LIKE semantics with `\` as escape character.
pub fn like_matches(pattern: &str, value: &str) -> bool {
    let tokens = tokenize_like(pattern);
    let chars: Vec<char> = value.chars().collect();
    let (mut t, mut v) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;

    while v < chars.len() {
        match tokens.get(t) {
            Some(LikeToken::AnySeq) => {
                backtrack = Some((t, v));
                t += 1;
            }
            Some(LikeToken::AnyChar) => {
                t += 1;
                v += 1;
            }
            Some(LikeToken::Literal(c)) if *c == chars[v] => {
                t += 1;
                v += 1;
            }
            _ => match backtrack {
                Some((star_t, star_v)) => {
                    t = star_t + 1;
                    v = star_v + 1;
                    backtrack = Some((star_t, star_v + 1));
                }
                None => return false,
            },
        }
    }
    tokens[t.min(tokens.len())..]
        .iter()
        .all(|tok| *tok == LikeToken::AnySeq)
}

/// Result ordering. Recency is always the final key: dated rows first, newest
/// first, then higher id.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultOrder {
    Recent,
    /// Jobs whose location mentions a hub sort ahead of others, in list order.
    HubsFirst(&'static [&'static str]),
}

impl ResultOrder {
    fn render(&self, out: &mut SqlWriter) {
        out.sql.push_str("ORDER BY ");
        if let ResultOrder::HubsFirst(hubs) = self {
            out.sql.push_str("CASE ");
            for (rank, hub) in hubs.iter().enumerate() {
                out.sql.push_str("WHEN ");
                out.push_column(Column::Location);
                out.sql.push_str(" LIKE ");
                out.push_param(SqlParam::Text(contains_pattern(hub)));
                out.sql.push_str(&format!(" ESCAPE '\\' THEN {rank} "));
            }
            out.sql.push_str(&format!("ELSE {} END, ", hubs.len()));
        }
        out.sql.push_str("(date IS NULL) ASC, date DESC, id DESC");
    }

    fn hub_rank<R: Searchable + ?Sized>(&self, row: &R) -> usize {
        match self {
            ResultOrder::Recent => 0,
            ResultOrder::HubsFirst(hubs) => {
                let location = row.column_value(Column::Location).to_lowercase();
                hubs.iter()
                    .position(|hub| like_matches(&contains_pattern(hub), &location))
                    .unwrap_or(hubs.len())
            }
        }
    }

    /// Same ordering as the rendered ORDER BY, for in-process stores.
    pub fn compare<R: Searchable + ?Sized>(&self, a: &R, b: &R) -> Ordering {
        self.hub_rank(a)
            .cmp(&self.hub_rank(b))
            .then_with(|| match (a.posted_date(), b.posted_date()) {
                (Some(x), Some(y)) => y.cmp(x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| b.row_id().cmp(&a.row_id()))
    }
}

/// Placeholder syntax of the target driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `%s`, for drivers using format-style parameters
    Format,
    /// `$1`, `$2`, … (Postgres)
    Numbered,
    /// `?` (SQLite)
    QuestionMark,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Int(i64),
    Null,
}

/// A rendered statement and its bind values, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

/// Accumulates SQL text and parameters so numbered placeholders stay in sync
/// across WHERE, ORDER BY and LIMIT.
pub struct SqlWriter {
    style: PlaceholderStyle,
    sql: String,
    params: Vec<SqlParam>,
}

impl SqlWriter {
    pub fn new(style: PlaceholderStyle) -> Self {
        Self {
            style,
            sql: String::new(),
            params: Vec::new(),
        }
    }

    pub fn push_sql(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    pub fn push_param(&mut self, param: SqlParam) -> &mut Self {
        self.params.push(param);
        match self.style {
            PlaceholderStyle::Format => self.sql.push_str("%s"),
            PlaceholderStyle::Numbered => self.sql.push_str(&format!("${}", self.params.len())),
            PlaceholderStyle::QuestionMark => self.sql.push('?'),
        }
        self
    }

    /// Appends ` WHERE <predicate>` unless the predicate is empty.
    pub fn push_where(&mut self, predicate: &Predicate) -> &mut Self {
        if !predicate.is_empty() {
            self.sql.push_str(" WHERE ");
            predicate.render(self);
        }
        self
    }

    pub fn push_order(&mut self, order: &ResultOrder) -> &mut Self {
        self.sql.push(' ');
        order.render(self);
        self
    }

    pub fn finish(self) -> SqlQuery {
        SqlQuery {
            sql: self.sql,
            params: self.params,
        }
    }

    fn push_column(&mut self, column: Column) {
        self.sql
            .push_str(&format!("LOWER(COALESCE({}, ''))", column.name()));
    }

    fn push_group(&mut self, children: &[Predicate], joiner: &str, empty: &str) {
        if children.is_empty() {
            self.sql.push_str(empty);
            return;
        }
        self.sql.push('(');
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(joiner);
            }
            child.render(self);
        }
        self.sql.push(')');
    }
}
