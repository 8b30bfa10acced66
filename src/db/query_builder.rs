use sea_orm::{DbBackend, Statement, Value};

/// Time granularity of a bucketed report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Day,
    Week,
    Month,
}

/// Helper for building parameterized report statements.
///
/// Starts from a base `SELECT ... WHERE 1=1` and appends `AND` conditions,
/// emitting the placeholder syntax of the target backend (`$n` for
/// Postgres, `?` otherwise).
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    backend: DbBackend,
    sql: String,
    values: Vec<Value>,
}

impl QueryBuilder {
    /// Create a new query builder
    pub fn new(backend: DbBackend, base: &str) -> Self {
        Self {
            backend,
            sql: base.trim_end().to_string(),
            values: Vec::new(),
        }
    }

    pub fn backend(&self) -> DbBackend {
        self.backend
    }

    fn bind(&mut self, value: Value) -> String {
        self.values.push(value);
        match self.backend {
            DbBackend::Postgres => format!("${}", self.values.len()),
            _ => "?".to_string(),
        }
    }

    /// Add a filter condition `AND <expr> <op> <value>`
    pub fn filter<V: Into<Value>>(mut self, expr: &str, op: &str, value: V) -> Self {
        let placeholder = self.bind(value.into());
        self.sql
            .push_str(&format!(" AND {} {} {}", expr, op, placeholder));
        self
    }

    /// Add a filter condition only when `value` is present
    pub fn filter_opt<V: Into<Value>>(self, expr: &str, op: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.filter(expr, op, value),
            None => self,
        }
    }

    /// Append a raw clause (GROUP BY, ORDER BY, ...)
    pub fn push(mut self, clause: &str) -> Self {
        self.sql.push(' ');
        self.sql.push_str(clause.trim());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.sql.push_str(&format!(" LIMIT {}", limit));
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn build(self) -> Statement {
        Statement::from_sql_and_values(self.backend, self.sql, self.values)
    }
}

/// SQL expression rendering the bucket start of `column` as `YYYY-MM-DD`.
///
/// Weeks start on Monday on every backend.
pub fn bucket_expr(backend: DbBackend, bucket: Bucket, column: &str) -> String {
    match backend {
        DbBackend::Sqlite => match bucket {
            Bucket::Day => format!("date({})", column),
            Bucket::Week => format!(
                "date({c}, '-' || ((CAST(strftime('%w', {c}) AS INTEGER) + 6) % 7) || ' days')",
                c = column
            ),
            Bucket::Month => format!("strftime('%Y-%m-01', {})", column),
        },
        _ => {
            let unit = match bucket {
                Bucket::Day => "day",
                Bucket::Week => "week",
                Bucket::Month => "month",
            };
            format!(
                "TO_CHAR(DATE_TRUNC('{}', {}), 'YYYY-MM-DD')",
                unit, column
            )
        }
    }
}
