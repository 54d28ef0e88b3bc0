//! Fluent SQL statement builders
//!
//! Builders only accumulate clause fragments and their parameters; nothing is rendered
//! until [`Sql::to_statement`] (or `build()`/`params()`) is called, and a builder can be
//! rendered any number of times.
//!
//! ```
//! use abavee_db::{params, SelectBuilder};
//!
//! let query = SelectBuilder::new()
//!     .fields("id")
//!     .from("users")
//!     .and_where("age>?", params![18])
//!     .order_by_asc("name");
//!
//! assert_eq!(query.build(), "SELECT id FROM users WHERE (age>?) ORDER BY name ASC");
//! ```

use super::dialect::Dialect;
use super::statement::{Param, Sql, Statement};

/// ORDER BY direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    /// Ascending order
    Asc,
    /// Descending order
    Desc,
}

impl OrderDirection {
    fn as_sql(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// WHERE fragments shared by the SELECT, UPDATE and DELETE builders
#[derive(Debug, Clone, Default)]
struct WhereClause {
    fragments: Vec<String>,
    params: Vec<Param>,
}

impl WhereClause {
    fn push(&mut self, expr: impl Into<String>, params: impl IntoIterator<Item = Param>) {
        self.fragments.push(expr.into());
        self.params.extend(params);
    }

    /// ` WHERE (a) AND (b)`, or nothing
    fn render(&self, sql: &mut String) {
        if !self.fragments.is_empty() {
            sql.push_str(" WHERE (");
            sql.push_str(&self.fragments.join(") AND ("));
            sql.push(')');
        }
    }
}

/// SELECT statement builder
#[derive(Debug, Clone, Default)]
pub struct SelectBuilder {
    field_sql: Vec<String>,
    field_params: Vec<Param>,
    from_sql: Vec<String>,
    from_params: Vec<Param>,
    where_clause: WhereClause,
    group_by: Vec<String>,
    order_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl SelectBuilder {
    /// Create an empty SELECT builder; without fields it selects `*`
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field or field expression
    #[must_use]
    pub fn fields(self, expr: impl Into<String>) -> Self {
        self.fields_with(expr, Vec::new())
    }

    /// Append a field expression with parameters for its placeholders
    #[must_use]
    pub fn fields_with(
        mut self,
        expr: impl Into<String>,
        params: impl IntoIterator<Item = Param>,
    ) -> Self {
        self.field_sql.push(expr.into());
        self.field_params.extend(params);
        self
    }

    /// Append `COUNT(*)`
    #[must_use]
    pub fn count(self) -> Self {
        self.count_of("*", Vec::new())
    }

    /// Append `COUNT(expr)`
    #[must_use]
    pub fn count_of(self, expr: &str, params: impl IntoIterator<Item = Param>) -> Self {
        self.fields_with(format!("COUNT({})", expr), params)
    }

    /// Append a FROM fragment (table, alias, or any table expression)
    #[must_use]
    pub fn from(self, expr: impl Into<String>) -> Self {
        self.from_with(expr, Vec::new())
    }

    /// Append a FROM fragment with parameters, e.g. a derived table `?` bound to a sub-select
    #[must_use]
    pub fn from_with(
        mut self,
        expr: impl Into<String>,
        params: impl IntoIterator<Item = Param>,
    ) -> Self {
        self.from_sql.push(expr.into());
        self.from_params.extend(params);
        self
    }

    /// Append `JOIN expr` to the FROM fragments
    #[must_use]
    pub fn join(self, expr: &str) -> Self {
        self.from_with(format!("JOIN {}", expr), Vec::new())
    }

    #[must_use]
    pub fn join_with(self, expr: &str, params: impl IntoIterator<Item = Param>) -> Self {
        self.from_with(format!("JOIN {}", expr), params)
    }

    /// Append `LEFT JOIN expr` to the FROM fragments
    #[must_use]
    pub fn left_join(self, expr: &str) -> Self {
        self.from_with(format!("LEFT JOIN {}", expr), Vec::new())
    }

    #[must_use]
    pub fn left_join_with(self, expr: &str, params: impl IntoIterator<Item = Param>) -> Self {
        self.from_with(format!("LEFT JOIN {}", expr), params)
    }

    /// Add a WHERE condition; all conditions are joined with AND
    #[must_use]
    pub fn and_where(
        mut self,
        expr: impl Into<String>,
        params: impl IntoIterator<Item = Param>,
    ) -> Self {
        self.where_clause.push(expr, params);
        self
    }

    /// Add GROUP BY field
    #[must_use]
    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        self.group_by.push(field.into());
        self
    }

    /// Add ORDER BY fragment as written
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by.push(field.into());
        self
    }

    /// Add ORDER BY field with an explicit direction
    #[must_use]
    pub fn order_by_direction(mut self, field: &str, direction: OrderDirection) -> Self {
        self.order_by.push(format!("{} {}", field, direction.as_sql()));
        self
    }

    /// Add ORDER BY ASC
    #[must_use]
    pub fn order_by_asc(self, field: &str) -> Self {
        self.order_by_direction(field, OrderDirection::Asc)
    }

    /// Add ORDER BY DESC
    #[must_use]
    pub fn order_by_desc(self, field: &str) -> Self {
        self.order_by_direction(field, OrderDirection::Desc)
    }

    /// Add LIMIT clause
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Add OFFSET clause; only rendered together with a limit
    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    fn render(&self, dialect: Option<&dyn Dialect>) -> String {
        let mut sql = String::from("SELECT ");
        if self.field_sql.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.field_sql.join(", "));
        }

        if !self.from_sql.is_empty() {
            sql.push_str(" FROM ");
            sql.push_str(&self.from_sql.join(" "));
        }

        self.where_clause.render(&mut sql);

        if !self.group_by.is_empty() {
            sql.push_str(&format!(" GROUP BY {}", self.group_by.join(", ")));
        }

        if !self.order_by.is_empty() {
            sql.push_str(&format!(" ORDER BY {}", self.order_by.join(", ")));
        }

        let limit = match dialect {
            Some(dialect) => dialect.limit_clause(self.limit, self.offset),
            None => self.default_limit_clause(),
        };
        if !limit.is_empty() {
            sql.push(' ');
            sql.push_str(&limit);
        }

        sql
    }

    /// Generic `LIMIT n OFFSET m`; not every engine accepts it, so only use for display
    fn default_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (None, _) => String::new(),
            (Some(limit), None) => format!("LIMIT {}", limit),
            (Some(limit), Some(offset)) => format!("LIMIT {} OFFSET {}", limit, offset),
        }
    }

    /// Build the SQL template without a dialect
    pub fn build(&self) -> String {
        self.render(None)
    }

    /// Parameters in placeholder order: fields, then FROM/JOIN, then WHERE
    pub fn params(&self) -> Vec<Param> {
        let mut params = self.field_params.clone();
        params.extend(self.from_params.iter().cloned());
        params.extend(self.where_clause.params.iter().cloned());
        params
    }
}

impl Sql for SelectBuilder {
    fn to_statement(&self, dialect: Option<&dyn Dialect>) -> Statement {
        Statement::new(self.render(dialect), self.params())
    }
}

impl From<SelectBuilder> for Param {
    fn from(v: SelectBuilder) -> Self {
        Param::nested(v)
    }
}

/// INSERT statement builder
#[derive(Debug, Clone)]
pub struct InsertBuilder {
    table: String,
    columns: Vec<String>,
    value_sql: Vec<String>,
    values: Vec<Param>,
}

impl InsertBuilder {
    /// Create a new INSERT builder for `table`
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            value_sql: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Set a column to a value, bound through a placeholder
    #[must_use]
    pub fn set(mut self, column: &str, value: impl Into<Param>) -> Self {
        self.columns.push(column.to_string());
        self.value_sql.push("?".to_string());
        self.values.push(value.into());
        self
    }

    /// Set a column to a raw SQL expression, inserted as written
    #[must_use]
    pub fn set_raw(mut self, column: &str, expr: &str) -> Self {
        self.columns.push(column.to_string());
        self.value_sql.push(expr.to_string());
        self
    }

    /// Build the SQL template
    pub fn build(&self) -> String {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            self.columns.join(", "),
            self.value_sql.join(", ")
        )
    }

    /// Get the parameter values
    pub fn params(&self) -> Vec<Param> {
        self.values.clone()
    }
}

impl Sql for InsertBuilder {
    fn to_statement(&self, _dialect: Option<&dyn Dialect>) -> Statement {
        Statement::new(self.build(), self.params())
    }
}

/// UPDATE statement builder
#[derive(Debug, Clone)]
pub struct UpdateBuilder {
    table: String,
    set_sql: Vec<String>,
    set_params: Vec<Param>,
    where_clause: WhereClause,
}

impl UpdateBuilder {
    /// Create a new UPDATE builder for `table`
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            set_sql: Vec::new(),
            set_params: Vec::new(),
            where_clause: WhereClause::default(),
        }
    }

    /// Set a column value
    #[must_use]
    pub fn set(mut self, column: &str, value: impl Into<Param>) -> Self {
        self.set_sql.push(format!("{}=?", column));
        self.set_params.push(value.into());
        self
    }

    /// Set a column to a raw SQL expression, e.g. `counter+1`
    #[must_use]
    pub fn set_raw(mut self, column: &str, expr: &str) -> Self {
        self.set_sql.push(format!("{}={}", column, expr));
        self
    }

    /// Add a WHERE condition; all conditions are joined with AND
    #[must_use]
    pub fn and_where(
        mut self,
        expr: impl Into<String>,
        params: impl IntoIterator<Item = Param>,
    ) -> Self {
        self.where_clause.push(expr, params);
        self
    }

    /// Build the SQL template
    pub fn build(&self) -> String {
        let mut sql = format!("UPDATE {}", self.table);
        if !self.set_sql.is_empty() {
            sql.push_str(" SET ");
            sql.push_str(&self.set_sql.join(", "));
        }
        self.where_clause.render(&mut sql);
        sql
    }

    /// Get the parameter values (SET values followed by WHERE values)
    pub fn params(&self) -> Vec<Param> {
        let mut params = self.set_params.clone();
        params.extend(self.where_clause.params.iter().cloned());
        params
    }
}

impl Sql for UpdateBuilder {
    fn to_statement(&self, _dialect: Option<&dyn Dialect>) -> Statement {
        Statement::new(self.build(), self.params())
    }
}

/// DELETE statement builder
#[derive(Debug, Clone)]
pub struct DeleteBuilder {
    table: String,
    where_clause: WhereClause,
}

impl DeleteBuilder {
    /// Create a new DELETE builder for `table`
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            where_clause: WhereClause::default(),
        }
    }

    /// Add a WHERE condition; all conditions are joined with AND
    #[must_use]
    pub fn and_where(
        mut self,
        expr: impl Into<String>,
        params: impl IntoIterator<Item = Param>,
    ) -> Self {
        self.where_clause.push(expr, params);
        self
    }

    /// Build the SQL template
    pub fn build(&self) -> String {
        let mut sql = format!("DELETE FROM {}", self.table);
        self.where_clause.render(&mut sql);
        sql
    }

    /// Get the parameter values
    pub fn params(&self) -> Vec<Param> {
        self.where_clause.params.clone()
    }
}

impl Sql for DeleteBuilder {
    fn to_statement(&self, _dialect: Option<&dyn Dialect>) -> Statement {
        Statement::new(self.build(), self.params())
    }
}
