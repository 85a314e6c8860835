use crate::entity::{CollectionDef, EntityKey, EntitySchema, FieldDef};
use crate::predicate::Predicate;
use crate::sort::Direction;
use crate::store::Query;
use crate::value::Value;

/// Renders [`Query`] shapes and write statements to parameterized SQL.
///
/// Every statement comes back as `(sql, bind_values)`; values are bound in
/// placeholder order.
///
/// # Example
///
/// ```ignore
/// let query = Query::new()
///     .filter(Predicate::eq("name", "rust"))
///     .skip(20)
///     .take(10);
/// let (sql, params) = QueryBuilder::new()
///     .dialect(Dialect::Postgres)
///     .build_select(Tag::descriptor().schema(), &query)?;
/// ```
#[derive(Debug, Clone, Copy)]
pub enum Dialect {
    /// Generic SQL using `?` placeholders (default).
    Generic,
    /// SQLite-style `?` placeholders.
    Sqlite,
    /// MySQL-style `?` placeholders with backtick quoting.
    MySql,
    /// Postgres-style `$1, $2, ...` placeholders.
    Postgres,
}

/// Largest LIMIT/OFFSET rendered; engines storing them as signed 64-bit
/// integers reject anything above.
const MAX_WINDOW: u64 = i64::MAX as u64;

impl Dialect {
    fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Generic | Dialect::Sqlite | Dialect::MySql => "?".to_string(),
        }
    }

    fn quote_char(self) -> char {
        match self {
            Dialect::MySql => '`',
            Dialect::Generic | Dialect::Sqlite | Dialect::Postgres => '"',
        }
    }

    /// `LIMIT` clause standing for "no limit", for dialects that reject a
    /// bare `OFFSET`.
    fn unbounded_limit(self) -> Option<&'static str> {
        match self {
            Dialect::Generic | Dialect::Sqlite => Some(" LIMIT -1"),
            Dialect::MySql => Some(" LIMIT 18446744073709551615"),
            Dialect::Postgres => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum IdentifierPolicy {
    /// Do not validate or quote identifiers.
    Raw,
    /// Validate identifiers against a conservative pattern.
    Validate,
    /// Validate and quote identifiers using the dialect quoting style.
    Quote,
}

#[derive(Debug, Clone)]
pub struct QueryBuilder {
    dialect: Dialect,
    identifier_policy: IdentifierPolicy,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self {
            dialect: Dialect::Generic,
            identifier_policy: IdentifierPolicy::Validate,
        }
    }
}

/// Accumulates SQL text and bind values with running placeholder numbers.
struct Writer {
    sql: String,
    params: Vec<Value>,
    placeholder_idx: usize,
    dialect: Dialect,
}

impl Writer {
    fn new(dialect: Dialect, sql: String) -> Self {
        Self {
            sql,
            params: Vec::new(),
            placeholder_idx: 1,
            dialect,
        }
    }

    fn bind(&mut self, value: Value) -> String {
        let placeholder = self.dialect.placeholder(self.placeholder_idx);
        self.placeholder_idx += 1;
        self.params.push(value);
        placeholder
    }

    fn push(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    fn finish(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new builder with an explicit SQL dialect.
    pub fn new_with_dialect(dialect: Dialect) -> Self {
        Self::new().dialect(dialect)
    }

    /// Set the SQL dialect (affects placeholder style and quoting).
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Configure identifier validation/quoting behavior.
    pub fn identifier_policy(mut self, policy: IdentifierPolicy) -> Self {
        self.identifier_policy = policy;
        self
    }

    /// `SELECT` of every scalar column of `schema`, shaped by `query`.
    ///
    /// Collections are not joined; stores load them with
    /// [`QueryBuilder::build_link_select`].
    pub fn build_select(
        &self,
        schema: &EntitySchema,
        query: &Query,
    ) -> Result<(String, Vec<Value>), QueryError> {
        let table = self.ident(schema.name(), "table")?;
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name).collect();
        let columns = self.column_list(&names)?;

        let mut w = Writer::new(self.dialect, format!("SELECT {columns} FROM {table}"));
        self.append_where(&mut w, schema, query.filter.as_ref())?;
        if let Some(chain) = query.order.as_ref().filter(|c| !c.is_empty()) {
            let mut clauses = Vec::with_capacity(chain.keys().len());
            for key in chain.keys() {
                let col = self.ident(key.field, "column")?;
                clauses.push(match key.direction {
                    Direction::Ascending => format!("{col} ASC"),
                    Direction::Descending => format!("{col} DESC"),
                });
            }
            w.push(" ORDER BY ");
            w.push(&clauses.join(", "));
        }
        match query.take {
            Some(limit) => w.push(&format!(" LIMIT {}", limit.min(MAX_WINDOW))),
            None if query.skip > 0 => {
                if let Some(clause) = self.dialect.unbounded_limit() {
                    w.push(clause);
                }
            }
            None => {}
        }
        if query.skip > 0 {
            w.push(&format!(" OFFSET {}", query.skip.min(MAX_WINDOW)));
        }
        Ok(w.finish())
    }

    /// `SELECT COUNT(*)` of the rows matching `filter`.
    pub fn build_count(
        &self,
        schema: &EntitySchema,
        filter: Option<&Predicate>,
    ) -> Result<(String, Vec<Value>), QueryError> {
        let table = self.ident(schema.name(), "table")?;
        let mut w = Writer::new(self.dialect, format!("SELECT COUNT(*) FROM {table}"));
        self.append_where(&mut w, schema, filter)?;
        Ok(w.finish())
    }

    pub fn build_insert(
        &self,
        schema: &EntitySchema,
        values: Vec<(FieldDef, Value)>,
    ) -> Result<(String, Vec<Value>), QueryError> {
        let table = self.ident(schema.name(), "table")?;
        let names: Vec<&str> = values.iter().map(|(def, _)| def.name).collect();
        let columns = self.column_list(&names)?;
        let mut w = Writer::new(self.dialect, format!("INSERT INTO {table} ({columns}) VALUES ("));
        let placeholders: Vec<String> = values.into_iter().map(|(_, v)| w.bind(v)).collect();
        w.push(&placeholders.join(", "));
        w.push(")");
        Ok(w.finish())
    }

    pub fn build_update(
        &self,
        schema: &EntitySchema,
        key: &EntityKey,
        fields: &[(&'static str, Value)],
    ) -> Result<(String, Vec<Value>), QueryError> {
        if fields.is_empty() {
            return Err(QueryError::Unsupported(format!(
                "update of '{}' without any field",
                schema.name()
            )));
        }
        let table = self.ident(schema.name(), "table")?;
        let mut w = Writer::new(self.dialect, format!("UPDATE {table} SET "));
        let mut assignments = Vec::with_capacity(fields.len());
        for (name, value) in fields {
            let col = self.ident(self.column(schema, name)?.name, "column")?;
            let placeholder = w.bind(value.clone());
            assignments.push(format!("{col} = {placeholder}"));
        }
        w.push(&assignments.join(", "));
        self.append_key_where(&mut w, schema, key)?;
        Ok(w.finish())
    }

    pub fn build_delete(
        &self,
        schema: &EntitySchema,
        key: &EntityKey,
    ) -> Result<(String, Vec<Value>), QueryError> {
        let table = self.ident(schema.name(), "table")?;
        let mut w = Writer::new(self.dialect, format!("DELETE FROM {table}"));
        self.append_key_where(&mut w, schema, key)?;
        Ok(w.finish())
    }

    /// `(owner, target)` link rows of a collection for the given owners.
    pub fn build_link_select(
        &self,
        def: &CollectionDef,
        owners: &[Value],
    ) -> Result<(String, Vec<Value>), QueryError> {
        let table = self.ident(def.link_table, "table")?;
        let owner = self.ident(def.owner_column, "column")?;
        let target = self.ident(def.target_column, "column")?;
        let mut w = Writer::new(self.dialect, format!("SELECT {owner}, {target} FROM {table} WHERE "));
        if owners.is_empty() {
            w.push("1 = 0");
        } else {
            let placeholders: Vec<String> = owners.iter().map(|v| w.bind(v.clone())).collect();
            w.push(&format!("{owner} IN ({})", placeholders.join(", ")));
        }
        Ok(w.finish())
    }

    pub fn build_link_insert(
        &self,
        def: &CollectionDef,
        owner: &Value,
        target: &Value,
    ) -> Result<(String, Vec<Value>), QueryError> {
        let table = self.ident(def.link_table, "table")?;
        let owner_col = self.ident(def.owner_column, "column")?;
        let target_col = self.ident(def.target_column, "column")?;
        let mut w = Writer::new(
            self.dialect,
            format!("INSERT INTO {table} ({owner_col}, {target_col}) VALUES ("),
        );
        let a = w.bind(owner.clone());
        let b = w.bind(target.clone());
        w.push(&format!("{a}, {b})"));
        Ok(w.finish())
    }

    pub fn build_link_delete(
        &self,
        def: &CollectionDef,
        owner: &Value,
        target: &Value,
    ) -> Result<(String, Vec<Value>), QueryError> {
        let table = self.ident(def.link_table, "table")?;
        let owner_col = self.ident(def.owner_column, "column")?;
        let target_col = self.ident(def.target_column, "column")?;
        let mut w = Writer::new(self.dialect, format!("DELETE FROM {table} WHERE "));
        let a = w.bind(owner.clone());
        let b = w.bind(target.clone());
        w.push(&format!("{owner_col} = {a} AND {target_col} = {b}"));
        Ok(w.finish())
    }

    /// Every link row owned by `owner`.
    pub fn build_link_delete_owner(
        &self,
        def: &CollectionDef,
        owner: &Value,
    ) -> Result<(String, Vec<Value>), QueryError> {
        let table = self.ident(def.link_table, "table")?;
        let owner_col = self.ident(def.owner_column, "column")?;
        let mut w = Writer::new(self.dialect, format!("DELETE FROM {table} WHERE "));
        let a = w.bind(owner.clone());
        w.push(&format!("{owner_col} = {a}"));
        Ok(w.finish())
    }

    fn append_where(
        &self,
        w: &mut Writer,
        schema: &EntitySchema,
        filter: Option<&Predicate>,
    ) -> Result<(), QueryError> {
        if let Some(predicate) = filter {
            w.push(" WHERE ");
            self.append_predicate(w, schema, predicate)?;
        }
        Ok(())
    }

    fn append_key_where(
        &self,
        w: &mut Writer,
        schema: &EntitySchema,
        key: &EntityKey,
    ) -> Result<(), QueryError> {
        let key_fields: Vec<&FieldDef> = schema.key_fields().collect();
        if key_fields.is_empty() || key_fields.len() != key.0.len() {
            return Err(QueryError::Unsupported(format!(
                "key {key} does not match the key fields of '{}'",
                schema.name()
            )));
        }
        let mut conditions = Vec::with_capacity(key_fields.len());
        for (def, value) in key_fields.into_iter().zip(&key.0) {
            let col = self.ident(def.name, "column")?;
            let placeholder = w.bind(value.clone());
            conditions.push(format!("{col} = {placeholder}"));
        }
        w.push(" WHERE ");
        w.push(&conditions.join(" AND "));
        Ok(())
    }

    fn append_predicate(
        &self,
        w: &mut Writer,
        schema: &EntitySchema,
        predicate: &Predicate,
    ) -> Result<(), QueryError> {
        match predicate {
            Predicate::Compare { field, op, value } => {
                let def = self.column(schema, field)?;
                if value.is_null() {
                    w.push("1 = 0");
                    return Ok(());
                }
                let col = self.ident(def.name, "column")?;
                let placeholder = w.bind(value.clone());
                let cmp = format!("{col} {} {placeholder}", op.sql());
                w.push(&guard_null(def, &col, cmp));
            }
            Predicate::In { field, values } => {
                let def = self.column(schema, field)?;
                let values: Vec<&Value> = values.iter().filter(|v| !v.is_null()).collect();
                if values.is_empty() {
                    w.push("1 = 0");
                    return Ok(());
                }
                let col = self.ident(def.name, "column")?;
                let placeholders: Vec<String> = values.into_iter().map(|v| w.bind(v.clone())).collect();
                let cmp = format!("{col} IN ({})", placeholders.join(", "));
                w.push(&guard_null(def, &col, cmp));
            }
            Predicate::IsNull(field) => {
                let col = self.ident(self.column(schema, field)?.name, "column")?;
                w.push(&format!("{col} IS NULL"));
            }
            Predicate::CountOf {
                collection,
                op,
                len,
            } => {
                let def = schema.collection(collection).ok_or_else(|| QueryError::UnknownColumn {
                    table: schema.name().to_string(),
                    column: collection.clone(),
                })?;
                let key = single_key(schema)?;
                let link = self.ident(def.link_table, "table")?;
                let owner = self.ident(&format!("{}.{}", def.link_table, def.owner_column), "column")?;
                let outer = self.ident(&format!("{}.{}", schema.name(), key.name), "column")?;
                let placeholder = w.bind(Value::Int(i64::try_from(*len).unwrap_or(i64::MAX)));
                w.push(&format!(
                    "(SELECT COUNT(*) FROM {link} WHERE {owner} = {outer}) {} {placeholder}",
                    op.sql()
                ));
            }
            Predicate::And(parts) => self.append_group(w, schema, parts, " AND ", "1 = 1")?,
            Predicate::Or(parts) => self.append_group(w, schema, parts, " OR ", "1 = 0")?,
            Predicate::Not(inner) => {
                w.push("NOT (");
                self.append_predicate(w, schema, inner)?;
                w.push(")");
            }
        }
        Ok(())
    }

    fn append_group(
        &self,
        w: &mut Writer,
        schema: &EntitySchema,
        parts: &[Predicate],
        separator: &str,
        empty: &str,
    ) -> Result<(), QueryError> {
        if parts.is_empty() {
            w.push(empty);
            return Ok(());
        }
        w.push("(");
        for (idx, part) in parts.iter().enumerate() {
            if idx > 0 {
                w.push(separator);
            }
            self.append_predicate(w, schema, part)?;
        }
        w.push(")");
        Ok(())
    }

    fn column<'s>(&self, schema: &'s EntitySchema, field: &str) -> Result<&'s FieldDef, QueryError> {
        schema.field(field).ok_or_else(|| QueryError::UnknownColumn {
            table: schema.name().to_string(),
            column: field.to_string(),
        })
    }

    fn column_list(&self, columns: &[&str]) -> Result<String, QueryError> {
        let mut out = Vec::with_capacity(columns.len());
        for col in columns {
            out.push(self.ident(col, "column")?);
        }
        Ok(out.join(", "))
    }

    fn ident(&self, ident: &str, kind: &'static str) -> Result<String, QueryError> {
        match self.identifier_policy {
            IdentifierPolicy::Raw => Ok(ident.to_string()),
            IdentifierPolicy::Validate | IdentifierPolicy::Quote if !is_valid_identifier(ident) => {
                Err(QueryError::InvalidIdentifier {
                    kind,
                    ident: ident.to_string(),
                })
            }
            IdentifierPolicy::Validate => Ok(ident.to_string()),
            IdentifierPolicy::Quote => Ok(quote_identifier(ident, self.dialect)),
        }
    }
}

/// Nullable columns compare as false when `NULL`, so that `NOT` of a
/// comparison behaves like in-memory evaluation.
fn guard_null(def: &FieldDef, col: &str, cmp: String) -> String {
    if def.nullable {
        format!("({col} IS NOT NULL AND {cmp})")
    } else {
        cmp
    }
}

fn single_key(schema: &EntitySchema) -> Result<&FieldDef, QueryError> {
    let mut keys = schema.key_fields();
    match (keys.next(), keys.next()) {
        (Some(key), None) => Ok(key),
        _ => Err(QueryError::Unsupported(format!(
            "collections of '{}' require a single-field key",
            schema.name()
        ))),
    }
}

#[derive(Debug, Clone)]
pub enum QueryError {
    InvalidIdentifier { kind: &'static str, ident: String },
    UnknownColumn { table: String, column: String },
    Unsupported(String),
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::InvalidIdentifier { kind, ident } => {
                write!(f, "Invalid {kind} identifier: {ident}")
            }
            QueryError::UnknownColumn { table, column } => {
                write!(f, "Unknown column '{column}' on table '{table}'")
            }
            QueryError::Unsupported(msg) => write!(f, "Unsupported statement: {msg}"),
        }
    }
}

impl std::error::Error for QueryError {}

fn is_valid_identifier(ident: &str) -> bool {
    !ident.is_empty() && ident.split('.').all(is_valid_segment)
}

fn is_valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn quote_identifier(ident: &str, dialect: Dialect) -> String {
    let quote = dialect.quote_char();
    ident
        .split('.')
        .map(|part| format!("{quote}{part}{quote}"))
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::fixtures::{Book, SHELVES};
    use crate::entity::{Entity, EntityDescriptor};
    use crate::metadata::Model;
    use crate::predicate::CmpOp;
    use crate::sort::{ComparatorChain, SortField};
    use crate::value::ScalarKind;

    const COLUMNS: &str = "id, title, rating, cover, subtitle";

    fn schema() -> EntitySchema {
        Book::descriptor().schema().clone()
    }

    fn order(fields: &[SortField]) -> ComparatorChain {
        ComparatorChain::build(fields, "books", &Model::of::<Book>()).unwrap()
    }

    #[test]
    fn test_simple_select() {
        let (sql, params) = QueryBuilder::new().build_select(&schema(), &Query::new()).unwrap();
        assert_eq!(sql, format!("SELECT {COLUMNS} FROM books"));
        assert!(params.is_empty());
    }

    #[test]
    fn test_where_eq() {
        let query = Query::new().filter(Predicate::eq("title", "Dune"));
        let (sql, params) = QueryBuilder::new().build_select(&schema(), &query).unwrap();
        assert_eq!(sql, format!("SELECT {COLUMNS} FROM books WHERE title = ?"));
        assert_eq!(params, vec![Value::Text("Dune".into())]);
    }

    #[test]
    fn test_complex_query() {
        let query = Query::new()
            .filter(Predicate::gt("rating", 3.5))
            .filter(Predicate::ne("title", "Emma"))
            .order(order(&[
                SortField::new("rating", Direction::Descending),
                SortField::new("id", Direction::Ascending),
            ]))
            .skip(20)
            .take(10);
        let (sql, params) = QueryBuilder::new().build_select(&schema(), &query).unwrap();
        assert_eq!(
            sql,
            format!(
                "SELECT {COLUMNS} FROM books WHERE (rating > ? AND title != ?) ORDER BY rating DESC, id ASC LIMIT 10 OFFSET 20"
            )
        );
        assert_eq!(params, vec![Value::Float(3.5), Value::Text("Emma".into())]);
    }

    #[test]
    fn test_offset_without_limit() {
        let query = Query::new().skip(5);
        let (sql, _) = QueryBuilder::new_with_dialect(Dialect::Sqlite)
            .build_select(&schema(), &query)
            .unwrap();
        assert!(sql.ends_with(" LIMIT -1 OFFSET 5"));
        let (sql, _) = QueryBuilder::new_with_dialect(Dialect::Postgres)
            .build_select(&schema(), &query)
            .unwrap();
        assert!(sql.ends_with("FROM books OFFSET 5"));
    }

    #[test]
    fn test_window_is_clamped_to_i64() {
        let query = Query::new().skip(u64::MAX).take(u64::MAX);
        let (sql, _) = QueryBuilder::new_with_dialect(Dialect::Sqlite)
            .build_select(&schema(), &query)
            .unwrap();
        assert!(sql.ends_with(&format!(" LIMIT {0} OFFSET {0}", i64::MAX)));
    }

    #[test]
    fn test_count_query() {
        let filter = Predicate::eq("id", 3i64);
        let (sql, params) = QueryBuilder::new().build_count(&schema(), Some(&filter)).unwrap();
        assert_eq!(sql, "SELECT COUNT(*) FROM books WHERE id = ?");
        assert_eq!(params, vec![Value::Int(3)]);
    }

    #[test]
    fn test_postgres_placeholders() {
        let filter = Predicate::eq("title", "a").and(Predicate::in_list("id", [1i64, 2]));
        let (sql, params) = QueryBuilder::new_with_dialect(Dialect::Postgres)
            .build_count(&schema(), Some(&filter))
            .unwrap();
        assert_eq!(sql, "SELECT COUNT(*) FROM books WHERE (title = $1 AND id IN ($2, $3))");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_nullable_comparison_is_guarded() {
        let filter = Predicate::eq("subtitle", "x").not();
        let (sql, _) = QueryBuilder::new().build_count(&schema(), Some(&filter)).unwrap();
        assert_eq!(
            sql,
            "SELECT COUNT(*) FROM books WHERE NOT ((subtitle IS NOT NULL AND subtitle = ?))"
        );
    }

    #[test]
    fn test_null_and_empty_comparisons() {
        let filter = Predicate::eq("title", Value::Null).or(Predicate::in_list("id", Vec::<i64>::new()));
        let (sql, params) = QueryBuilder::new().build_count(&schema(), Some(&filter)).unwrap();
        assert_eq!(sql, "SELECT COUNT(*) FROM books WHERE (1 = 0 OR 1 = 0)");
        assert!(params.is_empty());
    }

    #[test]
    fn test_count_of_subquery() {
        let filter = Predicate::count_of("shelves", CmpOp::Ge, 2);
        let (sql, params) = QueryBuilder::new().build_count(&schema(), Some(&filter)).unwrap();
        assert_eq!(
            sql,
            "SELECT COUNT(*) FROM books WHERE (SELECT COUNT(*) FROM book_shelves WHERE book_shelves.book_id = books.id) >= ?"
        );
        assert_eq!(params, vec![Value::Int(2)]);
    }

    #[test]
    fn test_write_statements() {
        let qb = QueryBuilder::new();
        let key = EntityKey(vec![Value::Int(7)]);
        let (sql, params) = qb
            .build_update(&schema(), &key, &[("title", Value::Text("t".into()))])
            .unwrap();
        assert_eq!(sql, "UPDATE books SET title = ? WHERE id = ?");
        assert_eq!(params, vec![Value::Text("t".into()), Value::Int(7)]);

        let (sql, _) = qb.build_delete(&schema(), &key).unwrap();
        assert_eq!(sql, "DELETE FROM books WHERE id = ?");

        let (sql, _) = qb
            .build_link_insert(&SHELVES, &Value::Int(7), &Value::Int(1))
            .unwrap();
        assert_eq!(sql, "INSERT INTO book_shelves (book_id, shelf_id) VALUES (?, ?)");

        let (sql, params) = qb
            .build_link_select(&SHELVES, &[Value::Int(1), Value::Int(2)])
            .unwrap();
        assert_eq!(sql, "SELECT book_id, shelf_id FROM book_shelves WHERE book_id IN (?, ?)");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_update_requires_fields() {
        let err = QueryBuilder::new()
            .build_update(&schema(), &EntityKey(vec![Value::Int(1)]), &[])
            .unwrap_err();
        assert!(matches!(err, QueryError::Unsupported(_)));
    }

    #[test]
    fn test_quoting() {
        let query = Query::new()
            .filter(Predicate::eq("id", 1i64))
            .order(order(&[SortField::new("title", Direction::Ascending)]));
        let (sql, _) = QueryBuilder::new()
            .dialect(Dialect::Postgres)
            .identifier_policy(IdentifierPolicy::Quote)
            .build_select(&schema(), &query)
            .unwrap();
        assert_eq!(
            sql,
            "SELECT \"id\", \"title\", \"rating\", \"cover\", \"subtitle\" FROM \"books\" WHERE \"id\" = $1 ORDER BY \"title\" ASC"
        );
    }

    #[test]
    fn test_invalid_identifier() {
        let descriptor: EntityDescriptor<Book> = EntityDescriptor::<Book>::builder("books;drop")
            .key("id", ScalarKind::Int, |b| b.id.into(), |b, v| {
                b.id = v.try_into()?;
                Ok(())
            })
            .build();
        let err = QueryBuilder::new()
            .build_select(descriptor.schema(), &Query::new())
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidIdentifier { kind: "table", .. }));
    }

    #[test]
    fn test_unknown_column() {
        let filter = Predicate::eq("nope", 1i64);
        let err = QueryBuilder::new().build_count(&schema(), Some(&filter)).unwrap_err();
        assert!(matches!(err, QueryError::UnknownColumn { .. }));
    }
}
