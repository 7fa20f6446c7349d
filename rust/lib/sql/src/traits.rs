use crate::error::SQLError;

/// A dynamically-typed SQL parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<Option<String>> for Value {
    fn from(v: Option<String>) -> Self {
        v.map(Value::Text).unwrap_or(Value::Null)
    }
}

impl From<Option<i64>> for Value {
    fn from(v: Option<i64>) -> Self {
        v.map(Value::Integer).unwrap_or(Value::Null)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

/// A row returned from a SQL query: column name to value.
#[derive(Debug, Clone)]
pub struct Row {
    pub columns: Vec<(String, Value)>,
}

impl Row {
    /// Get a column value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Get a text column value by name.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(Value::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get an integer column value by name.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(Value::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    /// Get a real column value by name.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        match self.get(name) {
            Some(Value::Real(f)) => Some(*f),
            _ => None,
        }
    }
}

/// Statement execution against one connection or transaction.
pub trait SQLExecutor {
    /// Execute a query and return rows.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError>;

    /// Execute a statement (INSERT/UPDATE/DELETE) and return affected row count.
    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError>;

    /// Execute one or more parameterless statements (DDL, PRAGMA, VACUUM).
    fn exec_batch(&self, sql: &str) -> Result<(), SQLError>;
}

/// SQLStore provides a SQL execution interface backed by an embedded database.
///
/// Plain `query`/`exec` calls run in autocommit mode on whichever pooled
/// connection is free. Use [`SQLStore::begin`] to pin one connection for a
/// multi-statement unit of work.
pub trait SQLStore: SQLExecutor + Send + Sync {
    /// Start a transaction on a dedicated connection.
    fn begin(&self) -> Result<Box<dyn SQLTransaction + '_>, SQLError>;

    /// Number of pooled connections.
    fn pool_size(&self) -> usize;
}

/// An open transaction. Dropping it without [`SQLTransaction::commit`]
/// rolls back every statement executed through it.
pub trait SQLTransaction: SQLExecutor {
    fn commit(self: Box<Self>) -> Result<(), SQLError>;
}
