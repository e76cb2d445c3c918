//! SQLite provider built on `rusqlite`.

use std::fmt;
use std::sync::Arc;

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{CachedStatement, OpenFlags};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::connection::{Connection, ConnectionFactory};
use crate::error::{DbError, DbResult};
use crate::parameter::{Parameter, ParameterSet};
use crate::value::{DataType, Value};
use crate::value_set::{ValueSet, ValueSets};

const MEMORY_SOURCE: &str = ":memory:";

/// How the database file is opened.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpenMode {
    #[default]
    ReadWriteCreate,
    ReadWrite,
    ReadOnly,
    Memory,
}

impl OpenMode {
    fn parse(value: &str) -> DbResult<Self> {
        match value.to_ascii_lowercase().as_str() {
            "readwritecreate" => Ok(OpenMode::ReadWriteCreate),
            "readwrite" => Ok(OpenMode::ReadWrite),
            "readonly" => Ok(OpenMode::ReadOnly),
            "memory" => Ok(OpenMode::Memory),
            _ => Err(DbError::InvalidConnectionString(format!(
                "unknown mode '{value}'"
            ))),
        }
    }

    fn flags(self) -> OpenFlags {
        let base = OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        match self {
            OpenMode::ReadWriteCreate | OpenMode::Memory => {
                base | OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
            }
            OpenMode::ReadWrite => base | OpenFlags::SQLITE_OPEN_READ_WRITE,
            OpenMode::ReadOnly => base | OpenFlags::SQLITE_OPEN_READ_ONLY,
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// SQLite connection settings, usually parsed from a connection string such
/// as `Data Source=app.sqlite;Foreign Keys=True`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Path to the SQLite database file, or `:memory:`
    pub data_source: String,
    #[serde(default)]
    pub mode: OpenMode,
    /// Turn on `PRAGMA foreign_keys` right after opening
    #[serde(default)]
    pub foreign_keys: bool,
}

impl SqliteConfig {
    /// Create a new SQLite config for a database path
    pub fn new(data_source: impl Into<String>) -> Self {
        Self {
            data_source: data_source.into(),
            mode: OpenMode::default(),
            foreign_keys: false,
        }
    }

    /// Config for a private in-memory database
    pub fn in_memory() -> Self {
        Self {
            mode: OpenMode::Memory,
            ..Self::new(MEMORY_SOURCE)
        }
    }

    pub fn with_mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Parse an ADO-style connection string. Performs no I/O.
    pub fn parse(connection_string: &str) -> DbResult<Self> {
        let connection_string = connection_string.trim();
        if connection_string.is_empty() {
            return Err(DbError::InvalidConnectionString(
                "connection string is empty".to_string(),
            ));
        }
        if !connection_string.contains('=') {
            return Ok(Self::new(connection_string));
        }

        let mut data_source = None;
        let mut config = Self::new(String::new());
        for segment in connection_string.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let (key, value) = segment.split_once('=').ok_or_else(|| {
                DbError::InvalidConnectionString(format!("'{segment}' is not a key=value pair"))
            })?;
            let value = value.trim();
            let key: String = key
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase();
            match key.as_str() {
                "datasource" | "filename" => data_source = Some(value.to_string()),
                "mode" => config.mode = OpenMode::parse(value)?,
                "foreignkeys" => config.foreign_keys = parse_bool(value)?,
                "version" => {}
                _ => warn!(key = %key, "ignoring unsupported connection string key"),
            }
        }

        config.data_source = match data_source {
            Some(source) if !source.is_empty() => source,
            _ if config.mode == OpenMode::Memory => MEMORY_SOURCE.to_string(),
            _ => {
                return Err(DbError::InvalidConnectionString(
                    "missing 'Data Source'".to_string(),
                ))
            }
        };
        Ok(config)
    }

    pub fn is_memory(&self) -> bool {
        self.mode == OpenMode::Memory || self.data_source == MEMORY_SOURCE
    }

    fn open(&self) -> DbResult<rusqlite::Connection> {
        let conn = if self.is_memory() {
            rusqlite::Connection::open_in_memory_with_flags(OpenMode::Memory.flags())?
        } else {
            rusqlite::Connection::open_with_flags(&self.data_source, self.mode.flags())?
        };
        if self.foreign_keys {
            conn.pragma_update(None, "foreign_keys", true)?;
        }
        debug!(data_source = %self.data_source, mode = %self.mode, "opened sqlite connection");
        Ok(conn)
    }
}

impl fmt::Display for SqliteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Data Source={};Mode={};Foreign Keys={}",
            self.data_source,
            self.mode,
            if self.foreign_keys { "True" } else { "False" }
        )
    }
}

fn parse_bool(value: &str) -> DbResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(DbError::InvalidConnectionString(format!(
            "'{value}' is not a boolean"
        ))),
    }
}

/// A [`Connection`] over one SQLite database handle.
///
/// The file is opened on the first statement, not on construction. The
/// transaction state is read back from SQLite itself, so a statement that
/// runs while a transaction is open joins it.
#[derive(Debug)]
pub struct SqliteConnection {
    config: SqliteConfig,
    handle: Option<rusqlite::Connection>,
}

impl SqliteConnection {
    pub fn new(config: SqliteConfig) -> Self {
        Self {
            config,
            handle: None,
        }
    }

    pub fn from_connection_string(connection_string: &str) -> DbResult<Self> {
        SqliteConfig::parse(connection_string).map(Self::new)
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    /// Whether a transaction is currently open on the handle.
    pub fn in_transaction(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|conn| !conn.is_autocommit())
    }

    fn handle(&mut self) -> DbResult<&rusqlite::Connection> {
        let conn = match self.handle.take() {
            Some(conn) => conn,
            None => self.config.open()?,
        };
        Ok(self.handle.insert(conn))
    }

    fn transaction_handle(&mut self) -> DbResult<&rusqlite::Connection> {
        let conn = self.handle()?;
        if conn.is_autocommit() {
            conn.execute_batch("BEGIN")?;
            debug!("began transaction");
        }
        Ok(conn)
    }

    /// Handle with an open transaction, or the state error for `operation`.
    fn open_transaction(&self, operation: &'static str) -> DbResult<&rusqlite::Connection> {
        match &self.handle {
            Some(conn) if !conn.is_autocommit() => Ok(conn),
            _ => Err(DbError::no_transaction(operation)),
        }
    }
}

impl Connection for SqliteConnection {
    fn select(&mut self, sql: &str, parameters: &ParameterSet) -> DbResult<ValueSets> {
        trace!(sql, "select");
        let conn = self.handle()?;
        let mut stmt = prepare_bound(conn, sql, parameters)?;
        let columns: Arc<[String]> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let mut rows = stmt.raw_query();
        let mut sets = Vec::new();
        while let Some(row) = rows.next()? {
            let values = (0..columns.len())
                .map(|i| read_value(row.get_ref(i)?))
                .collect::<DbResult<Vec<_>>>()?;
            sets.push(ValueSet::new(Arc::clone(&columns), values));
        }
        Ok(ValueSets::new(sets))
    }

    fn execute(&mut self, sql: &str, parameters: &ParameterSet) -> DbResult<()> {
        trace!(sql, "execute");
        run_statement(self.handle()?, sql, parameters)
    }

    fn execute_batch(&mut self, sql: &str, parameter_sets: &[ParameterSet]) -> DbResult<()> {
        trace!(sql, count = parameter_sets.len(), "execute batch");
        let conn = self.handle()?;
        for parameters in parameter_sets {
            run_statement(conn, sql, parameters)?;
        }
        Ok(())
    }

    fn execute_on_transaction(&mut self, sql: &str, parameters: &ParameterSet) -> DbResult<()> {
        trace!(sql, "execute on transaction");
        run_statement(self.transaction_handle()?, sql, parameters)
    }

    fn execute_batch_on_transaction(
        &mut self,
        sql: &str,
        parameter_sets: &[ParameterSet],
    ) -> DbResult<()> {
        trace!(sql, count = parameter_sets.len(), "execute batch on transaction");
        let conn = self.transaction_handle()?;
        for parameters in parameter_sets {
            run_statement(conn, sql, parameters)?;
        }
        Ok(())
    }

    fn execute_script(&mut self, sql: &str) -> DbResult<()> {
        trace!(sql, "execute script");
        self.handle()?.execute_batch(sql)?;
        Ok(())
    }

    fn get_scalar(&mut self, sql: &str, parameters: &ParameterSet) -> DbResult<Option<Value>> {
        trace!(sql, "get scalar");
        let conn = self.handle()?;
        let mut stmt = prepare_bound(conn, sql, parameters)?;
        let mut rows = stmt.raw_query();
        match rows.next()? {
            Some(row) => Ok(Some(read_value(row.get_ref(0)?)?)),
            None => Ok(None),
        }
    }

    fn commit(&mut self) -> DbResult<()> {
        self.open_transaction("commit")?.execute_batch("COMMIT")?;
        debug!("committed transaction");
        Ok(())
    }

    fn roll_back(&mut self) -> DbResult<()> {
        self.open_transaction("roll back")?.execute_batch("ROLLBACK")?;
        debug!("rolled back transaction");
        Ok(())
    }

    fn close(&mut self) {
        let Some(conn) = self.handle.take() else {
            return;
        };
        if !conn.is_autocommit() {
            match conn.execute_batch("ROLLBACK") {
                Ok(()) => debug!("rolled back pending transaction on close"),
                Err(err) => warn!(error = %err, "failed to roll back pending transaction"),
            }
        }
        match conn.close() {
            Ok(()) => debug!(data_source = %self.config.data_source, "closed sqlite connection"),
            Err((_, err)) => warn!(error = %err, "failed to close sqlite connection"),
        }
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Stateless factory producing [`SqliteConnection`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteFactory;

impl SqliteFactory {
    pub fn new() -> Self {
        Self
    }
}

impl ConnectionFactory for SqliteFactory {
    fn create(&self, connection_string: &str) -> DbResult<Box<dyn Connection>> {
        Ok(Box::new(SqliteConnection::from_connection_string(
            connection_string,
        )?))
    }
}

fn run_statement(conn: &rusqlite::Connection, sql: &str, parameters: &ParameterSet) -> DbResult<()> {
    let mut stmt = prepare_bound(conn, sql, parameters)?;
    // Rows produced by the statement (SELECT, reporting PRAGMAs) are discarded.
    let mut rows = stmt.raw_query();
    while rows.next()?.is_some() {}
    Ok(())
}

fn prepare_bound<'c>(
    conn: &'c rusqlite::Connection,
    sql: &str,
    parameters: &ParameterSet,
) -> DbResult<CachedStatement<'c>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let mut bound = vec![false; stmt.parameter_count()];
    for parameter in parameters {
        let placeholder = placeholder(parameter.name());
        let index = stmt
            .parameter_index(&placeholder)?
            .ok_or(rusqlite::Error::InvalidParameterName(placeholder))?;
        stmt.raw_bind_parameter(index, coerce(parameter)?)?;
        bound[index - 1] = true;
    }
    if let Some(unbound) = bound.iter().position(|bound| !bound) {
        let index = unbound + 1;
        let name = stmt
            .parameter_name(index)
            .map_or_else(|| format!("?{index}"), str::to_string);
        return Err(DbError::UnboundParameter(name));
    }
    Ok(stmt)
}

fn placeholder(name: &str) -> String {
    if name.starts_with(['@', ':', '$']) {
        name.to_string()
    } else {
        format!("@{name}")
    }
}

/// Map a parameter to a SQLite storage class according to its declared type.
fn coerce(parameter: &Parameter) -> DbResult<SqlValue> {
    let value = parameter.value();
    let target = parameter.data_type();
    let mismatch = || DbError::conversion(value.data_type(), sqlite_type_name(target));

    let coerced = match (target, value) {
        (_, Value::Null) | (DataType::Null, _) => SqlValue::Null,

        (DataType::Integer, Value::Integer(v)) => SqlValue::Integer(*v),
        (DataType::Integer, Value::Boolean(v)) => SqlValue::Integer((*v).into()),
        (DataType::Integer, Value::Real(v)) if v.is_finite() && v.fract() == 0.0 => {
            SqlValue::Integer(*v as i64)
        }
        (DataType::Integer, Value::Text(v)) => {
            SqlValue::Integer(v.trim().parse().map_err(|_| mismatch())?)
        }

        (DataType::Real, Value::Real(v)) => SqlValue::Real(*v),
        (DataType::Real, Value::Integer(v)) => SqlValue::Real(*v as f64),
        (DataType::Real, Value::Boolean(v)) => SqlValue::Real(if *v { 1.0 } else { 0.0 }),
        (DataType::Real, Value::Text(v)) => {
            SqlValue::Real(v.trim().parse().map_err(|_| mismatch())?)
        }

        (DataType::Text, Value::Text(v)) => SqlValue::Text(v.clone()),
        (DataType::Text, Value::Integer(v)) => SqlValue::Text(v.to_string()),
        (DataType::Text, Value::Real(v)) => SqlValue::Text(v.to_string()),
        (DataType::Text, Value::Boolean(v)) => SqlValue::Text(v.to_string()),
        (DataType::Text, Value::Blob(v)) => {
            SqlValue::Text(String::from_utf8(v.clone()).map_err(|_| mismatch())?)
        }

        (DataType::Blob, Value::Blob(v)) => SqlValue::Blob(v.clone()),
        (DataType::Blob, Value::Text(v)) => SqlValue::Blob(v.clone().into_bytes()),

        (DataType::Boolean, Value::Boolean(v)) => SqlValue::Integer((*v).into()),
        (DataType::Boolean, Value::Integer(v)) => SqlValue::Integer((*v != 0).into()),
        (DataType::Boolean, Value::Text(v)) => match v.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => SqlValue::Integer(1),
            "false" | "0" => SqlValue::Integer(0),
            _ => return Err(mismatch()),
        },

        _ => return Err(mismatch()),
    };
    Ok(coerced)
}

fn sqlite_type_name(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Null => "NULL",
        DataType::Integer | DataType::Boolean => "INTEGER",
        DataType::Real => "REAL",
        DataType::Text => "TEXT",
        DataType::Blob => "BLOB",
    }
}

fn read_value(value: ValueRef<'_>) -> DbResult<Value> {
    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(v) => Value::Text(
            String::from_utf8(v.to_vec())
                .map_err(|_| DbError::conversion(DataType::Text, "String"))?,
        ),
        ValueRef::Blob(v) => Value::Blob(v.to_vec()),
    })
}
