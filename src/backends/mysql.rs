//! MySQL / MariaDB engine
//!
//! Wraps `mysql_async` behind the synchronous [`Engine`] contract: the engine owns a
//! private current-thread runtime and blocks on it for every round trip. Statements go
//! over the text protocol, so cells arrive as text and are typed from the column metadata
//! through the dialect's primitive conversion.

use chrono::NaiveDate;
use mysql_async::consts::ColumnType;
use mysql_async::prelude::Queryable;
use mysql_async::{Column, Conn, OptsBuilder, Row, Value};
use tokio::runtime::Runtime;
use tracing::{debug, error, info, warn};

use crate::core::connection::ConnectionParameters;
use crate::core::dialect::Dialect;
use crate::core::engine::{
    ensure_protocol, initialize, BufferedCursor, CursorTable, Engine, ResultHandle,
    TransactionDepth,
};
use crate::core::error::{DatabaseError, Result};
use crate::core::statement::{NativeStatement, Statement};
use crate::core::value::{DatabaseRow, DatabaseValue, PrimitiveType};

const SUPPORTED_PROTOCOLS: &[&str] = &["mysql", "mariadb"];
const BINARY_CHARSET: u16 = 63;

/// MySQL-family engine
pub struct MysqlEngine {
    runtime: Runtime,
    conn: Option<Conn>,
    dialect: Box<dyn Dialect>,
    depth: TransactionDepth,
    cursors: CursorTable,
}

impl MysqlEngine {
    /// Connect and run the dialect's initializers
    pub fn connect(params: &ConnectionParameters, dialect: Box<dyn Dialect>) -> Result<Self> {
        ensure_protocol(params, SUPPORTED_PROTOCOLS)?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DatabaseError::connection(format!("cannot start runtime: {}", e)))?;

        let host = match params.host() {
            "" => "localhost",
            host => host,
        };
        let port = params
            .port_or_default()
            .ok_or_else(|| DatabaseError::configuration("no port configured for MySQL"))?;
        let opts = OptsBuilder::default()
            .ip_or_hostname(host)
            .tcp_port(port)
            .user(non_empty(params.username()))
            .pass(non_empty(params.password()))
            .db_name(non_empty(params.database()));

        let conn = runtime.block_on(Conn::new(opts)).map_err(|e| {
            DatabaseError::connection_failed_with_source(
                host,
                port,
                "cannot connect to MySQL server",
                Box::new(e),
            )
        })?;

        let mut engine = Self {
            runtime,
            conn: Some(conn),
            dialect,
            depth: TransactionDepth::new(),
            cursors: CursorTable::new(),
        };
        initialize(&mut engine)?;

        info!(host, port, database = params.database(), "mysql engine connected");
        Ok(engine)
    }

    /// Run a statement without a result, returning (affected rows, last insert id)
    fn run(&mut self, sql: &str, statement: Option<&NativeStatement>) -> Result<(u64, Option<u64>)> {
        let Self { runtime, conn, .. } = self;
        let conn = conn.as_mut().ok_or_else(|| {
            DatabaseError::statement("connection is closed", statement.map(Statement::from))
        })?;
        runtime
            .block_on(conn.query_drop(sql))
            .map_err(|e| failure(e, sql))?;
        Ok((conn.affected_rows(), conn.last_insert_id()))
    }
}

/// Convert a text-protocol row, typing each cell from its column metadata
fn row_to_database_row(dialect: &dyn Dialect, row: &Row) -> Result<DatabaseRow> {
    let mut db_row = DatabaseRow::new();
    for (i, column) in row.columns_ref().iter().enumerate() {
        let value = match row.as_ref(i) {
            Some(value) => convert_value(dialect, column, value).map_err(|e| {
                DatabaseError::encoding(format!("column {}: {}", column.name_str(), encoding_message(e)))
            })?,
            None => DatabaseValue::Null,
        };
        db_row.insert(column.name_str().to_string(), value);
    }
    Ok(db_row)
}

fn convert_value(dialect: &dyn Dialect, column: &Column, value: &Value) -> Result<DatabaseValue> {
    match value {
        Value::NULL => Ok(DatabaseValue::Null),
        Value::Int(v) => Ok(DatabaseValue::Long(*v)),
        Value::UInt(v) => i64::try_from(*v)
            .map(DatabaseValue::Long)
            .map_err(|_| DatabaseError::encoding(format!("unsigned value {} out of range", v))),
        Value::Float(v) => Ok(DatabaseValue::Float(*v)),
        Value::Double(v) => Ok(DatabaseValue::Double(*v)),
        Value::Bytes(bytes) => {
            let raw = DatabaseValue::Bytes(bytes.clone());
            match primitive_type_of(column) {
                Some(ty) => dialect.convert_primitive(ty, &raw),
                None => Ok(raw),
            }
        }
        Value::Date(year, month, day, hour, minute, second, micros) => {
            NaiveDate::from_ymd_opt(i32::from(*year), u32::from(*month), u32::from(*day))
                .and_then(|date| {
                    date.and_hms_micro_opt(
                        u32::from(*hour),
                        u32::from(*minute),
                        u32::from(*second),
                        *micros,
                    )
                })
                .map(DatabaseValue::Timestamp)
                .ok_or_else(|| {
                    DatabaseError::encoding(format!(
                        "unable to parse date: {}",
                        value.as_sql(true).trim_matches('\'')
                    ))
                })
        }
        Value::Time(..) => Ok(DatabaseValue::String(
            value.as_sql(true).trim_matches('\'').to_string(),
        )),
    }
}

fn encoding_message(e: DatabaseError) -> String {
    match e {
        DatabaseError::Encoding(message) => message,
        other => other.to_string(),
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn failure(e: mysql_async::Error, sql: &str) -> DatabaseError {
    DatabaseError::statement(e.to_string(), Some(Statement::new(sql, vec![])))
}

/// How a text-protocol cell of this column should be typed; `None` keeps raw bytes
fn primitive_type_of(column: &Column) -> Option<PrimitiveType> {
    match column.column_type() {
        ColumnType::MYSQL_TYPE_TINY
        | ColumnType::MYSQL_TYPE_SHORT
        | ColumnType::MYSQL_TYPE_LONG
        | ColumnType::MYSQL_TYPE_INT24
        | ColumnType::MYSQL_TYPE_LONGLONG
        | ColumnType::MYSQL_TYPE_YEAR => Some(PrimitiveType::Integer),
        ColumnType::MYSQL_TYPE_FLOAT
        | ColumnType::MYSQL_TYPE_DOUBLE
        | ColumnType::MYSQL_TYPE_DECIMAL
        | ColumnType::MYSQL_TYPE_NEWDECIMAL => Some(PrimitiveType::Float),
        ColumnType::MYSQL_TYPE_DATE
        | ColumnType::MYSQL_TYPE_DATETIME
        | ColumnType::MYSQL_TYPE_TIMESTAMP => Some(PrimitiveType::DateTime),
        _ if column.character_set() == BINARY_CHARSET => None,
        _ => Some(PrimitiveType::String),
    }
}

impl Engine for MysqlEngine {
    fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    fn escape(&self, text: &str) -> String {
        self.dialect.escape_str(text)
    }

    fn execute_primitive(&mut self, sql: &str) -> Result<()> {
        debug!(sql, "mysql primitive");
        self.run(sql, None).map(|_| ())
    }

    fn execute(&mut self, statement: &NativeStatement) -> Result<u64> {
        debug!(sql = statement.as_str(), "mysql execute");
        let (affected, _) = self.run(statement.as_str(), Some(statement))?;
        Ok(affected)
    }

    fn insert(&mut self, statement: &NativeStatement) -> Result<i64> {
        debug!(sql = statement.as_str(), "mysql insert");
        let (_, id) = self.run(statement.as_str(), Some(statement))?;
        let id = id.unwrap_or(0);
        i64::try_from(id).map_err(|_| {
            DatabaseError::statement(
                format!("generated id {} out of range", id),
                Some(Statement::from(statement)),
            )
        })
    }

    fn query(&mut self, statement: &NativeStatement) -> Result<ResultHandle> {
        debug!(sql = statement.as_str(), "mysql query");
        let rows: Vec<Row> = {
            let Self { runtime, conn, .. } = &mut *self;
            let conn = conn.as_mut().ok_or_else(|| {
                DatabaseError::statement("connection is closed", Some(Statement::from(statement)))
            })?;
            runtime
                .block_on(conn.query(statement.as_str()))
                .map_err(|e| failure(e, statement.as_str()))?
        };
        let rows = rows
            .iter()
            .map(|row| row_to_database_row(self.dialect.as_ref(), row))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| {
                DatabaseError::encoding(format!("{} on executing [{}]", encoding_message(e), statement))
            })?;
        Ok(self.cursors.register(Box::new(BufferedCursor::new(rows))))
    }

    fn close(&mut self) -> Result<()> {
        self.cursors.release_all();
        if let Some(conn) = self.conn.take() {
            self.runtime
                .block_on(conn.disconnect())
                .map_err(|e| DatabaseError::connection(format!("disconnect failed: {}", e)))?;
            info!("mysql engine closed");
        }
        Ok(())
    }

    fn transaction_depth(&self) -> &TransactionDepth {
        &self.depth
    }

    fn transaction_depth_mut(&mut self) -> &mut TransactionDepth {
        &mut self.depth
    }

    fn cursors(&mut self) -> &mut CursorTable {
        &mut self.cursors
    }
}

impl Drop for MysqlEngine {
    fn drop(&mut self) {
        if self.depth.is_open() {
            warn!("mysql engine dropped with an open transaction, rolling back");
            let rollback = self.dialect.rollback_sql();
            if let Err(e) = self.run(rollback, None) {
                error!(error = %e, "rollback on drop failed");
            }
        }
        if let Some(conn) = self.conn.take() {
            if let Err(e) = self.runtime.block_on(conn.disconnect()) {
                error!(error = %e, "disconnect on drop failed");
            }
        }
    }
}
