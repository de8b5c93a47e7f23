use std::time::Duration;

use async_trait::async_trait;
use nl2sql_core::{
    database::{Database, DatabaseError, Row},
    record::ConnectionRecord,
    schema::Schema,
};
use sqlx::{
    mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow},
    Column, ConnectOptions, Connection, Executor, Row as _, TypeInfo,
};
use tracing::{debug, instrument};

use crate::{
    introspect::{self, ColumnRow, KeyRow},
    statement, values,
};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// MySQL access over short-lived connections: every operation connects,
/// does its work and closes.
#[derive(Debug, Clone)]
pub struct MySqlDatabase {
    connect_timeout: Duration,
}

impl Default for MySqlDatabase {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl MySqlDatabase {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    async fn connect(&self, record: &ConnectionRecord) -> Result<MySqlConnection, DatabaseError> {
        let options = connect_options(record)?;
        match tokio::time::timeout(self.connect_timeout, options.connect()).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(err)) => Err(DatabaseError::Connect(err.to_string())),
            Err(_) => Err(DatabaseError::Connect(format!(
                "timed out after {}s",
                self.connect_timeout.as_secs()
            ))),
        }
    }
}

pub fn connect_options(record: &ConnectionRecord) -> Result<MySqlConnectOptions, DatabaseError> {
    let port = record
        .port_number()
        .map_err(|e| DatabaseError::Settings(e.to_string()))?;
    Ok(MySqlConnectOptions::new()
        .host(&record.host)
        .port(port)
        .username(&record.user)
        .password(&record.password)
        .database(&record.database))
}

#[async_trait]
impl Database for MySqlDatabase {
    #[instrument(skip_all, fields(host = %record.host, database = %record.database))]
    async fn check(&self, record: &ConnectionRecord) -> Result<(), DatabaseError> {
        let conn = self.connect(record).await?;
        conn.close()
            .await
            .map_err(|e| DatabaseError::Connect(e.to_string()))?;
        debug!("connection check passed");
        Ok(())
    }

    #[instrument(skip_all, fields(host = %record.host, database = %record.database))]
    async fn schema(&self, record: &ConnectionRecord) -> Result<Schema, DatabaseError> {
        let mut conn = self.connect(record).await?;
        let columns = text_rows(&mut conn, introspect::COLUMNS_SQL).await?;
        let keys = text_rows(&mut conn, introspect::KEYS_SQL).await?;
        // Close errors after a successful read don't invalidate the result.
        let _ = conn.close().await;

        let columns = columns
            .into_iter()
            .filter_map(|mut cells| {
                let default = cells.get_mut(4).and_then(Option::take);
                Some(ColumnRow {
                    table: take(&mut cells, 0)?,
                    column: take(&mut cells, 1)?,
                    column_type: take(&mut cells, 2)?,
                    is_nullable: take(&mut cells, 3).unwrap_or_default(),
                    default,
                })
            })
            .collect();
        let keys = keys
            .into_iter()
            .filter_map(|mut cells| {
                Some(KeyRow {
                    table: take(&mut cells, 0)?,
                    constraint: take(&mut cells, 1)?,
                    column: take(&mut cells, 2)?,
                    referenced_table: take(&mut cells, 3),
                    referenced_column: take(&mut cells, 4),
                })
            })
            .collect();

        let schema = introspect::assemble(columns, keys);
        debug!(tables = schema.tables.len(), "schema loaded");
        Ok(schema)
    }

    #[instrument(skip_all, fields(host = %record.host, database = %record.database))]
    async fn execute(&self, record: &ConnectionRecord, sql: &str) -> Result<Vec<Row>, DatabaseError> {
        // The text protocol runs every `;`-separated statement it is given.
        statement::ensure_single(sql)?;
        let mut conn = self.connect(record).await?;
        let result = conn.fetch_all(sqlx::raw_sql(sql)).await;
        let _ = conn.close().await;

        let rows = result.map_err(|e| DatabaseError::Query(e.to_string()))?;
        debug!(rows = rows.len(), "query executed");
        Ok(rows.iter().map(row_to_json).collect())
    }
}

/// Run an unprepared statement (text protocol) and read every cell as text.
async fn text_rows(
    conn: &mut MySqlConnection,
    sql: &str,
) -> Result<Vec<Vec<Option<String>>>, DatabaseError> {
    let rows = conn
        .fetch_all(sqlx::raw_sql(sql))
        .await
        .map_err(|e| DatabaseError::Query(e.to_string()))?;
    Ok(rows
        .iter()
        .map(|row| (0..row.len()).map(|i| cell_text(row, i)).collect())
        .collect())
}

fn cell_text(row: &MySqlRow, index: usize) -> Option<String> {
    match row.try_get_unchecked::<Option<String>, _>(index) {
        Ok(value) => value,
        // Binary data that is not UTF-8.
        Err(_) => row
            .try_get_unchecked::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()),
    }
}

fn row_to_json(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .map(|column| {
            let value = values::cell_to_json(column.type_info().name(), cell_text(row, column.ordinal()));
            (column.name().to_string(), value)
        })
        .collect()
}

fn take(cells: &mut [Option<String>], index: usize) -> Option<String> {
    cells.get_mut(index).and_then(Option::take)
}
