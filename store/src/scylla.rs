//! [`Database`] implementation on the ScyllaDB native driver.
//!
//! One [`Session`] per process, shared by every request task; the driver
//! serialises nothing, statement execution is safe under concurrent use.
//! All DDL runs at QUORUM; reads and writes use the default profile
//! (LOCAL_ONE, per-request timeout from the configuration).

use crate::cql;
use crate::interface::{ColumnMeta, Database, Error, Result, SampleBatch, ScanRow, ScanValue};
use async_trait::async_trait;
use data_types::is_valid_identifier;
use observability_deps::tracing::debug;
use scylla::batch::{Batch, BatchType};
use scylla::frame::response::result::CqlValue;
use scylla::query::Query;
use scylla::statement::Consistency;
use scylla::transport::errors::{DbError, NewSessionError, QueryError};
use scylla::transport::ExecutionProfile;
use scylla::{QueryResult, Session, SessionBuilder};
use std::fmt::{Debug, Display};
use std::time::Duration;

const CATALOG_TABLE_COLUMNS: &str =
    "SELECT table_name, column_name FROM system_schema.columns \
     WHERE keyspace_name = ? AND table_name = ?";
const CATALOG_ALL_COLUMNS: &str =
    "SELECT table_name, column_name FROM system_schema.columns WHERE keyspace_name = ?";

/// A ScyllaDB (or Cassandra) cluster as seen by the store.
pub struct ScyllaDatabase {
    session: Session,
    keyspace: String,
}

impl Debug for ScyllaDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScyllaDatabase")
            .field("keyspace", &self.keyspace)
            .finish_non_exhaustive()
    }
}

impl Display for ScyllaDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scylla(keyspace={})", self.keyspace)
    }
}

impl ScyllaDatabase {
    /// Establishes a session against `hosts`.
    ///
    /// `request_timeout` bounds every operation issued through the session,
    /// connection establishment included.
    pub async fn connect(
        hosts: &[String],
        keyspace: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let keyspace = keyspace.into();
        if !is_valid_identifier(&keyspace) {
            return Err(Error::Request {
                message: format!("keyspace '{keyspace}' is not a valid identifier"),
            });
        }

        let profile = ExecutionProfile::builder()
            .consistency(Consistency::LocalOne)
            .request_timeout(Some(request_timeout))
            .build();
        let session = SessionBuilder::new()
            .known_nodes(hosts)
            .connection_timeout(request_timeout)
            .default_execution_profile_handle(profile.into_handle())
            .build()
            .await
            .map_err(connect_error)?;

        Ok(Self { session, keyspace })
    }

    async fn execute_ddl(&self, statement: String) -> Result<()> {
        debug!(cql = %statement, "executing DDL");
        let mut query = Query::new(statement);
        query.set_consistency(Consistency::Quorum);
        self.session.query(query, ()).await.map_err(query_error)?;
        Ok(())
    }
}

#[async_trait]
impl Database for ScyllaDatabase {
    async fn ensure_keyspace(&self) -> Result<()> {
        self.execute_ddl(cql::create_keyspace(&self.keyspace)).await
    }

    async fn create_table(&self, table: &str, label_columns: &[String]) -> Result<()> {
        self.execute_ddl(cql::create_table(&self.keyspace, table, label_columns))
            .await?;
        self.execute_ddl(cql::create_timestamp_index(&self.keyspace, table))
            .await
    }

    async fn add_column(&self, table: &str, column: &str) -> Result<()> {
        self.execute_ddl(cql::add_column(&self.keyspace, table, column))
            .await
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnMeta>> {
        let result = self
            .session
            .query(CATALOG_TABLE_COLUMNS, (self.keyspace.as_str(), table))
            .await
            .map_err(query_error)?;
        column_rows(result)
    }

    async fn all_columns(&self) -> Result<Vec<ColumnMeta>> {
        let result = self
            .session
            .query(CATALOG_ALL_COLUMNS, (self.keyspace.as_str(),))
            .await
            .map_err(query_error)?;
        column_rows(result)
    }

    async fn insert_samples(&self, batch: &SampleBatch) -> Result<()> {
        let label_names: Vec<&str> = batch.labels.iter().map(|(name, _)| name.as_str()).collect();
        let statement = cql::insert(&self.keyspace, &batch.table_name, &label_names);
        let prepared = self.session.prepare(statement).await.map_err(query_error)?;

        let mut logged = Batch::new(BatchType::Logged);
        let mut values: Vec<Vec<CqlValue>> = Vec::with_capacity(batch.samples.len());
        for sample in &batch.samples {
            logged.append_statement(prepared.clone());

            let mut row: Vec<CqlValue> = Vec::with_capacity(batch.labels.len() + 4);
            row.push(CqlValue::Ascii(batch.metric_name.clone()));
            row.push(CqlValue::Ascii(batch.selector.clone()));
            row.push(CqlValue::BigInt(sample.timestamp));
            for (_, value) in &batch.labels {
                row.push(CqlValue::Ascii(value.clone()));
            }
            row.push(CqlValue::Double(sample.value));
            values.push(row);
        }

        self.session
            .batch(&logged, values)
            .await
            .map_err(|e| batch_error(e, batch))?;
        Ok(())
    }

    async fn scan_samples(
        &self,
        table: &str,
        metric: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<ScanRow>> {
        let result = self
            .session
            .query(cql::scan(&self.keyspace, table), (metric, start_ms, end_ms))
            .await
            .map_err(query_error)?;

        let names: Vec<String> = result
            .col_specs
            .iter()
            .map(|spec| spec.name.clone())
            .collect();
        let mut rows = Vec::new();
        for row in result.rows.unwrap_or_default() {
            let columns = names
                .iter()
                .cloned()
                .zip(row.columns.into_iter().map(scan_value))
                .collect();
            rows.push(ScanRow { columns });
        }
        Ok(rows)
    }
}

fn connect_error(e: NewSessionError) -> Error {
    Error::Request {
        message: e.to_string(),
    }
}

fn query_error(e: QueryError) -> Error {
    match e {
        QueryError::DbError(DbError::AlreadyExists { keyspace: _, table }, _) => {
            Error::TableExists { table }
        }
        other => Error::Request {
            message: other.to_string(),
        },
    }
}

/// The server reports an insert through a not-yet-propagated column as an
/// invalid request naming the column; surface it as [`Error::UnknownColumn`]
/// so the retry loop treats it like the schema lag it is.
fn batch_error(e: QueryError, batch: &SampleBatch) -> Error {
    if let QueryError::DbError(DbError::Invalid, message) = &e {
        if let Some((name, _)) = batch
            .labels
            .iter()
            .find(|(name, _)| message.contains(name.as_str()))
        {
            return Error::UnknownColumn {
                table: batch.table_name.clone(),
                column: name.clone(),
            };
        }
    }
    query_error(e)
}

fn column_rows(result: QueryResult) -> Result<Vec<ColumnMeta>> {
    let rows = result.rows_typed::<(String, String)>().map_err(row_error)?;
    let mut columns = Vec::new();
    for row in rows {
        let (table_name, column_name) = row.map_err(row_error)?;
        columns.push(ColumnMeta {
            table_name,
            column_name,
        });
    }
    Ok(columns)
}

fn row_error(e: impl std::error::Error) -> Error {
    Error::Request {
        message: e.to_string(),
    }
}

fn scan_value(value: Option<CqlValue>) -> ScanValue {
    match value {
        Some(CqlValue::Ascii(s)) | Some(CqlValue::Text(s)) => ScanValue::Ascii(s),
        Some(CqlValue::BigInt(i)) => ScanValue::BigInt(i),
        Some(CqlValue::Double(d)) => ScanValue::Double(d),
        // The row layout produces no other types; anything else reads as
        // unset.
        _ => ScanValue::Null,
    }
}
