//! Traits and data types for the database backend of the store.

use async_trait::async_trait;
use generated_types::prompb::Sample;
use std::fmt::{Debug, Display};
use thiserror::Error;

/// Failure modes a backend can surface.
///
/// The typed variants mirror the schema failure modes of a Cassandra-family
/// server so the reconciler and the retry loop can tell a lost DDL race or a
/// propagation lag from a hard failure.
#[derive(Debug, Error)]
pub enum Error {
    /// CREATE TABLE raced another writer and lost.
    #[error("table {table} already exists")]
    TableExists {
        /// Table the statement targeted.
        table: String,
    },

    /// ALTER TABLE ADD raced another writer and lost.
    #[error("column {column} already exists in table {table}")]
    ColumnExists {
        /// Table the statement targeted.
        table: String,
        /// Column that was already present.
        column: String,
    },

    /// A statement referenced a table the server does not know.
    #[error("table {table} does not exist")]
    TableNotFound {
        /// Table the statement targeted.
        table: String,
    },

    /// A statement referenced a column the server does not know, typically
    /// because an ALTER TABLE has not propagated yet.
    #[error("unknown column {column} in table {table}")]
    UnknownColumn {
        /// Table the statement targeted.
        table: String,
        /// Column the server rejected.
        column: String,
    },

    /// Any other request failure (connection, timeout, server error).
    #[error("database request failed: {message}")]
    Request {
        /// Driver-reported cause.
        message: String,
    },
}

/// Backend result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// One `(table, column)` row read from the database catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    /// Table the column belongs to.
    pub table_name: String,
    /// Name of the column.
    pub column_name: String,
}

/// All samples of one series, bound for one logged batch.
///
/// Every sample shares the series identity (`metric_name`, `selector`,
/// dimension labels); only timestamp and value vary per row.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBatch {
    /// Backing table.
    pub table_name: String,
    /// Full metric name (partition key value).
    pub metric_name: String,
    /// Series selector (second clustering key value).
    pub selector: String,
    /// Dimension labels as `(column name, value)`, in series order, deduplicated.
    pub labels: Vec<(String, String)>,
    /// The observations to insert.
    pub samples: Vec<Sample>,
}

/// One cell of a scanned row.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanValue {
    /// An `ascii` cell.
    Ascii(String),
    /// A `bigint` cell.
    BigInt(i64),
    /// A `double` cell.
    Double(f64),
    /// An unset cell.
    Null,
}

/// A row from a range scan, shaped by whatever columns the table has grown.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScanRow {
    /// `(column name, cell)` pairs in select order.
    pub columns: Vec<(String, ScanValue)>,
}

impl ScanRow {
    /// The cell of `column`, if the row has that column at all.
    pub fn get(&self, column: &str) -> Option<&ScanValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }
}

/// The operations the store needs from a wide-column database.
///
/// Implementations must be safe for concurrent use from many tasks; every
/// method may suspend the caller for the duration of a network round trip.
#[async_trait]
pub trait Database: Send + Sync + Debug + Display {
    /// Creates the configured keyspace if it does not exist yet. Idempotent.
    async fn ensure_keyspace(&self) -> Result<()>;

    /// Creates a metric table: the four fixed row columns, one `ascii`
    /// column per entry of `label_columns` (in order), the
    /// `(metric__name, timestamp, selector)` primary key, and the
    /// `<table>_ts` secondary index on `timestamp`.
    ///
    /// Fails with [`Error::TableExists`] if the table is already there.
    async fn create_table(&self, table: &str, label_columns: &[String]) -> Result<()>;

    /// Adds one `ascii` column to an existing table.
    ///
    /// Fails with [`Error::ColumnExists`] if another writer got there first.
    async fn add_column(&self, table: &str, column: &str) -> Result<()>;

    /// The catalog columns of one table; empty if the table does not exist.
    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnMeta>>;

    /// Every catalog column of the configured keyspace.
    async fn all_columns(&self) -> Result<Vec<ColumnMeta>>;

    /// Inserts all samples of `batch` as one logged batch: they become
    /// visible together or not at all.
    async fn insert_samples(&self, batch: &SampleBatch) -> Result<()>;

    /// All rows of `metric` with `start_ms < timestamp < end_ms`, in
    /// clustering order (ascending timestamp).
    async fn scan_samples(
        &self,
        table: &str,
        metric: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<ScanRow>>;
}
