//! The store itself: schema reconciliation plus the write and read paths.

use crate::cache::SchemaCache;
use crate::interface::{self, Database, SampleBatch};
use crate::results::{self, ResultAccumulator};
use backoff::{Retry, RetryConfig};
use data_types::{is_valid_identifier, TableSchema, METRIC_NAME_LABEL};
use generated_types::prompb::{label_matcher, Query, TimeSeries};
use observability_deps::tracing::{debug, info};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by the store to the ingress.
#[derive(Debug, Error)]
pub enum Error {
    /// The series cannot be mapped onto the row layout. A client error.
    #[error("malformed series: {source}")]
    MalformedSeries {
        /// What the series violated.
        #[from]
        source: data_types::Error,
    },

    /// A DDL statement or catalog read failed.
    #[error("schema change for table {table} failed: {source}")]
    Schema {
        /// Table being reconciled.
        table: String,
        /// Backend failure.
        source: interface::Error,
    },

    /// The sample batch failed every attempt.
    #[error("write for metric {metric} failed after {attempts} attempts: {source}")]
    Write {
        /// Metric being written.
        metric: String,
        /// Attempts made, including the first.
        attempts: usize,
        /// Failure of the final attempt.
        source: interface::Error,
    },

    /// The range scan failed.
    #[error("read for metric {metric} failed: {source}")]
    Read {
        /// Metric being read.
        metric: String,
        /// Backend failure.
        source: interface::Error,
    },

    /// The range scan returned a row that does not fit the layout.
    #[error("read for metric {metric} returned a malformed row: {source}")]
    ReadRow {
        /// Metric being read.
        metric: String,
        /// What was wrong with the row.
        source: results::Error,
    },

    /// The query carried no matchers at all. A client error.
    #[error("query has no matchers")]
    NoMatchers,

    /// The query used a matcher this adapter does not implement. A client
    /// error.
    #[error(
        "unsupported {matcher} matcher on label '{name}': \
         only equality on __name__ is supported"
    )]
    UnsupportedMatcher {
        /// Label the matcher addressed.
        name: String,
        /// Matcher operator.
        matcher: &'static str,
    },

    /// Keyspace creation or the initial catalog scan failed.
    #[error("bootstrap failed: {source}")]
    Bootstrap {
        /// Backend failure.
        source: interface::Error,
    },
}

impl Error {
    /// Whether the failure was caused by the request rather than the store.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedSeries { .. } | Self::NoMatchers | Self::UnsupportedMatcher { .. }
        )
    }
}

/// Store result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Entry point for persisting and querying series.
///
/// Owns the process-wide [`SchemaCache`] and the per-table reconciliation
/// gates; created once at bootstrap and shared (via [`Arc`]) by every
/// request task.
#[derive(Debug)]
pub struct SeriesStore {
    db: Arc<dyn Database>,
    cache: SchemaCache,
    retry_config: RetryConfig,
    /// One gate per table so concurrent writers of the same table do not
    /// race each other through the reconciliation slow path.
    gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SeriesStore {
    /// Creates a store on `db` with the given write retry policy.
    pub fn new(db: Arc<dyn Database>, retry_config: RetryConfig) -> Self {
        Self {
            db,
            cache: SchemaCache::new(),
            retry_config,
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Ensures the keyspace exists and pre-warms the schema cache from the
    /// catalog.
    pub async fn init(&self) -> Result<()> {
        self.db
            .ensure_keyspace()
            .await
            .map_err(|source| Error::Bootstrap { source })?;

        let columns = self
            .db
            .all_columns()
            .await
            .map_err(|source| Error::Bootstrap { source })?;
        let count = columns.len();
        for column in columns {
            self.cache.add_column(&column.table_name, &column.column_name);
        }
        info!(columns = count, db = %self.db, "schema cache warmed");
        Ok(())
    }

    /// Brings the database schema to a state that covers `series`: the
    /// backing table exists and has a column for every dimension label.
    ///
    /// The cache fast path makes the common call free of catalog traffic;
    /// the slow path is serialised per table within this process. A DDL
    /// race lost against another process still surfaces as
    /// [`Error::Schema`]; the write retry loop absorbs the window.
    pub async fn ensure_schema(&self, series: &TimeSeries) -> Result<()> {
        let wanted = TableSchema::from_series(series)?;
        if self.cache.satisfies(&wanted) {
            return Ok(());
        }

        let gate = self.gate(&wanted.table_name);
        let _guard = gate.lock().await;

        // Another task may have finished the same reconciliation while this
        // one waited on the gate.
        if self.cache.satisfies(&wanted) {
            debug!(table = %wanted.table_name, "schema reconciled while waiting");
            return Ok(());
        }

        self.reconcile(series, &wanted).await
    }

    async fn reconcile(&self, series: &TimeSeries, wanted: &TableSchema) -> Result<()> {
        let table = &wanted.table_name;
        let schema_error = |source| Error::Schema {
            table: table.clone(),
            source,
        };

        let existing = self.db.table_columns(table).await.map_err(schema_error)?;

        if existing.is_empty() {
            let columns = label_columns(series);
            info!(%table, columns = columns.len(), "creating metric table");
            self.db
                .create_table(table, &columns)
                .await
                .map_err(schema_error)?;
        } else {
            let present: HashSet<&str> = existing
                .iter()
                .map(|c| c.column_name.as_str())
                .collect();
            for column in label_columns(series) {
                if !present.contains(column.as_str()) {
                    info!(%table, %column, "adding label column");
                    self.db
                        .add_column(table, &column)
                        .await
                        .map_err(schema_error)?;
                }
            }
        }

        // Refresh the cache from the catalog rather than from what was just
        // issued: the cache must stay a lower bound of the real catalog.
        for column in self.db.table_columns(table).await.map_err(schema_error)? {
            self.cache.add_column(&column.table_name, &column.column_name);
        }
        Ok(())
    }

    /// Persists every sample of `series` as one logged batch, retrying per
    /// the configured policy to mask schema propagation lag.
    pub async fn write_samples(&self, series: &TimeSeries) -> Result<()> {
        let schema = TableSchema::from_series(series)?;
        if series.samples.is_empty() {
            return Ok(());
        }

        let metric = data_types::metric_name(series)?.to_string();
        let labels = data_types::dimensions(series)
            .map(|l| (l.name.clone(), l.value.clone()))
            .collect::<Vec<_>>();
        let batch = SampleBatch {
            table_name: schema.table_name,
            metric_name: metric.clone(),
            selector: data_types::selector(series),
            labels: dedup_labels(labels),
            samples: series.samples.clone(),
        };

        Retry::new(&self.retry_config)
            .retry("write samples", || async {
                self.db.insert_samples(&batch).await
            })
            .await
            .map_err(|e| {
                let attempts = e.attempts();
                Error::Write {
                    metric: metric.clone(),
                    attempts,
                    source: e.into_source(),
                }
            })?;

        debug!(%metric, samples = batch.samples.len(), "batch written");
        Ok(())
    }

    /// Serves one range query: scans the metric's table between the query
    /// bounds and reassembles the rows into series, one per distinct
    /// dimension-label combination.
    ///
    /// Only exact-equality matchers on `__name__` are supported; the first
    /// matcher provides the metric name.
    pub async fn read_samples(&self, query: &Query) -> Result<Vec<TimeSeries>> {
        let metric = query_metric(query)?;
        let table = data_types::table_name(&metric);

        let rows = self
            .db
            .scan_samples(
                &table,
                &metric,
                query.start_timestamp_ms,
                query.end_timestamp_ms,
            )
            .await
            .map_err(|source| Error::Read {
                metric: metric.clone(),
                source,
            })?;

        let mut acc = ResultAccumulator::default();
        for row in &rows {
            acc.push(row).map_err(|source| Error::ReadRow {
                metric: metric.clone(),
                source,
            })?;
        }
        Ok(acc.into_series())
    }

    fn gate(&self, table: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut gates = self.gates.lock();
        Arc::clone(
            gates
                .entry(table.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }
}

/// Dimension label names in series order, deduplicated.
fn label_columns(series: &TimeSeries) -> Vec<String> {
    let mut seen = HashSet::new();
    data_types::dimensions(series)
        .filter(|l| seen.insert(l.name.as_str()))
        .map(|l| l.name.clone())
        .collect()
}

/// Dimension `(name, value)` pairs deduplicated by name, first value wins.
fn dedup_labels(labels: Vec<(String, String)>) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    labels
        .into_iter()
        .filter(|(name, _)| seen.insert(name.clone()))
        .collect()
}

/// Validates the matchers of `query` and extracts the metric name.
fn query_metric(query: &Query) -> Result<String> {
    if query.matchers.is_empty() {
        return Err(Error::NoMatchers);
    }
    for matcher in &query.matchers {
        if matcher.r#type() != label_matcher::Type::Eq || matcher.name != METRIC_NAME_LABEL {
            return Err(Error::UnsupportedMatcher {
                name: matcher.name.clone(),
                matcher: matcher.r#type().as_str_name(),
            });
        }
    }
    let metric = query.matchers[0].value.clone();
    if !is_valid_identifier(&metric) {
        return Err(Error::MalformedSeries {
            source: data_types::Error::InvalidMetricName { name: metric },
        });
    }
    Ok(metric)
}
