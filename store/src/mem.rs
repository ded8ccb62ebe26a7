//! In-memory [`Database`] implementation, for testing.
//!
//! Mimics the failure modes of a real cluster: creating a table that exists,
//! adding a column that exists, or inserting through a column the server has
//! not seen all fail the way Cassandra fails them, so reconciliation and
//! retry behavior can be exercised without a cluster. Every call is recorded
//! in an operation history that tests can interrogate.

use crate::interface::{ColumnMeta, Database, Error, Result, SampleBatch, ScanRow, ScanValue};
use async_trait::async_trait;
use data_types::{METRIC_NAME_COLUMN, SELECTOR_COLUMN, TIMESTAMP_COLUMN, VALUE_COLUMN};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt::Display;

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Op {
    EnsureKeyspace,
    CreateTable { table: String },
    AddColumn { table: String, column: String },
    TableColumns { table: String },
    AllColumns,
    InsertBatch { table: String, samples: usize },
    ScanSamples { table: String },
}

#[derive(Debug, Default)]
struct MemTable {
    /// Column names in creation order.
    columns: Vec<String>,
    /// Rows keyed by `(metric, timestamp, selector)`; BTreeMap iteration
    /// yields clustering order.
    rows: BTreeMap<(String, i64, String), BTreeMap<String, ScanValue>>,
}

#[derive(Debug, Default)]
struct MemState {
    tables: BTreeMap<String, MemTable>,
    ops: Vec<Op>,
}

/// In-memory catalog + tables behind one mutex.
#[derive(Debug, Default)]
pub struct MemDatabase {
    state: Mutex<MemState>,
}

impl MemDatabase {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// The operation history so far.
    pub fn ops(&self) -> Vec<Op> {
        self.state.lock().ops.clone()
    }

    /// Number of recorded operations matching `predicate`.
    pub fn op_count(&self, predicate: impl Fn(&Op) -> bool) -> usize {
        self.state.lock().ops.iter().filter(|op| predicate(op)).count()
    }
}

impl Display for MemDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mem")
    }
}

#[async_trait]
impl Database for MemDatabase {
    async fn ensure_keyspace(&self) -> Result<()> {
        self.state.lock().ops.push(Op::EnsureKeyspace);
        Ok(())
    }

    async fn create_table(&self, table: &str, label_columns: &[String]) -> Result<()> {
        let mut state = self.state.lock();
        state.ops.push(Op::CreateTable {
            table: table.to_string(),
        });
        if state.tables.contains_key(table) {
            return Err(Error::TableExists {
                table: table.to_string(),
            });
        }

        let mut columns = vec![
            METRIC_NAME_COLUMN.to_string(),
            TIMESTAMP_COLUMN.to_string(),
            SELECTOR_COLUMN.to_string(),
            VALUE_COLUMN.to_string(),
        ];
        columns.extend(label_columns.iter().cloned());
        state.tables.insert(
            table.to_string(),
            MemTable {
                columns,
                rows: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn add_column(&self, table: &str, column: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.ops.push(Op::AddColumn {
            table: table.to_string(),
            column: column.to_string(),
        });
        let t = state
            .tables
            .get_mut(table)
            .ok_or_else(|| Error::TableNotFound {
                table: table.to_string(),
            })?;
        if t.columns.iter().any(|c| c == column) {
            return Err(Error::ColumnExists {
                table: table.to_string(),
                column: column.to_string(),
            });
        }
        t.columns.push(column.to_string());
        Ok(())
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnMeta>> {
        let mut state = self.state.lock();
        state.ops.push(Op::TableColumns {
            table: table.to_string(),
        });
        Ok(state
            .tables
            .get(table)
            .map(|t| {
                t.columns
                    .iter()
                    .map(|c| ColumnMeta {
                        table_name: table.to_string(),
                        column_name: c.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn all_columns(&self) -> Result<Vec<ColumnMeta>> {
        let mut state = self.state.lock();
        state.ops.push(Op::AllColumns);
        Ok(state
            .tables
            .iter()
            .flat_map(|(table, t)| {
                t.columns.iter().map(|c| ColumnMeta {
                    table_name: table.clone(),
                    column_name: c.clone(),
                })
            })
            .collect())
    }

    async fn insert_samples(&self, batch: &SampleBatch) -> Result<()> {
        let mut state = self.state.lock();
        state.ops.push(Op::InsertBatch {
            table: batch.table_name.clone(),
            samples: batch.samples.len(),
        });
        let t = state
            .tables
            .get_mut(&batch.table_name)
            .ok_or_else(|| Error::TableNotFound {
                table: batch.table_name.clone(),
            })?;

        for (name, _) in &batch.labels {
            if !t.columns.iter().any(|c| c == name) {
                return Err(Error::UnknownColumn {
                    table: batch.table_name.clone(),
                    column: name.clone(),
                });
            }
        }

        for sample in &batch.samples {
            let mut row = BTreeMap::from([
                (
                    METRIC_NAME_COLUMN.to_string(),
                    ScanValue::Ascii(batch.metric_name.clone()),
                ),
                (
                    TIMESTAMP_COLUMN.to_string(),
                    ScanValue::BigInt(sample.timestamp),
                ),
                (
                    SELECTOR_COLUMN.to_string(),
                    ScanValue::Ascii(batch.selector.clone()),
                ),
                (VALUE_COLUMN.to_string(), ScanValue::Double(sample.value)),
            ]);
            for (name, value) in &batch.labels {
                row.insert(name.clone(), ScanValue::Ascii(value.clone()));
            }
            t.rows.insert(
                (
                    batch.metric_name.clone(),
                    sample.timestamp,
                    batch.selector.clone(),
                ),
                row,
            );
        }
        Ok(())
    }

    async fn scan_samples(
        &self,
        table: &str,
        metric: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<ScanRow>> {
        let mut state = self.state.lock();
        state.ops.push(Op::ScanSamples {
            table: table.to_string(),
        });
        let t = state.tables.get(table).ok_or_else(|| Error::TableNotFound {
            table: table.to_string(),
        })?;

        Ok(t.rows
            .iter()
            .filter(|((m, ts, _), _)| m == metric && *ts > start_ms && *ts < end_ms)
            .map(|(_, row)| ScanRow {
                columns: t
                    .columns
                    .iter()
                    .map(|c| {
                        (
                            c.clone(),
                            row.get(c).cloned().unwrap_or(ScanValue::Null),
                        )
                    })
                    .collect(),
            })
            .collect())
    }
}
