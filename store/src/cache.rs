//! In-memory mirror of the database catalog.

use data_types::TableSchema;
use observability_deps::tracing::debug;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Process-wide mapping from table name to the columns known to exist.
///
/// The cache is a lower bound on the true catalog: entries are only ever
/// added from catalog reads, so it may lag a freshly applied DDL but never
/// reports a column the database does not have. All access is serialised
/// under one mutex; the hold time is a small map update, so coarse locking
/// is cheap even with many concurrent writers.
#[derive(Debug, Default)]
pub struct SchemaCache {
    tables: Mutex<HashMap<String, TableSchema>>,
}

impl SchemaCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `column` exists on `table`, creating the table entry on
    /// first sight. Idempotent.
    pub fn add_column(&self, table: &str, column: &str) {
        let mut tables = self.tables.lock();
        let schema = tables.entry(table.to_string()).or_insert_with(|| {
            debug!(%table, "adding table to schema cache");
            TableSchema::new(table)
        });
        schema.add_column(column);
    }

    /// Whether the cached catalog covers `wanted`. `false` if the table has
    /// never been observed.
    pub fn satisfies(&self, wanted: &TableSchema) -> bool {
        self.tables
            .lock()
            .get(&wanted.table_name)
            .map(|known| known.satisfies(wanted))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wanted(table: &str, columns: &[&str]) -> TableSchema {
        let mut schema = TableSchema::new(table);
        for c in columns {
            schema.add_column(*c);
        }
        schema
    }

    #[test]
    fn test_unknown_table_does_not_satisfy() {
        let cache = SchemaCache::new();
        assert!(!cache.satisfies(&wanted("node_cpu", &[])));
    }

    #[test]
    fn test_add_column_and_satisfies() {
        let cache = SchemaCache::new();
        cache.add_column("node_cpu", "mode");
        cache.add_column("node_cpu", "cpu");

        assert!(cache.satisfies(&wanted("node_cpu", &["mode"])));
        assert!(cache.satisfies(&wanted("node_cpu", &["mode", "cpu"])));
        assert!(!cache.satisfies(&wanted("node_cpu", &["mode", "instance"])));
    }

    #[test]
    fn test_add_column_idempotent() {
        let cache = SchemaCache::new();
        cache.add_column("up", "job");
        cache.add_column("up", "job");
        assert!(cache.satisfies(&wanted("up", &["job"])));
    }
}
