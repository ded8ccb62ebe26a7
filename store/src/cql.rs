//! CQL statement text for the fixed row layout.
//!
//! Identifiers interpolated here (keyspace, table, column names) are
//! validated against the CQL identifier charset upstream; values never
//! appear in statement text, they are always bound.

use data_types::{METRIC_NAME_COLUMN, SELECTOR_COLUMN, TIMESTAMP_COLUMN, VALUE_COLUMN};

pub(crate) fn create_keyspace(keyspace: &str) -> String {
    format!(
        "CREATE KEYSPACE IF NOT EXISTS {keyspace} \
         WITH replication = {{'class': 'SimpleStrategy', 'replication_factor': 3}}"
    )
}

pub(crate) fn create_table(keyspace: &str, table: &str, label_columns: &[String]) -> String {
    let mut columns = format!(
        "{METRIC_NAME_COLUMN} ascii, {TIMESTAMP_COLUMN} bigint, \
         {SELECTOR_COLUMN} ascii, {VALUE_COLUMN} double"
    );
    for label in label_columns {
        columns.push_str(&format!(", {label} ascii"));
    }
    format!(
        "CREATE TABLE {keyspace}.{table} ({columns}, \
         PRIMARY KEY ({METRIC_NAME_COLUMN}, {TIMESTAMP_COLUMN}, {SELECTOR_COLUMN})) \
         WITH CLUSTERING ORDER BY ({TIMESTAMP_COLUMN} ASC, {SELECTOR_COLUMN} ASC)"
    )
}

pub(crate) fn create_timestamp_index(keyspace: &str, table: &str) -> String {
    format!("CREATE INDEX {table}_ts ON {keyspace}.{table} ({TIMESTAMP_COLUMN})")
}

pub(crate) fn add_column(keyspace: &str, table: &str, column: &str) -> String {
    format!("ALTER TABLE {keyspace}.{table} ADD {column} ascii")
}

pub(crate) fn insert(keyspace: &str, table: &str, label_columns: &[&str]) -> String {
    let mut columns = format!("{METRIC_NAME_COLUMN}, {SELECTOR_COLUMN}, {TIMESTAMP_COLUMN}");
    let mut markers = "?, ?, ?".to_string();
    for label in label_columns {
        columns.push_str(&format!(", {label}"));
        markers.push_str(", ?");
    }
    columns.push_str(&format!(", {VALUE_COLUMN}"));
    markers.push_str(", ?");
    format!("INSERT INTO {keyspace}.{table} ({columns}) VALUES ({markers})")
}

pub(crate) fn scan(keyspace: &str, table: &str) -> String {
    format!(
        "SELECT * FROM {keyspace}.{table} \
         WHERE {METRIC_NAME_COLUMN} = ? AND {TIMESTAMP_COLUMN} > ? AND {TIMESTAMP_COLUMN} < ?"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_keyspace() {
        assert_eq!(
            create_keyspace("metrics"),
            "CREATE KEYSPACE IF NOT EXISTS metrics WITH replication = \
             {'class': 'SimpleStrategy', 'replication_factor': 3}"
        );
    }

    #[test]
    fn test_create_table() {
        assert_eq!(
            create_table(
                "metrics",
                "node_cpu",
                &["cpu".to_string(), "mode".to_string()]
            ),
            "CREATE TABLE metrics.node_cpu (metric__name ascii, timestamp bigint, \
             selector ascii, value double, cpu ascii, mode ascii, \
             PRIMARY KEY (metric__name, timestamp, selector)) \
             WITH CLUSTERING ORDER BY (timestamp ASC, selector ASC)"
        );
    }

    #[test]
    fn test_create_table_no_labels() {
        assert_eq!(
            create_table("metrics", "up", &[]),
            "CREATE TABLE metrics.up (metric__name ascii, timestamp bigint, \
             selector ascii, value double, \
             PRIMARY KEY (metric__name, timestamp, selector)) \
             WITH CLUSTERING ORDER BY (timestamp ASC, selector ASC)"
        );
    }

    #[test]
    fn test_create_timestamp_index() {
        assert_eq!(
            create_timestamp_index("metrics", "node_cpu"),
            "CREATE INDEX node_cpu_ts ON metrics.node_cpu (timestamp)"
        );
    }

    #[test]
    fn test_add_column() {
        assert_eq!(
            add_column("metrics", "node_cpu", "mode"),
            "ALTER TABLE metrics.node_cpu ADD mode ascii"
        );
    }

    #[test]
    fn test_insert() {
        assert_eq!(
            insert("metrics", "node_cpu", &["cpu", "mode"]),
            "INSERT INTO metrics.node_cpu (metric__name, selector, timestamp, \
             cpu, mode, value) VALUES (?, ?, ?, ?, ?, ?)"
        );
    }

    #[test]
    fn test_insert_no_labels() {
        assert_eq!(
            insert("metrics", "up", &[]),
            "INSERT INTO metrics.up (metric__name, selector, timestamp, value) \
             VALUES (?, ?, ?, ?)"
        );
    }

    #[test]
    fn test_scan() {
        assert_eq!(
            scan("metrics", "up"),
            "SELECT * FROM metrics.up WHERE metric__name = ? \
             AND timestamp > ? AND timestamp < ?"
        );
    }
}
