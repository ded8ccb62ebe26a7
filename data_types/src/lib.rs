//! Value types shared by the write path, read path and schema machinery:
//! the mapping from a labelled Prometheus series onto the fixed-column
//! ScyllaDB row layout.

#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr,
    clippy::todo,
    clippy::dbg_macro
)]

use generated_types::prompb::{Label, TimeSeries};
use std::collections::HashSet;
use thiserror::Error;

/// Name of the label carrying the metric name.
pub const METRIC_NAME_LABEL: &str = "__name__";

/// Partition key column holding the full metric name.
pub const METRIC_NAME_COLUMN: &str = "metric__name";

/// First clustering key column, milliseconds since epoch.
pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// Second clustering key column, the series selector.
pub const SELECTOR_COLUMN: &str = "selector";

/// Column holding the observed value.
pub const VALUE_COLUMN: &str = "value";

/// Columns every metric table carries; label names must not collide with
/// these.
pub const RESERVED_COLUMNS: [&str; 4] = [
    METRIC_NAME_COLUMN,
    TIMESTAMP_COLUMN,
    SELECTOR_COLUMN,
    VALUE_COLUMN,
];

/// Ways a series delivered by the ingress can fail validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The series carries no labels at all.
    #[error("series has no labels")]
    NoLabels,

    /// The series carries labels but none of them is `__name__`.
    #[error("series has no {METRIC_NAME_LABEL} label")]
    NoMetricName,

    /// The metric name cannot become a table/partition identifier.
    #[error("metric name '{name}' is not a valid identifier")]
    InvalidMetricName {
        /// Offending metric name.
        name: String,
    },

    /// A label name cannot become a column identifier.
    #[error("label name '{name}' is not a valid identifier")]
    InvalidLabelName {
        /// Offending label name.
        name: String,
    },

    /// A label name collides with one of [`RESERVED_COLUMNS`].
    #[error("label name '{name}' collides with a reserved column")]
    ReservedLabelName {
        /// Offending label name.
        name: String,
    },

    /// A label value cannot be stored in an `ascii` column.
    #[error("value of label '{name}' is not ASCII")]
    NonAsciiLabelValue {
        /// Name of the label whose value is out of range.
        name: String,
    },
}

/// Returns the metric name of a series.
///
/// Fails if the series has no labels or no `__name__` label.
pub fn metric_name(series: &TimeSeries) -> Result<&str, Error> {
    if series.labels.is_empty() {
        return Err(Error::NoLabels);
    }
    series
        .labels
        .iter()
        .find(|l| l.name == METRIC_NAME_LABEL)
        .map(|l| l.value.as_str())
        .ok_or(Error::NoMetricName)
}

/// The labels of a series other than `__name__`, in series order.
pub fn dimensions(series: &TimeSeries) -> impl Iterator<Item = &Label> {
    series
        .labels
        .iter()
        .filter(|l| l.name != METRIC_NAME_LABEL)
}

/// Derives the backing table name for a metric.
///
/// The first one or two underscore-separated components of the metric name,
/// joined by `_`. Related metrics thereby share a table, which caps the
/// catalog size.
pub fn table_name(metric: &str) -> String {
    let mut parts = metric.splitn(3, '_');
    let first = parts.next().unwrap_or_default();
    match parts.next() {
        Some(second) => format!("{first}_{second}"),
        None => first.to_string(),
    }
}

/// Deterministic fingerprint of a series' dimension labels.
///
/// Each non-`__name__` label rendered as `name=value`, sorted by label name,
/// joined with `:`. Two series with the same label set produce the same
/// selector regardless of label order; a series without dimensions produces
/// the empty string.
pub fn selector(series: &TimeSeries) -> String {
    let mut pairs = dimensions(series)
        .map(|l| format!("{}={}", l.name, l.value))
        .collect::<Vec<_>>();
    pairs.sort();
    pairs.join(":")
}

/// The columns a series needs in its backing table.
///
/// Immutable once constructed; `__name__` is never part of the column set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    /// Name of the backing table.
    pub table_name: String,

    /// Names of the label columns known for that table.
    pub column_names: HashSet<String>,
}

impl TableSchema {
    /// A schema for `table_name` with no columns yet.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            column_names: HashSet::new(),
        }
    }

    /// Extracts the schema a series requires, validating the series on the
    /// way: the metric name and every label name must be usable as an
    /// identifier, label names must not collide with the fixed row columns,
    /// and label values must fit `ascii` storage.
    pub fn from_series(series: &TimeSeries) -> Result<Self, Error> {
        let metric = metric_name(series)?;
        if !is_valid_identifier(metric) {
            return Err(Error::InvalidMetricName {
                name: metric.to_string(),
            });
        }

        let mut column_names = HashSet::new();
        for label in dimensions(series) {
            if !is_valid_identifier(&label.name) {
                return Err(Error::InvalidLabelName {
                    name: label.name.clone(),
                });
            }
            if RESERVED_COLUMNS.contains(&label.name.as_str()) {
                return Err(Error::ReservedLabelName {
                    name: label.name.clone(),
                });
            }
            if !label.value.is_ascii() {
                return Err(Error::NonAsciiLabelValue {
                    name: label.name.clone(),
                });
            }
            column_names.insert(label.name.clone());
        }

        Ok(Self {
            table_name: table_name(metric),
            column_names,
        })
    }

    /// Records `column` as known for this table. Idempotent.
    pub fn add_column(&mut self, column: impl Into<String>) {
        self.column_names.insert(column.into());
    }

    /// Whether this schema covers `other`: same table, and every column of
    /// `other` present here.
    pub fn satisfies(&self, other: &Self) -> bool {
        self.table_name == other.table_name
            && other
                .column_names
                .iter()
                .all(|c| self.column_names.contains(c))
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`: the intersection of Prometheus label names
/// and unquoted CQL identifiers.
pub fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn series(labels: &[(&str, &str)]) -> TimeSeries {
        TimeSeries {
            labels: labels
                .iter()
                .map(|(name, value)| Label {
                    name: name.to_string(),
                    value: value.to_string(),
                })
                .collect(),
            samples: vec![],
        }
    }

    #[test]
    fn test_table_name() {
        assert_eq!(table_name("up"), "up");
        assert_eq!(table_name("node_cpu"), "node_cpu");
        assert_eq!(table_name("node_cpu_seconds_total"), "node_cpu");
        assert_eq!(table_name("test_metric_1"), "test_metric");
    }

    #[test]
    fn test_metric_name() {
        let s = series(&[("__name__", "up"), ("job", "node")]);
        assert_eq!(metric_name(&s).unwrap(), "up");

        assert_matches!(metric_name(&series(&[])), Err(Error::NoLabels));
        assert_matches!(
            metric_name(&series(&[("job", "node")])),
            Err(Error::NoMetricName)
        );
    }

    #[test]
    fn test_selector_sorted_and_name_free() {
        let a = series(&[("__name__", "up"), ("job", "node"), ("az", "us-east")]);
        let b = series(&[("az", "us-east"), ("__name__", "up"), ("job", "node")]);

        assert_eq!(selector(&a), "az=us-east:job=node");
        assert_eq!(selector(&a), selector(&b));
    }

    #[test]
    fn test_selector_empty_dimensions() {
        assert_eq!(selector(&series(&[("__name__", "up")])), "");
    }

    #[test]
    fn test_from_series() {
        let schema =
            TableSchema::from_series(&series(&[("__name__", "test_metric_1"), ("foo", "bar")]))
                .unwrap();
        assert_eq!(schema.table_name, "test_metric");
        assert_eq!(
            schema.column_names,
            HashSet::from(["foo".to_string()])
        );
    }

    #[test]
    fn test_from_series_rejects_bad_input() {
        assert_matches!(
            TableSchema::from_series(&series(&[("__name__", "http:requests")])),
            Err(Error::InvalidMetricName { .. })
        );
        assert_matches!(
            TableSchema::from_series(&series(&[("__name__", "up"), ("0bad", "x")])),
            Err(Error::InvalidLabelName { .. })
        );
        assert_matches!(
            TableSchema::from_series(&series(&[("__name__", "up"), ("value", "x")])),
            Err(Error::ReservedLabelName { .. })
        );
        assert_matches!(
            TableSchema::from_series(&series(&[("__name__", "up"), ("job", "nöde")])),
            Err(Error::NonAsciiLabelValue { .. })
        );
    }

    #[test]
    fn test_satisfies_reflexive() {
        let schema =
            TableSchema::from_series(&series(&[("__name__", "up"), ("job", "node")])).unwrap();
        assert!(schema.satisfies(&schema));
    }

    #[test]
    fn test_satisfies_subset() {
        let mut wide = TableSchema::new("foo_bar");
        wide.add_column("baz");
        wide.add_column("bix");

        let mut narrow = TableSchema::new("foo_bar");
        narrow.add_column("baz");

        assert!(wide.satisfies(&narrow));
        assert!(!narrow.satisfies(&wide));
    }

    #[test]
    fn test_satisfies_transitive() {
        let mut a = TableSchema::new("t");
        a.add_column("c1");
        a.add_column("c2");
        a.add_column("c3");
        let mut b = TableSchema::new("t");
        b.add_column("c1");
        b.add_column("c2");
        let mut c = TableSchema::new("t");
        c.add_column("c1");

        assert!(a.satisfies(&b));
        assert!(b.satisfies(&c));
        assert!(a.satisfies(&c));
    }

    #[test]
    fn test_satisfies_table_mismatch() {
        let a = TableSchema::new("foo_bar");
        let b = TableSchema::new("foo_baz");
        assert!(!a.satisfies(&b));
    }
}
