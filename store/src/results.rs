//! Reassembly of scanned rows into the per-series shape of the wire format.

use crate::interface::{ScanRow, ScanValue};
use data_types::{
    METRIC_NAME_COLUMN, METRIC_NAME_LABEL, SELECTOR_COLUMN, TIMESTAMP_COLUMN, VALUE_COLUMN,
};
use generated_types::prompb::{Label, Sample, TimeSeries};
use std::collections::HashMap;
use thiserror::Error;

/// A scanned row that does not fit the fixed layout.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A fixed column was absent or NULL.
    #[error("scan row is missing column {column}")]
    MissingColumn {
        /// Name of the absent column.
        column: &'static str,
    },

    /// A cell held a type the layout does not produce.
    #[error("scan row column {column} has an unexpected type")]
    WrongColumnType {
        /// Name of the offending column.
        column: String,
    },
}

/// Groups rows into one series per distinct dimension-label combination.
///
/// The group key is the sorted `name=value` rendering of a row's dimension
/// cells. The first row of a group seeds the series labels (`__name__`
/// first, then dimensions sorted by name); every row appends one sample in
/// arrival order.
#[derive(Debug, Default)]
pub(crate) struct ResultAccumulator {
    groups: HashMap<String, usize>,
    series: Vec<TimeSeries>,
}

impl ResultAccumulator {
    /// Folds one row in.
    pub(crate) fn push(&mut self, row: &ScanRow) -> Result<(), Error> {
        let metric = match row.get(METRIC_NAME_COLUMN) {
            Some(ScanValue::Ascii(s)) => s.clone(),
            Some(ScanValue::Null) | None => {
                return Err(Error::MissingColumn {
                    column: METRIC_NAME_COLUMN,
                })
            }
            Some(_) => {
                return Err(Error::WrongColumnType {
                    column: METRIC_NAME_COLUMN.to_string(),
                })
            }
        };
        let timestamp = match row.get(TIMESTAMP_COLUMN) {
            Some(ScanValue::BigInt(ts)) => *ts,
            Some(ScanValue::Null) | None => {
                return Err(Error::MissingColumn {
                    column: TIMESTAMP_COLUMN,
                })
            }
            Some(_) => {
                return Err(Error::WrongColumnType {
                    column: TIMESTAMP_COLUMN.to_string(),
                })
            }
        };
        let value = match row.get(VALUE_COLUMN) {
            Some(ScanValue::Double(v)) => *v,
            Some(ScanValue::Null) | None => {
                return Err(Error::MissingColumn {
                    column: VALUE_COLUMN,
                })
            }
            Some(_) => {
                return Err(Error::WrongColumnType {
                    column: VALUE_COLUMN.to_string(),
                })
            }
        };

        // Dimension cells: everything that is not part of the fixed layout.
        // NULL means the row predates that column; the series simply does
        // not carry the label.
        let mut dimensions = Vec::new();
        for (name, cell) in &row.columns {
            if name == METRIC_NAME_COLUMN
                || name == TIMESTAMP_COLUMN
                || name == SELECTOR_COLUMN
                || name == VALUE_COLUMN
            {
                continue;
            }
            match cell {
                ScanValue::Ascii(v) => dimensions.push((name.clone(), v.clone())),
                ScanValue::Null => {}
                _ => {
                    return Err(Error::WrongColumnType {
                        column: name.clone(),
                    })
                }
            }
        }
        dimensions.sort();

        let key = dimensions
            .iter()
            .map(|(n, v)| format!("{n}={v}"))
            .collect::<Vec<_>>()
            .join(":");

        let idx = match self.groups.get(&key) {
            Some(idx) => *idx,
            None => {
                let mut labels = vec![Label {
                    name: METRIC_NAME_LABEL.to_string(),
                    value: metric,
                }];
                labels.extend(dimensions.into_iter().map(|(name, value)| Label {
                    name,
                    value,
                }));
                self.series.push(TimeSeries {
                    labels,
                    samples: vec![],
                });
                let idx = self.series.len() - 1;
                self.groups.insert(key, idx);
                idx
            }
        };

        self.series[idx].samples.push(Sample { value, timestamp });
        Ok(())
    }

    /// The grouped series, in first-occurrence order.
    pub(crate) fn into_series(self) -> Vec<TimeSeries> {
        self.series
    }
}
