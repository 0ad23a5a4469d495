use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::metrics::MetricRegistry;
use crate::settings::{AnalysisSettings, Statistic};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One computed cell, before table assembly. NaN means "not computed".
#[derive(Debug, Clone)]
pub struct MetricResult {
    pub recording_id: String,
    pub channel_label: String,
    pub metric_label: String,
    pub statistic: Statistic,
    pub value: f64,
}

/// A per-recording error annotation. `channel`/`metric` narrow the scope:
/// both None means the whole recording failed or degraded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunError {
    pub recording_id: String,
    pub channel: Option<String>,
    pub metric: Option<String>,
    pub message: String,
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.recording_id)?;
        if let Some(ch) = &self.channel {
            write!(f, " [{ch}]")?;
        }
        if let Some(m) = &self.metric {
            write!(f, " {m}")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// One table column: a metric crossed with a statistic.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnKey {
    pub metric_label: String,
    pub statistic: Statistic,
}

impl ColumnKey {
    pub fn name(&self) -> String {
        format!("{}_{}", self.metric_label, self.statistic.label())
    }
}

/// One table row: every column's value for one (recording, channel).
#[derive(Debug, Clone)]
pub struct Row {
    pub recording_id: String,
    pub channel_label: String,
    pub values: Vec<f64>,
}

/// The merged result table: rows keyed by (recording, channel) in
/// canonical order, columns fixed at run start as the union of every
/// enabled metric × statistic.
#[derive(Debug, Clone)]
pub struct ResultTable {
    columns: Vec<ColumnKey>,
    rows: Vec<Row>,
}

impl ResultTable {
    pub fn new(columns: Vec<ColumnKey>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Column set for a validated settings tree: enabled specs in settings
    /// order, each crossed with its requested statistics.
    pub fn columns_for(settings: &AnalysisSettings, registry: &MetricRegistry) -> Vec<ColumnKey> {
        let mut columns = Vec::new();
        for spec in settings.enabled_metrics() {
            let label = registry
                .get(&spec.family, &spec.name)
                .map(|d| d.label.clone())
                .unwrap_or_else(|| spec.name.clone());
            for stat in &spec.statistics {
                columns.push(ColumnKey {
                    metric_label: label.clone(),
                    statistic: *stat,
                });
            }
        }
        columns
    }

    pub fn columns(&self) -> &[ColumnKey] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name()).collect()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a fully-NaN row for a recording that failed before any
    /// metric could run.
    pub fn push_failed_row(&mut self, recording_id: &str, channel_label: &str) {
        self.rows.push(Row {
            recording_id: recording_id.to_string(),
            channel_label: channel_label.to_string(),
            values: vec![f64::NAN; self.columns.len()],
        });
    }

    /// Append one channel's row from a flat result list. Any column with
    /// no matching result stays NaN.
    pub fn push_from_results(
        &mut self,
        recording_id: &str,
        channel_label: &str,
        results: &[MetricResult],
    ) {
        let values = self
            .columns
            .iter()
            .map(|col| {
                results
                    .iter()
                    .find(|r| {
                        r.channel_label == channel_label
                            && r.metric_label == col.metric_label
                            && r.statistic == col.statistic
                    })
                    .map(|r| r.value)
                    .unwrap_or(f64::NAN)
            })
            .collect();
        self.rows.push(Row {
            recording_id: recording_id.to_string(),
            channel_label: channel_label.to_string(),
            values,
        });
    }

    /// Cell lookup by column name, for inspection and tests.
    pub fn get(&self, recording_id: &str, channel_label: &str, column: &str) -> Option<f64> {
        let col = self.columns.iter().position(|c| c.name() == column)?;
        self.rows
            .iter()
            .find(|r| r.recording_id == recording_id && r.channel_label == channel_label)
            .map(|r| r.values[col])
    }

    /// Bit-exact equality, treating NaN cells as equal when both are NaN.
    /// Derived float equality would make any NaN row unequal to itself.
    pub fn bitwise_eq(&self, other: &Self) -> bool {
        self.columns == other.columns
            && self.rows.len() == other.rows.len()
            && self.rows.iter().zip(&other.rows).all(|(a, b)| {
                a.recording_id == b.recording_id
                    && a.channel_label == b.channel_label
                    && a.values.len() == b.values.len()
                    && a.values
                        .iter()
                        .zip(&b.values)
                        .all(|(x, y)| x.to_bits() == y.to_bits())
            })
    }

    /// Write as CSV: `recording,channel,<column...>`, NaN cells written
    /// as the literal `NaN`.
    pub fn write_csv<W: std::io::Write>(&self, writer: W) -> Result<(), ExportError> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        let mut header = vec!["recording".to_string(), "channel".to_string()];
        header.extend(self.column_names());
        csv_writer.write_record(&header)?;

        for row in &self.rows {
            let mut record = vec![row.recording_id.clone(), row.channel_label.clone()];
            for value in &row.values {
                if value.is_nan() {
                    record.push("NaN".to_string());
                } else {
                    record.push(format!("{value:.4}"));
                }
            }
            csv_writer.write_record(&record)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn write_csv_file(&self, path: &Path) -> Result<(), ExportError> {
        let file = std::fs::File::create(path)?;
        self.write_csv(file)
    }

    /// JSON value with NaN cells as null (NaN is not representable in JSON).
    pub fn to_json_value(&self) -> serde_json::Value {
        let rows: Vec<serde_json::Value> = self
            .rows
            .iter()
            .map(|row| {
                let mut values = serde_json::Map::new();
                for (col, value) in self.columns.iter().zip(&row.values) {
                    let v = if value.is_nan() {
                        serde_json::Value::Null
                    } else {
                        serde_json::json!(*value)
                    };
                    values.insert(col.name(), v);
                }
                serde_json::json!({
                    "recording": row.recording_id,
                    "channel": row.channel_label,
                    "values": values,
                })
            })
            .collect();
        serde_json::Value::Array(rows)
    }
}
