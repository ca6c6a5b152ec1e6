//! Empirical tuning table for the preemptive policy
//!
//! Each row gives, for an absolute deadline cushion `1 + c`, the pessimism
//! and preemption factors found to be most competitive. The table is
//! external data: it is loaded from tab-separated text and shared read-only
//! between runs.
//!
//! ```text
//! absolute_cushion  competitiveness  preemption_factor  pessimism_factor
//! ```

use serde::{Deserialize, Serialize};

use super::preemptive::PreemptionParameters;
use crate::orchestrator::ConfigError;

/// One row of the table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuningEntry {
    pub absolute_cushion: f64,
    pub competitiveness: f64,
    pub preemption_factor: f64,
    pub pessimism_factor: f64,
}

impl TuningEntry {
    pub fn parameters(&self) -> PreemptionParameters {
        PreemptionParameters::new(self.pessimism_factor, self.preemption_factor)
    }
}

/// Non-empty table sorted by absolute cushion
///
/// # Example
/// ```
/// use admission_simulator_core_rs::policy::TuningTable;
///
/// let table = TuningTable::from_tsv("1.5\t0.4\t2.0\t0.1\n2.0\t0.5\t1.5\t0.3\n").unwrap();
/// // cushion 0.6 -> absolute 1.6, nearest row is 1.5
/// assert_eq!(table.lookup(0.6).preemption_factor, 2.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TuningTable {
    entries: Vec<TuningEntry>,
}

impl TuningTable {
    pub fn from_entries(mut entries: Vec<TuningEntry>) -> Result<Self, ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::InvalidTuningTable("table is empty".to_string()));
        }
        if let Some(bad) = entries.iter().find(|e| !e.absolute_cushion.is_finite()) {
            return Err(ConfigError::InvalidTuningTable(format!(
                "non-finite cushion {}",
                bad.absolute_cushion
            )));
        }
        entries.sort_by(|a, b| a.absolute_cushion.total_cmp(&b.absolute_cushion));
        Ok(Self { entries })
    }

    /// Parse tab-separated rows; blank lines and `#` comments are skipped
    pub fn from_tsv(text: &str) -> Result<Self, ConfigError> {
        let mut entries = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields = line
                .split('\t')
                .map(|field| field.trim().parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| {
                    ConfigError::InvalidTuningTable(format!("line {}: {}", line_no + 1, e))
                })?;
            let [absolute_cushion, competitiveness, preemption_factor, pessimism_factor] =
                fields[..]
            else {
                return Err(ConfigError::InvalidTuningTable(format!(
                    "line {}: expected 4 columns, found {}",
                    line_no + 1,
                    fields.len()
                )));
            };
            entries.push(TuningEntry {
                absolute_cushion,
                competitiveness,
                preemption_factor,
                pessimism_factor,
            });
        }
        Self::from_entries(entries)
    }

    pub fn entries(&self) -> &[TuningEntry] {
        &self.entries
    }

    /// Row whose absolute cushion is nearest to `1 + cushion`
    ///
    /// Ties go to the smaller absolute cushion.
    pub fn lookup(&self, cushion: f64) -> &TuningEntry {
        let target = 1.0 + cushion;
        let upper = self
            .entries
            .partition_point(|e| e.absolute_cushion < target);
        if upper == 0 {
            return &self.entries[0];
        }
        let below = &self.entries[upper - 1];
        match self.entries.get(upper) {
            Some(above)
                if (above.absolute_cushion - target).abs()
                    < (below.absolute_cushion - target).abs() =>
            {
                above
            }
            _ => below,
        }
    }
}
