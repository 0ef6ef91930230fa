//! Result export
//!
//! Each solve becomes a [`RunRecord`]: metadata for reproducibility, a small
//! summary, the objective trace and the final allocation. Records are written
//! as CSV (trace, allocation) and JSON (summary) for analysis elsewhere.
//! [`MethodSummary`] aggregates the records of one method across runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::config::Method;
use crate::error::ConfigError;
use crate::solver::{SolveOutcome, SolverParams};

/// Everything recorded about one solve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub metadata: RunMetadata,
    pub summary: RunSummary,
    pub trace: Vec<f64>,
    /// Final owners, 1-based
    pub allocation: Vec<usize>,
}

/// Metadata for reproducibility
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub method: Method,
    pub seed: u64,
    pub persons: usize,
    pub items: usize,
    pub params: SolverParams,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub status: String,
    pub status_code: u8,
    pub iterations: usize,
    pub objective: f64,
    /// Inequality without per-person targets, `mincov_target` only
    pub untargeted_objective: Option<f64>,
    pub trace_min: Option<f64>,
    pub trace_max: Option<f64>,
    pub bundle_sizes: Vec<usize>,
}

impl RunRecord {
    pub fn from_outcome(
        method: Method,
        seed: u64,
        params: SolverParams,
        outcome: &SolveOutcome,
    ) -> Self {
        let allocation = &outcome.allocation;
        RunRecord {
            metadata: RunMetadata {
                method,
                seed,
                persons: allocation.persons(),
                items: allocation.items(),
                params,
                timestamp: chrono::Utc::now().to_rfc3339(),
            },
            summary: RunSummary {
                status: outcome.status.to_string(),
                status_code: outcome.status.code(),
                iterations: outcome.iterations,
                objective: outcome.objective,
                untargeted_objective: outcome.untargeted.as_ref().map(|u| u.objective),
                trace_min: outcome.trace.min(),
                trace_max: outcome.trace.max(),
                bundle_sizes: allocation.bundle_sizes(),
            },
            trace: outcome.trace.values().to_vec(),
            allocation: allocation.to_one_based(),
        }
    }

    /// Write the trace as `iteration,objective`
    pub fn write_trace_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(["iteration", "objective"])?;
        for (iteration, value) in self.trace.iter().enumerate() {
            wtr.write_record(&[iteration.to_string(), value.to_string()])?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Write the final allocation as `item,owner`, both 1-based
    pub fn write_allocation_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(["item", "owner"])?;
        for (item, owner) in self.allocation.iter().enumerate() {
            wtr.write_record(&[(item + 1).to_string(), owner.to_string()])?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Metadata and summary, without the bulky trace and allocation
    pub fn write_summary_json<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        #[derive(Serialize)]
        struct Summary<'a> {
            metadata: &'a RunMetadata,
            summary: &'a RunSummary,
        }
        let json = serde_json::to_string_pretty(&Summary {
            metadata: &self.metadata,
            summary: &self.summary,
        })?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Write all outputs to a directory
    ///
    /// Creates:
    /// - trace.csv
    /// - allocation.csv
    /// - summary.json
    pub fn write_all<P: AsRef<Path>>(&self, dir: P) -> Result<(), ConfigError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        self.write_trace_csv(dir.join("trace.csv"))?;
        self.write_allocation_csv(dir.join("allocation.csv"))?;
        self.write_summary_json(dir.join("summary.json"))?;

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanStd {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl MeanStd {
    /// Population statistics; all zero for an empty slice
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return MeanStd {
                mean: 0.0,
                std: 0.0,
                min: 0.0,
                max: 0.0,
            };
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        MeanStd {
            mean,
            std: variance.sqrt(),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// One method's results across all runs of an experiment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodSummary {
    pub method: Method,
    pub num_runs: usize,
    pub objective: MeanStd,
    pub untargeted_objective: Option<MeanStd>,
    pub iterations: MeanStd,
    /// Run count per status name
    pub status_counts: BTreeMap<String, usize>,
}

impl MethodSummary {
    pub fn from_records(method: Method, records: &[RunRecord]) -> Self {
        let objectives: Vec<f64> = records.iter().map(|r| r.summary.objective).collect();
        let iterations: Vec<f64> = records
            .iter()
            .map(|r| r.summary.iterations as f64)
            .collect();
        let untargeted: Vec<f64> = records
            .iter()
            .filter_map(|r| r.summary.untargeted_objective)
            .collect();

        let mut status_counts = BTreeMap::new();
        for record in records {
            *status_counts
                .entry(record.summary.status.clone())
                .or_insert(0) += 1;
        }

        MethodSummary {
            method,
            num_runs: records.len(),
            objective: MeanStd::from_values(&objectives),
            untargeted_objective: (!untargeted.is_empty())
                .then(|| MeanStd::from_values(&untargeted)),
            iterations: MeanStd::from_values(&iterations),
            status_counts,
        }
    }
}

/// Write the per-method aggregates of an experiment as pretty JSON
pub fn write_experiment_summary<P: AsRef<Path>>(
    path: P,
    summaries: &[MethodSummary],
) -> Result<(), ConfigError> {
    let json = serde_json::to_string_pretty(summaries)?;
    fs::write(path, json)?;
    Ok(())
}
