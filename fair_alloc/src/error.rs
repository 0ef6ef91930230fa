//! Error types for allocation problems and experiment configuration

use thiserror::Error;

/// Input validation failures. Raised before any solver touches an allocation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AllocError {
    #[error("Valuation matrix has no persons")]
    NoPersons,

    #[error("Row {row} has {found} entries, expected {expected}")]
    RaggedRows {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Dimension mismatch for {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Item {item} is assigned to person {owner}, but there are only {persons} persons")]
    InvalidAllocation {
        item: usize,
        owner: usize,
        persons: usize,
    },

    #[error("Item {item} has 1-based owner {owner}, expected a value in [1, {persons}]")]
    InvalidBoundaryOwner {
        item: usize,
        owner: usize,
        persons: usize,
    },

    #[error("Valuation of person {person} for item {item} must be finite and nonnegative (got {value})")]
    InvalidValuation {
        person: usize,
        item: usize,
        value: f64,
    },

    #[error("Weight of person {person} for item {item} must be finite (got {value})")]
    InvalidWeight {
        person: usize,
        item: usize,
        value: f64,
    },

    #[error("Target for person {person} must be finite (got {value})")]
    InvalidTarget { person: usize, value: f64 },

    #[error("Invalid distribution parameters: {0}")]
    InvalidDistribution(String),
}

/// Failures of the experiment runner: reading config, instance files and writing results
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not parse {value:?} as a number in {path} (row {row})")]
    Parse {
        path: String,
        row: usize,
        value: String,
    },

    #[error(transparent)]
    Alloc(#[from] AllocError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
