use thiserror::Error;

/// Rejected simulation input. The engine itself never fails; everything it
/// cannot sensibly model is turned away here first.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("timeHorizon must be between {min} and {max}, got {value}")]
    TimeHorizonOutOfRange { value: u32, min: u32, max: u32 },

    #[error("at least one scenario is required")]
    NoScenarios,

    #[error("at most {max} scenarios are supported, got {count}")]
    TooManyScenarios { count: usize, max: usize },

    #[error("scenario {scenario}: at most {max} funds are supported, got {count}")]
    TooManyFunds {
        scenario: String,
        count: usize,
        max: usize,
    },

    #[error("duplicate scenario id {0}")]
    DuplicateScenarioId(String),

    #[error("scenario {scenario}: duplicate fund id {fund}")]
    DuplicateFundId { scenario: String, fund: String },

    #[error("{field} must be a finite number >= 0, got {value}")]
    InvalidAmount { field: String, value: f64 },

    #[error("{field} must be between {min} and {max}, got {value}")]
    ReturnOutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{field} must be between 0 and 100, got {value}")]
    PercentOutOfRange { field: String, value: f64 },

    #[error("{field}: year {year} is outside 1..={horizon}")]
    YearOutOfRange {
        field: String,
        year: u32,
        horizon: u32,
    },
}

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid payload JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
