use crate::types::Day;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Configuration error: {field}: {reason}")]
    Configuration { field: String, reason: String },

    #[error("Data inconsistency at day {day}: {detail}")]
    DataInconsistency { day: Day, detail: String },

    #[error("Simulation already ran all {total_days} days")]
    HorizonReached { total_days: Day },

    #[error("All {failed} trials failed")]
    NoSuccessfulTrials { failed: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SimError {
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration { field: field.into(), reason: reason.into() }
    }

    pub fn inconsistency(day: Day, detail: impl Into<String>) -> Self {
        Self::DataInconsistency { day, detail: detail.into() }
    }
}

pub type SimResult<T> = Result<T, SimError>;
