//! Error types for the PIC engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PicError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("particle storage capacity ({0}) exceeded on injection")]
    CapacityExceeded(usize),

    #[error("Poisson solver diverged: numerical breakdown on {attempts} consecutive attempts")]
    SolverDivergence { attempts: u32 },

    #[error("flight loop exceeded {0} sub-steps without draining the particle store")]
    FlightStalled(usize),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, PicError>;
