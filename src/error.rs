use thiserror::Error;

#[derive(Error, Debug)]
pub enum CleanError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Job {job} learner failure: {reason}")]
    ExternalProcess { job: usize, reason: String },

    #[error("Integrity error: {0}")]
    Integrity(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, CleanError>;
