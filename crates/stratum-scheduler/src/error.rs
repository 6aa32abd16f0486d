use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("job scheduler unavailable: {0}")]
    Unavailable(String),

    #[error("job scheduler rejected request: {0}")]
    Rejected(String),
}
