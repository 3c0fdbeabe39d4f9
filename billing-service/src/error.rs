#[derive(thiserror::Error, Debug)]
pub enum BillingError {
    #[error("store call timed out after {elapsed_secs}s")]
    Timeout { elapsed_secs: u64 },
    #[error("invalid sample: {0}")]
    InvalidSample(String),
    #[error("invalid date key '{0}'")]
    InvalidDate(String),
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl BillingError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, BillingError>;
