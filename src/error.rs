use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("admission timeout: no worker became free within {0:?}")]
    AdmissionTimeout(Duration),

    #[error("dispatcher is not accepting jobs")]
    Rejected,

    #[error("wait_result is not supported by this job")]
    WaitUnsupported,

    #[error("job result was already taken by an earlier waiter")]
    ResultConsumed,
}

pub type Result<T> = std::result::Result<T, PoolError>;
