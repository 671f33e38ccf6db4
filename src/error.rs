use crate::dispatch::JobKind;
use std::io::Error as IoError;
use std::sync::PoisonError;
use std::time::Duration;
use thiserror::Error;

#[cfg(feature = "postgres")]
use diesel::r2d2::PoolError;
#[cfg(feature = "postgres")]
use diesel::result::Error as DieselError;

/// Errors reported by a [`Service`](crate::Service) implementation.
///
/// They travel through the worker pool untouched and reach the caller wrapped in
/// [`DispatchError::Service`].
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("subscription {0} not found")]
    NotFound(i32),
    #[error("invalid subscription: {0}")]
    InvalidRecord(String),
    #[error("storage backend failure: {0}")]
    Backend(String),
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    DieselError(#[from] DieselError),
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PoolError(#[from] PoolError),
    #[cfg(feature = "postgres")]
    #[error("failed to apply migrations: {0}")]
    MigrationError(String),
}

/// Errors produced by the dispatch layer itself.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The service answered with an error; passed through verbatim.
    #[error(transparent)]
    Service(#[from] ServiceError),
    /// The service answered, but not with the shape the operation promises.
    #[error("invalid result: {0}")]
    InvalidResult(String),
    /// The worker holding the job went away without replying.
    #[error("no reply received for {0} job")]
    NoReply(JobKind),
    #[error("{kind} job did not complete within {timeout:?}")]
    Timeout { kind: JobKind, timeout: Duration },
    #[error("the worker pool is closed and does not accept jobs")]
    PoolClosed,
    #[error("the number of workers must be positive")]
    InvalidPoolSize,
    #[error("The shared state of the worker pool became poisoned")]
    PoisonedLock,
    #[error("Failed to create worker thread")]
    WorkerThreadCreationFailed {
        #[from]
        source: IoError,
    },
}

impl<T> From<PoisonError<T>> for DispatchError {
    fn from(_: PoisonError<T>) -> Self {
        Self::PoisonedLock
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("environment variable {0} must be set")]
    MissingVar(&'static str),
    #[error("environment variable {name} has an invalid value {value:?}")]
    InvalidVar { name: &'static str, value: String },
}

/// Top level error returned while bringing the backend up.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}
