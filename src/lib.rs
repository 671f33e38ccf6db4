//! Subscription records behind a bounded worker pool.
//!
//! Every domain operation is turned into a [`Job`], pushed onto a queue shared by a
//! fixed set of worker threads and answered through a private reply channel. Callers
//! only see the typed [`Dispatcher`] methods; storage sits behind the [`Service`] trait.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod models;
pub mod service;

#[cfg(feature = "postgres")]
pub mod app;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "postgres")]
pub mod schema;

#[cfg(test)]
mod test_utils;

pub use config::Config;
pub use dispatch::*;
pub use error::{ConfigError, DispatchError, Error, ServiceError};
pub use models::{AggregateQuery, Subscription};
pub use service::Service;

#[cfg(feature = "postgres")]
pub use app::bootstrap;
#[cfg(feature = "postgres")]
pub use postgres::PgService;
