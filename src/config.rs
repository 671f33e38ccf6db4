use crate::dispatch::DEFAULT_NUMBER_OF_WORKERS;
use crate::dispatch::DEFAULT_QUEUE_CAPACITY;
use crate::ConfigError;
use crate::WorkerPool;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use typed_builder::TypedBuilder;

pub const DATABASE_URL_VAR: &str = "POSTGRES_DB_URL";
pub const FALLBACK_DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const WORKER_COUNT_VAR: &str = "WORKER_COUNT";
pub const QUEUE_CAPACITY_VAR: &str = "QUEUE_CAPACITY";
pub const CALL_TIMEOUT_VAR: &str = "CALL_TIMEOUT_MS";
pub const DB_POOL_SIZE_VAR: &str = "DB_POOL_SIZE";

pub const DEFAULT_DB_POOL_SIZE: u32 = 50;

/// Settings of the whole backend: where the store lives and how the worker pool is sized.
#[derive(Clone, Debug, Eq, PartialEq, TypedBuilder)]
pub struct Config {
    #[builder(setter(into))]
    pub database_url: String,
    /// upper bound of open database connections
    #[builder(default = DEFAULT_DB_POOL_SIZE)]
    pub db_pool_size: u32,
    #[builder(default = DEFAULT_NUMBER_OF_WORKERS)]
    pub number_of_workers: u32,
    #[builder(default = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,
    #[builder(default, setter(strip_option))]
    pub call_timeout: Option<Duration>,
}

impl Config {
    /// Reads the configuration from the environment, loading `.env` first if there is one.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup(DATABASE_URL_VAR)
            .or_else(|| lookup(FALLBACK_DATABASE_URL_VAR))
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::MissingVar(DATABASE_URL_VAR))?;

        let db_pool_size = parse_var(&lookup, DB_POOL_SIZE_VAR)?.unwrap_or(DEFAULT_DB_POOL_SIZE);
        let number_of_workers =
            parse_var(&lookup, WORKER_COUNT_VAR)?.unwrap_or(DEFAULT_NUMBER_OF_WORKERS);
        let queue_capacity =
            parse_var(&lookup, QUEUE_CAPACITY_VAR)?.unwrap_or(DEFAULT_QUEUE_CAPACITY);
        let call_timeout = parse_var::<u64, _>(&lookup, CALL_TIMEOUT_VAR)?.map(Duration::from_millis);

        if number_of_workers == 0 {
            return Err(ConfigError::InvalidVar {
                name: WORKER_COUNT_VAR,
                value: number_of_workers.to_string(),
            });
        }

        if db_pool_size == 0 {
            return Err(ConfigError::InvalidVar {
                name: DB_POOL_SIZE_VAR,
                value: db_pool_size.to_string(),
            });
        }

        if queue_capacity == 0 {
            return Err(ConfigError::InvalidVar {
                name: QUEUE_CAPACITY_VAR,
                value: queue_capacity.to_string(),
            });
        }

        // a zero deadline would expire every call before a worker could answer it
        if call_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(ConfigError::InvalidVar {
                name: CALL_TIMEOUT_VAR,
                value: "0".to_string(),
            });
        }

        Ok(Self {
            database_url,
            db_pool_size,
            number_of_workers,
            queue_capacity,
            call_timeout,
        })
    }

    /// The worker pool described by this configuration.
    pub fn worker_pool(&self) -> WorkerPool {
        WorkerPool {
            number_of_workers: self.number_of_workers,
            queue_capacity: self.queue_capacity,
            call_timeout: self.call_timeout,
            ..WorkerPool::default()
        }
    }
}

fn parse_var<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidVar { name, value }),
    }
}
