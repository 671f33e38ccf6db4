use crate::Config;
use crate::Dispatcher;
use crate::Error;
use crate::PgService;
use log::info;
use std::sync::Arc;

/// Connects to the database, applies pending migrations and starts the worker pool.
pub fn bootstrap(config: &Config) -> Result<Dispatcher, Error> {
    let connection_pool = PgService::connection_pool(&config.database_url, config.db_pool_size)?;
    let service = PgService::builder().connection_pool(connection_pool).build();

    service.run_migrations()?;

    let dispatcher = config.worker_pool().start(Arc::new(service))?;

    info!(
        "subscriptions backend ready, {} workers",
        dispatcher.number_of_workers()
    );

    Ok(dispatcher)
}
