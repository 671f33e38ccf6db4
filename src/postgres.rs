use crate::schema::subscriptions;
use crate::AggregateQuery;
use crate::Service;
use crate::ServiceError;
use crate::Subscription;
use chrono::NaiveDate;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2;
use diesel::r2d2::ConnectionManager;
use diesel::r2d2::PooledConnection;
use diesel_migrations::embed_migrations;
use diesel_migrations::EmbeddedMigrations;
use diesel_migrations::MigrationHarness;
use log::error;
use log::info;
use std::time::Duration;
use typed_builder::TypedBuilder;

#[cfg(test)]
mod postgres_tests;

pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;
pub type PoolConnection = PooledConnection<ConnectionManager<PgConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Connections kept open while idle, at most.
pub const MAX_IDLE_CONNECTIONS: u32 = 25;
pub const CONNECTION_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Queryable, Selectable, Debug, Eq, PartialEq, Clone)]
#[diesel(table_name = subscriptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SubscriptionRow {
    pub id: i32,
    pub service_name: String,
    pub price: i32,
    pub user_id: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl From<SubscriptionRow> for Subscription {
    fn from(row: SubscriptionRow) -> Self {
        Self {
            id: row.id,
            service_name: row.service_name,
            price: row.price,
            user_id: row.user_id,
            start_date: Some(row.start_date),
            end_date: row.end_date,
            total_sum: None,
        }
    }
}

/// Column values written by create and update. `end_date` is written even when empty.
#[derive(Insertable, AsChangeset, Debug, Eq, PartialEq, Clone)]
#[diesel(table_name = subscriptions)]
#[diesel(treat_none_as_null = true)]
pub struct SubscriptionChanges<'a> {
    pub service_name: &'a str,
    pub price: i32,
    pub user_id: &'a str,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl<'a> TryFrom<&'a Subscription> for SubscriptionChanges<'a> {
    type Error = ServiceError;

    fn try_from(record: &'a Subscription) -> Result<Self, Self::Error> {
        record.validate()?;

        let start_date = record
            .start_date
            .ok_or_else(|| ServiceError::InvalidRecord("start_date must be set".to_string()))?;

        Ok(Self {
            service_name: record.service_name.trim(),
            price: record.price,
            user_id: record.user_id.trim(),
            start_date,
            end_date: record.end_date,
        })
    }
}

/// [`Service`] backed by PostgreSQL.
///
///    ```rust
///         let pool = PgService::connection_pool(&config.database_url, config.db_pool_size)?;
///         let service = PgService::builder().connection_pool(pool).build();
///
///         service.run_migrations()?;
///    ```
#[derive(Clone, TypedBuilder)]
pub struct PgService {
    #[builder(setter(into))]
    pub connection_pool: PgPool,
}

impl Service for PgService {
    fn create(&self, record: &Subscription) -> Result<String, ServiceError> {
        let mut connection = self.get_connection()?;

        Self::create_query(&mut connection, record)
    }

    fn read_one(&self, id: i32) -> Result<Option<Subscription>, ServiceError> {
        let mut connection = self.get_connection()?;

        Self::read_one_query(&mut connection, id).map(Some)
    }

    fn read_many(&self, user_id: &str) -> Result<Vec<Subscription>, ServiceError> {
        let mut connection = self.get_connection()?;

        Self::read_many_query(&mut connection, user_id)
    }

    fn update(&self, record: &Subscription) -> Result<(), ServiceError> {
        let mut connection = self.get_connection()?;

        Self::update_query(&mut connection, record)
    }

    fn delete(&self, id: i32) -> Result<(), ServiceError> {
        let mut connection = self.get_connection()?;

        Self::delete_query(&mut connection, id)
    }

    fn aggregate(&self, query: &AggregateQuery) -> Result<Vec<Subscription>, ServiceError> {
        let mut connection = self.get_connection()?;

        Self::aggregate_query(&mut connection, query)
    }
}

impl PgService {
    /// Builds a connection pool and checks it can reach the database.
    pub fn connection_pool(database_url: &str, pool_size: u32) -> Result<PgPool, ServiceError> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);

        let pool = r2d2::Pool::builder()
            .max_size(pool_size)
            .min_idle(Some(pool_size.min(MAX_IDLE_CONNECTIONS)))
            .idle_timeout(Some(CONNECTION_IDLE_TIMEOUT))
            .build(manager)?;

        info!("connected to the database, pool size {}", pool_size);

        Ok(pool)
    }

    pub fn get_connection(&self) -> Result<PoolConnection, ServiceError> {
        self.connection_pool.get().map_err(|err| {
            error!("Failed to get a db connection {:?}", err);
            ServiceError::PoolError(err)
        })
    }

    /// Applies the embedded migrations that are not in the database yet.
    pub fn run_migrations(&self) -> Result<(), ServiceError> {
        let mut connection = self.get_connection()?;

        let applied = connection
            .run_pending_migrations(MIGRATIONS)
            .map_err(|error| ServiceError::MigrationError(error.to_string()))?;

        info!("migrations applied: {}", applied.len());

        Ok(())
    }

    pub fn create_query(
        connection: &mut PgConnection,
        record: &Subscription,
    ) -> Result<String, ServiceError> {
        let changes = SubscriptionChanges::try_from(record)?;

        let id = diesel::insert_into(subscriptions::table)
            .values(&changes)
            .returning(subscriptions::id)
            .get_result::<i32>(connection)?;

        Ok(id.to_string())
    }

    pub fn read_one_query(
        connection: &mut PgConnection,
        id: i32,
    ) -> Result<Subscription, ServiceError> {
        subscriptions::table
            .find(id)
            .select(SubscriptionRow::as_select())
            .first::<SubscriptionRow>(connection)
            .optional()?
            .map(Subscription::from)
            .ok_or(ServiceError::NotFound(id))
    }

    pub fn read_many_query(
        connection: &mut PgConnection,
        user_id: &str,
    ) -> Result<Vec<Subscription>, ServiceError> {
        let rows = subscriptions::table
            .filter(subscriptions::user_id.eq(user_id))
            .order(subscriptions::id.asc())
            .select(SubscriptionRow::as_select())
            .load::<SubscriptionRow>(connection)?;

        Ok(rows.into_iter().map(Subscription::from).collect())
    }

    pub fn update_query(
        connection: &mut PgConnection,
        record: &Subscription,
    ) -> Result<(), ServiceError> {
        let changes = SubscriptionChanges::try_from(record)?;

        let updated = diesel::update(subscriptions::table.find(record.id))
            .set(&changes)
            .execute(connection)?;

        if updated == 0 {
            return Err(ServiceError::NotFound(record.id));
        }

        Ok(())
    }

    pub fn delete_query(connection: &mut PgConnection, id: i32) -> Result<(), ServiceError> {
        let deleted = diesel::delete(subscriptions::table.find(id)).execute(connection)?;

        if deleted == 0 {
            return Err(ServiceError::NotFound(id));
        }

        Ok(())
    }

    pub fn aggregate_query(
        connection: &mut PgConnection,
        query: &AggregateQuery,
    ) -> Result<Vec<Subscription>, ServiceError> {
        let rows = subscriptions::table
            .filter(subscriptions::user_id.eq(query.user_id.as_str()))
            .filter(subscriptions::service_name.eq(query.service_name.as_str()))
            .filter(subscriptions::start_date.ge(query.period_start))
            .filter(subscriptions::end_date.le(query.period_end))
            .order(subscriptions::id.asc())
            .select(SubscriptionRow::as_select())
            .load::<SubscriptionRow>(connection)?;

        let total: i64 = rows.iter().map(|row| i64::from(row.price)).sum();

        let mut records: Vec<Subscription> = rows.into_iter().map(Subscription::from).collect();
        records.push(Subscription::total(total));

        Ok(records)
    }

    #[cfg(test)]
    pub fn test() -> Self {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let connection_pool = Self::connection_pool(&database_url, 5).unwrap();
        let service = Self::builder().connection_pool(connection_pool).build();

        service.run_migrations().unwrap();

        service
    }
}
