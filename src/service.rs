use crate::AggregateQuery;
use crate::ServiceError;
use crate::Subscription;

/// The domain operations the worker pool calls into.
///
/// Every worker thread shares one instance, so implementations must be safe to call
/// concurrently. The storage behind it (a connection pool, for instance) is up to the
/// implementation.
pub trait Service: Send + Sync {
    /// Store a new subscription. The `id` of `record` is ignored.
    /// Returns the identifier the store generated.
    fn create(&self, record: &Subscription) -> Result<String, ServiceError>;

    /// Fetch one subscription. `Ok(None)` means the store has no such record.
    fn read_one(&self, id: i32) -> Result<Option<Subscription>, ServiceError>;

    /// All subscriptions of a user, possibly none.
    fn read_many(&self, user_id: &str) -> Result<Vec<Subscription>, ServiceError>;

    /// Overwrite the subscription identified by `record.id`.
    fn update(&self, record: &Subscription) -> Result<(), ServiceError>;

    fn delete(&self, id: i32) -> Result<(), ServiceError>;

    /// Matching subscriptions followed by exactly one [`Subscription::total`] record
    /// holding the sum of their prices.
    fn aggregate(&self, query: &AggregateQuery) -> Result<Vec<Subscription>, ServiceError>;
}
