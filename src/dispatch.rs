pub mod dispatcher;
pub mod job;
pub mod worker;
pub mod worker_pool;

pub use dispatcher::Dispatcher;
pub use job::{Job, JobKind, JobPayload, JobResult};
pub use worker::Worker;
pub use worker_pool::*;
