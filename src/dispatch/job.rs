use crate::AggregateQuery;
use crate::ServiceError;
use crate::Subscription;
use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use std::fmt;
use uuid::Uuid;

/// The outcome of one job, as produced by the service.
pub type JobResult<T> = Result<T, ServiceError>;

/// The single-use reply slot of a job. Created with capacity one, written once by the
/// worker that processes the job and read once by the caller that submitted it.
pub type Reply<T> = Sender<JobResult<T>>;

/// All operations the pool knows how to run.
#[derive(Debug, Eq, PartialEq, Clone, Copy, Hash)]
pub enum JobKind {
    Create,
    Update,
    Delete,
    ReadOne,
    ReadMany,
    Aggregate,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Create => "create",
            JobKind::Update => "update",
            JobKind::Delete => "delete",
            JobKind::ReadOne => "read_one",
            JobKind::ReadMany => "read_many",
            JobKind::Aggregate => "aggregate",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request data of a job together with a reply slot typed for what that kind produces.
#[derive(Debug)]
pub enum JobPayload {
    Create {
        record: Subscription,
        reply: Reply<String>,
    },
    Update {
        record: Subscription,
        reply: Reply<()>,
    },
    Delete {
        id: i32,
        reply: Reply<()>,
    },
    ReadOne {
        id: i32,
        reply: Reply<Option<Subscription>>,
    },
    ReadMany {
        user_id: String,
        reply: Reply<Vec<Subscription>>,
    },
    Aggregate {
        query: AggregateQuery,
        reply: Reply<Vec<Subscription>>,
    },
}

impl JobPayload {
    pub fn kind(&self) -> JobKind {
        match self {
            JobPayload::Create { .. } => JobKind::Create,
            JobPayload::Update { .. } => JobKind::Update,
            JobPayload::Delete { .. } => JobKind::Delete,
            JobPayload::ReadOne { .. } => JobKind::ReadOne,
            JobPayload::ReadMany { .. } => JobKind::ReadMany,
            JobPayload::Aggregate { .. } => JobKind::Aggregate,
        }
    }
}

/// One unit of dispatched work.
#[derive(Debug)]
pub struct Job {
    /// Only used to correlate log lines.
    pub id: Uuid,
    pub payload: JobPayload,
}

impl Job {
    pub fn new(payload: JobPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
        }
    }

    pub fn kind(&self) -> JobKind {
        self.payload.kind()
    }
}

/// A fresh capacity-one reply channel.
pub fn reply_channel<T>() -> (Reply<T>, Receiver<JobResult<T>>) {
    crossbeam_channel::bounded(1)
}
