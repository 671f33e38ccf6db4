use crate::dispatch::job::reply_channel;
use crate::dispatch::job::Job;
use crate::dispatch::job::JobKind;
use crate::dispatch::job::JobPayload;
use crate::dispatch::job::JobResult;
use crate::dispatch::job::Reply;
use crate::dispatch::worker_pool::WorkerHandles;
use crate::AggregateQuery;
use crate::DispatchError;
use crate::Subscription;
use chrono::NaiveDate;
use crossbeam_channel::Receiver;
use crossbeam_channel::RecvTimeoutError;
use crossbeam_channel::SendTimeoutError;
use crossbeam_channel::Sender;
use log::error;
use log::info;
use std::sync::Arc;
use std::sync::RwLock;
use std::time::Duration;
use std::time::Instant;

/// Typed entry point of the worker pool.
///
/// Every `submit_*` call turns into one job on the shared queue and blocks until a
/// worker answers it. Clones share the same queue; once the last clone is dropped the
/// queue closes and the workers exit after draining it.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    queue: RwLock<Option<Sender<Job>>>,
    workers: WorkerHandles,
    number_of_workers: u32,
    call_timeout: Option<Duration>,
}

impl Dispatcher {
    pub(crate) fn new(
        queue: Sender<Job>,
        workers: WorkerHandles,
        number_of_workers: u32,
        call_timeout: Option<Duration>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue: RwLock::new(Some(queue)),
                workers,
                number_of_workers,
                call_timeout,
            }),
        }
    }

    /// Stores a new subscription and returns the identifier the service generated.
    pub fn submit_create(&self, record: Subscription) -> Result<String, DispatchError> {
        self.submit(|reply| JobPayload::Create { record, reply })
    }

    /// Fetches one subscription. A service that answers without a record and without an
    /// error gets [`DispatchError::InvalidResult`].
    pub fn submit_read_one(&self, id: i32) -> Result<Subscription, DispatchError> {
        self.submit(|reply| JobPayload::ReadOne { id, reply })?
            .ok_or_else(|| DispatchError::InvalidResult(format!("no subscription for id {id}")))
    }

    pub fn submit_read_many(
        &self,
        user_id: impl Into<String>,
    ) -> Result<Vec<Subscription>, DispatchError> {
        let user_id = user_id.into();

        self.submit(|reply| JobPayload::ReadMany { user_id, reply })
    }

    pub fn submit_update(&self, record: Subscription) -> Result<(), DispatchError> {
        self.submit(|reply| JobPayload::Update { record, reply })
    }

    pub fn submit_delete(&self, id: i32) -> Result<(), DispatchError> {
        self.submit(|reply| JobPayload::Delete { id, reply })
    }

    /// Subscriptions of `user_id` to `service_name` inside the period, followed by one
    /// [`Subscription::total`] record with the summed price.
    pub fn submit_aggregate(
        &self,
        service_name: impl Into<String>,
        user_id: impl Into<String>,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<Vec<Subscription>, DispatchError> {
        let query = AggregateQuery::builder()
            .service_name(service_name)
            .user_id(user_id)
            .period_start(period_start)
            .period_end(period_end)
            .build();

        let records = self.submit(|reply| JobPayload::Aggregate { query, reply })?;

        let totals = records.iter().filter(|record| record.is_total()).count();
        let ends_with_total = records.last().map_or(false, Subscription::is_total);

        if totals != 1 || !ends_with_total {
            return Err(DispatchError::InvalidResult(format!(
                "aggregate must end with exactly one total record, found {totals}"
            )));
        }

        Ok(records)
    }

    /// Stops accepting jobs. Jobs already queued are still processed.
    pub fn close(&self) -> Result<(), DispatchError> {
        if self.inner.queue.write()?.take().is_some() {
            info!("worker pool closed, draining queued jobs");
        }

        Ok(())
    }

    /// Closes the queue and waits for every worker thread to finish.
    ///
    /// Must not be called from a worker thread.
    pub fn shutdown(&self) -> Result<(), DispatchError> {
        self.close()?;

        loop {
            let next = self.inner.workers.lock()?.pop();

            let Some(handle) = next else {
                break;
            };

            let name = handle.thread().name().map(str::to_string);

            if handle.join().is_err() {
                error!("worker {:?} exited with a panic", name);
            }
        }

        info!("worker pool shut down");

        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.inner
            .queue
            .read()
            .map(|queue| queue.is_none())
            .unwrap_or(true)
    }

    pub fn number_of_workers(&self) -> u32 {
        self.inner.number_of_workers
    }

    #[cfg(test)]
    pub(crate) fn tracked_workers(&self) -> usize {
        self.inner.workers.lock().unwrap().len()
    }

    fn submit<T>(
        &self,
        payload: impl FnOnce(Reply<T>) -> JobPayload,
    ) -> Result<T, DispatchError> {
        let deadline = self.inner.call_timeout.map(|timeout| Instant::now() + timeout);

        let (reply, result) = reply_channel();
        let job = Job::new(payload(reply));
        let kind = job.kind();

        self.enqueue(job, deadline)?;

        let job_result = self.wait_for_reply(kind, result, deadline)?;

        Ok(job_result?)
    }

    fn enqueue(&self, job: Job, deadline: Option<Instant>) -> Result<(), DispatchError> {
        // clone the sender so a full queue doesn't block `close` behind the read lock
        let queue = self
            .inner
            .queue
            .read()?
            .clone()
            .ok_or(DispatchError::PoolClosed)?;

        let kind = job.kind();

        match deadline {
            None => queue.send(job).map_err(|_| DispatchError::PoolClosed),
            Some(deadline) => queue.send_deadline(job, deadline).map_err(|error| match error {
                SendTimeoutError::Timeout(_) => self.timeout(kind),
                SendTimeoutError::Disconnected(_) => DispatchError::PoolClosed,
            }),
        }
    }

    fn wait_for_reply<T>(
        &self,
        kind: JobKind,
        result: Receiver<JobResult<T>>,
        deadline: Option<Instant>,
    ) -> Result<JobResult<T>, DispatchError> {
        match deadline {
            None => result.recv().map_err(|_| DispatchError::NoReply(kind)),
            Some(deadline) => result.recv_deadline(deadline).map_err(|error| match error {
                RecvTimeoutError::Timeout => self.timeout(kind),
                RecvTimeoutError::Disconnected => DispatchError::NoReply(kind),
            }),
        }
    }

    fn timeout(&self, kind: JobKind) -> DispatchError {
        DispatchError::Timeout {
            kind,
            timeout: self.inner.call_timeout.unwrap_or_default(),
        }
    }
}
