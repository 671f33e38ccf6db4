use crate::dispatch::job::Job;
use crate::dispatch::job::JobPayload;
use crate::dispatch::job::JobResult;
use crate::dispatch::job::Reply;
use crate::Service;
use crossbeam_channel::Receiver;
use log::debug;
use log::error;
use std::sync::Arc;
use typed_builder::TypedBuilder;
use uuid::Uuid;

/// Pulls jobs off the shared queue and runs them against the service, one at a time.
#[derive(TypedBuilder)]
pub struct Worker<S>
where
    S: Service + 'static,
{
    #[builder(setter(into))]
    pub name: String,
    pub queue: Receiver<Job>,
    pub service: Arc<S>,
}

impl<S> Worker<S>
where
    S: Service + 'static,
{
    /// Runs until the queue is closed and every job left in it has been processed.
    pub fn run_jobs(&self) {
        for job in self.queue.iter() {
            self.run(job);
        }

        debug!("worker {} stopped, the queue is closed", self.name);
    }

    /// Processes a single job. Service errors end up in the reply, they never stop the worker.
    pub fn run(&self, job: Job) {
        let id = job.id;
        let kind = job.kind();

        debug!("worker {} received {} job {}", self.name, kind, id);

        match job.payload {
            JobPayload::Create { record, reply } => {
                self.reply(id, reply, self.service.create(&record));
            }
            JobPayload::Update { record, reply } => {
                self.reply(id, reply, self.service.update(&record));
            }
            JobPayload::Delete { id: record_id, reply } => {
                self.reply(id, reply, self.service.delete(record_id));
            }
            JobPayload::ReadOne { id: record_id, reply } => {
                self.reply(id, reply, self.service.read_one(record_id));
            }
            JobPayload::ReadMany { user_id, reply } => {
                self.reply(id, reply, self.service.read_many(&user_id));
            }
            JobPayload::Aggregate { query, reply } => {
                self.reply(id, reply, self.service.aggregate(&query));
            }
        }

        debug!("worker {} finished {} job {}", self.name, kind, id);
    }

    fn reply<T>(&self, job_id: Uuid, reply: Reply<T>, result: JobResult<T>) {
        if let Err(error) = &result {
            error!("worker {}: job {} failed: {}", self.name, job_id, error);
        }

        // the caller stopped waiting (deadline passed), the result has nobody to go to
        if reply.send(result).is_err() {
            debug!(
                "worker {}: reply for job {} dropped, the caller is gone",
                self.name, job_id
            );
        }
    }
}
