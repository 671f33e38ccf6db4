use crate::dispatch::dispatcher::Dispatcher;
use crate::dispatch::job::Job;
use crate::dispatch::worker::Worker;
use crate::DispatchError;
use crate::Service;
use crossbeam_channel::Receiver;
use log::error;
use log::info;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use typed_builder::TypedBuilder;

pub const DEFAULT_NUMBER_OF_WORKERS: u32 = 6;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Join handles of the live worker threads. Finished ones are dropped on the next spawn.
pub(crate) type WorkerHandles = Arc<Mutex<Vec<JoinHandle<()>>>>;

/// A fixed set of worker threads sharing one bounded job queue.
///
/// ```rust
///     let dispatcher = WorkerPool::builder()
///         .number_of_workers(6_u32)
///         .call_timeout(Duration::from_secs(5))
///         .build()
///         .start(Arc::new(service))?;
/// ```
#[derive(Clone, Debug, TypedBuilder)]
pub struct WorkerPool {
    /// the number of worker threads, fixed for the lifetime of the pool
    #[builder(default = DEFAULT_NUMBER_OF_WORKERS, setter(into))]
    pub number_of_workers: u32,
    /// how many jobs may wait in the queue before submitting blocks
    #[builder(default = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,
    /// deadline for a whole submit call, enqueueing included. `None` waits forever
    #[builder(default, setter(strip_option))]
    pub call_timeout: Option<Duration>,
    /// prefix of the worker thread names
    #[builder(default = "worker_".to_string(), setter(into))]
    pub name: String,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::builder().build()
    }
}

struct WorkerThread<S>
where
    S: Service + 'static,
{
    name: String,
    restarts: u64,
    queue: Receiver<Job>,
    service: Arc<S>,
    handles: WorkerHandles,
}

/// Starts `number_of_workers` workers with the default queue settings.
pub fn start_pool<S>(number_of_workers: u32, service: Arc<S>) -> Result<Dispatcher, DispatchError>
where
    S: Service + 'static,
{
    WorkerPool::builder()
        .number_of_workers(number_of_workers)
        .build()
        .start(service)
}

impl WorkerPool {
    /// Spawns the workers and hands back the dispatcher feeding them.
    /// The queue lives as long as the dispatcher (or one of its clones) does.
    pub fn start<S>(self, service: Arc<S>) -> Result<Dispatcher, DispatchError>
    where
        S: Service + 'static,
    {
        if self.number_of_workers == 0 {
            return Err(DispatchError::InvalidPoolSize);
        }

        let (sender, queue) = crossbeam_channel::bounded(self.queue_capacity);
        let handles = WorkerHandles::default();

        for idx in 1..=self.number_of_workers {
            let worker_thread = WorkerThread {
                name: format!("{}{idx}", self.name),
                restarts: 0,
                queue: queue.clone(),
                service: service.clone(),
                handles: handles.clone(),
            };

            worker_thread.spawn()?;
        }

        info!(
            "started {} workers, queue capacity {}",
            self.number_of_workers, self.queue_capacity
        );

        Ok(Dispatcher::new(
            sender,
            handles,
            self.number_of_workers,
            self.call_timeout,
        ))
    }
}

impl<S> WorkerThread<S>
where
    S: Service + 'static,
{
    fn spawn(self) -> Result<(), DispatchError> {
        info!(
            "starting a worker thread {}, number of restarts {}",
            self.name, self.restarts
        );

        let handles = self.handles.clone();
        let builder = thread::Builder::new().name(self.name.clone());

        let handle = builder.spawn(move || {
            // when the thread unwinds, `worker_thread` is dropped and restarts it (see Drop impl)
            let worker_thread = self;

            let worker = Worker::builder()
                .name(worker_thread.name.clone())
                .queue(worker_thread.queue.clone())
                .service(worker_thread.service.clone())
                .build();

            worker.run_jobs();
        })?;

        let mut handles = handles.lock()?;

        // threads that died in a panic were replaced already
        handles.retain(|handle| !handle.is_finished());
        handles.push(handle);

        Ok(())
    }

    fn restarted(&self) -> Self {
        Self {
            name: self.name.clone(),
            restarts: self.restarts + 1,
            queue: self.queue.clone(),
            service: self.service.clone(),
            handles: self.handles.clone(),
        }
    }
}

impl<S> Drop for WorkerThread<S>
where
    S: Service + 'static,
{
    fn drop(&mut self) {
        if !thread::panicking() {
            return;
        }

        let worker_thread = self.restarted();

        error!(
            "Worker {} panicked. Restarting. The number of restarts {}",
            worker_thread.name, worker_thread.restarts,
        );

        if let Err(error) = worker_thread.spawn() {
            error!("Failed to restart worker {}: {:?}", self.name, error);
        }
    }
}
