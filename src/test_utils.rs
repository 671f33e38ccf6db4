//! An in-memory [`Service`] for exercising the worker pool without a database.

use crate::AggregateQuery;
use crate::Service;
use crate::ServiceError;
use crate::Subscription;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::atomic::AtomicI32;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

/// Routes `log` output of the crate to the test harness, once per test binary.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Default)]
pub struct MemoryService {
    records: Mutex<BTreeMap<i32, Subscription>>,
    next_id: AtomicI32,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
    delay: Duration,
    failing: bool,
    absent_reads: bool,
    skip_total: bool,
    panic_for_user: Option<String>,
}

/// Tracks how many calls are inside the service at once.
struct ActiveCall<'a> {
    active: &'a AtomicUsize,
}

impl Drop for ActiveCall<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every call fails with a backend error.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// `read_one` answers `Ok(None)` instead of a record or an error.
    pub fn with_absent_reads(mut self) -> Self {
        self.absent_reads = true;
        self
    }

    /// `aggregate` forgets to append the total record.
    pub fn without_total(mut self) -> Self {
        self.skip_total = true;
        self
    }

    /// `read_many` panics when asked for this user.
    pub fn panicking_for(mut self, user_id: &str) -> Self {
        self.panic_for_user = Some(user_id.to_string());
        self
    }

    pub fn record(user_id: &str, service_name: &str, price: i32) -> Subscription {
        Subscription::builder()
            .service_name(service_name)
            .price(price)
            .user_id(user_id)
            .start_date(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
            .end_date(NaiveDate::from_ymd_opt(2025, 12, 1).unwrap())
            .build()
    }

    pub fn insert(&self, record: Subscription) -> i32 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;

        self.records
            .lock()
            .unwrap()
            .insert(id, Subscription { id, ..record });

        id
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<ActiveCall<'_>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);

        let call = ActiveCall {
            active: &self.active,
        };

        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }

        if self.failing {
            return Err(ServiceError::Backend("store unavailable".to_string()));
        }

        Ok(call)
    }
}

impl Service for MemoryService {
    fn create(&self, record: &Subscription) -> Result<String, ServiceError> {
        let _call = self.enter()?;

        record.validate()?;

        Ok(self.insert(record.clone()).to_string())
    }

    fn read_one(&self, id: i32) -> Result<Option<Subscription>, ServiceError> {
        let _call = self.enter()?;

        if self.absent_reads {
            return Ok(None);
        }

        match self.records.lock().unwrap().get(&id) {
            Some(record) => Ok(Some(record.clone())),
            None => Err(ServiceError::NotFound(id)),
        }
    }

    fn read_many(&self, user_id: &str) -> Result<Vec<Subscription>, ServiceError> {
        let _call = self.enter()?;

        if self.panic_for_user.as_deref() == Some(user_id) {
            panic!("read_many blew up for {user_id}");
        }

        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect())
    }

    fn update(&self, record: &Subscription) -> Result<(), ServiceError> {
        let _call = self.enter()?;

        match self.records.lock().unwrap().get_mut(&record.id) {
            Some(stored) => {
                *stored = record.clone();
                Ok(())
            }
            None => Err(ServiceError::NotFound(record.id)),
        }
    }

    fn delete(&self, id: i32) -> Result<(), ServiceError> {
        let _call = self.enter()?;

        match self.records.lock().unwrap().remove(&id) {
            Some(_) => Ok(()),
            None => Err(ServiceError::NotFound(id)),
        }
    }

    fn aggregate(&self, query: &AggregateQuery) -> Result<Vec<Subscription>, ServiceError> {
        let _call = self.enter()?;

        let mut records: Vec<Subscription> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|record| {
                record.user_id == query.user_id
                    && record.service_name == query.service_name
                    && record.start_date.map_or(false, |start| start >= query.period_start)
                    && record.end_date.map_or(false, |end| end <= query.period_end)
            })
            .cloned()
            .collect();

        if !self.skip_total {
            let sum = records.iter().map(|record| i64::from(record.price)).sum();
            records.push(Subscription::total(sum));
        }

        Ok(records)
    }
}
