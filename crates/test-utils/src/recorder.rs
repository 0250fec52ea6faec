use std::sync::{Arc, Mutex};
use std::time::Duration;

use cbn_build::dag::{BoxFuture, Completion, TaskAction};
use cbn_build::errors::{BuildError, Result};
use cbn_build::exec::TaskContext;
use cbn_build::watch::{ChangeBatch, RebuildTarget};

/// A shared, ordered log of events for assertions.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn snapshot(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// A task action that:
/// - records `start:<name>` and `end:<name>`
/// - sleeps for `delay` in between
/// - fails with `reason` when one is set
#[derive(Clone)]
pub struct RecordingTask {
    name: String,
    log: EventLog,
    delay: Duration,
    fail: Option<String>,
}

impl RecordingTask {
    pub fn new(name: &str, log: &EventLog) -> Self {
        Self {
            name: name.to_string(),
            log: Arc::clone(log),
            delay: Duration::from_millis(5),
            fail: None,
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, reason: &str) -> Self {
        self.fail = Some(reason.to_string());
        self
    }
}

impl TaskAction for RecordingTask {
    fn run(&self, _ctx: TaskContext) -> BoxFuture<'static, Result<Completion>> {
        let this = self.clone();
        Box::pin(async move {
            this.log.lock().unwrap().push(format!("start:{}", this.name));
            tokio::time::sleep(this.delay).await;
            this.log.lock().unwrap().push(format!("end:{}", this.name));
            match this.fail {
                Some(reason) => Err(BuildError::Other(anyhow::anyhow!(reason))),
                None => Ok(Completion::Done),
            }
        })
    }
}

/// A rebuild target that records every batch it receives.
#[derive(Clone, Default)]
pub struct RecordingTarget {
    batches: Arc<Mutex<Vec<ChangeBatch>>>,
}

impl RecordingTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<ChangeBatch> {
        self.batches.lock().unwrap().clone()
    }
}

impl RebuildTarget for RecordingTarget {
    fn rebuild(&self, batch: ChangeBatch) -> BoxFuture<'static, Result<()>> {
        let batches = Arc::clone(&self.batches);
        Box::pin(async move {
            batches.lock().unwrap().push(batch);
            Ok(())
        })
    }
}
