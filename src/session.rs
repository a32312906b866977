//! Control-side owner of the queue, the run flag and the event channel

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::{Config, OutputConfig};
use crate::converter::Converter;
use crate::error::ValidationError;
use crate::events::{event_channel, EventReceiver, EventSender};
use crate::queue::{AddOutcome, JobQueue};
use crate::runner::BatchRunner;
use crate::state::{RunFlag, RunState};

pub use crate::events::BatchOutcome;

/// One batch session: edit the queue while Idle, then `start` a run.
pub struct BatchSession {
    queue: JobQueue,
    run_flag: RunFlag,
    events: EventSender,
    output_config: OutputConfig,
}

impl BatchSession {
    /// Create a session and the receiver the presentation loop should poll
    pub fn new(config: &Config) -> (Self, EventReceiver) {
        let (events, receiver) = event_channel();
        let run_flag = RunFlag::new();
        let queue = JobQueue::new(config.queue.clone(), run_flag.clone(), events.clone());

        let session = Self {
            queue,
            run_flag,
            events,
            output_config: config.output.clone(),
        };
        (session, receiver)
    }

    pub fn state(&self) -> RunState {
        self.run_flag.state()
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn add_paths<I, P>(&mut self, paths: I) -> AddOutcome
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.queue.add_paths(paths)
    }

    pub fn remove(&mut self, path: &Path) -> bool {
        self.queue.remove(path)
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn set_output_directory(&mut self, path: impl Into<PathBuf>) {
        self.queue.set_output_directory(path);
    }

    /// Validate and launch a run on a background tokio task.
    ///
    /// The task flips the session back to Idle and then sends
    /// `BatchEvent::Finished`. Callers may drop the handle; completion is
    /// observable through the event channel. Must be called inside a tokio
    /// runtime.
    pub fn start(&mut self, converter: Arc<dyn Converter>) -> Result<JoinHandle<BatchOutcome>, ValidationError> {
        if self.run_flag.is_running() {
            return Err(ValidationError::AlreadyRunning);
        }

        let (snapshot, output_dir) = self.queue.validate_for_start()?;

        if !self.run_flag.try_begin() {
            return Err(ValidationError::AlreadyRunning);
        }

        info!("▶️ Starting batch: {} videos → {}", snapshot.len(), output_dir.display());

        let runner = BatchRunner::from_config(converter, self.events.clone(), &self.output_config);
        let events = self.events.clone();
        let guard = self.run_flag.guard();

        let handle = tokio::spawn(async move {
            let result = AssertUnwindSafe(runner.run(snapshot, &output_dir))
                .catch_unwind()
                .await;

            let outcome = match result {
                Ok(Ok(summary)) => BatchOutcome::Completed(summary),
                Ok(Err(e)) => BatchOutcome::Aborted { reason: e.to_string() },
                Err(_) => {
                    error!("Batch task panicked");
                    BatchOutcome::Aborted {
                        reason: "batch task panicked".to_string(),
                    }
                }
            };

            // Idle before Finished, so the consumer can edit the queue as soon as it sees it
            drop(guard);
            events.finished(outcome.clone());
            outcome
        });

        Ok(handle)
    }
}
