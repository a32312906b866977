//! Event channel between the batch task and the presentation loop
//!
//! Producers push [`BatchEvent`]s into an unbounded FIFO. The single consumer
//! drains everything that is currently queued on each tick and never blocks
//! waiting for more.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::debug;

use crate::runner::BatchSummary;

/// Severity of a log line shown to the user
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// One leveled status message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEvent {
    pub message: String,
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
}

impl LogEvent {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level,
            timestamp: Utc::now(),
        }
    }
}

/// Progress of the running batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Progress {
    /// 1-based index of the item being processed
    pub index: usize,
    pub total: usize,
    /// Percentage in [0, 100]
    pub percent: f64,
    /// File name of the item being processed, empty once the run is done
    pub current: String,
}

impl Progress {
    /// Progress for starting item `index` of `total`
    pub fn item(index: usize, total: usize, current: impl Into<String>) -> Self {
        let percent = if total == 0 {
            100.0
        } else {
            (index as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
        };
        Self {
            index,
            total,
            percent,
            current: current.into(),
        }
    }

    pub fn complete(total: usize) -> Self {
        Self {
            index: total,
            total,
            percent: 100.0,
            current: String::new(),
        }
    }
}

/// How a batch task ended
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BatchOutcome {
    /// Every item was attempted
    Completed(BatchSummary),

    /// The run stopped before processing items (e.g. output folder not creatable)
    Aborted { reason: String },
}

/// Item carried by the event channel
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Log(LogEvent),
    Progress(Progress),
    Finished(BatchOutcome),
}

/// Create a connected sender/receiver pair
pub fn event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        EventSender { tx },
        EventReceiver {
            rx,
            disconnected: false,
        },
    )
}

/// Producer handle; cheap to clone
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<BatchEvent>,
}

impl EventSender {
    pub fn send(&self, event: BatchEvent) {
        if self.tx.send(event).is_err() {
            debug!("Event receiver dropped, discarding event");
        }
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let event = LogEvent::new(level, message);
        debug!("[{}] {}", event.level, event.message);
        self.send(BatchEvent::Log(event));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    pub fn progress(&self, progress: Progress) {
        self.send(BatchEvent::Progress(progress));
    }

    pub fn finished(&self, outcome: BatchOutcome) {
        self.send(BatchEvent::Finished(outcome));
    }
}

/// Consumer handle, owned by the presentation loop
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<BatchEvent>,
    disconnected: bool,
}

impl EventReceiver {
    /// Take every event queued right now, in arrival order. Returns immediately
    /// when nothing is pending.
    pub fn drain(&mut self) -> Vec<BatchEvent> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    break;
                }
            }
        }
        events
    }

    /// True once every sender is gone and the queue has been emptied
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// Drain on a fixed tick, handing each event to `handler`, until a
    /// `Finished` event is seen. Returns `None` if all senders disappear first.
    pub async fn poll_until_finished<F>(&mut self, tick: Duration, mut handler: F) -> Option<BatchOutcome>
    where
        F: FnMut(&BatchEvent),
    {
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let mut outcome = None;
            for event in self.drain() {
                handler(&event);
                if let BatchEvent::Finished(finished) = event {
                    outcome = Some(finished);
                }
            }

            if outcome.is_some() {
                return outcome;
            }
            if self.disconnected {
                return None;
            }
        }
    }
}
