/// Batch Watermark Remover - Rust Implementation
///
/// Queues MP4 videos, then runs an external watermark-removal script over each
/// one in turn while streaming progress and log events to the front end.

pub mod config;
pub mod console;
pub mod converter;
pub mod error;
pub mod events;
pub mod queue;
pub mod runner;
pub mod session;
pub mod state;

// Re-export main types for easy access
pub use crate::config::{Config, ConfigBuilder};
pub use crate::converter::{ConversionStats, Converter, ScriptConverter};
pub use crate::error::{BatchError, ConversionError, ValidationError};
pub use crate::events::{event_channel, BatchEvent, EventReceiver, EventSender, LogEvent, LogLevel, Progress};
pub use crate::queue::{AddOutcome, JobQueue};
pub use crate::runner::{destination_path, BatchRunner, BatchSummary, ItemOutcome, ItemResult};
pub use crate::session::{BatchOutcome, BatchSession};
pub use crate::state::{RunFlag, RunState};
