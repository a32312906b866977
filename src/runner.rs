use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::ffi::OsString;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::config::OutputConfig;
use crate::converter::Converter;
use crate::error::{BatchError, ConversionError, Result};
use crate::events::{EventSender, Progress};
use crate::queue::display_name;

const SEPARATOR_WIDTH: usize = 50;

/// Outcome of one queued video
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ItemOutcome {
    Success,
    Failure { reason: String },
}

/// Result for a single video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemResult {
    /// 1-based position in the batch
    pub index: usize,
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub outcome: ItemOutcome,
    pub elapsed: Duration,
}

impl ItemResult {
    pub fn is_success(&self) -> bool {
        self.outcome == ItemOutcome::Success
    }
}

/// Overall batch results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub output_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub total_time: Duration,
    pub results: Vec<ItemResult>,
}

impl BatchSummary {
    pub fn success_rate(&self) -> f64 {
        if self.total > 0 {
            self.successful as f64 / self.total as f64 * 100.0
        } else {
            0.0
        }
    }
}

/// Sequential batch runner: one converter invocation at a time, in queue order.
///
/// A failing item is logged and counted; it never stops the remaining items.
pub struct BatchRunner {
    converter: Arc<dyn Converter>,
    events: EventSender,
    suffix: String,
    extension: String,
    results_file: Option<String>,
}

impl BatchRunner {
    pub fn new(converter: Arc<dyn Converter>, events: EventSender) -> Self {
        let defaults = OutputConfig::default();
        Self {
            converter,
            events,
            suffix: defaults.suffix,
            extension: defaults.extension,
            results_file: None,
        }
    }

    pub fn from_config(converter: Arc<dyn Converter>, events: EventSender, config: &OutputConfig) -> Self {
        Self::new(converter, events)
            .with_output_naming(config.suffix.as_str(), config.extension.as_str())
            .with_results_file(config.save_results.then(|| config.results_file.clone()))
    }

    pub fn with_output_naming(mut self, suffix: impl Into<String>, extension: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self.extension = extension.into();
        self
    }

    /// Write the summary as JSON into the output folder after each run
    pub fn with_results_file(mut self, file_name: Option<String>) -> Self {
        self.results_file = file_name;
        self
    }

    pub fn destination_for(&self, input: &Path, output_dir: &Path) -> std::result::Result<PathBuf, ConversionError> {
        destination_path(input, output_dir, &self.suffix, &self.extension)
    }

    /// Process every video of `snapshot` into `output_dir`.
    ///
    /// Only a failure to create `output_dir` aborts the run; per-item errors
    /// end up in the summary.
    pub async fn run(&self, snapshot: Vec<PathBuf>, output_dir: &Path) -> Result<BatchSummary> {
        let started_at = Utc::now();
        let start_time = Instant::now();
        let total = snapshot.len();

        info!("🚀 Starting batch of {} videos", total);
        info!("📂 Output: {}", output_dir.display());

        if let Err(source) = tokio::fs::create_dir_all(output_dir).await {
            error!("Cannot create output folder {}: {}", output_dir.display(), source);
            self.events.error(format!(
                "Cannot create output folder {}: {}",
                output_dir.display(),
                source
            ));
            return Err(BatchError::Environment {
                path: output_dir.to_path_buf(),
                source,
            });
        }

        let mut results = Vec::with_capacity(total);
        for (offset, input) in snapshot.into_iter().enumerate() {
            let index = offset + 1;
            let item_start = Instant::now();

            let processed = AssertUnwindSafe(self.process_item(index, total, &input, output_dir))
                .catch_unwind()
                .await;

            let result = match processed {
                Ok(result) => result,
                Err(panic) => {
                    let reason = format!("converter panicked: {}", panic_message(panic.as_ref()));
                    error!("Item {} panicked: {}", input.display(), reason);
                    self.events.error(format!("❌ ERROR: {} - {}", display_name(&input), reason));
                    ItemResult {
                        index,
                        input,
                        output: None,
                        outcome: ItemOutcome::Failure { reason },
                        elapsed: item_start.elapsed(),
                    }
                }
            };
            results.push(result);
        }

        let successful = results.iter().filter(|r| r.is_success()).count();
        let summary = BatchSummary {
            total,
            successful,
            failed: total - successful,
            output_dir: output_dir.to_path_buf(),
            started_at,
            total_time: start_time.elapsed(),
            results,
        };

        self.events.progress(Progress::complete(total));
        self.emit_summary(&summary);

        if let Some(file_name) = &self.results_file {
            let path = output_dir.join(file_name);
            match save_summary(&summary, &path).await {
                Ok(()) => info!("💾 Results saved to: {}", path.display()),
                Err(e) => {
                    warn!("Failed to save results to {}: {}", path.display(), e);
                    self.events.warning(format!("Could not save results file: {}", e));
                }
            }
        }

        info!(
            "🎉 Batch completed in {:.2}s: {}/{} successful",
            summary.total_time.as_secs_f64(),
            summary.successful,
            summary.total
        );

        Ok(summary)
    }

    async fn process_item(&self, index: usize, total: usize, input: &Path, output_dir: &Path) -> ItemResult {
        let start_time = Instant::now();
        let name = display_name(input);

        self.events.progress(Progress::item(index, total, name.clone()));
        self.events.info(format!("Processing ({}/{}): {}", index, total, name));

        let output = match self.destination_for(input, output_dir) {
            Ok(output) => output,
            Err(e) => {
                self.events.error(format!("❌ ERROR: {} - {}", name, e));
                return ItemResult {
                    index,
                    input: input.to_path_buf(),
                    output: None,
                    outcome: ItemOutcome::Failure { reason: e.to_string() },
                    elapsed: start_time.elapsed(),
                };
            }
        };

        let outcome = match self.converter.convert(input, &output).await {
            Ok(_stats) => {
                self.events
                    .info(format!("✅ SUCCESS: {} → {}", name, display_name(&output)));
                ItemOutcome::Success
            }
            Err(e @ (ConversionError::Failed { .. } | ConversionError::Terminated { .. })) => {
                self.events.error(format!("❌ FAILED: {} - {}", name, e.log_excerpt()));
                ItemOutcome::Failure { reason: e.to_string() }
            }
            Err(e) => {
                self.events.error(format!("❌ ERROR: {} - {}", name, e));
                ItemOutcome::Failure { reason: e.to_string() }
            }
        };

        ItemResult {
            index,
            input: input.to_path_buf(),
            output: Some(output),
            outcome,
            elapsed: start_time.elapsed(),
        }
    }

    fn emit_summary(&self, summary: &BatchSummary) {
        let separator = "=".repeat(SEPARATOR_WIDTH);
        self.events.info(format!("\n{}", separator));
        self.events.info("BATCH PROCESSING COMPLETE!");
        self.events
            .info(format!("Success: {}/{}", summary.successful, summary.total));
        self.events
            .info(format!("Output folder: {}", summary.output_dir.display()));
        self.events.info(format!("{}\n", separator));
    }
}

/// `<output_dir>/<input stem><suffix>.<extension>`
pub fn destination_path(
    input: &Path,
    output_dir: &Path,
    suffix: &str,
    extension: &str,
) -> std::result::Result<PathBuf, ConversionError> {
    let stem = input
        .file_stem()
        .ok_or_else(|| ConversionError::InvalidPath(format!("no file name in {}", input.display())))?;

    let mut file_name = OsString::from(stem);
    file_name.push(suffix);
    file_name.push(".");
    file_name.push(extension.trim_start_matches('.'));

    Ok(output_dir.join(file_name))
}

async fn save_summary(summary: &BatchSummary, path: &Path) -> Result<()> {
    let json_data = serde_json::to_string_pretty(summary)?;
    tokio::fs::write(path, json_data).await?;
    Ok(())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
