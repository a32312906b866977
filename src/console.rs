//! Terminal presentation of batch events

use chrono::Local;
use std::io::{self, Write};

use crate::error::ValidationError;
use crate::events::{BatchEvent, BatchOutcome, LogEvent, Progress};

const BAR_WIDTH: usize = 30;

/// Renders log lines, the progress label and the completion notice
pub struct ConsoleView<W: Write> {
    out: W,
    show_timestamps: bool,
}

impl<W: Write> ConsoleView<W> {
    pub fn new(out: W, show_timestamps: bool) -> Self {
        Self { out, show_timestamps }
    }

    pub fn render(&mut self, event: &BatchEvent) -> io::Result<()> {
        match event {
            BatchEvent::Log(log) => writeln!(self.out, "{}", format_log_line(log, self.show_timestamps)),
            BatchEvent::Progress(progress) => writeln!(self.out, "{}", format_progress(progress)),
            BatchEvent::Finished(outcome) => self.render_completion(outcome),
        }?;
        self.out.flush()
    }

    pub fn render_completion(&mut self, outcome: &BatchOutcome) -> io::Result<()> {
        match outcome {
            BatchOutcome::Completed(summary) => writeln!(
                self.out,
                "\nProcessing finished!\n\nSuccess: {}/{}\nOutput: {}",
                summary.successful,
                summary.total,
                summary.output_dir.display()
            ),
            BatchOutcome::Aborted { reason } => writeln!(self.out, "\nProcessing aborted: {}", reason),
        }
    }

    pub fn render_validation_error(&mut self, err: &ValidationError) -> io::Result<()> {
        writeln!(self.out, "error: {}", err)?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// `[LEVEL] message`, optionally prefixed with the local time
pub fn format_log_line(event: &LogEvent, show_timestamp: bool) -> String {
    if show_timestamp {
        format!(
            "{} [{}] {}",
            event.timestamp.with_timezone(&Local).format("%H:%M:%S"),
            event.level,
            event.message
        )
    } else {
        format!("[{}] {}", event.level, event.message)
    }
}

pub fn format_progress(progress: &Progress) -> String {
    let bar = progress_bar(progress.percent, BAR_WIDTH);
    if progress.current.is_empty() {
        format!("{} {:>3.0}% DONE! ({}/{})", bar, progress.percent, progress.index, progress.total)
    } else {
        format!(
            "{} {:>3.0}% Processing: {} ({}/{})",
            bar, progress.percent, progress.current, progress.index, progress.total
        )
    }
}

/// Fixed-width text bar for a percentage in [0, 100]
pub fn progress_bar(percent: f64, width: usize) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}
