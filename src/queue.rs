use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::QueueConfig;
use crate::error::ValidationError;
use crate::events::EventSender;
use crate::state::RunFlag;

/// Result of an `add_paths` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddOutcome {
    pub added: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

/// Ordered, duplicate-free list of input videos plus the output folder.
///
/// Every mutating call is a no-op while the shared [`RunFlag`] reports a
/// running batch.
#[derive(Debug)]
pub struct JobQueue {
    entries: Vec<PathBuf>,
    output_dir: Option<PathBuf>,
    config: QueueConfig,
    run_flag: RunFlag,
    events: EventSender,
}

impl JobQueue {
    pub fn new(config: QueueConfig, run_flag: RunFlag, events: EventSender) -> Self {
        Self {
            entries: Vec::new(),
            output_dir: None,
            config,
            run_flag,
            events,
        }
    }

    /// Append every acceptable path in order, skipping duplicates and files
    /// that are not videos of the accepted type.
    pub fn add_paths<I, P>(&mut self, paths: I) -> AddOutcome
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut outcome = AddOutcome::default();

        if self.run_flag.is_running() {
            debug!("Ignoring add while a batch is running");
            return outcome;
        }

        for path in paths {
            let path = path.into();
            let name = display_name(&path);

            if !self.is_accepted_extension(&path) {
                self.events.warning(format!("Skipped (not MP4): {}", name));
                outcome.skipped.push(path);
                continue;
            }

            if self.config.require_existing && !path.is_file() {
                self.events.warning(format!("Skipped (not found): {}", name));
                outcome.skipped.push(path);
                continue;
            }

            if self.entries.contains(&path) {
                debug!("Already queued: {}", path.display());
                outcome.skipped.push(path);
                continue;
            }

            self.events.info(format!("Added: {}", name));
            self.entries.push(path.clone());
            outcome.added.push(path);
        }

        outcome
    }

    /// Remove a single entry. Returns true if it was queued.
    pub fn remove(&mut self, path: &Path) -> bool {
        if self.run_flag.is_running() {
            debug!("Ignoring remove while a batch is running");
            return false;
        }

        match self.entries.iter().position(|entry| entry == path) {
            Some(index) => {
                let removed = self.entries.remove(index);
                self.events.info(format!("Removed: {}", display_name(&removed)));
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        if self.run_flag.is_running() {
            debug!("Ignoring clear while a batch is running");
            return;
        }

        self.entries.clear();
        self.events.info("Video list cleared");
    }

    /// Store the output folder. Existence is not checked; the runner creates it.
    pub fn set_output_directory(&mut self, path: impl Into<PathBuf>) {
        if self.run_flag.is_running() {
            debug!("Ignoring output folder change while a batch is running");
            return;
        }

        let path = path.into();
        self.events.info(format!("Output folder set: {}", path.display()));
        self.output_dir = Some(path);
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn output_directory(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    pub fn snapshot(&self) -> Vec<PathBuf> {
        self.entries.clone()
    }

    /// Check the preconditions of a run and hand out what it needs
    pub fn validate_for_start(&self) -> Result<(Vec<PathBuf>, PathBuf), ValidationError> {
        if self.entries.is_empty() {
            return Err(ValidationError::EmptyQueue);
        }

        match &self.output_dir {
            Some(dir) if !dir.as_os_str().is_empty() => Ok((self.snapshot(), dir.clone())),
            _ => Err(ValidationError::MissingOutputDirectory),
        }
    }

    fn is_accepted_extension(&self, path: &Path) -> bool {
        let wanted = self.config.accepted_extension.trim_start_matches('.');
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(wanted))
            .unwrap_or(false)
    }
}

/// Expand directories into the matching videos they contain (recursively,
/// sorted by path). Other paths are passed through untouched so the queue can
/// report them.
pub fn expand_inputs<I, P>(paths: I, extension: &str, scan_directories: bool) -> Vec<PathBuf>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    let wanted = extension.trim_start_matches('.');
    let mut expanded = Vec::new();

    for path in paths {
        let path = path.into();
        if !(scan_directories && path.is_dir()) {
            expanded.push(path);
            continue;
        }

        let mut found: Vec<PathBuf> = WalkDir::new(&path)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Cannot read {}: {}", path.display(), e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|p| {
                p.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext.eq_ignore_ascii_case(wanted))
                    .unwrap_or(false)
            })
            .collect();
        found.sort();

        debug!("📁 Found {} videos in {}", found.len(), path.display());
        expanded.extend(found);
    }

    expanded
}

/// File name for log lines, falling back to the full path
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
