//! Converter capability and the external-script implementation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::ConverterConfig;
use crate::error::ConversionError;

/// Statistics for one successful conversion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversionStats {
    pub elapsed: Duration,
    pub exit_code: Option<i32>,
}

/// Removes the watermark from one input, writing the result to `output`
#[async_trait]
pub trait Converter: Send + Sync {
    async fn convert(&self, input: &Path, output: &Path) -> Result<ConversionStats, ConversionError>;
}

/// Runs `<python> <script> <input> <output> [extra args]` in a fixed working directory.
///
/// No timeout is applied: a converter that never exits blocks the batch.
#[derive(Debug, Clone)]
pub struct ScriptConverter {
    python: PathBuf,
    script: PathBuf,
    work_dir: PathBuf,
    extra_args: Vec<String>,
    excerpt_chars: usize,
}

impl ScriptConverter {
    pub fn new(python: PathBuf, script: PathBuf, work_dir: PathBuf) -> Self {
        let defaults = ConverterConfig::default();
        Self {
            python,
            script,
            work_dir,
            extra_args: defaults.extra_args,
            excerpt_chars: defaults.stderr_excerpt_chars,
        }
    }

    pub fn from_config(config: &ConverterConfig) -> Self {
        Self::new(config.resolved_python(), config.script.clone(), config.resolved_work_dir())
            .with_extra_args(config.extra_args.clone())
            .with_excerpt_chars(config.stderr_excerpt_chars)
    }

    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn with_excerpt_chars(mut self, chars: usize) -> Self {
        self.excerpt_chars = chars;
        self
    }

    pub fn python(&self) -> &Path {
        &self.python
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Verify the interpreter starts and the script is present
    pub async fn check_available(&self) -> Result<String, ConversionError> {
        let output = Command::new(&self.python)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ConversionError::Spawn(format!("{}: {}", self.python.display(), e)))?;

        if !output.status.success() {
            return Err(ConversionError::Failed {
                code: output.status.code().unwrap_or(-1),
                stderr: excerpt(&String::from_utf8_lossy(&output.stderr), self.excerpt_chars),
            });
        }

        let script_path = self.work_dir.join(&self.script);
        if !script_path.is_file() {
            return Err(ConversionError::InvalidPath(format!(
                "converter script not found: {}",
                script_path.display()
            )));
        }

        // Older interpreters print the version on stderr
        let mut version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if version.is_empty() {
            version = String::from_utf8_lossy(&output.stderr).trim().to_string();
        }

        Ok(format!("{} ({}) with {}", self.python.display(), version, script_path.display()))
    }
}

#[async_trait]
impl Converter for ScriptConverter {
    async fn convert(&self, input: &Path, output: &Path) -> Result<ConversionStats, ConversionError> {
        let start_time = Instant::now();

        let mut cmd = Command::new(&self.python);
        cmd.arg(&self.script)
            .arg(input)
            .arg(output)
            .args(&self.extra_args)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!("Executing command: {:?}", cmd);

        let result = cmd
            .output()
            .await
            .map_err(|e| ConversionError::Spawn(format!("{}: {}", self.python.display(), e)))?;

        let elapsed = start_time.elapsed();
        let stdout = String::from_utf8_lossy(&result.stdout);
        if !stdout.trim().is_empty() {
            debug!("Converter stdout: {}", stdout.trim());
        }

        match result.status.code() {
            Some(0) => {
                info!("✅ Converter finished {} in {:.1}s", input.display(), elapsed.as_secs_f64());
                Ok(ConversionStats {
                    elapsed,
                    exit_code: Some(0),
                })
            }
            Some(code) => {
                let stderr = excerpt(&String::from_utf8_lossy(&result.stderr), self.excerpt_chars);
                warn!("❌ Converter exited with {} for {}", code, input.display());
                Err(ConversionError::Failed { code, stderr })
            }
            None => {
                let stderr = excerpt(&String::from_utf8_lossy(&result.stderr), self.excerpt_chars);
                warn!("❌ Converter terminated by signal for {}", input.display());
                Err(ConversionError::Terminated { stderr })
            }
        }
    }
}

/// First `max_chars` characters of `text`, trimmed
pub fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect::<String>().trim().to_string()
}
