use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the batch watermark remover
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// External converter invocation
    pub converter: ConverterConfig,

    /// Queue admission rules
    pub queue: QueueConfig,

    /// Output naming and result files
    pub output: OutputConfig,

    /// Presentation loop settings
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConverterConfig {
    /// Python interpreter; defaults to the virtual environment next to the program
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python: Option<PathBuf>,

    /// Watermark removal script, relative to the working directory
    pub script: PathBuf,

    /// Working directory for the converter; defaults to the program directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,

    /// Arguments appended after `<input> <output>`
    pub extra_args: Vec<String>,

    /// Number of stderr characters kept for the log
    pub stderr_excerpt_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    /// Accepted input extension, compared case-insensitively
    pub accepted_extension: String,

    /// Reject paths that do not exist when they are added
    pub require_existing: bool,

    /// Scan directories given on the command line for matching videos
    pub scan_directories: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output folder when none is given on the command line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,

    /// Appended to the input file stem
    pub suffix: String,

    /// Extension of the produced files
    pub extension: String,

    /// Write a JSON summary into the output folder after each run
    pub save_results: bool,

    /// File name of the JSON summary
    pub results_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UiConfig {
    /// Interval between event channel polls (milliseconds)
    pub poll_interval_ms: u64,

    /// Prefix log lines with a local timestamp
    pub show_timestamps: bool,
}

impl ConverterConfig {
    /// Directory the converter runs in
    pub fn resolved_work_dir(&self) -> PathBuf {
        if let Some(dir) = &self.work_dir {
            return dir.clone();
        }
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Interpreter used to run the script
    pub fn resolved_python(&self) -> PathBuf {
        match &self.python {
            Some(python) => python.clone(),
            None => self.resolved_work_dir().join(default_venv_python()),
        }
    }
}

/// Interpreter location inside a virtual environment
fn default_venv_python() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("venv").join("Scripts").join("python.exe")
    } else {
        PathBuf::from("venv").join("bin").join("python")
    }
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let config_paths = [
            "batch-watermark-remover.toml",
            "config/batch-watermark-remover.toml",
        ];

        for path in &config_paths {
            if Path::new(path).exists() {
                match Self::from_file(path) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from an explicit TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(python) = std::env::var("WATERMARK_REMOVER_PYTHON") {
            config.converter.python = Some(PathBuf::from(python));
        }

        if let Ok(script) = std::env::var("WATERMARK_REMOVER_SCRIPT") {
            config.converter.script = PathBuf::from(script);
        }

        if let Ok(work_dir) = std::env::var("WATERMARK_REMOVER_WORK_DIR") {
            config.converter.work_dir = Some(PathBuf::from(work_dir));
        }

        if let Ok(output_dir) = std::env::var("WATERMARK_REMOVER_OUTPUT_DIR") {
            config.output.base_dir = Some(PathBuf::from(output_dir));
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.converter.script.as_os_str().is_empty() {
            return Err(anyhow!("converter.script must not be empty"));
        }

        let extension = self.queue.accepted_extension.trim_start_matches('.');
        if extension.is_empty() {
            return Err(anyhow!("queue.accepted_extension must not be empty"));
        }

        if self.output.extension.trim_start_matches('.').is_empty() {
            return Err(anyhow!("output.extension must not be empty"));
        }

        // An empty suffix would overwrite inputs that already sit in the output folder
        if self.output.suffix.is_empty() {
            return Err(anyhow!("output.suffix must not be empty"));
        }

        if self.output.save_results && self.output.results_file.is_empty() {
            return Err(anyhow!("output.results_file required when save_results is enabled"));
        }

        if self.ui.poll_interval_ms == 0 {
            return Err(anyhow!("ui.poll_interval_ms must be greater than 0"));
        }

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Batch Watermark Remover Configuration:\n\
            - Python: {}\n\
            - Script: {}\n\
            - Working Directory: {}\n\
            - Extra Arguments: {}\n\
            - Accepted Extension: .{}\n\
            - Output Naming: <name>{}.{}\n\
            - Save Results: {}\n\
            - Poll Interval: {}ms",
            self.converter.resolved_python().display(),
            self.converter.script.display(),
            self.converter.resolved_work_dir().display(),
            self.converter.extra_args.join(" "),
            self.queue.accepted_extension.trim_start_matches('.'),
            self.output.suffix,
            self.output.extension.trim_start_matches('.'),
            self.output.save_results,
            self.ui.poll_interval_ms,
        )
    }
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            python: None,
            script: PathBuf::from("remwm.py"),
            work_dir: None,
            extra_args: vec!["--overwrite".to_string()],
            stderr_excerpt_chars: 100,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            accepted_extension: "mp4".to_string(),
            require_existing: true,
            scan_directories: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            suffix: "_no_watermark".to_string(),
            extension: "mp4".to_string(),
            save_results: false,
            results_file: "batch_results.json".to_string(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            show_timestamps: false,
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_python(mut self, python: PathBuf) -> Self {
        self.config.converter.python = Some(python);
        self
    }

    pub fn with_script(mut self, script: PathBuf) -> Self {
        self.config.converter.script = script;
        self
    }

    pub fn with_work_dir(mut self, dir: PathBuf) -> Self {
        self.config.converter.work_dir = Some(dir);
        self
    }

    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.config.converter.extra_args = args;
        self
    }

    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.config.output.base_dir = Some(dir);
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.output.suffix = suffix.into();
        self
    }

    pub fn save_results(mut self, enable: bool) -> Self {
        self.config.output.save_results = enable;
        self
    }

    pub fn require_existing(mut self, enable: bool) -> Self {
        self.config.queue.require_existing = enable;
        self
    }

    pub fn with_poll_interval_ms(mut self, millis: u64) -> Self {
        self.config.ui.poll_interval_ms = millis;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
