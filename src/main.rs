use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgAction, Command};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use batch_watermark_remover::console::ConsoleView;
use batch_watermark_remover::queue::expand_inputs;
use batch_watermark_remover::{BatchOutcome, BatchSession, Config, ScriptConverter};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("Batch Watermark Remover")
        .version("0.1.0")
        .author("TigreRoll")
        .about("Remove watermarks from a batch of MP4 videos with an external converter script")
        .arg(
            Arg::new("inputs")
                .value_name("VIDEO")
                .help("MP4 files or directories containing them")
                .num_args(1..)
                .required_unless_present("check"),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .help("Output folder for processed videos"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (TOML)"),
        )
        .arg(
            Arg::new("python")
                .long("python")
                .value_name("PATH")
                .help("Python interpreter running the converter script"),
        )
        .arg(
            Arg::new("script")
                .long("script")
                .value_name("PATH")
                .help("Converter script, relative to the working directory"),
        )
        .arg(
            Arg::new("work-dir")
                .long("work-dir")
                .value_name("DIR")
                .help("Working directory of the converter"),
        )
        .arg(
            Arg::new("save-results")
                .long("save-results")
                .help("Write batch_results.json into the output folder")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("check")
                .long("check")
                .help("Check that the converter can be launched, then exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let verbose = matches.get_flag("verbose");
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_log_filter(verbose))),
        )
        .with_writer(io::stderr)
        .init();

    // Load configuration
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::from_file(path)?,
        None => Config::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {}", e);
            Config::default()
        }),
    };

    if let Some(python) = matches.get_one::<String>("python") {
        config.converter.python = Some(PathBuf::from(python));
    }
    if let Some(script) = matches.get_one::<String>("script") {
        config.converter.script = PathBuf::from(script);
    }
    if let Some(work_dir) = matches.get_one::<String>("work-dir") {
        config.converter.work_dir = Some(PathBuf::from(work_dir));
    }
    if matches.get_flag("save-results") {
        config.output.save_results = true;
    }
    config.validate().context("Invalid configuration")?;

    if verbose {
        info!("{}", config.summary());
    }

    let converter = ScriptConverter::from_config(&config.converter);

    if matches.get_flag("check") {
        return match converter.check_available().await {
            Ok(description) => {
                println!("Converter ready: {}", description);
                Ok(())
            }
            Err(e) => Err(anyhow!("Converter not available: {}", e)),
        };
    }

    let (mut session, mut receiver) = BatchSession::new(&config);
    let mut view = ConsoleView::new(io::stdout(), config.ui.show_timestamps);

    let output_dir = matches
        .get_one::<String>("output-dir")
        .map(PathBuf::from)
        .or_else(|| config.output.base_dir.clone());
    if let Some(dir) = output_dir {
        session.set_output_directory(dir);
    }

    let inputs: Vec<PathBuf> = matches
        .get_many::<String>("inputs")
        .map(|values| values.map(PathBuf::from).collect())
        .unwrap_or_default();
    let inputs = expand_inputs(
        inputs,
        &config.queue.accepted_extension,
        config.queue.scan_directories,
    );
    session.add_paths(inputs);

    for event in receiver.drain() {
        view.render(&event)?;
    }

    // The task handle is not joined; completion arrives as a Finished event
    if let Err(e) = session.start(Arc::new(converter)) {
        view.render_validation_error(&e)?;
        std::process::exit(2);
    }

    let tick = Duration::from_millis(config.ui.poll_interval_ms);
    let outcome = receiver
        .poll_until_finished(tick, |event| {
            if let Err(e) = view.render(event) {
                warn!("Failed to write to console: {}", e);
            }
        })
        .await;

    match outcome {
        Some(BatchOutcome::Completed(summary)) => {
            info!(
                "📊 Success rate: {:.1}% in {:.2}s",
                summary.success_rate(),
                summary.total_time.as_secs_f64()
            );
            Ok(())
        }
        Some(BatchOutcome::Aborted { reason }) => Err(anyhow!("Batch aborted: {}", reason)),
        None => Err(anyhow!("Batch task ended without reporting completion")),
    }
}

/// Filter used when `RUST_LOG` is unset
fn default_log_filter(verbose: bool) -> &'static str {
    if verbose {
        "batch_watermark_remover=debug,info"
    } else {
        "batch_watermark_remover=info,warn"
    }
}
