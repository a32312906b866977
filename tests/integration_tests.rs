use async_trait::async_trait;
use batch_watermark_remover::{
    BatchEvent, BatchOutcome, BatchSession, Config, ConfigBuilder, ConversionError, ConversionStats, Converter,
    LogLevel, RunState, ValidationError,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::fs;

/// Records every call; fails inputs listed in `failing`
struct FakeConverter {
    failing: HashSet<String>,
    calls: Mutex<Vec<PathBuf>>,
}

impl FakeConverter {
    fn new(failing: &[&str]) -> Self {
        Self {
            failing: failing.iter().map(|s| s.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Converter for FakeConverter {
    async fn convert(&self, input: &Path, output: &Path) -> Result<ConversionStats, ConversionError> {
        self.calls.lock().unwrap().push(input.to_path_buf());
        let name = input.file_name().unwrap().to_string_lossy().to_string();
        if self.failing.contains(&name) {
            return Err(ConversionError::Failed {
                code: 1,
                stderr: format!("cannot process {}", name),
            });
        }
        fs::write(output, b"clean video").await.unwrap();
        Ok(ConversionStats {
            elapsed: Duration::from_millis(1),
            exit_code: Some(0),
        })
    }
}

async fn create_videos(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for name in names {
        let path = dir.join(name);
        fs::write(&path, b"mock video content").await.unwrap();
        paths.push(path);
    }
    paths
}

fn fast_config() -> Config {
    ConfigBuilder::new().with_poll_interval_ms(10).build()
}

async fn run_to_completion(
    session: &mut BatchSession,
    receiver: &mut batch_watermark_remover::EventReceiver,
    converter: Arc<dyn Converter>,
) -> (BatchOutcome, Vec<BatchEvent>) {
    session.start(converter).unwrap();
    let mut events = Vec::new();
    let outcome = receiver
        .poll_until_finished(Duration::from_millis(10), |event| events.push(event.clone()))
        .await
        .expect("batch finished");
    (outcome, events)
}

#[tokio::test]
async fn test_partial_failure_batch_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let inputs = create_videos(temp_dir.path(), &["one.mp4", "two.mp4", "three.mp4"]).await;
    let output_dir = temp_dir.path().join("out");

    let (mut session, mut receiver) = BatchSession::new(&fast_config());
    session.add_paths(inputs.clone());
    session.set_output_directory(&output_dir);
    receiver.drain();

    let converter = Arc::new(FakeConverter::new(&["two.mp4"]));
    let (outcome, events) = run_to_completion(&mut session, &mut receiver, converter.clone()).await;

    let summary = match outcome {
        BatchOutcome::Completed(summary) => summary,
        other => panic!("unexpected outcome: {:?}", other),
    };
    assert_eq!(summary.successful, 2);
    assert_eq!(summary.total, 3);
    assert_eq!(converter.calls(), inputs);

    assert!(output_dir.join("one_no_watermark.mp4").exists());
    assert!(!output_dir.join("two_no_watermark.mp4").exists());
    assert!(output_dir.join("three_no_watermark.mp4").exists());

    let last_progress = events
        .iter()
        .filter_map(|e| match e {
            BatchEvent::Progress(p) => Some(p.percent),
            _ => None,
        })
        .last();
    assert_eq!(last_progress, Some(100.0));

    let error_lines: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            BatchEvent::Log(log) if log.level == LogLevel::Error => Some(log.message.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(error_lines, vec!["❌ FAILED: two.mp4 - cannot process two.mp4"]);

    assert_eq!(session.state(), RunState::Idle);
}

#[tokio::test]
async fn test_success_count_matches_successful_subset() {
    let temp_dir = TempDir::new().unwrap();
    let names = ["a.mp4", "b.mp4", "c.mp4", "d.mp4", "e.mp4"];
    let inputs = create_videos(temp_dir.path(), &names).await;

    let (mut session, mut receiver) = BatchSession::new(&fast_config());
    session.add_paths(inputs);
    session.set_output_directory(temp_dir.path().join("out"));

    let converter = Arc::new(FakeConverter::new(&["a.mp4", "c.mp4", "e.mp4"]));
    let (outcome, _) = run_to_completion(&mut session, &mut receiver, converter.clone()).await;

    match outcome {
        BatchOutcome::Completed(summary) => {
            assert_eq!(summary.successful, 2);
            assert_eq!(summary.failed, 3);
            assert_eq!(summary.total, 5);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(converter.calls().len(), 5);
}

#[tokio::test]
async fn test_validation_errors_invoke_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let converter = Arc::new(FakeConverter::new(&[]));

    let (mut session, _receiver) = BatchSession::new(&fast_config());
    session.set_output_directory(temp_dir.path().join("out"));
    assert_eq!(session.start(converter.clone()).err(), Some(ValidationError::EmptyQueue));

    let (mut session, _receiver) = BatchSession::new(&fast_config());
    session.add_paths(create_videos(temp_dir.path(), &["a.mp4"]).await);
    assert_eq!(
        session.start(converter.clone()).err(),
        Some(ValidationError::MissingOutputDirectory)
    );

    assert!(converter.calls().is_empty());
    assert!(!temp_dir.path().join("out").exists());
}

#[tokio::test]
async fn test_queue_events_arrive_in_order() {
    let temp_dir = TempDir::new().unwrap();
    let inputs = create_videos(temp_dir.path(), &["a.mp4", "b.mp4"]).await;
    let notes = temp_dir.path().join("notes.txt");
    fs::write(&notes, b"text").await.unwrap();

    let (mut session, mut receiver) = BatchSession::new(&fast_config());
    session.add_paths([inputs[0].clone(), notes, inputs[1].clone(), inputs[0].clone()]);
    session.clear();

    let lines: Vec<(LogLevel, String)> = receiver
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            BatchEvent::Log(log) => Some((log.level, log.message)),
            _ => None,
        })
        .collect();

    assert_eq!(
        lines,
        vec![
            (LogLevel::Info, "Added: a.mp4".to_string()),
            (LogLevel::Warning, "Skipped (not MP4): notes.txt".to_string()),
            (LogLevel::Info, "Added: b.mp4".to_string()),
            (LogLevel::Info, "Video list cleared".to_string()),
        ]
    );
    assert!(session.queue().is_empty());
}

#[tokio::test]
async fn test_uncreatable_output_folder_aborts_run() {
    let temp_dir = TempDir::new().unwrap();
    let inputs = create_videos(temp_dir.path(), &["a.mp4"]).await;
    let blocker = temp_dir.path().join("blocker");
    fs::write(&blocker, b"file in the way").await.unwrap();

    let (mut session, mut receiver) = BatchSession::new(&fast_config());
    session.add_paths(inputs);
    session.set_output_directory(blocker.join("out"));

    let converter = Arc::new(FakeConverter::new(&[]));
    let (outcome, _) = run_to_completion(&mut session, &mut receiver, converter.clone()).await;

    assert!(matches!(outcome, BatchOutcome::Aborted { .. }));
    assert!(converter.calls().is_empty());
    assert_eq!(session.state(), RunState::Idle);
}

#[cfg(unix)]
mod script_converter {
    use super::*;
    use batch_watermark_remover::ScriptConverter;

    /// Stand-in for remwm.py: copies input to output, fails on names containing "bad"
    const FAKE_REMWM: &str = r#"
case "$(basename "$1")" in
  *bad*) printf 'RuntimeError: %0150d' 0 >&2; exit 3 ;;
esac
[ "$3" = "--overwrite" ] || exit 9
cp "$1" "$2"
"#;

    async fn script_converter(work_dir: &Path) -> ScriptConverter {
        fs::write(work_dir.join("remwm.sh"), FAKE_REMWM).await.unwrap();
        ScriptConverter::new(PathBuf::from("sh"), PathBuf::from("remwm.sh"), work_dir.to_path_buf())
    }

    #[tokio::test]
    async fn test_exit_codes_map_to_results() {
        let temp_dir = TempDir::new().unwrap();
        let converter = script_converter(temp_dir.path()).await;
        let inputs = create_videos(temp_dir.path(), &["good.mp4", "bad.mp4"]).await;

        let output = temp_dir.path().join("good_no_watermark.mp4");
        let stats = converter.convert(&inputs[0], &output).await.unwrap();
        assert_eq!(stats.exit_code, Some(0));
        assert_eq!(fs::read(&output).await.unwrap(), b"mock video content");

        let failed = converter
            .convert(&inputs[1], &temp_dir.path().join("bad_no_watermark.mp4"))
            .await;
        match failed {
            Err(ConversionError::Failed { code, stderr }) => {
                assert_eq!(code, 3);
                assert_eq!(stderr.chars().count(), 100);
                assert!(stderr.starts_with("RuntimeError: "));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_batch_with_real_processes() {
        let temp_dir = TempDir::new().unwrap();
        let converter = Arc::new(script_converter(temp_dir.path()).await);
        let inputs = create_videos(temp_dir.path(), &["first.mp4", "bad_second.mp4", "third.MP4"]).await;
        let output_dir = temp_dir.path().join("results");

        let (mut session, mut receiver) = BatchSession::new(&fast_config());
        session.add_paths(inputs);
        session.set_output_directory(&output_dir);

        let (outcome, _) = run_to_completion(&mut session, &mut receiver, converter).await;

        match outcome {
            BatchOutcome::Completed(summary) => {
                assert_eq!(summary.successful, 2);
                assert_eq!(summary.total, 3);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(output_dir.join("first_no_watermark.mp4").exists());
        assert!(output_dir.join("third_no_watermark.mp4").exists());
        assert!(!output_dir.join("bad_second_no_watermark.mp4").exists());
    }

    #[tokio::test]
    async fn test_check_available() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("remwm.py"), b"# converter").await.unwrap();

        // `true` accepts --version everywhere, standing in for the interpreter
        let ready = ScriptConverter::new(PathBuf::from("true"), PathBuf::from("remwm.py"), temp_dir.path().to_path_buf());
        assert!(ready.check_available().await.is_ok());

        let missing = ScriptConverter::new(PathBuf::from("true"), PathBuf::from("missing.py"), temp_dir.path().to_path_buf());
        assert!(matches!(
            missing.check_available().await,
            Err(ConversionError::InvalidPath(_))
        ));
    }
}
