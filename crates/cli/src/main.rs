use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::Receiver;

use eyesoff_core::alerting::domain::alert_event::AlertEvent;
use eyesoff_core::alerting::domain::alert_presenter::dispatch_to_presenter;
use eyesoff_core::alerting::domain::detection_stats::Stats;
use eyesoff_core::alerting::domain::engine_config::{AlertPosition, EngineConfig, SettingsPatch};
use eyesoff_core::alerting::infrastructure::decision_engine::{DecisionEngine, EngineHandle};
use eyesoff_core::alerting::infrastructure::log_alert_presenter::LogAlertPresenter;

/// Replay per-frame face counts through the EyesOff alert decision engine.
#[derive(Parser)]
#[command(name = "eyesoff-sim")]
struct Cli {
    /// Face counts, one per frame. Read from stdin (one per line) if omitted.
    counts: Vec<u32>,

    /// JSON settings file. Missing fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Alert when more than this many faces are seen.
    #[arg(long)]
    face_threshold: Option<u32>,

    /// Consecutive frames required before the alert flips.
    #[arg(long, conflicts_with = "detection_delay_secs")]
    detection_delay: Option<u32>,

    /// Confirmation delay in seconds (converted at 30 fps).
    #[arg(long)]
    detection_delay_secs: Option<f64>,

    /// Dismiss the alert automatically after this many seconds.
    #[arg(long)]
    alert_duration: Option<f64>,

    /// Alert position: center, top or bottom.
    #[arg(long)]
    alert_position: Option<String>,

    /// Milliseconds between simulated frames.
    #[arg(long, default_value = "33")]
    frame_interval_ms: u64,

    /// Frame indices at which the user closes the alert (comma-separated).
    #[arg(long, value_delimiter = ',')]
    dismiss_at: Option<Vec<usize>>,

    /// Print the final stats and engine state as JSON on stdout.
    #[arg(long)]
    stats_json: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let overrides = cli_patch(&cli)?;
    if !overrides.is_empty() {
        log::debug!("Applying command-line overrides: {overrides:?}");
    }
    let config = load_config(cli.config.as_deref())?.merged(&overrides)?;
    let counts = if cli.counts.is_empty() {
        parse_counts(io::stdin().lock())?
    } else {
        cli.counts.clone()
    };
    if counts.is_empty() {
        return Err("No face counts given".into());
    }

    let mut engine = DecisionEngine::new(config)?;
    let presenter = spawn_presenter(engine.handle(), engine.subscribe());
    engine.start()?;

    log::info!("Replaying {} frames", counts.len());
    let dismiss_at = cli.dismiss_at.unwrap_or_default();
    let interval = Duration::from_millis(cli.frame_interval_ms);
    for (frame, &count) in counts.iter().enumerate() {
        if dismiss_at.contains(&frame) {
            log::info!("Frame {frame}: user closes the alert");
            engine.handle_user_dismissal();
        }
        engine.update_face_count(count);
        thread::sleep(interval);
    }
    engine.stop();

    let presenter = presenter
        .join()
        .map_err(|_| "Presenter thread panicked")?;
    let stats = engine.stats();

    if cli.stats_json {
        let report = serde_json::json!({
            "stats": serde_json::to_value(&stats)?,
            "state": serde_json::to_value(engine.state())?,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        eprintln!("{}", summary(&stats, presenter.shown_count()));
    }
    Ok(())
}

/// Drives a [`LogAlertPresenter`] from engine events until the engine stops.
fn spawn_presenter(
    handle: EngineHandle,
    events: Receiver<AlertEvent>,
) -> JoinHandle<LogAlertPresenter> {
    thread::spawn(move || {
        let mut presenter = LogAlertPresenter::new();
        for event in events.iter() {
            match &event {
                AlertEvent::ShowAlert | AlertEvent::DismissAlert => {
                    let presentation = handle.config().presentation;
                    dispatch_to_presenter(&event, &mut presenter, &presentation);
                }
                AlertEvent::AlertStateChanged(active) => {
                    log::info!("Alert active: {active}");
                }
                AlertEvent::StatsUpdated(stats) => {
                    log::debug!(
                        "Stats: {} frames, {} alerts",
                        stats.total_detections,
                        stats.alert_count
                    );
                }
                AlertEvent::ErrorOccurred(message) => log::error!("{message}"),
                AlertEvent::ManagerStopped => break,
            }
        }
        presenter
    })
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let json = fs::read_to_string(path)
        .map_err(|e| format!("Cannot read config {}: {e}", path.display()))?;
    let patch: SettingsPatch = serde_json::from_str(&json)
        .map_err(|e| format!("Invalid config {}: {e}", path.display()))?;
    Ok(EngineConfig::default().merged(&patch)?)
}

fn cli_patch(cli: &Cli) -> Result<SettingsPatch, Box<dyn std::error::Error>> {
    let alert_position = cli
        .alert_position
        .as_deref()
        .map(str::parse::<AlertPosition>)
        .transpose()?;
    Ok(SettingsPatch {
        face_threshold: cli.face_threshold,
        detection_delay: cli.detection_delay_secs,
        detection_delay_frames: cli.detection_delay,
        alert_duration: cli.alert_duration.map(Some),
        alert_position,
        ..SettingsPatch::default()
    })
}

/// Reads one face count per line. Blank lines and `#` comments are skipped.
fn parse_counts(reader: impl BufRead) -> Result<Vec<u32>, Box<dyn std::error::Error>> {
    let mut counts = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let count = trimmed
            .parse::<u32>()
            .map_err(|_| format!("Line {}: invalid face count '{trimmed}'", i + 1))?;
        counts.push(count);
    }
    Ok(counts)
}

fn summary(stats: &Stats, shown: usize) -> String {
    let mut lines = vec![format!(
        "Session summary ({} frames, {} alerts, {shown} shown):",
        stats.total_detections, stats.alert_count
    )];
    for (faces, frames) in &stats.face_counts {
        lines.push(format!("  {faces} faces: {frames} frames"));
    }
    lines.join("\n")
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = &cli.config {
        if !path.exists() {
            return Err(format!("Config file not found: {}", path.display()).into());
        }
    }
    if cli.face_threshold == Some(0) {
        return Err("Face threshold must be at least 1".into());
    }
    if cli.detection_delay == Some(0) {
        return Err("Detection delay must be at least 1 frame".into());
    }
    if let Some(position) = &cli.alert_position {
        position.parse::<AlertPosition>()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyesoff_core::alerting::domain::engine_config::AlertColor;
    use std::io::Write;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("eyesoff-sim").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_counts_skips_blank_and_comments() {
        let input = "2\n\n# someone walks by\n3\n 0 \n";
        assert_eq!(parse_counts(input.as_bytes()).unwrap(), vec![2, 3, 0]);
    }

    #[test]
    fn test_parse_counts_reports_line() {
        let err = parse_counts("1\nmany\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Line 2"));
    }

    #[test]
    fn test_load_config_defaults_without_path() {
        assert_eq!(load_config(None).unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_load_config_merges_file_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"face_threshold": 2, "detection_delay": 0.5, "alert_position": "top"}}"#
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();

        assert_eq!(config.face_threshold, 2);
        assert_eq!(config.detection_delay, 15);
        assert_eq!(config.presentation.position, AlertPosition::Top);
        assert_eq!(config.debounce_time, EngineConfig::default().debounce_time);
    }

    #[test]
    fn test_load_config_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"alert_opacity": 2.0}}"#).unwrap();
        assert!(load_config(Some(file.path())).is_err());
    }

    #[test]
    fn test_load_config_rejects_malformed_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = load_config(Some(file.path())).unwrap_err();
        assert!(err.to_string().starts_with("Invalid config"));
    }

    #[test]
    fn test_cli_patch_from_flags() {
        let args = cli(&[
            "--face-threshold",
            "2",
            "--alert-duration",
            "5",
            "--alert-position",
            "bottom",
            "2",
            "2",
        ]);

        let patch = cli_patch(&args).unwrap();

        assert_eq!(patch.face_threshold, Some(2));
        assert_eq!(patch.alert_duration, Some(Some(5.0)));
        assert_eq!(patch.alert_position, Some(AlertPosition::Bottom));
        assert_eq!(args.counts, vec![2, 2]);
    }

    #[test]
    fn test_delay_flags_map_to_patch_units() {
        let frames = cli_patch(&cli(&["--detection-delay", "4", "1"])).unwrap();
        assert_eq!(frames.detection_delay_frames, Some(4));
        assert_eq!(frames.detection_delay, None);

        let secs = cli_patch(&cli(&["--detection-delay-secs", "0.5", "1"])).unwrap();
        assert_eq!(secs.detection_delay, Some(0.5));
        assert_eq!(secs.detection_delay_frames, None);
    }

    #[test]
    fn test_load_config_reads_bgr_color() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"alert_color": [0, 0, 255], "detection_delay": 1}}"#).unwrap();

        let config = load_config(Some(file.path())).unwrap();

        assert_eq!(config.presentation.color, AlertColor::RED);
        assert_eq!(config.detection_delay, 30);
    }

    #[test]
    fn test_cli_without_flags_is_empty_patch() {
        assert!(cli_patch(&cli(&["1"])).unwrap().is_empty());
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        assert!(validate(&cli(&["--face-threshold", "0"])).is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_position() {
        assert!(validate(&cli(&["--alert-position", "left"])).is_err());
    }

    #[test]
    fn test_delay_flags_conflict() {
        let result = Cli::try_parse_from([
            "eyesoff-sim",
            "--detection-delay",
            "3",
            "--detection-delay-secs",
            "0.2",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_dismiss_at_list() {
        let args = cli(&["--dismiss-at", "3,7", "2"]);
        assert_eq!(args.dismiss_at, Some(vec![3, 7]));
    }

    #[test]
    fn test_summary_lists_histogram() {
        let mut stats = Stats {
            total_detections: 3,
            alert_count: 1,
            ..Stats::default()
        };
        stats.face_counts.insert(1, 2);
        stats.face_counts.insert(2, 1);

        let text = summary(&stats, 1);

        assert!(text.contains("3 frames, 1 alerts"));
        assert!(text.contains("1 faces: 2 frames"));
        assert!(text.contains("2 faces: 1 frames"));
    }
}
