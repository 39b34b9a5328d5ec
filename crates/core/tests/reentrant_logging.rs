use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use log::{LevelFilter, Log, Metadata, Record};

use eyesoff_core::alerting::domain::engine_config::{EngineConfig, SettingsPatch};
use eyesoff_core::alerting::infrastructure::decision_engine::{DecisionEngine, EngineHandle};

static HANDLE: OnceLock<EngineHandle> = OnceLock::new();
static RECORDS: AtomicUsize = AtomicUsize::new(0);
static BLOCKED: AtomicUsize = AtomicUsize::new(0);

/// Queries the engine from another thread for every record it receives.
/// The query stalls if the engine lock is held while logging.
struct ReentrantLogger;

impl Log for ReentrantLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, _record: &Record) {
        let Some(handle) = HANDLE.get().cloned() else {
            return;
        };
        let (tx, rx) = crossbeam_channel::bounded(1);
        thread::spawn(move || {
            let _ = tx.send(handle.lifecycle());
        });

        RECORDS.fetch_add(1, Ordering::SeqCst);
        if rx.recv_timeout(Duration::from_secs(1)).is_err() {
            BLOCKED.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn flush(&self) {}
}

static LOGGER: ReentrantLogger = ReentrantLogger;

#[test]
fn test_control_calls_log_without_holding_engine_lock() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Info);

    let mut engine = DecisionEngine::new(EngineConfig::default()).unwrap();
    let _ = HANDLE.set(engine.handle());
    engine.start().unwrap();

    engine.pause();
    engine.resume();
    let rejected = engine.update_settings(&SettingsPatch {
        face_threshold: Some(0),
        ..SettingsPatch::default()
    });
    engine.stop();

    assert!(rejected.is_err());
    assert!(RECORDS.load(Ordering::SeqCst) >= 3);
    assert_eq!(BLOCKED.load(Ordering::SeqCst), 0);
}
