use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Instant, SystemTime};

use crossbeam_channel::Receiver;
use thiserror::Error;

use crate::alerting::domain::alert_event::AlertEvent;
use crate::alerting::domain::debounce::{Debouncer, Transition};
use crate::alerting::domain::detection_stats::{EvaluationError, Stats, StatsAggregator};
use crate::alerting::domain::engine_config::{ConfigError, EngineConfig, SettingsPatch};
use crate::alerting::domain::engine_state::EngineState;
use crate::alerting::infrastructure::event_bus::EventBus;
use crate::shared::constants::{STATS_EMIT_INTERVAL, WAIT_TIMEOUT};

const WORKER_THREAD_NAME: &str = "eyesoff-decision";

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid engine configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to spawn decision worker: {0}")]
    Spawn(#[source] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Stopped,
    Running,
    Paused,
}

/// Everything callers may touch, behind the engine's single lock.
struct SharedState {
    config: EngineConfig,
    latest_face_count: u32,
    /// Set by `update_face_count`, cleared when the worker takes the value.
    fresh_observation: bool,
    /// Face count at the time the user closed the alert.
    pending_dismissal: Option<u32>,
    running: bool,
    paused: bool,
    published_state: EngineState,
    published_stats: Stats,
}

impl SharedState {
    fn new(config: EngineConfig) -> Self {
        Self {
            config,
            latest_face_count: 0,
            fresh_observation: false,
            pending_dismissal: None,
            running: false,
            paused: false,
            published_state: EngineState::default(),
            published_stats: Stats::default(),
        }
    }

    fn has_pending_work(&self) -> bool {
        (self.fresh_observation && !self.paused) || self.pending_dismissal.is_some()
    }

    fn lifecycle(&self) -> Lifecycle {
        match (self.running, self.paused) {
            (false, _) => Lifecycle::Stopped,
            (true, false) => Lifecycle::Running,
            (true, true) => Lifecycle::Paused,
        }
    }
}

struct Shared {
    state: Mutex<SharedState>,
    wake: Condvar,
    events: EventBus,
}

/// Input the worker took from the shared slot for one loop iteration.
struct Tick {
    observation: Option<u32>,
    dismissal: Option<u32>,
    paused: bool,
    config: EngineConfig,
}

impl Shared {
    fn new(config: EngineConfig) -> Self {
        Self {
            state: Mutex::new(SharedState::new(config)),
            wake: Condvar::new(),
            events: EventBus::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits up to [`WAIT_TIMEOUT`] for work, then takes whatever is pending.
    /// Returns `None` once the engine has been asked to stop.
    fn next_tick(&self) -> Option<Tick> {
        let mut guard = self.lock();
        if guard.running && !guard.has_pending_work() {
            let (next, _timed_out) = self
                .wake
                .wait_timeout(guard, WAIT_TIMEOUT)
                .unwrap_or_else(PoisonError::into_inner);
            guard = next;
        }
        if !guard.running {
            return None;
        }

        let observation = if guard.fresh_observation && !guard.paused {
            guard.fresh_observation = false;
            Some(guard.latest_face_count)
        } else {
            None
        };

        Some(Tick {
            observation,
            dismissal: guard.pending_dismissal.take(),
            paused: guard.paused,
            config: guard.config.clone(),
        })
    }

    fn publish(&self, state: EngineState, stats: Stats) {
        let mut guard = self.lock();
        guard.published_state = state;
        guard.published_stats = stats;
    }
}

/// Thread-safe control surface of a [`DecisionEngine`].
///
/// Cheap to clone; hand one to the capture pipeline, one to the UI, and so
/// on. No method blocks beyond a short critical section.
#[derive(Clone)]
pub struct EngineHandle {
    shared: Arc<Shared>,
}

impl EngineHandle {
    /// Replaces the current observation. Only the latest value is kept.
    pub fn update_face_count(&self, face_count: u32) {
        {
            let mut guard = self.shared.lock();
            guard.latest_face_count = face_count;
            guard.fresh_observation = true;
        }
        self.shared.wake.notify_all();
    }

    /// Merges `patch` into the config. Takes effect on the worker's next
    /// iteration. A rejected patch leaves the config untouched.
    pub fn update_settings(&self, patch: &SettingsPatch) -> Result<(), ConfigError> {
        let mut guard = self.shared.lock();
        match guard.config.merged(patch) {
            Ok(next) => {
                guard.config = next;
                Ok(())
            }
            Err(e) => {
                drop(guard);
                log::warn!("Rejected settings update: {e}");
                Err(e)
            }
        }
    }

    /// The user closed the alert. Hides it and suppresses re-showing it for
    /// the current face count. Does nothing if no alert is up.
    pub fn handle_user_dismissal(&self) {
        {
            let mut guard = self.shared.lock();
            if !guard.running {
                return;
            }
            guard.pending_dismissal = Some(guard.latest_face_count);
        }
        self.shared.wake.notify_all();
    }

    pub fn pause(&self) {
        {
            let mut guard = self.shared.lock();
            if guard.lifecycle() != Lifecycle::Running {
                return;
            }
            guard.paused = true;
        }
        log::info!("Decision engine paused");
    }

    pub fn resume(&self) {
        {
            let mut guard = self.shared.lock();
            if guard.lifecycle() != Lifecycle::Paused {
                return;
            }
            guard.paused = false;
        }
        log::info!("Decision engine resumed");
        self.shared.wake.notify_all();
    }

    /// Asks the worker to exit without waiting for it. The worker notices
    /// within one wait interval and emits [`AlertEvent::ManagerStopped`].
    pub fn stop(&self) {
        {
            let mut guard = self.shared.lock();
            if !guard.running {
                return;
            }
            guard.running = false;
            guard.paused = false;
        }
        self.shared.wake.notify_all();
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.lock().lifecycle()
    }

    pub fn config(&self) -> EngineConfig {
        self.shared.lock().config.clone()
    }

    /// Engine state as of the worker's last iteration.
    pub fn state(&self) -> EngineState {
        self.shared.lock().published_state
    }

    /// Stats as of the worker's last iteration.
    pub fn stats(&self) -> Stats {
        self.shared.lock().published_stats.clone()
    }

    pub fn subscribe(&self) -> Receiver<AlertEvent> {
        self.shared.events.subscribe()
    }
}

/// Owns the decision worker thread.
///
/// The worker takes the latest face count, runs it through the
/// [`Debouncer`], keeps [`Stats`], and emits [`AlertEvent`]s to every
/// subscriber. Dropping the engine stops the worker.
pub struct DecisionEngine {
    handle: EngineHandle,
    worker: Option<JoinHandle<()>>,
}

impl DecisionEngine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            handle: EngineHandle {
                shared: Arc::new(Shared::new(config)),
            },
            worker: None,
        })
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Starts a new monitoring session with fresh state and stats. Does
    /// nothing if the engine is already running or paused.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.handle.lifecycle() != Lifecycle::Stopped {
            return Ok(());
        }
        // A previous session may have been stopped through a handle.
        self.join_worker();

        let state = EngineState {
            is_running: true,
            ..EngineState::default()
        };
        let mut stats = StatsAggregator::new();
        stats.start_session(SystemTime::now());

        {
            let mut guard = self.handle.shared.lock();
            guard.running = true;
            guard.paused = false;
            guard.fresh_observation = false;
            guard.pending_dismissal = None;
            guard.published_state = state;
            guard.published_stats = stats.snapshot();
        }

        let worker = Worker {
            shared: Arc::clone(&self.handle.shared),
            state,
            stats,
            shown_at: None,
        };
        let spawned = thread::Builder::new()
            .name(WORKER_THREAD_NAME.into())
            .spawn(move || worker.run());

        match spawned {
            Ok(join_handle) => {
                self.worker = Some(join_handle);
                Ok(())
            }
            Err(e) => {
                self.handle.shared.lock().running = false;
                Err(EngineError::Spawn(e))
            }
        }
    }

    /// Stops the worker and waits for it to exit. A no-op when stopped.
    pub fn stop(&mut self) {
        self.handle.stop();
        self.join_worker();
    }

    pub fn update_face_count(&self, face_count: u32) {
        self.handle.update_face_count(face_count);
    }

    pub fn update_settings(&self, patch: &SettingsPatch) -> Result<(), ConfigError> {
        self.handle.update_settings(patch)
    }

    pub fn handle_user_dismissal(&self) {
        self.handle.handle_user_dismissal();
    }

    pub fn pause(&self) {
        self.handle.pause();
    }

    pub fn resume(&self) {
        self.handle.resume();
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.handle.lifecycle()
    }

    pub fn config(&self) -> EngineConfig {
        self.handle.config()
    }

    pub fn state(&self) -> EngineState {
        self.handle.state()
    }

    pub fn stats(&self) -> Stats {
        self.handle.stats()
    }

    pub fn subscribe(&self) -> Receiver<AlertEvent> {
        self.handle.subscribe()
    }

    fn join_worker(&mut self) {
        if let Some(join_handle) = self.worker.take() {
            if join_handle.join().is_err() {
                log::error!("Decision worker panicked");
                self.handle.shared.lock().running = false;
            }
        }
    }
}

impl Drop for DecisionEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State private to the worker thread.
struct Worker {
    shared: Arc<Shared>,
    state: EngineState,
    stats: StatsAggregator,
    /// When the alert was last shown, for auto-dismiss.
    shown_at: Option<Instant>,
}

impl Worker {
    fn run(mut self) {
        log::info!("Decision worker started");
        while let Some(tick) = self.shared.next_tick() {
            self.process(tick);
            self.publish();
        }
        self.shut_down();
    }

    fn process(&mut self, tick: Tick) {
        self.state.is_running = true;
        self.state.is_paused = tick.paused;

        if let Some(face_count) = tick.dismissal {
            if self.state.dismiss(face_count) {
                log::info!("Alert manually dismissed by user. Last alert face count: {face_count}");
                self.emit_dismissal();
            }
        }

        if let Some(face_count) = tick.observation {
            if let Err(e) = self.observe(face_count, &tick.config) {
                log::error!("Error processing detection: {e}");
                self.emit(AlertEvent::ErrorOccurred(format!(
                    "Error processing detection: {e}"
                )));
            }
        }

        self.check_auto_dismiss(&tick.config);
    }

    /// Evaluates one observation. On error neither state nor stats change.
    fn observe(&mut self, face_count: u32, config: &EngineConfig) -> Result<(), EvaluationError> {
        let mut state = self.state;
        let mut stats = self.stats.clone();

        stats.record(face_count, SystemTime::now())?;
        let transition = Debouncer::from_config(config).evaluate(&mut state, face_count);
        if transition.is_some_and(Transition::shows_alert) {
            stats.record_alert()?;
        }

        self.state = state;
        self.stats = stats;
        log::debug!(
            "faces={face_count} threshold={} consecutive={} showing={}",
            config.face_threshold,
            self.state.consecutive_detections,
            self.state.alert_is_showing
        );

        if let Some(transition) = transition {
            self.announce(transition, face_count);
        }
        if transition.is_some() || self.stats.total_detections() % STATS_EMIT_INTERVAL == 0 {
            self.emit(AlertEvent::StatsUpdated(self.stats.snapshot()));
        }
        Ok(())
    }

    fn announce(&mut self, transition: Transition, face_count: u32) {
        match transition {
            Transition::Show => {
                log::info!("Multiple viewers detected ({face_count})! Showing privacy alert.");
                self.shown_at = Some(Instant::now());
                self.emit(AlertEvent::ShowAlert);
                self.emit(AlertEvent::AlertStateChanged(true));
            }
            Transition::Escalate => {
                log::info!("Viewer count rose to {face_count}. Raising privacy alert again.");
                self.shown_at = Some(Instant::now());
                self.emit(AlertEvent::ShowAlert);
            }
            Transition::Dismiss => {
                log::info!("No unauthorized viewers detected. Hiding alert.");
                self.shown_at = None;
                self.emit(AlertEvent::DismissAlert);
                self.emit(AlertEvent::AlertStateChanged(false));
            }
        }
    }

    fn check_auto_dismiss(&mut self, config: &EngineConfig) {
        let (Some(limit), Some(shown_at)) = (config.alert_duration(), self.shown_at) else {
            return;
        };
        if !self.state.alert_is_showing || shown_at.elapsed() < limit {
            return;
        }
        let face_count = self.state.current_face_count;
        if self.state.dismiss(face_count) {
            log::info!(
                "Alert auto-dismissed after {:.1}s at {face_count} faces",
                limit.as_secs_f64()
            );
            self.emit_dismissal();
        }
    }

    /// Events for a dismissal that did not come from the detector signal.
    fn emit_dismissal(&mut self) {
        self.shown_at = None;
        self.emit(AlertEvent::DismissAlert);
        self.emit(AlertEvent::AlertStateChanged(false));
        self.emit(AlertEvent::StatsUpdated(self.stats.snapshot()));
    }

    fn shut_down(&mut self) {
        if self.state.force_dismiss() {
            log::info!("Hiding privacy alert on shutdown");
            self.emit(AlertEvent::DismissAlert);
            self.emit(AlertEvent::AlertStateChanged(false));
        }
        self.shown_at = None;
        self.state.is_running = false;
        self.state.is_paused = false;
        self.publish();
        self.emit(AlertEvent::StatsUpdated(self.stats.snapshot()));

        log::info!("Decision worker stopped");
        self.emit(AlertEvent::ManagerStopped);
    }

    fn publish(&self) {
        self.shared.publish(self.state, self.stats.snapshot());
    }

    fn emit(&self, event: AlertEvent) {
        self.shared.events.emit(event);
    }
}
