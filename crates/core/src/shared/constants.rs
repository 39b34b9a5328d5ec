use std::time::Duration;

/// Frame rate assumed when converting a delay in seconds to a frame count.
pub const ASSUMED_FPS: f64 = 30.0;

/// Upper bound on how long the decision worker sleeps without new input.
///
/// Pause, stop and auto-dismiss are all noticed within this interval.
pub const WAIT_TIMEOUT: Duration = Duration::from_millis(100);

/// A stats snapshot is emitted every this many evaluated observations.
pub const STATS_EMIT_INTERVAL: u64 = 10;

pub const DEFAULT_FACE_THRESHOLD: u32 = 1;
pub const DEFAULT_DEBOUNCE_SECS: f64 = 1.0;
/// About 0.2s at 30 fps.
pub const DEFAULT_DETECTION_DELAY_FRAMES: u32 = 6;
pub const DEFAULT_ALERT_OPACITY: f32 = 0.8;
pub const DEFAULT_ALERT_SIZE: (u32, u32) = (600, 300);
