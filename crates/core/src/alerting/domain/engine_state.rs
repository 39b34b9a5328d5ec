use serde::Serialize;

/// Debounce and alert state owned by the decision worker.
///
/// Callers only ever see copies of this.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineState {
    pub is_running: bool,
    pub is_paused: bool,
    pub current_face_count: u32,
    pub previous_face_count: u32,
    /// Length of the current run of observations on the same side of the
    /// threshold. Cleared whenever a transition fires.
    pub consecutive_detections: u32,
    /// Face count of the observation that fired the last transition.
    pub last_confirmed_face_count: u32,
    /// Face count the current (or last dismissed) alert was raised for.
    /// Zero once the room drops back below the threshold.
    pub num_faces_last_alert: u32,
    /// Whether the last observation was above the threshold.
    pub last_detection_state: bool,
    pub alert_is_showing: bool,
}

impl EngineState {
    /// Hides the alert on request from outside the detector signal (the
    /// user closed it, or it timed out).
    ///
    /// Remembers `face_count` so the same crowd does not raise the alert
    /// again straight away. Returns `false` if no alert was showing.
    pub fn dismiss(&mut self, face_count: u32) -> bool {
        if !self.alert_is_showing {
            return false;
        }
        self.alert_is_showing = false;
        self.num_faces_last_alert = face_count;
        true
    }

    /// Hides the alert for shutdown. Returns `false` if none was showing.
    pub fn force_dismiss(&mut self) -> bool {
        let was_showing = self.alert_is_showing;
        self.alert_is_showing = false;
        self.consecutive_detections = 0;
        was_showing
    }
}
