use crate::alerting::domain::engine_config::EngineConfig;
use crate::alerting::domain::engine_state::EngineState;

/// Alert state change decided for one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Raise the alert after a confirmed run above the threshold.
    Show,
    /// The alert is already up and more faces appeared. Re-raise it without
    /// waiting for a confirmation run.
    Escalate,
    /// Lower the alert after a confirmed run at or below the threshold.
    Dismiss,
}

impl Transition {
    /// Whether the presenter is asked to show the alert.
    pub fn shows_alert(self) -> bool {
        matches!(self, Transition::Show | Transition::Escalate)
    }
}

/// Consecutive-frame confirmation over the thresholded face count.
///
/// A single noisy frame never flips the alert: the count has to stay on the
/// new side of `face_threshold` for `detection_delay` observations first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Debouncer {
    face_threshold: u32,
    detection_delay: u32,
}

impl Debouncer {
    pub fn new(face_threshold: u32, detection_delay: u32) -> Self {
        Self {
            face_threshold,
            detection_delay: detection_delay.max(1),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.face_threshold, config.detection_delay)
    }

    /// Whether `face_count` counts as an unauthorized viewer. Zero faces
    /// never does, whatever the threshold.
    pub fn is_above(&self, face_count: u32) -> bool {
        face_count > 0 && face_count > self.face_threshold
    }

    /// Feeds one observation into `state` and returns the transition it
    /// fires, if any. At most one transition fires per call.
    pub fn evaluate(&self, state: &mut EngineState, face_count: u32) -> Option<Transition> {
        let above = self.is_above(face_count);

        state.previous_face_count = state.current_face_count;
        state.current_face_count = face_count;

        if above != state.last_detection_state {
            // The observation that breaks a run is the first of the next one.
            state.consecutive_detections = 1;
            state.last_detection_state = above;
        } else {
            state.consecutive_detections = state.consecutive_detections.saturating_add(1);
        }

        if !above && !state.alert_is_showing {
            state.num_faces_last_alert = 0;
        }

        let confirmed = state.consecutive_detections >= self.detection_delay;
        let transition = match (above, state.alert_is_showing) {
            (true, true) if face_count > state.num_faces_last_alert => Some(Transition::Escalate),
            (true, false)
                if confirmed
                    && (state.num_faces_last_alert == 0
                        || face_count > state.num_faces_last_alert) =>
            {
                Some(Transition::Show)
            }
            (false, true) if confirmed => Some(Transition::Dismiss),
            _ => None,
        };

        if let Some(transition) = transition {
            apply(state, transition, face_count);
        }
        transition
    }
}

fn apply(state: &mut EngineState, transition: Transition, face_count: u32) {
    match transition {
        Transition::Show => {
            state.alert_is_showing = true;
            state.num_faces_last_alert = face_count;
        }
        Transition::Escalate => {
            state.num_faces_last_alert = face_count;
        }
        Transition::Dismiss => {
            state.alert_is_showing = false;
            state.num_faces_last_alert = 0;
        }
    }
    state.last_confirmed_face_count = face_count;
    state.consecutive_detections = 0;
}
