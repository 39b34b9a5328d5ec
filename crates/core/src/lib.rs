//! Decision core for the EyesOff privacy alert.
//!
//! A detector upstream reports how many faces it sees on each frame. The
//! [`DecisionEngine`](alerting::infrastructure::decision_engine::DecisionEngine)
//! debounces that signal on its own worker thread and tells an alert
//! presenter when to show or hide the unauthorized-viewer warning.

pub mod alerting;
pub mod shared;
