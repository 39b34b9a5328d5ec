pub mod alert_event;
pub mod alert_presenter;
pub mod debounce;
pub mod detection_stats;
pub mod engine_config;
pub mod engine_state;
