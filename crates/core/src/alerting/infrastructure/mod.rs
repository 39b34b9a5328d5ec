pub mod decision_engine;
pub mod event_bus;
pub mod log_alert_presenter;
