use crate::alerting::domain::detection_stats::Stats;

/// Notifications emitted by the decision engine, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertEvent {
    /// The alert went up (`true`) or down (`false`).
    AlertStateChanged(bool),
    /// Ask the presenter to show the alert. Also sent, without a state
    /// change, when the alert is re-raised for a larger crowd.
    ShowAlert,
    DismissAlert,
    StatsUpdated(Stats),
    /// A single observation could not be evaluated. Not fatal.
    ErrorOccurred(String),
    /// The worker has exited. Always the last event of a session.
    ManagerStopped,
}
