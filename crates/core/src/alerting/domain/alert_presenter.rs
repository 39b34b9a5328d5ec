use crate::alerting::domain::alert_event::AlertEvent;
use crate::alerting::domain::engine_config::AlertPresentation;

/// Domain interface for whatever puts the warning in front of the user
/// (overlay window, notification, ...).
///
/// Calls must return promptly; the presenter runs off the decision worker.
pub trait AlertPresenter: Send {
    fn show(&mut self, presentation: &AlertPresentation);
    fn dismiss(&mut self);
}

/// Presenter that discards every command.
pub struct NullAlertPresenter;

impl AlertPresenter for NullAlertPresenter {
    fn show(&mut self, _presentation: &AlertPresentation) {}
    fn dismiss(&mut self) {}
}

/// Routes a presenter command to `presenter`, using `presentation` for the
/// look of a shown alert. Returns `false` for events that are not
/// presenter commands.
pub fn dispatch_to_presenter(
    event: &AlertEvent,
    presenter: &mut dyn AlertPresenter,
    presentation: &AlertPresentation,
) -> bool {
    match event {
        AlertEvent::ShowAlert => {
            presenter.show(presentation);
            true
        }
        AlertEvent::DismissAlert => {
            presenter.dismiss();
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::domain::engine_config::AlertPosition;

    #[derive(Default)]
    struct RecordingPresenter {
        calls: Vec<String>,
    }

    impl AlertPresenter for RecordingPresenter {
        fn show(&mut self, presentation: &AlertPresentation) {
            self.calls.push(format!("show:{}", presentation.position));
        }

        fn dismiss(&mut self) {
            self.calls.push("dismiss".into());
        }
    }

    #[test]
    fn test_dispatch_show_uses_presentation() {
        let mut presenter = RecordingPresenter::default();
        let presentation = AlertPresentation {
            position: AlertPosition::Top,
            ..AlertPresentation::default()
        };

        assert!(dispatch_to_presenter(
            &AlertEvent::ShowAlert,
            &mut presenter,
            &presentation
        ));
        assert_eq!(presenter.calls, vec!["show:top"]);
    }

    #[test]
    fn test_dispatch_dismiss() {
        let mut presenter = RecordingPresenter::default();
        assert!(dispatch_to_presenter(
            &AlertEvent::DismissAlert,
            &mut presenter,
            &AlertPresentation::default()
        ));
        assert_eq!(presenter.calls, vec!["dismiss"]);
    }

    #[test]
    fn test_dispatch_ignores_other_events() {
        let mut presenter = RecordingPresenter::default();
        let presentation = AlertPresentation::default();
        for event in [
            AlertEvent::AlertStateChanged(true),
            AlertEvent::ErrorOccurred("boom".into()),
            AlertEvent::ManagerStopped,
        ] {
            assert!(!dispatch_to_presenter(&event, &mut presenter, &presentation));
        }
        assert!(presenter.calls.is_empty());
    }

    #[test]
    fn test_null_presenter_is_noop() {
        let mut presenter = NullAlertPresenter;
        presenter.show(&AlertPresentation::default());
        presenter.dismiss();
    }
}
