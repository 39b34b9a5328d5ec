use crate::alerting::domain::alert_presenter::AlertPresenter;
use crate::alerting::domain::engine_config::AlertPresentation;

/// Presenter for headless runs: writes each command to the `log` facade and
/// remembers whether an alert is up.
#[derive(Default)]
pub struct LogAlertPresenter {
    visible: bool,
    shown: usize,
}

impl LogAlertPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// How many times an alert was shown, re-raises included.
    pub fn shown_count(&self) -> usize {
        self.shown
    }
}

impl AlertPresenter for LogAlertPresenter {
    fn show(&mut self, presentation: &AlertPresentation) {
        let (w, h) = presentation.size;
        let c = presentation.color;
        log::warn!(
            "EYES OFF!!! Privacy alert ({w}x{h} at {}, rgb({}, {}, {}), opacity {:.2}{})",
            presentation.position,
            c.r,
            c.g,
            c.b,
            presentation.opacity,
            if presentation.enable_animations {
                ", animated"
            } else {
                ""
            }
        );
        self.visible = true;
        self.shown += 1;
    }

    fn dismiss(&mut self) {
        if self.visible {
            log::info!("Privacy alert dismissed");
        }
        self.visible = false;
    }
}
