use ratatui::Frame;

use crate::ui::{render_exit_modal, render_results, render_session};
use crate::{App, AppState};

/// A UI Screen boundary: one per app state
pub trait Screen {
    fn render(&self, app: &App, f: &mut Frame);
}

/// Question, countdown and status line of a running test
pub struct SessionScreen;

impl Screen for SessionScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        let area = f.area();
        render_session(app, area, f.buffer_mut());
    }
}

/// The running test with the leave-confirmation dialog on top
pub struct ConfirmExitScreen;

impl Screen for ConfirmExitScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        let area = f.area();
        render_session(app, area, f.buffer_mut());
        render_exit_modal(area, f.buffer_mut());
    }
}

pub struct ResultsScreen;

impl Screen for ResultsScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        let area = f.area();
        render_results(app, area, f.buffer_mut());
    }
}

pub fn current_screen(state: &AppState) -> Box<dyn Screen> {
    match state {
        AppState::Session => Box::new(SessionScreen),
        AppState::ConfirmExit => Box::new(ConfirmExitScreen),
        AppState::Results => Box::new(ResultsScreen),
    }
}
