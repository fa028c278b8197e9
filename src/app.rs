use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use webbrowser::Browser;

use crate::history::{AttemptLog, AttemptRecord};
use crate::host::{is_back_navigation, to_lockdown_event, TerminalSurface};
use crate::lockdown::{Disposition, FullscreenApi, LockdownController, LockdownEvent};
use crate::runtime::AppEvent;
use crate::speaking::narration::Narrator;
use crate::speaking::recorder::Recorder;
use crate::speaking::{AudioBlob, Mode, Part, PersistedResult, SessionStorage, SpeakingSession, Status};

#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    Session,
    ConfirmExit,
    Results,
}

/// What to run: the test, its content and how strictly to proctor it
#[derive(Debug, Clone)]
pub struct SessionPlan {
    pub test_id: String,
    pub parts: Vec<Part>,
    pub mode: Mode,
    pub proctored: bool,
    pub open_videos: bool,
}

/// Host capabilities handed to the app
pub struct HostKit {
    pub fullscreen: Box<dyn FullscreenApi>,
    pub narrator: Box<dyn Narrator>,
    pub recorder: Box<dyn Recorder>,
    pub history: Option<AttemptLog>,
}

pub struct App {
    pub session: SpeakingSession,
    pub state: AppState,
    pub notice: Option<String>,
    plan: SessionPlan,
    lockdown: Option<LockdownController>,
    surface: TerminalSurface,
    exit_attempted: Rc<Cell<bool>>,
    narrator: Box<dyn Narrator>,
    recorder: Box<dyn Recorder>,
    results_store: Box<dyn SessionStorage>,
    history: Option<AttemptLog>,
    result: Option<PersistedResult>,
    /// Status and step last reacted to
    seen: (Status, usize),
    window_opened_at: Option<Instant>,
    should_quit: bool,
}

impl App {
    pub fn new<S>(plan: SessionPlan, host: HostKit, storage: S) -> Self
    where
        S: SessionStorage + Clone + 'static,
    {
        let mut session = SpeakingSession::new().with_storage(storage.clone());
        session.init_session(plan.test_id.clone(), plan.parts.clone(), plan.mode);
        let surface = TerminalSurface::default();
        let lockdown = plan
            .proctored
            .then(|| LockdownController::new(Box::new(surface.clone()), host.fullscreen));

        Self {
            session,
            state: AppState::Session,
            notice: None,
            plan,
            lockdown,
            surface,
            exit_attempted: Rc::new(Cell::new(false)),
            narrator: host.narrator,
            recorder: host.recorder,
            results_store: Box::new(storage),
            history: host.history,
            result: None,
            seen: (Status::Idle, 0),
            window_opened_at: None,
            should_quit: false,
        }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn is_locked_down(&self) -> bool {
        self.lockdown.as_ref().is_some_and(LockdownController::is_active)
    }

    pub fn surface(&self) -> &TerminalSurface {
        &self.surface
    }

    pub fn result(&self) -> Option<&PersistedResult> {
        self.result.as_ref()
    }

    /// Time left in the open response window
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let opened = self.window_opened_at?;
        if self.session.mode() == Mode::Human {
            return None;
        }
        let window = Duration::from_millis(self.session.current_step_duration_ms());
        Some(window.saturating_sub(now.duration_since(opened)))
    }

    pub fn on_event(&mut self, ev: AppEvent, now: Instant) {
        if let AppEvent::Tick = ev {
            self.on_tick(now);
            return;
        }

        if is_back_navigation(&ev) {
            self.on_back(now);
            return;
        }

        if let Some(lockdown_event) = to_lockdown_event(&ev) {
            let disposition = self.route_to_lockdown(lockdown_event, now);
            self.after_lockdown(now);
            if disposition == Disposition::Prevent || self.should_quit {
                return;
            }
        }

        if let AppEvent::Key(key) = ev {
            self.on_key(key, now);
        }
        self.sync(now);
    }

    pub fn on_tick(&mut self, now: Instant) {
        match self.session.status() {
            Status::ReadingQuestion if self.narrator.has_finished(now) => {
                self.session.tts_ended_for_current_step();
            }
            Status::Recording => {
                let expired = self.remaining(now).is_some_and(|left| left.is_zero());
                let human_done = self.session.mode() == Mode::Human && self.session.finish_requested();
                if expired || self.session.next_requested() || human_done {
                    self.commit_recording(now);
                }
            }
            _ => {}
        }
        self.sync(now);
    }

    fn route_to_lockdown(&mut self, event: LockdownEvent, now: Instant) -> Disposition {
        let listening = self.surface.is_listening(event.listener_kind());
        match self.lockdown.as_mut() {
            Some(lockdown) if listening => lockdown.dispatch(event, now),
            _ => Disposition::Proceed,
        }
    }

    /// Exit attempts and navigations requested by the lockdown
    fn after_lockdown(&mut self, now: Instant) {
        if self.exit_attempted.replace(false) && self.state == AppState::Session {
            log::info!("exit attempt during step {}", self.session.current_step());
            self.state = AppState::ConfirmExit;
        }
        if let Some(route) = self.surface.take_navigation() {
            log::info!("leaving the test for {route}");
            self.abandon(now);
            self.should_quit = true;
        }
    }

    fn on_back(&mut self, now: Instant) {
        self.surface.go_back();
        self.route_to_lockdown(LockdownEvent::PopState, now);
        self.after_lockdown(now);
        if self.surface.guard_depth() == 0 && !self.should_quit {
            // nothing held the history in place
            self.abandon(now);
            self.should_quit = true;
        }
    }

    fn on_key(&mut self, key: KeyEvent, now: Instant) {
        let ctrl_c = key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL);
        match self.state {
            AppState::ConfirmExit => match key.code {
                KeyCode::Char('y') => {
                    self.state = AppState::Session;
                    self.request_finish(now);
                }
                KeyCode::Char('n') | KeyCode::Enter => {
                    self.state = AppState::Session;
                    if let Some(lockdown) = self.lockdown.as_mut() {
                        lockdown.force_fullscreen();
                    }
                }
                _ => {}
            },
            AppState::Session => match key.code {
                KeyCode::Esc | KeyCode::Char('q') if !self.is_locked_down() => {
                    self.abandon(now);
                    self.should_quit = true;
                }
                _ if ctrl_c && !self.is_locked_down() => {
                    self.abandon(now);
                    self.should_quit = true;
                }
                KeyCode::Enter => self.primary_action(),
                KeyCode::Char(' ') if self.session.status() == Status::Recording => {
                    // answer done early
                    if self.session.mode() != Mode::Human {
                        self.session.go_to_next_step();
                        self.commit_recording(now);
                    }
                }
                KeyCode::Char('n') => {
                    if self.session.mode() == Mode::Human {
                        self.session.next_question_human();
                    } else {
                        self.session.go_to_next_step();
                        if self.session.status() == Status::Recording {
                            self.commit_recording(now);
                        }
                    }
                }
                KeyCode::Char('f') => self.request_finish(now),
                _ => {}
            },
            AppState::Results => match key.code {
                KeyCode::Char('r') => self.restart(),
                KeyCode::Esc | KeyCode::Char('q') => self.should_quit = true,
                _ if ctrl_c => self.should_quit = true,
                _ => {}
            },
        }
    }

    /// Finish now, or once the answer being recorded has run its course
    fn request_finish(&mut self, now: Instant) {
        self.session.finish_session();
        if self.session.status() != Status::Recording {
            return;
        }
        if self.session.mode() == Mode::Human {
            // one open capture for the whole session, nothing left to wait for
            self.commit_recording(now);
        } else {
            self.notice = Some("finishing after this answer".to_string());
        }
    }

    fn primary_action(&mut self) {
        match self.session.status() {
            Status::Idle => {
                if self.session.start_session() && self.session.status() != Status::Finished {
                    self.lock_down();
                }
            }
            Status::Watching | Status::Ready => {
                self.session.start_recording_for_current_step();
            }
            _ => {}
        }
    }

    fn lock_down(&mut self) {
        let flag = Rc::clone(&self.exit_attempted);
        if let Some(lockdown) = self.lockdown.as_mut() {
            lockdown.activate(move || flag.set(true));
            lockdown.force_fullscreen();
        }
    }

    fn release(&mut self) {
        if let Some(lockdown) = self.lockdown.as_mut() {
            lockdown.deactivate();
        }
    }

    /// Stop the recorder and hand its audio to the session
    fn commit_recording(&mut self, now: Instant) {
        let blob = if self.recorder.is_recording() {
            match self.recorder.stop(now) {
                Ok(blob) => blob,
                Err(e) => {
                    log::warn!("recorder stop failed: {e}");
                    empty_blob()
                }
            }
        } else {
            empty_blob()
        };
        self.window_opened_at = None;
        match self.session.mode() {
            Mode::Human => self.session.set_human_session_recording_result(blob),
            _ => self
                .session
                .set_recording_result(self.session.current_step(), blob),
        };
    }

    /// Leaving mid-test: drop any capture in flight and release the lockdown
    fn abandon(&mut self, now: Instant) {
        if self.recorder.is_recording() {
            if let Err(e) = self.recorder.stop(now) {
                log::warn!("recorder stop failed while leaving: {e}");
            }
        }
        self.narrator.cancel();
        self.release();
    }

    fn restart(&mut self) {
        self.session.reset_session();
        self.session
            .init_session(self.plan.test_id.clone(), self.plan.parts.clone(), self.plan.mode);
        self.result = None;
        self.notice = None;
        self.seen = (Status::Idle, 0);
        self.state = AppState::Session;
    }

    /// React to whatever the session moved to since the last look
    fn sync(&mut self, now: Instant) {
        loop {
            let current = (self.session.status(), self.session.current_step());
            if current == self.seen {
                return;
            }
            let previous = std::mem::replace(&mut self.seen, current);
            self.enter(previous.0, now);
        }
    }

    fn enter(&mut self, previous: Status, now: Instant) {
        match self.session.status() {
            Status::ReadingQuestion => {
                let text = self
                    .session
                    .current_question()
                    .map(|q| q.text.clone())
                    .unwrap_or_default();
                if self.narrator.is_supported() {
                    self.narrator.speak(&text, now);
                } else {
                    self.session.tts_ended_for_current_step();
                }
            }
            Status::Watching => self.open_video(),
            Status::Recording if previous != Status::Recording => {
                if let Err(e) = self.recorder.start(now) {
                    log::warn!("recording unavailable: {e}");
                    self.notice = Some(format!("recording unavailable: {e}"));
                }
                self.window_opened_at = Some(now);
            }
            Status::Recording => {
                // human mode: same capture, next question
            }
            Status::Finished => self.on_finished(),
            Status::Idle | Status::Ready => {}
        }
    }

    fn open_video(&mut self) {
        if !self.plan.open_videos || !Browser::is_available() {
            return;
        }
        if let Some(url) = self.session.current_youtube_url() {
            if let Err(e) = webbrowser::open(url) {
                log::warn!("could not open {url}: {e}");
            }
        }
    }

    fn on_finished(&mut self) {
        self.release();
        self.narrator.cancel();
        self.result = match PersistedResult::load(self.results_store.as_ref()) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("could not read the stored result: {e}");
                None
            }
        };
        if let (Some(log), Some(result)) = (self.history.as_ref(), self.result.as_ref()) {
            if let Err(e) = log.record(&AttemptRecord::from_result(result, self.session.mode())) {
                log::warn!("could not record attempt: {e}");
            }
        }
        self.state = AppState::Results;
    }
}

fn empty_blob() -> AudioBlob {
    AudioBlob {
        mime_type: "audio/wav".to_string(),
        data: Vec::new(),
        duration: Duration::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lockdown::FullscreenError;
    use crate::speaking::narration::MutedNarrator;
    use crate::speaking::recorder::{RecorderError, SilentRecorder};
    use crate::speaking::source::{FixtureSource, PartsSource};
    use crate::speaking::storage::MemorySessionStorage;
    use std::cell::RefCell;

    struct Windowed;

    impl FullscreenApi for Windowed {
        fn is_supported(&self) -> bool {
            false
        }
        fn is_fullscreen(&self) -> bool {
            false
        }
        fn request(&mut self) -> Result<(), FullscreenError> {
            Err(FullscreenError::Unsupported)
        }
        fn exit(&mut self) -> Result<(), FullscreenError> {
            Ok(())
        }
    }

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn app(mode: Mode, proctored: bool) -> App {
        let test_id = match mode {
            Mode::Shadowing => "shadowing-sample",
            _ => "speaking-sample",
        };
        let parts = FixtureSource.parts_for_test(test_id).unwrap();
        let plan = SessionPlan {
            test_id: test_id.to_string(),
            parts,
            mode,
            proctored,
            open_videos: false,
        };
        let host = HostKit {
            fullscreen: Box::new(Windowed),
            narrator: Box::new(MutedNarrator),
            recorder: Box::new(SilentRecorder::default()),
            history: Some(AttemptLog::open_in_memory().unwrap()),
        };
        App::new(plan, host, Rc::new(RefCell::new(MemorySessionStorage::default())))
    }

    #[test]
    fn muted_narration_goes_straight_to_recording() {
        let mut app = app(Mode::TextToSpeech, false);
        let t0 = Instant::now();
        app.on_event(key(KeyCode::Enter), t0);
        assert_eq!(app.session.status(), Status::Recording);
        assert!(app.remaining(t0).is_some());
    }

    #[test]
    fn countdown_expiry_commits_and_advances() {
        let mut app = app(Mode::TextToSpeech, false);
        let t0 = Instant::now();
        app.on_event(key(KeyCode::Enter), t0);
        let window = Duration::from_millis(app.session.current_step_duration_ms());
        app.on_tick(t0 + window);
        assert_eq!(app.session.recorded_count(), 1);
        assert_eq!(app.session.current_step(), 1);
        assert_eq!(app.session.status(), Status::Recording);
    }

    #[test]
    fn finishing_shows_results_from_storage() {
        let mut app = app(Mode::Human, false);
        let t0 = Instant::now();
        app.on_event(key(KeyCode::Enter), t0);
        assert_eq!(app.session.status(), Status::Ready);
        app.on_event(key(KeyCode::Enter), t0);
        app.on_event(key(KeyCode::Char('f')), t0 + Duration::from_secs(5));
        assert_eq!(app.state, AppState::Results);
        let result = app.result().unwrap();
        assert_eq!(result.recorded_count(), 1);
    }

    #[test]
    fn escape_under_lockdown_asks_for_confirmation() {
        let mut app = app(Mode::TextToSpeech, true);
        let t0 = Instant::now();
        app.on_event(key(KeyCode::Enter), t0);
        assert!(app.is_locked_down());
        app.on_event(key(KeyCode::Esc), t0);
        assert_eq!(app.state, AppState::ConfirmExit);
        assert!(!app.should_quit());

        app.on_event(key(KeyCode::Char('n')), t0);
        assert_eq!(app.state, AppState::Session);

        app.on_event(key(KeyCode::Esc), t0);
        app.on_event(key(KeyCode::Char('y')), t0);
        assert_eq!(app.state, AppState::Session);
        assert_eq!(app.session.status(), Status::Recording);
        assert!(app.is_locked_down());

        let window = Duration::from_millis(app.session.current_step_duration_ms());
        app.on_tick(t0 + window);
        assert_eq!(app.state, AppState::Results);
        assert!(!app.is_locked_down());
    }

    #[test]
    fn finish_lets_the_answer_run_out() {
        let mut app = app(Mode::TextToSpeech, false);
        let t0 = Instant::now();
        app.on_event(key(KeyCode::Enter), t0);
        let window = Duration::from_millis(app.session.current_step_duration_ms());

        app.on_event(key(KeyCode::Char('f')), t0 + Duration::from_secs(1));
        assert_eq!(app.session.status(), Status::Recording);
        assert!(app.session.finish_requested());
        assert!(app.notice.is_some());

        app.on_tick(t0 + window - Duration::from_millis(1));
        assert_eq!(app.session.status(), Status::Recording);
        app.on_tick(t0 + window);
        assert_eq!(app.session.status(), Status::Finished);
        assert_eq!(app.state, AppState::Results);
        let result = app.result().unwrap();
        assert_eq!(result.recorded_count(), 1);
        assert!(result.recording_results[0].is_some());
    }

    /// Claims a capture is running but can never stop it
    struct Stuck;

    impl Recorder for Stuck {
        fn is_supported(&self) -> bool {
            true
        }
        fn is_recording(&self) -> bool {
            true
        }
        fn start(&mut self, _now: Instant) -> Result<(), RecorderError> {
            Ok(())
        }
        fn stop(&mut self, _now: Instant) -> Result<AudioBlob, RecorderError> {
            Err(RecorderError::NotRecording)
        }
    }

    #[test]
    fn leaving_survives_a_recorder_that_cannot_stop() {
        let mut app = app(Mode::TextToSpeech, true);
        app.recorder = Box::new(Stuck);
        let t0 = Instant::now();
        app.on_event(key(KeyCode::Enter), t0);
        assert!(app.is_locked_down());

        app.abandon(t0);
        assert!(!app.is_locked_down());
        assert_eq!(app.surface().listener_count(), 0);
    }

    #[test]
    fn escape_without_lockdown_quits() {
        let mut app = app(Mode::TextToSpeech, false);
        app.on_event(key(KeyCode::Esc), Instant::now());
        assert!(app.should_quit());
    }

    #[test]
    fn back_navigation_is_held_under_lockdown() {
        let mut app = app(Mode::TextToSpeech, true);
        let t0 = Instant::now();
        app.on_event(key(KeyCode::Enter), t0);
        let back = AppEvent::Key(KeyEvent::new(KeyCode::Left, KeyModifiers::ALT));
        app.on_event(back, t0);
        assert!(!app.should_quit());
        assert_eq!(app.state, AppState::ConfirmExit);
        assert_eq!(app.surface().guard_depth(), 1);
    }

    #[test]
    fn restart_runs_the_same_test_again() {
        let mut app = app(Mode::Human, false);
        let t0 = Instant::now();
        app.on_event(key(KeyCode::Enter), t0);
        app.on_event(key(KeyCode::Char('f')), t0);
        assert_eq!(app.state, AppState::Results);
        app.on_event(key(KeyCode::Char('r')), t0);
        assert_eq!(app.state, AppState::Session);
        assert_eq!(app.session.status(), Status::Idle);
        assert_eq!(app.session.test_id(), Some("speaking-sample"));
    }
}
