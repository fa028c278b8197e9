use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use ielts_coach::host::TerminalSurface;
use ielts_coach::lockdown::machine::SAFE_ROUTE;
use ielts_coach::lockdown::{
    ClipboardAction, Disposition, FullscreenApi, FullscreenError, Key, KeyChord, ListenerKind,
    LockdownController, LockdownEvent,
};

#[derive(Default)]
struct ScreenState {
    fullscreen: bool,
    deny: bool,
    requests: u32,
}

#[derive(Clone, Default)]
struct Screen(Rc<RefCell<ScreenState>>);

impl FullscreenApi for Screen {
    fn is_supported(&self) -> bool {
        true
    }
    fn is_fullscreen(&self) -> bool {
        self.0.borrow().fullscreen
    }
    fn request(&mut self) -> Result<(), FullscreenError> {
        let mut s = self.0.borrow_mut();
        s.requests += 1;
        if s.deny {
            return Err(FullscreenError::Denied("no gesture".into()));
        }
        s.fullscreen = true;
        Ok(())
    }
    fn exit(&mut self) -> Result<(), FullscreenError> {
        self.0.borrow_mut().fullscreen = false;
        Ok(())
    }
}

fn setup() -> (LockdownController, TerminalSurface, Screen) {
    let surface = TerminalSurface::default();
    let screen = Screen::default();
    let controller = LockdownController::new(Box::new(surface.clone()), Box::new(screen.clone()));
    (controller, surface, screen)
}

fn exit_counter() -> (Rc<Cell<u32>>, impl FnMut() + 'static) {
    let hits = Rc::new(Cell::new(0));
    let h = Rc::clone(&hits);
    (hits, move || h.set(h.get() + 1))
}

fn key(c: char) -> LockdownEvent {
    LockdownEvent::KeyDown(KeyChord::plain(Key::Char(c)))
}

#[test]
fn idempotent_activation_and_full_teardown() {
    let (mut c, surface, _) = setup();
    let (hits, on_exit) = exit_counter();
    c.activate(on_exit);
    let (_, again) = exit_counter();
    c.activate(again);

    assert_eq!(surface.listener_count(), ListenerKind::ALL.len());
    assert_eq!(surface.guard_depth(), 1);

    c.deactivate();
    assert_eq!(surface.listener_count(), 0);
    assert_eq!(
        c.dispatch(LockdownEvent::KeyDown(KeyChord::plain(Key::Escape)), Instant::now()),
        Disposition::Proceed
    );
    assert_eq!(hits.get(), 0);
}

#[test]
fn escape_is_blocked_and_reported_once_per_press() {
    let (mut c, _, _) = setup();
    let (hits, on_exit) = exit_counter();
    c.activate(on_exit);
    let now = Instant::now();

    for _ in 0..3 {
        let d = c.dispatch(LockdownEvent::KeyDown(KeyChord::plain(Key::Escape)), now);
        assert_eq!(d, Disposition::Prevent);
    }
    assert_eq!(hits.get(), 3);
}

#[test]
fn clipboard_shortcuts_and_devtools_are_swallowed_silently() {
    let (mut c, _, _) = setup();
    let (hits, on_exit) = exit_counter();
    c.activate(on_exit);
    let now = Instant::now();

    for letter in ['c', 'v', 'x', 'a', 's', 'p', 'f', 'u'] {
        assert_eq!(
            c.dispatch(LockdownEvent::KeyDown(KeyChord::ctrl(Key::Char(letter))), now),
            Disposition::Prevent,
            "ctrl+{letter}"
        );
    }
    assert_eq!(
        c.dispatch(
            LockdownEvent::KeyDown(KeyChord::meta(Key::Char('i')).shifted()),
            now
        ),
        Disposition::Prevent
    );
    assert_eq!(
        c.dispatch(LockdownEvent::KeyDown(KeyChord::plain(Key::F(12))), now),
        Disposition::Prevent
    );
    assert_eq!(
        c.dispatch(LockdownEvent::Clipboard(ClipboardAction::Copy), now),
        Disposition::Prevent
    );
    assert_eq!(c.dispatch(LockdownEvent::ContextMenu, now), Disposition::Prevent);
    assert_eq!(c.dispatch(key('h'), now), Disposition::Proceed);
    assert_eq!(hits.get(), 0);
}

#[test]
fn back_navigation_is_undone_and_reported() {
    let (mut c, surface, _) = setup();
    let (hits, on_exit) = exit_counter();
    c.activate(on_exit);
    let now = Instant::now();

    for n in 1..=3 {
        assert!(surface.go_back());
        c.dispatch(LockdownEvent::PopState, now);
        assert_eq!(surface.guard_depth(), 1);
        assert_eq!(hits.get(), n);
    }
}

#[test]
fn bypass_sequence_within_the_window_goes_to_the_dashboard() {
    let (mut c, surface, _) = setup();
    let (hits, on_exit) = exit_counter();
    c.activate(on_exit);
    let t0 = Instant::now();

    c.dispatch(
        LockdownEvent::KeyDown(KeyChord::plain(Key::Char('!')).shifted()),
        t0,
    );
    c.dispatch(key('2'), t0 + Duration::from_millis(900));

    assert_eq!(surface.take_navigation().as_deref(), Some(SAFE_ROUTE));
    assert!(c.is_bypass_armed_at(t0 + Duration::from_millis(1000)));

    // armed: the navigation it triggers is not an exit attempt
    assert!(surface.go_back());
    c.dispatch(LockdownEvent::PopState, t0 + Duration::from_millis(950));
    assert_eq!(hits.get(), 0);
    assert_eq!(surface.guard_depth(), 0);
}

#[test]
fn slow_bypass_sequence_does_nothing() {
    let (mut c, surface, _) = setup();
    let (_, on_exit) = exit_counter();
    c.activate(on_exit);
    let t0 = Instant::now();

    c.dispatch(
        LockdownEvent::KeyDown(KeyChord::plain(Key::Char('1')).shifted()),
        t0,
    );
    c.dispatch(key('2'), t0 + Duration::from_millis(1100));

    assert!(surface.take_navigation().is_none());
    assert!(!c.is_bypass_armed_at(t0 + Duration::from_millis(1100)));
}

#[test]
fn manual_bypass_expires() {
    let (mut c, _, _) = setup();
    let (hits, on_exit) = exit_counter();
    c.activate(on_exit);
    let t0 = Instant::now();

    c.arm_bypass_at(t0);
    assert!(c.is_bypass_armed_at(t0 + Duration::from_millis(100)));
    assert!(!c.is_bypass_armed_at(t0 + Duration::from_millis(250)));

    c.dispatch(LockdownEvent::WindowBlur, t0 + Duration::from_millis(250));
    assert_eq!(hits.get(), 1);
}

#[test]
fn leaving_fullscreen_is_reported_and_can_be_forced_back() {
    let (mut c, _, screen) = setup();
    screen.0.borrow_mut().fullscreen = true;
    let (hits, on_exit) = exit_counter();
    c.activate(on_exit);
    let now = Instant::now();

    // the first transition after mount is the host settling, not the user
    c.dispatch(LockdownEvent::FullscreenChange { fullscreen: true }, now);
    assert_eq!(hits.get(), 0);

    screen.0.borrow_mut().fullscreen = false;
    c.dispatch(LockdownEvent::FullscreenChange { fullscreen: false }, now);
    assert_eq!(hits.get(), 1);
    assert!(c.fullscreen_exited_by_user());

    c.force_fullscreen();
    assert!(screen.0.borrow().fullscreen);

    screen.0.borrow_mut().deny = true;
    screen.0.borrow_mut().fullscreen = false;
    c.force_fullscreen();
    assert_eq!(screen.0.borrow().requests, 2);
    assert!(!screen.0.borrow().fullscreen);
}

#[test]
fn unload_asks_for_confirmation() {
    let (mut c, _, _) = setup();
    let (_, on_exit) = exit_counter();
    c.activate(on_exit);
    assert_eq!(
        c.dispatch(LockdownEvent::BeforeUnload, Instant::now()),
        Disposition::ConfirmUnload
    );
}

#[test]
fn scoped_lockdown_ends_with_its_scope() {
    let (mut c, surface, _) = setup();
    {
        let (_, on_exit) = exit_counter();
        let guard = c.scoped(on_exit);
        assert!(guard.is_active());
        assert!(surface.is_listening(ListenerKind::KeyDown));
    }
    assert!(!c.is_active());
    assert_eq!(surface.listener_count(), 0);
}
