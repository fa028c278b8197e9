use std::ops::{Deref, DerefMut};
use std::time::Instant;

use super::event::{Command, Disposition, ListenerKind, LockdownEvent, Reaction};
use super::fullscreen::FullscreenApi;
use super::machine::{Input, Lockdown};

/// Opaque handle for a registered listener
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// The host's global event surface: listener registration plus the history
/// and navigation side effects the lockdown needs.
pub trait EventSurface {
    /// Register a capture-phase listener for `kind`
    fn add_listener(&mut self, kind: ListenerKind) -> ListenerId;
    fn remove_listener(&mut self, id: ListenerId);
    fn push_guard_entry(&mut self);
    fn navigate(&mut self, route: &str);
}

type ExitHandler = Box<dyn FnMut()>;

/// Binds the lockdown reducer to a host surface.
///
/// The fullscreen API is captured at construction and kept apart from the
/// event surface, so `force_fullscreen` keeps working even if something else
/// wraps or intercepts the surface later.
pub struct LockdownController {
    machine: Lockdown,
    surface: Box<dyn EventSurface>,
    fullscreen: Box<dyn FullscreenApi>,
    listeners: Vec<ListenerId>,
    on_exit_attempt: Option<ExitHandler>,
}

impl LockdownController {
    pub fn new(surface: Box<dyn EventSurface>, fullscreen: Box<dyn FullscreenApi>) -> Self {
        Self {
            machine: Lockdown::default(),
            surface,
            fullscreen,
            listeners: Vec::new(),
            on_exit_attempt: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.machine.is_active()
    }

    /// Begin enforcement. Calling this while active only swaps the callback.
    pub fn activate(&mut self, on_exit_attempt: impl FnMut() + 'static) {
        self.on_exit_attempt = Some(Box::new(on_exit_attempt));
        if self.machine.is_active() {
            return;
        }

        let fullscreen = self.fullscreen.is_supported() && self.fullscreen.is_fullscreen();
        let reaction = self
            .machine
            .transition(Input::Activate { fullscreen }, Instant::now());
        self.listeners = ListenerKind::ALL
            .iter()
            .map(|kind| self.surface.add_listener(*kind))
            .collect();
        self.run_commands(&reaction);
    }

    /// Activate and return a guard that deactivates when dropped
    pub fn scoped(&mut self, on_exit_attempt: impl FnMut() + 'static) -> LockdownGuard<'_> {
        self.activate(on_exit_attempt);
        LockdownGuard { controller: self }
    }

    /// Remove every listener and drop all pending lockdown state
    pub fn deactivate(&mut self) {
        for id in self.listeners.drain(..) {
            self.surface.remove_listener(id);
        }
        self.machine.transition(Input::Deactivate, Instant::now());
        self.on_exit_attempt = None;
    }

    /// Re-enter fullscreen. Failures are logged, never propagated; the
    /// outcome is confirmed by a later `FullscreenChange` event.
    pub fn force_fullscreen(&mut self) {
        if !self.fullscreen.is_supported() {
            log::warn!("fullscreen unavailable on this host, not forcing it");
            return;
        }
        if let Err(e) = self.fullscreen.request() {
            log::warn!("could not re-enter fullscreen: {e}");
        }
    }

    pub fn arm_bypass(&mut self) {
        self.arm_bypass_at(Instant::now());
    }

    pub fn arm_bypass_at(&mut self, now: Instant) {
        self.machine.transition(Input::ArmBypass, now);
    }

    pub fn is_bypass_armed(&self) -> bool {
        self.is_bypass_armed_at(Instant::now())
    }

    pub fn is_bypass_armed_at(&self, now: Instant) -> bool {
        self.machine.is_bypass_armed(now)
    }

    pub fn fullscreen_exited_by_user(&self) -> bool {
        self.machine
            .watcher()
            .is_some_and(|w| w.exited_by_user())
    }

    /// Feed a host event observed at `now`. Returns what the host should do
    /// with the event's default action.
    pub fn dispatch(&mut self, event: LockdownEvent, now: Instant) -> Disposition {
        if !self.machine.is_active() {
            return Disposition::Proceed;
        }
        let reaction = self.machine.transition(Input::Event(event), now);
        self.run_commands(&reaction);
        if reaction.report_exit {
            if let Some(handler) = self.on_exit_attempt.as_mut() {
                handler();
            }
        }
        reaction.disposition
    }

    fn run_commands(&mut self, reaction: &Reaction) {
        for command in &reaction.commands {
            match command {
                Command::PushGuardEntry => self.surface.push_guard_entry(),
                Command::Navigate(route) => self.surface.navigate(route),
            }
        }
    }
}

impl Drop for LockdownController {
    fn drop(&mut self) {
        if self.machine.is_active() {
            self.deactivate();
        }
    }
}

/// Scoped activation; deactivates the controller on drop
pub struct LockdownGuard<'a> {
    controller: &'a mut LockdownController,
}

impl Deref for LockdownGuard<'_> {
    type Target = LockdownController;

    fn deref(&self) -> &Self::Target {
        self.controller
    }
}

impl DerefMut for LockdownGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.controller
    }
}

impl Drop for LockdownGuard<'_> {
    fn drop(&mut self) {
        self.controller.deactivate();
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use crate::lockdown::fullscreen::FullscreenError;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    pub struct SurfaceLog {
        pub next_id: u64,
        pub listeners: HashMap<ListenerId, ListenerKind>,
        pub history: Vec<String>,
        pub navigations: Vec<String>,
    }

    impl SurfaceLog {
        pub fn listening(&self, kind: ListenerKind) -> usize {
            self.listeners.values().filter(|k| **k == kind).count()
        }

        /// Simulate the browser's back button
        pub fn go_back(&mut self) {
            self.history.pop();
        }
    }

    #[derive(Clone, Default)]
    pub struct FakeSurface(pub Rc<RefCell<SurfaceLog>>);

    impl EventSurface for FakeSurface {
        fn add_listener(&mut self, kind: ListenerKind) -> ListenerId {
            let mut log = self.0.borrow_mut();
            log.next_id += 1;
            let id = ListenerId(log.next_id);
            log.listeners.insert(id, kind);
            id
        }

        fn remove_listener(&mut self, id: ListenerId) {
            self.0.borrow_mut().listeners.remove(&id);
        }

        fn push_guard_entry(&mut self) {
            self.0.borrow_mut().history.push("guard".to_string());
        }

        fn navigate(&mut self, route: &str) {
            self.0.borrow_mut().navigations.push(route.to_string());
        }
    }

    #[derive(Debug, Default)]
    pub struct ScreenLog {
        pub supported: bool,
        pub fullscreen: bool,
        pub deny: bool,
        pub requests: usize,
    }

    #[derive(Clone)]
    pub struct FakeFullscreen(pub Rc<RefCell<ScreenLog>>);

    impl FakeFullscreen {
        pub fn supported() -> Self {
            Self(Rc::new(RefCell::new(ScreenLog {
                supported: true,
                ..ScreenLog::default()
            })))
        }
    }

    impl FullscreenApi for FakeFullscreen {
        fn is_supported(&self) -> bool {
            self.0.borrow().supported
        }

        fn is_fullscreen(&self) -> bool {
            self.0.borrow().fullscreen
        }

        fn request(&mut self) -> Result<(), FullscreenError> {
            let mut log = self.0.borrow_mut();
            log.requests += 1;
            if log.deny {
                return Err(FullscreenError::Denied("needs a user gesture".into()));
            }
            log.fullscreen = true;
            Ok(())
        }

        fn exit(&mut self) -> Result<(), FullscreenError> {
            self.0.borrow_mut().fullscreen = false;
            Ok(())
        }
    }
}
