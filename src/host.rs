//! Terminal bindings for the lockdown: the alternate screen plays the part of
//! fullscreen, a guard-entry counter plays the part of browser history, and
//! terminal input is translated into lockdown events.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, IsTerminal};
use std::rc::Rc;

use crossterm::event::{KeyCode, KeyModifiers, MouseButton, MouseEventKind};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};

use crate::lockdown::{
    ClipboardAction, EventSurface, FullscreenApi, FullscreenError, KeyChord, ListenerId,
    ListenerKind, LockdownEvent,
};
use crate::runtime::AppEvent;

#[derive(Debug, Default)]
struct SurfaceState {
    next_id: u64,
    listeners: HashMap<ListenerId, ListenerKind>,
    guard_depth: usize,
    pending_route: Option<String>,
}

/// Shared handle: the controller owns one clone, the app loop another
#[derive(Debug, Clone, Default)]
pub struct TerminalSurface(Rc<RefCell<SurfaceState>>);

impl TerminalSurface {
    pub fn is_listening(&self, kind: ListenerKind) -> bool {
        self.0.borrow().listeners.values().any(|k| *k == kind)
    }

    pub fn listener_count(&self) -> usize {
        self.0.borrow().listeners.len()
    }

    pub fn guard_depth(&self) -> usize {
        self.0.borrow().guard_depth
    }

    /// Back navigation: drop the newest guard entry. Returns false when there
    /// was nothing left to go back through.
    pub fn go_back(&self) -> bool {
        let mut state = self.0.borrow_mut();
        if state.guard_depth == 0 {
            return false;
        }
        state.guard_depth -= 1;
        true
    }

    pub fn take_navigation(&self) -> Option<String> {
        self.0.borrow_mut().pending_route.take()
    }
}

impl EventSurface for TerminalSurface {
    fn add_listener(&mut self, kind: ListenerKind) -> ListenerId {
        let mut state = self.0.borrow_mut();
        state.next_id += 1;
        let id = ListenerId(state.next_id);
        state.listeners.insert(id, kind);
        id
    }

    fn remove_listener(&mut self, id: ListenerId) {
        self.0.borrow_mut().listeners.remove(&id);
    }

    fn push_guard_entry(&mut self) {
        self.0.borrow_mut().guard_depth += 1;
    }

    fn navigate(&mut self, route: &str) {
        log::info!("navigating to {route}");
        self.0.borrow_mut().pending_route = Some(route.to_string());
    }
}

/// The terminal's alternate screen standing in for fullscreen
#[derive(Debug, Default)]
pub struct AlternateScreen {
    active: bool,
}

impl AlternateScreen {
    /// For a screen the caller already switched to
    pub fn entered() -> Self {
        Self { active: true }
    }
}

impl FullscreenApi for AlternateScreen {
    fn is_supported(&self) -> bool {
        io::stdout().is_terminal()
    }

    fn is_fullscreen(&self) -> bool {
        self.active
    }

    fn request(&mut self) -> Result<(), FullscreenError> {
        if self.active {
            return Ok(());
        }
        execute!(io::stdout(), EnterAlternateScreen)
            .map_err(|e| FullscreenError::Denied(e.to_string()))?;
        self.active = true;
        Ok(())
    }

    fn exit(&mut self) -> Result<(), FullscreenError> {
        if !self.active {
            return Ok(());
        }
        execute!(io::stdout(), LeaveAlternateScreen)
            .map_err(|e| FullscreenError::Denied(e.to_string()))?;
        self.active = false;
        Ok(())
    }
}

/// Alt+Left, the usual "back" shortcut
pub fn is_back_navigation(ev: &AppEvent) -> bool {
    matches!(ev, AppEvent::Key(k) if k.code == KeyCode::Left && k.modifiers.contains(KeyModifiers::ALT))
}

/// Translate terminal input into the lockdown's vocabulary. Back navigation is
/// handled by the caller (it has to pop a guard entry first), so it is not
/// mapped here.
pub fn to_lockdown_event(ev: &AppEvent) -> Option<LockdownEvent> {
    match ev {
        AppEvent::Key(_) if is_back_navigation(ev) => None,
        AppEvent::Key(k) => Some(LockdownEvent::KeyDown(KeyChord::from(*k))),
        AppEvent::Paste(_) => Some(LockdownEvent::Clipboard(ClipboardAction::Paste)),
        AppEvent::FocusLost => Some(LockdownEvent::WindowBlur),
        AppEvent::Mouse(m) => match m.kind {
            MouseEventKind::ScrollLeft => Some(LockdownEvent::Wheel {
                delta_x: -1.0,
                delta_y: 0.0,
                scroll_left: 0.0,
            }),
            MouseEventKind::Down(MouseButton::Right) => Some(LockdownEvent::ContextMenu),
            _ => None,
        },
        AppEvent::FocusGained | AppEvent::Resize | AppEvent::Tick => None,
    }
}
