use super::keys::KeyChord;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipboardAction {
    Copy,
    Cut,
    Paste,
}

/// Host events the lockdown observes. Coordinates are in CSS-pixel-like units
/// relative to the left edge of the viewport.
#[derive(Clone, Debug, PartialEq)]
pub enum LockdownEvent {
    KeyDown(KeyChord),
    Clipboard(ClipboardAction),
    ContextMenu,
    VisibilityHidden,
    WindowBlur,
    BeforeUnload,
    PopState,
    TouchStart { x: f64, y: f64 },
    TouchMove { x: f64, y: f64 },
    TouchEnd,
    Wheel {
        delta_x: f64,
        delta_y: f64,
        scroll_left: f64,
    },
    FullscreenChange { fullscreen: bool },
}

/// Where a listener is attached on the host surface
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    Document,
    Window,
}

/// One capture-phase listener slot. The controller registers exactly one
/// listener per kind while active.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum ListenerKind {
    KeyDown,
    Copy,
    Cut,
    Paste,
    ContextMenu,
    VisibilityChange,
    Blur,
    BeforeUnload,
    PopState,
    TouchStart,
    TouchMove,
    TouchEnd,
    Wheel,
    FullscreenChange,
}

impl ListenerKind {
    pub const ALL: [ListenerKind; 14] = [
        ListenerKind::KeyDown,
        ListenerKind::Copy,
        ListenerKind::Cut,
        ListenerKind::Paste,
        ListenerKind::ContextMenu,
        ListenerKind::VisibilityChange,
        ListenerKind::Blur,
        ListenerKind::BeforeUnload,
        ListenerKind::PopState,
        ListenerKind::TouchStart,
        ListenerKind::TouchMove,
        ListenerKind::TouchEnd,
        ListenerKind::Wheel,
        ListenerKind::FullscreenChange,
    ];

    pub fn target(&self) -> Target {
        match self {
            ListenerKind::Blur | ListenerKind::BeforeUnload | ListenerKind::PopState => {
                Target::Window
            }
            _ => Target::Document,
        }
    }
}

impl LockdownEvent {
    pub fn listener_kind(&self) -> ListenerKind {
        match self {
            LockdownEvent::KeyDown(_) => ListenerKind::KeyDown,
            LockdownEvent::Clipboard(ClipboardAction::Copy) => ListenerKind::Copy,
            LockdownEvent::Clipboard(ClipboardAction::Cut) => ListenerKind::Cut,
            LockdownEvent::Clipboard(ClipboardAction::Paste) => ListenerKind::Paste,
            LockdownEvent::ContextMenu => ListenerKind::ContextMenu,
            LockdownEvent::VisibilityHidden => ListenerKind::VisibilityChange,
            LockdownEvent::WindowBlur => ListenerKind::Blur,
            LockdownEvent::BeforeUnload => ListenerKind::BeforeUnload,
            LockdownEvent::PopState => ListenerKind::PopState,
            LockdownEvent::TouchStart { .. } => ListenerKind::TouchStart,
            LockdownEvent::TouchMove { .. } => ListenerKind::TouchMove,
            LockdownEvent::TouchEnd => ListenerKind::TouchEnd,
            LockdownEvent::Wheel { .. } => ListenerKind::Wheel,
            LockdownEvent::FullscreenChange { .. } => ListenerKind::FullscreenChange,
        }
    }
}

/// What the host should do with the event's default action
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    Proceed,
    Prevent,
    /// Ask the host for its native "leave this page?" confirmation
    ConfirmUnload,
}

/// Side effects the reducer asks the integration boundary to perform
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    PushGuardEntry,
    Navigate(String),
}

/// Result of feeding one input to the lockdown reducer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reaction {
    pub disposition: Disposition,
    pub report_exit: bool,
    pub commands: Vec<Command>,
}

impl Reaction {
    pub fn proceed() -> Self {
        Self {
            disposition: Disposition::Proceed,
            report_exit: false,
            commands: Vec::new(),
        }
    }

    pub fn prevent() -> Self {
        Self {
            disposition: Disposition::Prevent,
            ..Self::proceed()
        }
    }

    pub fn reported(mut self) -> Self {
        self.report_exit = true;
        self
    }

    pub fn with(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn listener_kinds_are_unique() {
        let set: HashSet<_> = ListenerKind::ALL.iter().collect();
        assert_eq!(set.len(), ListenerKind::ALL.len());
    }

    #[test]
    fn window_level_listeners() {
        assert_eq!(ListenerKind::Blur.target(), Target::Window);
        assert_eq!(ListenerKind::PopState.target(), Target::Window);
        assert_eq!(ListenerKind::KeyDown.target(), Target::Document);
    }

    #[test]
    fn events_map_to_their_listener() {
        assert_eq!(
            LockdownEvent::Clipboard(ClipboardAction::Paste).listener_kind(),
            ListenerKind::Paste
        );
        assert_eq!(
            LockdownEvent::FullscreenChange { fullscreen: true }.listener_kind(),
            ListenerKind::FullscreenChange
        );
    }
}
