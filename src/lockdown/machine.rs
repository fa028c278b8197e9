use std::time::{Duration, Instant};

use super::event::{ClipboardAction, Command, Disposition, LockdownEvent, Reaction};
use super::fullscreen::FullscreenWatcher;
use super::gesture::{is_back_scroll, SwipeTracker};
use super::keys::{is_blocked_shortcut, is_bypass_follow, is_bypass_lead, Key, KeyChord};

/// Shift+1 and 2 must both land inside this window
pub const BYPASS_SEQUENCE_WINDOW: Duration = Duration::from_millis(1000);
/// How long an armed bypass stays valid
pub const BYPASS_HOLD: Duration = Duration::from_millis(200);
/// Route the developer bypass navigates to
pub const SAFE_ROUTE: &str = "/dashboard";

/// Inputs accepted by the lockdown reducer
#[derive(Clone, Debug, PartialEq)]
pub enum Input {
    Activate { fullscreen: bool },
    Deactivate,
    ArmBypass,
    Event(LockdownEvent),
}

/// Lockdown state. `Active` carries everything that must be discarded on
/// deactivation, so reactivating always starts from a clean slate.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Lockdown {
    #[default]
    Inactive,
    Active(Guarded),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Guarded {
    bypass_until: Option<Instant>,
    sequence_lead_at: Option<Instant>,
    swipe: SwipeTracker,
    watcher: FullscreenWatcher,
}

impl Lockdown {
    pub fn is_active(&self) -> bool {
        matches!(self, Lockdown::Active(_))
    }

    pub fn is_bypass_armed(&self, now: Instant) -> bool {
        match self {
            Lockdown::Active(g) => g.bypass_armed(now),
            Lockdown::Inactive => false,
        }
    }

    pub fn watcher(&self) -> Option<&FullscreenWatcher> {
        match self {
            Lockdown::Active(g) => Some(&g.watcher),
            Lockdown::Inactive => None,
        }
    }

    /// Single reducer for every lockdown input
    pub fn transition(&mut self, input: Input, now: Instant) -> Reaction {
        match (std::mem::take(self), input) {
            (Lockdown::Inactive, Input::Activate { fullscreen }) => {
                log::debug!("lockdown engaged (fullscreen={fullscreen})");
                *self = Lockdown::Active(Guarded::new(fullscreen));
                Reaction::proceed().with(Command::PushGuardEntry)
            }
            (active @ Lockdown::Active(_), Input::Activate { .. }) => {
                *self = active;
                Reaction::proceed()
            }
            (previous, Input::Deactivate) => {
                if previous.is_active() {
                    log::debug!("lockdown released");
                }
                Reaction::proceed()
            }
            (Lockdown::Active(mut guarded), Input::ArmBypass) => {
                guarded.arm_bypass(now);
                *self = Lockdown::Active(guarded);
                Reaction::proceed()
            }
            (Lockdown::Active(mut guarded), Input::Event(event)) => {
                let reaction = guarded.react(event, now);
                *self = Lockdown::Active(guarded);
                reaction
            }
            (Lockdown::Inactive, Input::ArmBypass | Input::Event(_)) => Reaction::proceed(),
        }
    }
}

impl Guarded {
    fn new(fullscreen: bool) -> Self {
        Self {
            bypass_until: None,
            sequence_lead_at: None,
            swipe: SwipeTracker::default(),
            watcher: FullscreenWatcher::new(fullscreen),
        }
    }

    fn bypass_armed(&self, now: Instant) -> bool {
        self.bypass_until.is_some_and(|until| now < until)
    }

    fn arm_bypass(&mut self, now: Instant) {
        log::info!("developer bypass armed");
        self.bypass_until = Some(now + BYPASS_HOLD);
    }

    fn react(&mut self, event: LockdownEvent, now: Instant) -> Reaction {
        if self.bypass_until.is_some() && !self.bypass_armed(now) {
            self.bypass_until = None;
        }
        let bypassed = self.bypass_armed(now);

        match event {
            LockdownEvent::KeyDown(chord) => self.on_key(chord, now),
            LockdownEvent::Clipboard(
                ClipboardAction::Copy | ClipboardAction::Cut | ClipboardAction::Paste,
            )
            | LockdownEvent::ContextMenu => Reaction::prevent(),
            LockdownEvent::VisibilityHidden | LockdownEvent::WindowBlur => {
                report_unless(bypassed, Reaction::proceed())
            }
            LockdownEvent::BeforeUnload if bypassed => Reaction::proceed(),
            LockdownEvent::BeforeUnload => Reaction {
                disposition: Disposition::ConfirmUnload,
                ..Reaction::proceed()
            },
            LockdownEvent::PopState if bypassed => {
                // one navigation gets through, then the guard is back
                self.bypass_until = None;
                Reaction::proceed()
            }
            LockdownEvent::PopState => Reaction::proceed()
                .reported()
                .with(Command::PushGuardEntry),
            LockdownEvent::TouchStart { x, y } => {
                self.swipe.touch_start(x, y);
                Reaction::proceed()
            }
            LockdownEvent::TouchMove { x, y } => {
                if self.swipe.touch_move(x, y) {
                    Reaction::prevent()
                } else {
                    Reaction::proceed()
                }
            }
            LockdownEvent::TouchEnd => {
                self.swipe.touch_end();
                Reaction::proceed()
            }
            LockdownEvent::Wheel {
                delta_x,
                delta_y,
                scroll_left,
            } => {
                if is_back_scroll(delta_x, delta_y, scroll_left) {
                    Reaction::prevent()
                } else {
                    Reaction::proceed()
                }
            }
            LockdownEvent::FullscreenChange { fullscreen } => {
                if self.watcher.observe(fullscreen) {
                    report_unless(bypassed, Reaction::proceed())
                } else {
                    Reaction::proceed()
                }
            }
        }
    }

    fn on_key(&mut self, chord: KeyChord, now: Instant) -> Reaction {
        if is_bypass_lead(&chord) {
            self.sequence_lead_at = Some(now);
            return Reaction::proceed();
        }

        if is_bypass_follow(&chord) {
            let lead = self.sequence_lead_at.take();
            if lead.is_some_and(|at| now.duration_since(at) <= BYPASS_SEQUENCE_WINDOW) {
                self.arm_bypass(now);
                return Reaction::proceed().with(Command::Navigate(SAFE_ROUTE.to_string()));
            }
        } else if chord.key != Key::Other {
            self.sequence_lead_at = None;
        }

        if chord.key == Key::Escape {
            return if self.bypass_armed(now) {
                Reaction::proceed()
            } else {
                Reaction::prevent().reported()
            };
        }

        if is_blocked_shortcut(&chord) {
            Reaction::prevent()
        } else {
            Reaction::proceed()
        }
    }
}

fn report_unless(bypassed: bool, reaction: Reaction) -> Reaction {
    if bypassed {
        reaction
    } else {
        reaction.reported()
    }
}
