//! Proctored-session lockdown: blocks shortcuts, clipboard and navigation,
//! and reports exit attempts while a timed mock test is running.
//!
//! [`machine::Lockdown`] is the pure reducer; [`controller::LockdownController`]
//! binds it to a host [`controller::EventSurface`] and fullscreen API.

pub mod controller;
pub mod event;
pub mod fullscreen;
pub mod gesture;
pub mod keys;
pub mod machine;

pub use controller::{EventSurface, ListenerId, LockdownController, LockdownGuard};
pub use event::{ClipboardAction, Disposition, ListenerKind, LockdownEvent};
pub use fullscreen::{FullscreenApi, FullscreenError, FullscreenWatcher};
pub use keys::{Key, KeyChord};
