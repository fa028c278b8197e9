use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FullscreenError {
    #[error("fullscreen is not supported by this host")]
    Unsupported,
    #[error("fullscreen request denied: {0}")]
    Denied(String),
}

/// Host fullscreen capability.
///
/// Requests are fire-and-forget: `Ok` only means the request was issued. The
/// actual state change is confirmed later by a `FullscreenChange` event.
pub trait FullscreenApi {
    fn is_supported(&self) -> bool;
    fn is_fullscreen(&self) -> bool;
    fn request(&mut self) -> Result<(), FullscreenError>;
    fn exit(&mut self) -> Result<(), FullscreenError>;
}

/// Watches fullscreen transitions and reports user exits.
///
/// The first observed transition is the mount-time one and is ignored. Every
/// later fullscreen -> windowed transition is an exit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FullscreenWatcher {
    entered: bool,
    exited_by_user: bool,
    seen_first: bool,
}

impl FullscreenWatcher {
    pub fn new(initially_fullscreen: bool) -> Self {
        Self {
            entered: initially_fullscreen,
            exited_by_user: false,
            seen_first: false,
        }
    }

    /// Feed a fullscreen change. Returns true when it counts as a user exit.
    pub fn observe(&mut self, fullscreen: bool) -> bool {
        let was = self.entered;
        self.entered = fullscreen;
        if !self.seen_first {
            self.seen_first = true;
            return false;
        }
        let exited = was && !fullscreen;
        if exited {
            self.exited_by_user = true;
        } else if fullscreen {
            self.exited_by_user = false;
        }
        exited
    }

    pub fn is_fullscreen(&self) -> bool {
        self.entered
    }

    pub fn exited_by_user(&self) -> bool {
        self.exited_by_user
    }
}
