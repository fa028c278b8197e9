pub mod app;
pub mod app_dirs;
pub mod config;
pub mod history;
pub mod host;
pub mod lockdown;
pub mod runtime;
pub mod speaking;
pub mod ui;
pub mod util;

pub use app::{App, AppState, HostKit, SessionPlan};
