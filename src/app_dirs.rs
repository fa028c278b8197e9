use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "ielts-coach";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// `$HOME/.local/state/ielts-coach`, or the platform data dir without a HOME
    pub fn state_dir() -> PathBuf {
        if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".local")
                .join("state")
                .join(APP_NAME)
        } else if let Some(proj_dirs) = ProjectDirs::from("", "", APP_NAME) {
            proj_dirs.data_local_dir().to_path_buf()
        } else {
            PathBuf::from(format!(".{APP_NAME}"))
        }
    }

    pub fn db_path() -> PathBuf {
        Self::state_dir().join("attempts.db")
    }

    /// Scratch directory backing session storage; wiped on every start
    pub fn session_dir() -> PathBuf {
        Self::state_dir().join("session")
    }

    pub fn log_path() -> PathBuf {
        Self::state_dir().join("ielts-coach.log")
    }

    pub fn config_path() -> PathBuf {
        ProjectDirs::from("", "", APP_NAME)
            .map(|pd| pd.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("ielts_coach_config.json"))
    }
}
