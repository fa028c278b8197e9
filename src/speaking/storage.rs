use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::{Prompt, RecordingResult};

/// Session-storage key the results screen reads the finished attempt from
pub const RESULT_KEY: &str = "speakingTestResult";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no session storage attached")]
    Unavailable,
    #[error("session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("session storage payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Key/value storage that lives only as long as the practice session
pub trait SessionStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&mut self, key: &str) -> Result<(), StorageError>;
}

impl<S: SessionStorage> SessionStorage for Rc<RefCell<S>> {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.borrow().get_item(key)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.borrow_mut().set_item(key, value)
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
        self.borrow_mut().remove_item(key)
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    items: HashMap<String, String>,
}

impl SessionStorage for MemorySessionStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
        self.items.remove(key);
        Ok(())
    }
}

/// One JSON file per key in a scratch directory. `clear` wipes it, which the
/// binary does on startup so nothing outlives a run.
#[derive(Debug, Clone)]
pub struct FileSessionStorage {
    dir: PathBuf,
}

impl FileSessionStorage {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
        }
        Ok(())
    }
}

impl SessionStorage for FileSessionStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// What the results screen needs to render a finished attempt
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedResult {
    pub test_id: Option<String>,
    pub questions: Vec<Prompt>,
    pub recording_results: Vec<Option<RecordingResult>>,
    /// RFC 3339
    pub completed_at: String,
}

impl PersistedResult {
    pub fn save(&self, storage: &mut dyn SessionStorage) -> Result<(), StorageError> {
        let json = serde_json::to_string(self)?;
        storage.set_item(RESULT_KEY, &json)
    }

    pub fn load(storage: &dyn SessionStorage) -> Result<Option<Self>, StorageError> {
        match storage.get_item(RESULT_KEY)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn recorded_count(&self) -> usize {
        self.recording_results.iter().flatten().count()
    }
}
