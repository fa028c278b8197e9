use std::fs;
use std::path::{Path, PathBuf};

use include_dir::{include_dir, Dir};
use serde_json::Value;
use thiserror::Error;

use super::model::{parts_from_value, Part};

static FIXTURE_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/fixtures");

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no parts found for test '{0}'")]
    UnknownTest(String),
    #[error("could not read parts: {0}")]
    Io(#[from] std::io::Error),
    #[error("parts are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Supplies the parts of a speaking test. Shape problems inside a payload are
/// tolerated (see [`parts_from_value`]); only missing or unreadable payloads
/// are errors.
pub trait PartsSource {
    fn parts_for_test(&self, test_id: &str) -> Result<Vec<Part>, SourceError>;
}

/// Sample tests compiled into the binary, for development and demos
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureSource;

impl FixtureSource {
    pub fn test_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = FIXTURE_DIR
            .files()
            .filter_map(|f| f.path().file_stem())
            .filter_map(|s| s.to_str())
            .map(str::to_string)
            .collect();
        ids.sort();
        ids
    }
}

impl PartsSource for FixtureSource {
    fn parts_for_test(&self, test_id: &str) -> Result<Vec<Part>, SourceError> {
        let file = FIXTURE_DIR
            .get_file(format!("{test_id}.json"))
            .ok_or_else(|| SourceError::UnknownTest(test_id.to_string()))?;
        let contents = file
            .contents_utf8()
            .ok_or_else(|| SourceError::UnknownTest(test_id.to_string()))?;
        let value: Value = serde_json::from_str(contents)?;
        Ok(parts_from_value(&value))
    }
}

/// Reads `<root>/<test_id>.json` from disk
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    root: PathBuf,
}

impl JsonFileSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Source and test id for a single parts file given on the command line
    pub fn for_file<P: AsRef<Path>>(path: P) -> Option<(Self, String)> {
        let path = path.as_ref();
        let test_id = path.file_stem()?.to_str()?.to_string();
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Some((Self { root }, test_id))
    }
}

impl PartsSource for JsonFileSource {
    fn parts_for_test(&self, test_id: &str) -> Result<Vec<Part>, SourceError> {
        let path = self.root.join(format!("{test_id}.json"));
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::UnknownTest(test_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let value: Value = serde_json::from_slice(&bytes)?;
        Ok(parts_from_value(&value))
    }
}
