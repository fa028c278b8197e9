use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result};
use std::path::Path;

use crate::app_dirs::AppDirs;
use crate::speaking::{Mode, PersistedResult};
use crate::util::mean;

/// One finished speaking attempt
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub test_id: String,
    pub mode: Mode,
    pub questions: usize,
    pub recorded: usize,
    pub completed_at: DateTime<Utc>,
}

impl AttemptRecord {
    pub fn from_result(result: &PersistedResult, mode: Mode) -> Self {
        let completed_at = DateTime::parse_from_rfc3339(&result.completed_at)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        // human mode keeps one aggregate recording covering every question
        let recorded = match mode {
            Mode::Human if result.recorded_count() > 0 => result.questions.len(),
            _ => result.recorded_count(),
        };
        Self {
            test_id: result.test_id.clone().unwrap_or_default(),
            mode,
            questions: result.questions.len(),
            recorded,
            completed_at,
        }
    }

    /// Share of questions answered, 0..=100
    pub fn completion_pct(&self) -> f64 {
        if self.questions == 0 {
            return 0.0;
        }
        (self.recorded as f64 / self.questions as f64 * 100.0).round()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistorySummary {
    pub attempts: usize,
    pub avg_completion_pct: Option<f64>,
    pub by_mode: Vec<(Mode, usize)>,
}

/// SQLite log of finished attempts, the data behind `--history`
#[derive(Debug)]
pub struct AttemptLog {
    conn: Connection,
}

impl AttemptLog {
    /// Open the log at the default state location, creating it if needed
    pub fn open_default() -> Result<Self> {
        let path = AppDirs::db_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {}", e)),
                )
            })?;
        }
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS attempts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                test_id TEXT NOT NULL,
                mode TEXT NOT NULL,
                questions INTEGER NOT NULL,
                recorded INTEGER NOT NULL,
                completed_at TEXT NOT NULL
            )
            "#,
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_attempts_completed_at ON attempts(completed_at)",
            [],
        )?;
        Ok(Self { conn })
    }

    pub fn record(&self, attempt: &AttemptRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO attempts (test_id, mode, questions, recorded, completed_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                attempt.test_id,
                attempt.mode.to_string(),
                attempt.questions as i64,
                attempt.recorded as i64,
                attempt.completed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Most recent attempts first
    pub fn recent(&self, limit: usize) -> Result<Vec<AttemptRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT test_id, mode, questions, recorded, completed_at
            FROM attempts
            ORDER BY completed_at DESC, id DESC
            LIMIT ?1
            "#,
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            let mode: String = row.get(1)?;
            let questions: i64 = row.get(2)?;
            let recorded: i64 = row.get(3)?;
            let completed_at: String = row.get(4)?;
            Ok(AttemptRecord {
                test_id: row.get(0)?,
                mode: parse_mode(&mode),
                questions: questions.max(0) as usize,
                recorded: recorded.max(0) as usize,
                completed_at: DateTime::parse_from_rfc3339(&completed_at)
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })
        })?;
        let records = rows.collect::<Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn summary(&self) -> Result<HistorySummary> {
        let all = self.recent(usize::MAX >> 1)?;
        let completion: Vec<f64> = all.iter().map(AttemptRecord::completion_pct).collect();
        let by_mode = [Mode::TextToSpeech, Mode::Shadowing, Mode::Human]
            .into_iter()
            .map(|m| (m, all.iter().filter(|a| a.mode == m).count()))
            .filter(|(_, n)| *n > 0)
            .collect();
        Ok(HistorySummary {
            attempts: all.len(),
            avg_completion_pct: mean(&completion),
            by_mode,
        })
    }

    pub fn clear_all(&self) -> Result<()> {
        self.conn.execute("DELETE FROM attempts", [])?;
        Ok(())
    }
}

fn parse_mode(s: &str) -> Mode {
    match s {
        "shadowing" => Mode::Shadowing,
        "human" => Mode::Human,
        _ => Mode::TextToSpeech,
    }
}
