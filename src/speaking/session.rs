use chrono::{DateTime, SecondsFormat, Utc};
use itertools::Itertools;

use super::model::{
    flatten, AudioBlob, Mode, Part, Prompt, RecordingResult, Status, DEFAULT_STEP_SECS,
};
use super::storage::{PersistedResult, SessionStorage, StorageError};

/// Question id used for the single aggregate recording in human mode
pub const HUMAN_SESSION_ID: &str = "human-session";

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Where the session is. Data that only makes sense in one phase lives in
/// that variant, so a recording phase always has a start time.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    ReadingQuestion,
    Watching,
    Ready,
    Recording { started_at: DateTime<Utc> },
    Finished { completed_at: DateTime<Utc> },
}

impl Phase {
    fn status(&self) -> Status {
        match self {
            Phase::Idle => Status::Idle,
            Phase::ReadingQuestion => Status::ReadingQuestion,
            Phase::Watching => Status::Watching,
            Phase::Ready => Status::Ready,
            Phase::Recording { .. } => Status::Recording,
            Phase::Finished { .. } => Status::Finished,
        }
    }
}

/// Every input the orchestrator reacts to
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    Init {
        test_id: String,
        parts: Vec<Part>,
        mode: Mode,
    },
    Start,
    NarrationEnded,
    StartRecording,
    RecordingCommitted { step: usize, blob: AudioBlob },
    HumanRecordingCommitted(AudioBlob),
    NextQuestionHuman,
    NextStep,
    Finish,
    Reset,
}

/// Read-only view handed to subscribers after each accepted transition
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: Status,
    pub mode: Mode,
    pub current_step: usize,
    pub total_steps: usize,
    pub recorded: usize,
    pub finish_requested: bool,
}

type Subscriber = Box<dyn FnMut(&SessionSnapshot)>;

/// Sequences a learner through spoken-response prompts.
///
/// The orchestrator runs no timers and owns no devices. It records when a
/// step's response window opened and how long it lasts; the host drives the
/// countdown, narration and recorder, and reports back through the methods
/// below.
pub struct SpeakingSession {
    test_id: Option<String>,
    mode: Mode,
    parts: Vec<Part>,
    flat: Vec<Prompt>,
    current_step: usize,
    phase: Phase,
    recording_results: Vec<Option<RecordingResult>>,
    next_requested: bool,
    finish_requested: bool,
    clock: Box<dyn Clock>,
    storage: Option<Box<dyn SessionStorage>>,
    subscribers: Vec<Subscriber>,
}

impl Default for SpeakingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeakingSession {
    pub fn new() -> Self {
        Self {
            test_id: None,
            mode: Mode::default(),
            parts: Vec::new(),
            flat: Vec::new(),
            current_step: 0,
            phase: Phase::Idle,
            recording_results: Vec::new(),
            next_requested: false,
            finish_requested: false,
            clock: Box::new(SystemClock),
            storage: None,
            subscribers: Vec::new(),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Attach storage; the finished attempt is written there automatically
    pub fn with_storage(mut self, storage: impl SessionStorage + 'static) -> Self {
        self.storage = Some(Box::new(storage));
        self
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&SessionSnapshot) + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    // -- transitions -------------------------------------------------------

    pub fn init_session(
        &mut self,
        test_id: impl Into<String>,
        parts: Vec<Part>,
        mode: Mode,
    ) -> bool {
        self.dispatch(SessionEvent::Init {
            test_id: test_id.into(),
            parts,
            mode,
        })
    }

    pub fn start_session(&mut self) -> bool {
        self.dispatch(SessionEvent::Start)
    }

    pub fn tts_ended_for_current_step(&mut self) -> bool {
        self.dispatch(SessionEvent::NarrationEnded)
    }

    pub fn start_recording_for_current_step(&mut self) -> bool {
        self.dispatch(SessionEvent::StartRecording)
    }

    pub fn set_recording_result(&mut self, step: usize, blob: AudioBlob) -> bool {
        self.dispatch(SessionEvent::RecordingCommitted { step, blob })
    }

    pub fn set_human_session_recording_result(&mut self, blob: AudioBlob) -> bool {
        self.dispatch(SessionEvent::HumanRecordingCommitted(blob))
    }

    pub fn next_question_human(&mut self) -> bool {
        self.dispatch(SessionEvent::NextQuestionHuman)
    }

    pub fn go_to_next_step(&mut self) -> bool {
        self.dispatch(SessionEvent::NextStep)
    }

    pub fn finish_session(&mut self) -> bool {
        self.dispatch(SessionEvent::Finish)
    }

    pub fn reset_session(&mut self) -> bool {
        self.dispatch(SessionEvent::Reset)
    }

    /// Single reducer behind every transition method. Returns false when the
    /// event does not apply in the current phase; nothing changes then.
    pub fn dispatch(&mut self, event: SessionEvent) -> bool {
        let accepted = self.reduce(event);
        if accepted {
            let snapshot = self.snapshot();
            for subscriber in self.subscribers.iter_mut() {
                subscriber(&snapshot);
            }
        }
        accepted
    }

    fn reduce(&mut self, event: SessionEvent) -> bool {
        let now = self.clock.now();
        let status = self.phase.status();
        match (status, event) {
            (Status::Idle, SessionEvent::Init { test_id, parts, mode }) => {
                self.clear();
                self.flat = flatten(&parts, mode);
                self.test_id = Some(test_id);
                self.parts = parts;
                self.mode = mode;
                self.recording_results = vec![None; self.flat.len()];
                log::debug!(
                    "speaking session {:?} initialised: {} steps, mode {}",
                    self.test_id,
                    self.flat.len(),
                    self.mode
                );
                true
            }
            (Status::Idle, SessionEvent::Start) => {
                self.current_step = 0;
                if self.flat.is_empty() {
                    log::info!("speaking session has no steps, finishing immediately");
                    self.enter_finished(now);
                } else {
                    self.phase = self.entry_phase();
                }
                true
            }
            (Status::ReadingQuestion, SessionEvent::NarrationEnded) => {
                self.phase = Phase::Recording { started_at: now };
                true
            }
            (Status::Watching, SessionEvent::StartRecording) => {
                self.phase = Phase::Recording { started_at: now };
                true
            }
            (Status::Ready, SessionEvent::StartRecording) if self.mode == Mode::Human => {
                self.phase = Phase::Recording { started_at: now };
                true
            }
            (Status::Recording, SessionEvent::RecordingCommitted { step, blob })
                if self.mode != Mode::Human =>
            {
                self.commit_step(step, blob, now);
                true
            }
            (Status::Recording, SessionEvent::HumanRecordingCommitted(blob))
                if self.mode == Mode::Human =>
            {
                self.commit_human(blob, now);
                true
            }
            (Status::Recording, SessionEvent::NextQuestionHuman)
                if self.mode == Mode::Human =>
            {
                if self.current_step + 1 < self.flat.len() {
                    self.current_step += 1;
                } else {
                    // past the last question: capture stops and the commit finishes
                    self.finish_requested = true;
                }
                true
            }
            (Status::Recording, SessionEvent::NextStep) => {
                self.next_requested = true;
                true
            }
            (
                Status::ReadingQuestion | Status::Watching | Status::Ready,
                SessionEvent::NextStep,
            ) => {
                self.advance_to(self.current_step + 1, now);
                true
            }
            (Status::Recording, SessionEvent::Finish) => {
                log::debug!("finish requested mid-recording, deferring to the next commit");
                self.finish_requested = true;
                true
            }
            (
                Status::Idle | Status::ReadingQuestion | Status::Watching | Status::Ready,
                SessionEvent::Finish,
            ) => {
                self.enter_finished(now);
                true
            }
            (_, SessionEvent::Reset) => {
                self.clear();
                true
            }
            (status, event) => {
                log::debug!("ignoring {event:?} while {status}");
                false
            }
        }
    }

    fn entry_phase(&self) -> Phase {
        match self.mode {
            Mode::TextToSpeech => Phase::ReadingQuestion,
            Mode::Shadowing => Phase::Watching,
            Mode::Human => Phase::Ready,
        }
    }

    fn commit_step(&mut self, step: usize, blob: AudioBlob, now: DateTime<Utc>) {
        let Some(last) = self.flat.len().checked_sub(1) else {
            self.enter_finished(now);
            return;
        };
        let step = step.min(last);
        // a stale index never moves the machine back past the step in flight
        let resume_from = step.max(self.current_step);
        let result = RecordingResult {
            question_id: self.flat[step].id.clone(),
            question_text: self.flat[step].text.clone(),
            audio_url: self.blob_url(&step.to_string()),
            blob: Some(blob),
        };
        self.recording_results[step] = Some(result);
        self.next_requested = false;

        if self.finish_requested {
            self.enter_finished(now);
        } else {
            self.advance_to(resume_from + 1, now);
        }
    }

    fn commit_human(&mut self, blob: AudioBlob, now: DateTime<Utc>) {
        let text = self.flat.iter().map(|p| p.text.as_str()).join("\n");
        self.recording_results = vec![Some(RecordingResult {
            question_id: HUMAN_SESSION_ID.to_string(),
            question_text: text,
            audio_url: self.blob_url("session"),
            blob: Some(blob),
        })];
        self.enter_finished(now);
    }

    /// Move to `step`, or finish when it is past the last one
    fn advance_to(&mut self, step: usize, now: DateTime<Utc>) {
        if step >= self.flat.len() {
            self.enter_finished(now);
        } else {
            self.current_step = step;
            self.phase = self.entry_phase();
        }
    }

    fn enter_finished(&mut self, now: DateTime<Utc>) {
        self.current_step = self.flat.len();
        self.phase = Phase::Finished { completed_at: now };
        self.finish_requested = false;
        self.next_requested = false;
        if self.storage.is_some() {
            if let Err(e) = self.persist_result_for_result_page() {
                log::warn!("could not store speaking result for the results page: {e}");
            }
        }
    }

    fn clear(&mut self) {
        self.test_id = None;
        self.mode = Mode::default();
        self.parts.clear();
        self.flat.clear();
        self.current_step = 0;
        self.phase = Phase::Idle;
        self.recording_results.clear();
        self.next_requested = false;
        self.finish_requested = false;
    }

    fn blob_url(&self, suffix: &str) -> String {
        format!(
            "blob:ielts-coach/{}/{}",
            self.test_id.as_deref().unwrap_or("untitled"),
            suffix
        )
    }

    /// Build the blob-free result record and write it to session storage
    pub fn persist_result_for_result_page(&mut self) -> Result<PersistedResult, StorageError> {
        let completed_at = match self.phase {
            Phase::Finished { completed_at } => completed_at,
            _ => self.clock.now(),
        };
        let record = PersistedResult {
            test_id: self.test_id.clone(),
            questions: self.flat.clone(),
            recording_results: self.recording_results.clone(),
            completed_at: completed_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        let storage = self.storage.as_deref_mut().ok_or(StorageError::Unavailable)?;
        record.save(storage)?;
        Ok(record)
    }

    // -- getters -----------------------------------------------------------

    pub fn status(&self) -> Status {
        self.phase.status()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn test_id(&self) -> Option<&str> {
        self.test_id.as_deref()
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn flat_questions(&self) -> &[Prompt] {
        &self.flat
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn total_steps(&self) -> usize {
        self.flat.len()
    }

    pub fn is_last_step(&self) -> bool {
        !self.flat.is_empty() && self.current_step + 1 == self.flat.len()
    }

    pub fn current_question(&self) -> Option<&Prompt> {
        self.flat.get(self.current_step)
    }

    pub fn current_youtube_url(&self) -> Option<&str> {
        self.current_question()?.youtube_url.as_deref()
    }

    /// Response window of the current step, for the host's countdown
    pub fn current_step_duration_ms(&self) -> u64 {
        let secs = self
            .current_question()
            .map_or(DEFAULT_STEP_SECS, |p| p.duration_sec);
        u64::from(secs) * 1000
    }

    pub fn step_started_at(&self) -> Option<DateTime<Utc>> {
        match self.phase {
            Phase::Recording { started_at } => Some(started_at),
            _ => None,
        }
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        match self.phase {
            Phase::Finished { completed_at } => Some(completed_at),
            _ => None,
        }
    }

    pub fn recording_results(&self) -> &[Option<RecordingResult>] {
        &self.recording_results
    }

    pub fn recorded_count(&self) -> usize {
        self.recording_results.iter().flatten().count()
    }

    pub fn next_requested(&self) -> bool {
        self.next_requested
    }

    pub fn finish_requested(&self) -> bool {
        self.finish_requested
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status(),
            mode: self.mode,
            current_step: self.current_step,
            total_steps: self.flat.len(),
            recorded: self.recorded_count(),
            finish_requested: self.finish_requested,
        }
    }
}
