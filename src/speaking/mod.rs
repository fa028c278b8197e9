//! Speaking practice: the session orchestrator and the collaborators it is
//! hosted with (parts sources, narration, recording, session storage).

pub mod model;
pub mod narration;
pub mod recorder;
pub mod session;
pub mod source;
pub mod storage;

pub use model::{flatten, parts_from_value, AudioBlob, Mode, Part, Prompt, RecordingResult, Status};
pub use session::{SessionSnapshot, SpeakingSession};
pub use storage::{PersistedResult, SessionStorage, RESULT_KEY};
