use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response window used when a question does not declare its own
pub const DEFAULT_STEP_SECS: u32 = 30;

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    /// Question narrated by text-to-speech, then recorded
    #[default]
    #[strum(serialize = "textToSpeech")]
    TextToSpeech,
    /// Learner watches a clip and repeats the phrase
    #[strum(serialize = "shadowing")]
    Shadowing,
    /// A human examiner paces the questions over one continuous recording
    #[strum(serialize = "human")]
    Human,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(default)]
    pub id: String,
    #[serde(default, alias = "question")]
    pub text: String,
    #[serde(default, alias = "durationSec")]
    pub duration_sec: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowingStep {
    #[serde(default)]
    pub id: String,
    #[serde(default, alias = "youtubeUrl")]
    pub youtube_url: String,
    #[serde(default)]
    pub phrase: String,
    #[serde(default, alias = "durationSec")]
    pub duration_sec: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub steps: Vec<ShadowingStep>,
}

/// One entry of the flattened question/step sequence
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub id: String,
    pub part_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube_url: Option<String>,
    pub duration_sec: u32,
}

impl Prompt {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.duration_sec))
    }
}

/// Concatenate every part's questions (steps in shadowing mode) in part order
pub fn flatten(parts: &[Part], mode: Mode) -> Vec<Prompt> {
    parts
        .iter()
        .flat_map(|part| -> Vec<Prompt> {
            match mode {
                Mode::Shadowing => part
                    .steps
                    .iter()
                    .map(|s| Prompt {
                        id: s.id.clone(),
                        part_id: part.id.clone(),
                        text: s.phrase.clone(),
                        youtube_url: Some(s.youtube_url.clone()).filter(|u| !u.is_empty()),
                        duration_sec: s.duration_sec.unwrap_or(DEFAULT_STEP_SECS),
                    })
                    .collect(),
                Mode::TextToSpeech | Mode::Human => part
                    .questions
                    .iter()
                    .map(|q| Prompt {
                        id: q.id.clone(),
                        part_id: part.id.clone(),
                        text: q.text.clone(),
                        youtube_url: None,
                        duration_sec: q.duration_sec.unwrap_or(DEFAULT_STEP_SECS),
                    })
                    .collect(),
            }
        })
        .collect()
}

/// Give every question and step without its own duration `secs`
pub fn fill_default_durations(parts: &mut [Part], secs: u32) {
    for part in parts.iter_mut() {
        for q in part.questions.iter_mut() {
            q.duration_sec.get_or_insert(secs);
        }
        for s in part.steps.iter_mut() {
            s.duration_sec.get_or_insert(secs);
        }
    }
}

/// Parse parts from loosely shaped JSON.
///
/// Anything that is not an array yields no parts. Non-object entries and
/// entries that fail to deserialize are skipped; missing ids are filled in
/// from their position.
pub fn parts_from_value(value: &Value) -> Vec<Part> {
    let Some(items) = value.as_array() else {
        if !value.is_null() {
            log::warn!("parts payload is not an array, treating it as empty");
        }
        return Vec::new();
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| {
            if !item.is_object() {
                log::warn!("skipping malformed part #{idx}");
                return None;
            }
            let mut part = Part {
                id: str_field(item, "id").unwrap_or_else(|| format!("p{}", idx + 1)),
                title: str_field(item, "title").unwrap_or_default(),
                ..Part::default()
            };
            part.questions = lenient_list(item.get("questions"));
            part.steps = lenient_list(item.get("steps"));
            for (n, q) in part.questions.iter_mut().enumerate() {
                if q.id.is_empty() {
                    q.id = format!("{}-q{}", part.id, n + 1);
                }
            }
            for (n, s) in part.steps.iter_mut().enumerate() {
                if s.id.is_empty() {
                    s.id = format!("{}-s{}", part.id, n + 1);
                }
            }
            Some(part)
        })
        .collect()
}

fn str_field(item: &Value, key: &str) -> Option<String> {
    match item.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn lenient_list<T: serde::de::DeserializeOwned>(list: Option<&Value>) -> Vec<T> {
    list.and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| serde_json::from_value(v.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Status {
    Idle,
    ReadingQuestion,
    Watching,
    Recording,
    Ready,
    Finished,
}

/// Captured audio handed over by the recorder
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioBlob {
    pub mime_type: String,
    pub data: Vec<u8>,
    pub duration: Duration,
}

/// Result stored for one step, or for the whole session in human mode.
/// The blob itself never leaves the process; only its URL is serialized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingResult {
    pub question_id: String,
    pub question_text: String,
    pub audio_url: String,
    #[serde(skip)]
    pub blob: Option<AudioBlob>,
}
