use std::time::{Duration, Instant};

use thiserror::Error;

use super::model::AudioBlob;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecorderError {
    #[error("audio recording is not supported on this host")]
    Unsupported,
    #[error("a recording is already in progress")]
    AlreadyRecording,
    #[error("no recording in progress")]
    NotRecording,
}

/// Media recording collaborator: one blob per `start`/`stop` pair
pub trait Recorder {
    fn is_supported(&self) -> bool;
    fn is_recording(&self) -> bool;
    fn start(&mut self, now: Instant) -> Result<(), RecorderError>;
    fn stop(&mut self, now: Instant) -> Result<AudioBlob, RecorderError>;
}

const WAV_MIME: &str = "audio/wav";

/// Captures silence for the elapsed time as 16-bit mono PCM WAV. Used where no
/// audio backend is available so the session flow and results still work.
#[derive(Debug, Clone)]
pub struct SilentRecorder {
    sample_rate: u32,
    started_at: Option<Instant>,
}

impl Default for SilentRecorder {
    fn default() -> Self {
        Self::new(8_000)
    }
}

impl SilentRecorder {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            started_at: None,
        }
    }

    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        self.started_at
            .map(|start| now.saturating_duration_since(start))
    }
}

impl Recorder for SilentRecorder {
    fn is_supported(&self) -> bool {
        true
    }

    fn is_recording(&self) -> bool {
        self.started_at.is_some()
    }

    fn start(&mut self, now: Instant) -> Result<(), RecorderError> {
        if self.started_at.is_some() {
            return Err(RecorderError::AlreadyRecording);
        }
        self.started_at = Some(now);
        Ok(())
    }

    fn stop(&mut self, now: Instant) -> Result<AudioBlob, RecorderError> {
        let start = self.started_at.take().ok_or(RecorderError::NotRecording)?;
        let duration = now.saturating_duration_since(start);
        let samples = (duration.as_millis() as u64 * u64::from(self.sample_rate) / 1000) as usize;
        Ok(AudioBlob {
            mime_type: WAV_MIME.to_string(),
            data: silent_wav(self.sample_rate, samples),
            duration,
        })
    }
}

/// Host without any recording capability
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRecorder;

impl Recorder for NoRecorder {
    fn is_supported(&self) -> bool {
        false
    }

    fn is_recording(&self) -> bool {
        false
    }

    fn start(&mut self, _now: Instant) -> Result<(), RecorderError> {
        Err(RecorderError::Unsupported)
    }

    fn stop(&mut self, _now: Instant) -> Result<AudioBlob, RecorderError> {
        Err(RecorderError::Unsupported)
    }
}

/// RIFF/WAVE container, PCM, 1 channel, 16 bits per sample, all zeros
fn silent_wav(sample_rate: u32, samples: usize) -> Vec<u8> {
    let data_len = (samples * 2) as u32;
    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.resize(44 + data_len as usize, 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn silent_recording_matches_elapsed_time() {
        let mut r = SilentRecorder::new(1_000);
        let t0 = Instant::now();
        r.start(t0).unwrap();
        assert!(r.is_recording());
        let blob = r.stop(t0 + Duration::from_millis(1500)).unwrap();
        assert!(!r.is_recording());
        assert_eq!(blob.mime_type, "audio/wav");
        assert_eq!(blob.duration, Duration::from_millis(1500));
        assert_eq!(blob.data.len(), 44 + 1500 * 2);
        assert_eq!(&blob.data[0..4], b"RIFF");
        assert_eq!(&blob.data[8..12], b"WAVE");
    }

    #[test]
    fn start_twice_and_stop_idle_fail() {
        let mut r = SilentRecorder::default();
        let t0 = Instant::now();
        assert_matches!(r.stop(t0), Err(RecorderError::NotRecording));
        r.start(t0).unwrap();
        assert_matches!(r.start(t0), Err(RecorderError::AlreadyRecording));
    }

    #[test]
    fn unsupported_host_reports_it() {
        let mut r = NoRecorder;
        assert!(!r.is_supported());
        assert_matches!(r.start(Instant::now()), Err(RecorderError::Unsupported));
    }
}
