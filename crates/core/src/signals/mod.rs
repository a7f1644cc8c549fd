//! Typed containers for the output of external beat detection and speech
//! transcription, plus the collaborator traits that produce them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Beat grid and emphasis points detected in the source audio.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeatAnalysis {
    /// Ascending beat timestamps in seconds.
    #[serde(default)]
    pub beats: Vec<f64>,
    /// Tempo estimate in BPM. Informational only.
    #[serde(default)]
    pub tempo: f64,
    /// Ascending timestamps of high onset strength.
    #[serde(default)]
    pub energy_peaks: Vec<f64>,
}

/// A single caption interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl Caption {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }

    /// True when the caption touches or overlaps `[start, end]`.
    pub fn overlaps(&self, start: f64, end: f64) -> bool {
        !(self.end < start || self.start > end)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    #[serde(default)]
    pub segments: Vec<Caption>,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srt_path: Option<PathBuf>,
}

impl TranscriptionResult {
    /// Result for silent or non-speech audio.
    pub fn empty(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            ..Default::default()
        }
    }

    pub fn new(segments: Vec<Caption>, language: impl Into<String>) -> Self {
        let text = segments
            .iter()
            .map(|caption| caption.text.trim())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            segments,
            language: language.into(),
            text,
            json_path: None,
            srt_path: None,
        }
    }

    /// Writes `<stem>.json` and `<stem>.srt` into `dir` and records both paths.
    pub fn write_files(&mut self, dir: impl AsRef<Path>, stem: &str) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let json_path = dir.join(format!("{stem}.json"));
        let srt_path = dir.join(format!("{stem}.srt"));

        let payload = serde_json::json!({
            "language": self.language,
            "text": self.text,
            "segments": self.segments,
        });
        std::fs::write(&json_path, serde_json::to_string_pretty(&payload)?)?;
        std::fs::write(&srt_path, to_srt(&self.segments))?;

        tracing::debug!(json = %json_path.display(), srt = %srt_path.display(), "wrote caption files");
        self.json_path = Some(json_path);
        self.srt_path = Some(srt_path);
        Ok(())
    }
}

/// Produces a [`BeatAnalysis`] for an audio or video file.
///
/// Implementations return [`crate::AutoCutError::MediaNotFound`] for a missing
/// path and [`crate::AutoCutError::Analysis`] when decoding fails.
pub trait BeatDetector {
    fn detect(&self, audio_path: &Path) -> Result<BeatAnalysis>;
}

/// Produces caption intervals for an audio or video file. Must return an
/// empty segment list, not an error, for audio without speech.
pub trait Transcriber {
    fn transcribe(&self, audio_path: &Path) -> Result<TranscriptionResult>;
}

/// Renders captions as SubRip text.
pub fn to_srt(captions: &[Caption]) -> String {
    let mut lines = Vec::with_capacity(captions.len() * 4);
    for (index, caption) in captions.iter().enumerate() {
        lines.push((index + 1).to_string());
        lines.push(format!(
            "{} --> {}",
            srt_timestamp(caption.start),
            srt_timestamp(caption.end)
        ));
        lines.push(caption.text.clone());
        lines.push(String::new());
    }
    lines.join("\n").trim().to_string()
}

fn srt_timestamp(seconds: f64) -> String {
    let total_millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let secs = (total_millis % 60_000) / 1000;
    let millis = total_millis % 1000;
    format!("{hours:02}:{minutes:02}:{secs:02},{millis:03}")
}
