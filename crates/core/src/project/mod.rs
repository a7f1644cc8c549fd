use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    AssetSnapshot, AutoCutError, BeatDetector, Result, Timeline, TimelineEngine, Transcriber,
};

const EMPTY_DOCUMENT: &str = "{}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Created,
    Analyzed,
    TimelineUpdated,
    Failed,
}

/// Editing project owning one asset and its current timeline document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub title: String,
    pub status: ProjectStatus,
    /// Persisted timeline text; `{}` until the first successful build.
    pub timeline_json: String,
    pub asset: AssetSnapshot,
}

impl Project {
    pub fn new(id: i64, title: impl Into<String>, asset: AssetSnapshot) -> Self {
        Self {
            id,
            title: title.into(),
            status: ProjectStatus::Created,
            timeline_json: EMPTY_DOCUMENT.to_string(),
            asset,
        }
    }

    /// Parses the stored document. `None` until a timeline has been stored.
    pub fn timeline(&self) -> Result<Option<Timeline>> {
        let raw = self.timeline_json.trim();
        if raw.is_empty() || raw == EMPTY_DOCUMENT {
            return Ok(None);
        }
        Timeline::from_text(raw).map(Some)
    }

    /// Runs transcription and beat detection on the asset, then replaces the
    /// stored timeline. On any failure the previous document is kept and the
    /// project is marked failed.
    pub fn rebuild_timeline<D, T>(
        &mut self,
        engine: &TimelineEngine,
        detector: &D,
        transcriber: &T,
    ) -> Result<Timeline>
    where
        D: BeatDetector + ?Sized,
        T: Transcriber + ?Sized,
    {
        let outcome = self.analyze(engine, detector, transcriber).and_then(|timeline| {
            let text = timeline.to_text()?;
            Ok((timeline, text))
        });

        match outcome {
            Ok((timeline, text)) => {
                self.timeline_json = text;
                self.status = ProjectStatus::Analyzed;
                tracing::info!(
                    project = self.id,
                    segments = timeline.segments.len(),
                    "timeline rebuilt"
                );
                Ok(timeline)
            }
            Err(err) => {
                self.status = ProjectStatus::Failed;
                tracing::warn!(project = self.id, error = %err, "timeline rebuild failed");
                Err(err)
            }
        }
    }

    /// Stores an edited timeline in place of the current one.
    pub fn update_timeline(&mut self, timeline: &Timeline) -> Result<()> {
        self.timeline_json = timeline.to_text()?;
        self.status = ProjectStatus::TimelineUpdated;
        Ok(())
    }

    fn analyze<D, T>(&self, engine: &TimelineEngine, detector: &D, transcriber: &T) -> Result<Timeline>
    where
        D: BeatDetector + ?Sized,
        T: Transcriber + ?Sized,
    {
        let media = Path::new(&self.asset.path);
        if !media.exists() {
            return Err(AutoCutError::MediaNotFound(media.to_path_buf()));
        }

        let transcription = transcriber.transcribe(media)?;
        let analysis = detector.detect(media)?;
        Ok(engine.build(&self.asset, &analysis, &transcription))
    }
}
