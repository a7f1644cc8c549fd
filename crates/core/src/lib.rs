//! Core library for the AutoCut timeline builder.
//!
//! AutoCut turns a short vertical video into an edit plan. External
//! collaborators detect beats and transcribe speech; this crate merges their
//! output with a declarative segment template and a sound effect catalog into
//! a [`Timeline`] document that the render stage consumes.

pub mod config;
pub mod error;
pub mod project;
pub mod sfx;
pub mod signals;
pub mod template;
pub mod timeline;

pub use config::AppConfig;
pub use error::{AutoCutError, Result};
pub use project::{Project, ProjectStatus};
pub use sfx::{DurationProbe, FfprobeDuration, SfxCatalog, SfxItem};
pub use signals::{to_srt, BeatAnalysis, BeatDetector, Caption, Transcriber, TranscriptionResult};
pub use template::{Template, TemplateRow};
pub use timeline::{
    AssetSnapshot, EffectRule, EffectRules, SegmentSfx, Timeline, TimelineEngine, TimelineSegment,
};
