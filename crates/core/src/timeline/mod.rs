//! Timeline construction.
//!
//! The engine walks the template rows in order and, for each row, merges the
//! beat grid, the energy peaks and the caption intervals that fall inside the
//! row's window. Effect tags are normalised against a small rule table and the
//! first resolvable `sfx:` tag is bound to a catalog item.

mod rules;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

pub use rules::{EffectRule, EffectRules};

use crate::{
    sfx::{SfxCatalog, SfxItem, SFX_TAG_PREFIX},
    AutoCutError, BeatAnalysis, Caption, Result, Template, TemplateRow, TranscriptionResult,
};

/// Copy of the source asset metadata taken at build time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetSnapshot {
    pub id: i64,
    pub path: String,
    pub duration: f64,
    pub resolution: String,
    pub fps: Option<f64>,
}

impl AssetSnapshot {
    pub fn new(id: i64, path: impl Into<String>, duration: f64, resolution: impl Into<String>) -> Self {
        Self {
            id,
            path: path.into(),
            duration,
            resolution: resolution.into(),
            fps: None,
        }
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = Some(fps);
        self
    }
}

/// Sound effect bound to a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSfx {
    pub name: String,
    pub path: PathBuf,
    pub duration: f64,
}

impl From<&SfxItem> for SegmentSfx {
    fn from(item: &SfxItem) -> Self {
        Self {
            name: item.name.clone(),
            path: item.path.clone(),
            duration: item.duration,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineSegment {
    pub name: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub effects: Vec<String>,
    #[serde(default)]
    pub beats: Vec<f64>,
    #[serde(default)]
    pub energy_peaks: Vec<f64>,
    #[serde(default)]
    pub captions: Vec<Caption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sfx: Option<SegmentSfx>,
}

impl TimelineSegment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// The persisted result of one build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    #[serde(default)]
    pub template_name: String,
    #[serde(default)]
    pub asset: AssetSnapshot,
    #[serde(default)]
    pub beats: Vec<f64>,
    #[serde(default)]
    pub tempo: f64,
    #[serde(default)]
    pub energy_peaks: Vec<f64>,
    #[serde(default)]
    pub captions: Vec<Caption>,
    #[serde(default)]
    pub segments: Vec<TimelineSegment>,
}

impl Timeline {
    /// Pretty printed JSON with a fixed key order. Every number must be
    /// finite; JSON has no encoding for NaN or infinity.
    pub fn to_text(&self) -> Result<String> {
        if let Some(field) = self.first_non_finite() {
            return Err(AutoCutError::Timeline(format!("`{field}` is not a finite number")));
        }
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_text(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|err| AutoCutError::Timeline(err.to_string()))
    }

    /// End of the latest segment, or zero for an empty timeline.
    pub fn duration(&self) -> f64 {
        self.segments
            .iter()
            .map(|segment| segment.end)
            .fold(0.0, f64::max)
    }

    fn first_non_finite(&self) -> Option<String> {
        let all_finite = |values: &[f64]| values.iter().all(|value| value.is_finite());
        let captions_finite = |captions: &[Caption]| {
            captions
                .iter()
                .all(|caption| caption.start.is_finite() && caption.end.is_finite())
        };

        if !self.asset.duration.is_finite() || self.asset.fps.is_some_and(|fps| !fps.is_finite()) {
            return Some("asset".to_string());
        }
        if !self.tempo.is_finite() {
            return Some("tempo".to_string());
        }
        if !all_finite(&self.beats) {
            return Some("beats".to_string());
        }
        if !all_finite(&self.energy_peaks) {
            return Some("energy_peaks".to_string());
        }
        if !captions_finite(&self.captions) {
            return Some("captions".to_string());
        }
        self.segments.iter().enumerate().find_map(|(index, segment)| {
            let finite = segment.start.is_finite()
                && segment.end.is_finite()
                && all_finite(&segment.beats)
                && all_finite(&segment.energy_peaks)
                && captions_finite(&segment.captions)
                && segment.sfx.as_ref().map_or(true, |sfx| sfx.duration.is_finite());
            (!finite).then(|| format!("segments[{index}]"))
        })
    }

    pub fn segment(&self, name: &str) -> Option<&TimelineSegment> {
        self.segments
            .iter()
            .find(|segment| segment.name.eq_ignore_ascii_case(name))
    }
}

/// Builds timelines from one template and one sound effect catalog.
#[derive(Debug)]
pub struct TimelineEngine {
    template: Template,
    catalog: Arc<SfxCatalog>,
    rules: EffectRules,
}

impl TimelineEngine {
    pub fn new(template: Template, catalog: Arc<SfxCatalog>) -> Self {
        Self {
            template,
            catalog,
            rules: EffectRules::default(),
        }
    }

    /// Loads the template at `path`. Fails with a configuration error, never
    /// with a half-initialised engine.
    pub fn from_template_path(path: impl AsRef<Path>, catalog: Arc<SfxCatalog>) -> Result<Self> {
        Ok(Self::new(Template::load(path)?, catalog))
    }

    pub fn with_rules(mut self, rules: EffectRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn catalog(&self) -> &Arc<SfxCatalog> {
        &self.catalog
    }

    pub fn build(
        &self,
        asset: &AssetSnapshot,
        analysis: &BeatAnalysis,
        transcription: &TranscriptionResult,
    ) -> Timeline {
        let segments: Vec<TimelineSegment> = self
            .template
            .rows
            .iter()
            .map(|row| self.build_segment(row, analysis, transcription))
            .collect();

        tracing::debug!(
            template = %self.template.name,
            segments = segments.len(),
            with_sfx = segments.iter().filter(|segment| segment.sfx.is_some()).count(),
            "timeline generated"
        );

        Timeline {
            template_name: self.template.name.clone(),
            asset: asset.clone(),
            beats: analysis.beats.clone(),
            tempo: analysis.tempo,
            energy_peaks: analysis.energy_peaks.clone(),
            captions: transcription.segments.clone(),
            segments,
        }
    }

    fn build_segment(
        &self,
        row: &TemplateRow,
        analysis: &BeatAnalysis,
        transcription: &TranscriptionResult,
    ) -> TimelineSegment {
        let name = row.name.to_uppercase();
        let (start, end) = window(row);
        let effects = self.rules.normalize(&name, &row.effects);
        let sfx = self.select_sfx(&name, &effects).map(|item| SegmentSfx::from(item.as_ref()));

        TimelineSegment {
            beats: within(&analysis.beats, start, end),
            energy_peaks: within(&analysis.energy_peaks, start, end),
            captions: transcription
                .segments
                .iter()
                .filter(|caption| caption.overlaps(start, end))
                .cloned()
                .collect(),
            name,
            start,
            end,
            effects,
            sfx,
        }
    }

    fn select_sfx(&self, name: &str, effects: &[String]) -> Option<Arc<SfxItem>> {
        let explicit = effects
            .iter()
            .filter(|effect| effect.starts_with(SFX_TAG_PREFIX))
            .find_map(|effect| self.catalog.resolve_effect_tag(effect));
        if explicit.is_some() {
            return explicit;
        }

        let tag = self.rules.fallback_sfx_tag(name)?;
        self.catalog
            .get_random(Some(tag))
            .or_else(|| self.catalog.get_random(None))
    }
}

/// Segment bounds; a window that does not move forward is widened to one second.
fn window(row: &TemplateRow) -> (f64, f64) {
    let start = row.start;
    let end = row.end.unwrap_or(start + 1.0);
    if end <= start {
        (start, start + 1.0)
    } else {
        (start, end)
    }
}

fn within(values: &[f64], start: f64, end: f64) -> Vec<f64> {
    values
        .iter()
        .copied()
        .filter(|value| start <= *value && *value <= end)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sfx::tests::catalog_with;

    fn engine(rows: Vec<TemplateRow>, sfx_files: &[&str]) -> (tempfile::TempDir, TimelineEngine) {
        let (tmp, catalog) = catalog_with(sfx_files);
        let engine = TimelineEngine::new(Template::new("test", rows), Arc::new(catalog));
        (tmp, engine)
    }

    fn asset() -> AssetSnapshot {
        AssetSnapshot::new(1, "/tmp/video.mp4", 15.0, "1080x1920").with_fps(30.0)
    }

    fn analysis(beats: &[f64], peaks: &[f64]) -> BeatAnalysis {
        BeatAnalysis {
            beats: beats.to_vec(),
            tempo: 120.0,
            energy_peaks: peaks.to_vec(),
        }
    }

    fn captions(items: &[(&str, f64, f64)]) -> TranscriptionResult {
        TranscriptionResult::new(
            items
                .iter()
                .map(|(text, start, end)| Caption::new(*text, *start, *end))
                .collect(),
            "en",
        )
    }

    #[test]
    fn builds_hook_segment() {
        let (_tmp, engine) = engine(vec![TemplateRow::new("HOOK", 0.0, 3.0)], &[]);
        let timeline = engine.build(
            &asset(),
            &analysis(&[0.5, 1.0, 2.0, 4.0], &[]),
            &captions(&[("Hi", 0.2, 1.4)]),
        );

        let segment = &timeline.segments[0];
        assert_eq!(segment.effects, vec!["zoom", "caption"]);
        assert_eq!(segment.beats, vec![0.5, 1.0, 2.0]);
        assert_eq!(segment.captions, vec![Caption::new("Hi", 0.2, 1.4)]);
        assert!(segment.sfx.is_none());
        assert_eq!(timeline.template_name, "test");
        assert_eq!(timeline.beats.len(), 4);
    }

    #[test]
    fn beats_on_boundaries_belong_to_both_segments() {
        let (_tmp, engine) = engine(
            vec![
                TemplateRow::new("hook", 0.0, 2.0),
                TemplateRow::new("build", 2.0, 4.0),
            ],
            &[],
        );
        let timeline = engine.build(&asset(), &analysis(&[0.0, 2.0, 4.0], &[2.0]), &captions(&[]));

        assert_eq!(timeline.segments[0].beats, vec![0.0, 2.0]);
        assert_eq!(timeline.segments[1].beats, vec![2.0, 4.0]);
        assert_eq!(timeline.segments[0].energy_peaks, vec![2.0]);
        assert_eq!(timeline.segments[1].energy_peaks, vec![2.0]);
    }

    #[test]
    fn captions_touching_the_window_are_included() {
        let (_tmp, engine) = engine(vec![TemplateRow::new("build", 1.0, 3.0)], &[]);
        let timeline = engine.build(
            &asset(),
            &analysis(&[], &[]),
            &captions(&[("before", 0.0, 1.0), ("touching", 3.0, 4.0), ("after", 3.1, 4.0)]),
        );

        let texts: Vec<&str> = timeline.segments[0]
            .captions
            .iter()
            .map(|caption| caption.text.as_str())
            .collect();
        assert_eq!(texts, vec!["before", "touching"]);
        assert_eq!(timeline.captions.len(), 3);
    }

    #[test]
    fn degenerate_windows_are_widened() {
        let mut open_ended = TemplateRow::new("outro", 9.0, 0.0);
        open_ended.end = None;
        let (_tmp, engine) = engine(
            vec![TemplateRow::new("build", 5.0, 5.0), TemplateRow::new("punch", 7.0, 6.0), open_ended],
            &[],
        );
        let timeline = engine.build(&asset(), &analysis(&[], &[]), &captions(&[]));

        assert_eq!(timeline.segments[0].end, 6.0);
        assert_eq!(timeline.segments[1].end, 8.0);
        assert_eq!(timeline.segments[2].end, 10.0);
    }

    #[test]
    fn keeps_template_order_and_upper_cases_names() {
        let (_tmp, engine) = engine(
            vec![TemplateRow::new("punch", 8.0, 10.0), TemplateRow::new("hook", 0.0, 3.0)],
            &[],
        );
        let timeline = engine.build(&asset(), &analysis(&[], &[]), &captions(&[]));

        let names: Vec<&str> = timeline.segments.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["PUNCH", "HOOK"]);
        assert_eq!(timeline.duration(), 10.0);
    }

    #[test]
    fn existing_zoom_is_not_duplicated() {
        let row = TemplateRow::new("hook", 0.0, 3.0).with_effects(["Zoom", "shake"]);
        let (_tmp, engine) = engine(vec![row], &[]);
        let timeline = engine.build(&asset(), &analysis(&[], &[]), &captions(&[]));

        assert_eq!(timeline.segments[0].effects, vec!["Zoom", "shake", "caption"]);
    }

    #[test]
    fn every_segment_carries_a_caption_tag() {
        let (_tmp, engine) = engine(
            vec![
                TemplateRow::new("hook", 0.0, 3.0),
                TemplateRow::new("build", 3.0, 6.0).with_effects(["CAPTION"]),
                TemplateRow::new("punch", 6.0, 8.0),
            ],
            &[],
        );
        let timeline = engine.build(&asset(), &analysis(&[], &[]), &captions(&[]));

        for segment in &timeline.segments {
            let count = segment
                .effects
                .iter()
                .filter(|effect| effect.eq_ignore_ascii_case("caption"))
                .count();
            assert_eq!(count, 1, "segment {}", segment.name);
        }
        assert_eq!(timeline.segments[2].effects, vec!["sfx:vine_boom", "caption"]);
    }

    #[test]
    fn punch_falls_back_to_tagged_sfx() {
        let (_tmp, engine) = engine(vec![TemplateRow::new("PUNCH", 6.0, 8.0)], &["punch_1.wav"]);
        let timeline = engine.build(&asset(), &analysis(&[], &[]), &captions(&[]));

        let sfx = timeline.segments[0].sfx.as_ref().unwrap();
        assert_eq!(sfx.name, "punch_1");
        assert_eq!(sfx.duration, 1.5);
    }

    #[test]
    fn punch_falls_back_to_any_sfx() {
        let (_tmp, engine) = engine(vec![TemplateRow::new("punch", 6.0, 8.0)], &["ding.wav"]);
        let timeline = engine.build(&asset(), &analysis(&[], &[]), &captions(&[]));

        assert_eq!(timeline.segments[0].sfx.as_ref().unwrap().name, "ding");
    }

    #[test]
    fn explicit_sfx_tag_resolves_by_name() {
        let row = TemplateRow::new("build", 0.0, 2.0).with_effects(["sfx:missing", "sfx:vine_boom"]);
        let (_tmp, engine) = engine(vec![row], &["vine_boom.mp3", "ding.wav"]);
        let timeline = engine.build(&asset(), &analysis(&[], &[]), &captions(&[]));

        assert_eq!(timeline.segments[0].sfx.as_ref().unwrap().name, "vine_boom");
    }

    #[test]
    fn unresolvable_sfx_tag_attaches_nothing() {
        let row = TemplateRow::new("build", 0.0, 2.0).with_effects(["sfx:vine_boom"]);
        let (_tmp, engine) = engine(vec![row], &["ding.wav", "whoosh.ogg"]);
        let timeline = engine.build(&asset(), &analysis(&[], &[]), &captions(&[]));

        assert!(timeline.segments[0].sfx.is_none());
        assert_eq!(timeline.segments[0].effects, vec!["sfx:vine_boom", "caption"]);
    }

    #[test]
    fn builds_are_repeatable() {
        let (_tmp, engine) = engine(
            vec![
                TemplateRow::new("hook", 0.0, 3.0),
                TemplateRow::new("punch", 3.0, 5.0),
            ],
            &["punch_1.wav"],
        );
        let beats = analysis(&[0.5, 3.0, 4.5], &[4.4]);
        let transcript = captions(&[("Hook", 0.2, 1.4), ("Punch", 3.0, 4.0)]);

        let first = engine.build(&asset(), &beats, &transcript).to_text().unwrap();
        let second = engine.build(&asset(), &beats, &transcript).to_text().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn text_round_trip_preserves_every_field() {
        let (_tmp, engine) = engine(
            vec![
                TemplateRow::new("hook", 0.0, 3.0).with_effects(["shake"]),
                TemplateRow::new("punch", 3.0, 5.0),
            ],
            &["punch_1.wav"],
        );
        let timeline = engine.build(
            &asset(),
            &analysis(&[0.1, 1.0 / 3.0, 4.75], &[0.7]),
            &captions(&[("Hook", 0.2, 1.4), ("Punch", 3.0, 4.0)]),
        );

        let text = timeline.to_text().unwrap();
        assert_eq!(Timeline::from_text(&text).unwrap(), timeline);
    }

    #[test]
    fn non_finite_numbers_are_rejected_on_write() {
        let (_tmp, engine) = engine(vec![TemplateRow::new("hook", 0.0, 3.0)], &[]);
        let mut timeline = engine.build(&asset(), &analysis(&[1.0], &[]), &captions(&[]));

        timeline.tempo = f64::NAN;
        let err = timeline.to_text().unwrap_err();
        assert!(matches!(err, AutoCutError::Timeline(ref message) if message.contains("tempo")));

        timeline.tempo = 120.0;
        timeline.segments[0].beats.push(f64::INFINITY);
        let err = timeline.to_text().unwrap_err();
        assert!(format!("{err}").contains("segments[0]"));

        timeline.segments[0].beats.pop();
        let text = timeline.to_text().unwrap();
        assert_eq!(Timeline::from_text(&text).unwrap(), timeline);
    }

    #[test]
    fn serialized_layout_matches_wire_contract() {
        let (_tmp, engine) = engine(vec![TemplateRow::new("punch", 0.0, 1.0)], &["punch_1.wav"]);
        let timeline = engine.build(&asset(), &analysis(&[], &[]), &captions(&[("Hi", 0.0, 0.5)]));
        let value: serde_json::Value = serde_json::from_str(&timeline.to_text().unwrap()).unwrap();

        assert_eq!(value["asset"]["resolution"], "1080x1920");
        assert_eq!(value["asset"]["fps"], 30.0);
        assert_eq!(value["segments"][0]["captions"][0]["text"], "Hi");
        assert_eq!(value["segments"][0]["sfx"]["name"], "punch_1");
        assert!(value["segments"][0]["sfx"].get("tags").is_none());
    }

    #[test]
    fn segments_without_sfx_omit_the_key() {
        let (_tmp, engine) = engine(vec![TemplateRow::new("hook", 0.0, 1.0)], &[]);
        let timeline = engine.build(&asset(), &analysis(&[], &[]), &captions(&[]));
        let value: serde_json::Value = serde_json::from_str(&timeline.to_text().unwrap()).unwrap();

        assert!(value["segments"][0].get("sfx").is_none());
    }

    #[test]
    fn reads_sparse_edited_documents() {
        let timeline = Timeline::from_text(
            r#"{"segments": [{"name": "HOOK", "start": 0.0, "end": 2.0}]}"#,
        )
        .unwrap();
        assert_eq!(timeline.segments[0].effects, Vec::<String>::new());
        assert_eq!(timeline.tempo, 0.0);

        let err = Timeline::from_text("[1, 2]").unwrap_err();
        assert!(matches!(err, AutoCutError::Timeline(_)));
    }

    #[test]
    fn loads_template_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chaos.yaml");
        std::fs::write(&path, "segments:\n  - {name: hook, start: 0, end: 1}\n").unwrap();
        let (_sfx, catalog) = catalog_with(&[]);

        let engine = TimelineEngine::from_template_path(&path, Arc::new(catalog)).unwrap();
        assert_eq!(engine.template().name, "chaos");

        let missing = TimelineEngine::from_template_path(tmp.path().join("nope.yaml"), engine.catalog().clone());
        assert!(matches!(missing.unwrap_err(), AutoCutError::Config(_)));
    }
}
