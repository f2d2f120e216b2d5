//! Cinematic enrichment (taxonomy) stage.
//!
//! Assigns a shot type and cinematic tags to each segment. Classification
//! reads only fields the stage does not write, and tags are replaced rather
//! than appended, so re-running on already-tagged input yields identical
//! output.

use async_trait::async_trait;

use crate::core::error::PipelineError;
use crate::core::stage::StageKind;
use crate::domain::{ModuleSettings, Segment, ShotType};

use super::{StageContext, StageModule, StageOutput};

/// Adds shot types and cinematic tags
#[derive(Debug, Default)]
pub struct TaxonomyModule {
    configured: bool,
}

impl TaxonomyModule {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StageModule for TaxonomyModule {
    fn kind(&self) -> StageKind {
        StageKind::Taxonomy
    }

    fn configure(&mut self, _settings: &ModuleSettings) -> Result<(), PipelineError> {
        self.configured = true;
        Ok(())
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput, PipelineError> {
        if ctx.segments.is_empty() {
            return Err(PipelineError::Dependency {
                stage: self.kind(),
                missing: StageKind::Segmentation,
            });
        }

        let tagged = ctx
            .segments
            .iter()
            .map(|seg| {
                let shot_type = classify_shot(seg);
                let tags = build_tags(seg, shot_type);
                Segment {
                    shot_type: Some(shot_type),
                    tags,
                    ..seg.clone()
                }
            })
            .collect();

        Ok(StageOutput::Segments(tagged))
    }

    fn is_complete(&self) -> bool {
        self.configured
    }
}

const MOVEMENT_VERBS: &[&str] = &[
    "runs", "rides", "walks", "chases", "climbs", "travels", "follows", "flees", "marches",
];

fn classify_shot(seg: &Segment) -> ShotType {
    if seg.index == 0 {
        return ShotType::Establishing;
    }

    let lower = seg.content.to_lowercase();
    if lower.contains('"') || lower.contains('\u{201c}') {
        return ShotType::CloseUp;
    }
    if MOVEMENT_VERBS.iter().any(|v| lower.contains(v)) || MOVEMENT_VERBS.contains(&seg.action.as_str())
    {
        return ShotType::Tracking;
    }
    if seg.characters.len() >= 2 {
        return ShotType::Wide;
    }
    ShotType::Medium
}

fn build_tags(seg: &Segment, shot_type: ShotType) -> Vec<String> {
    let mut tags = vec![shot_type.display_name().to_string()];

    match seg.tone.as_str() {
        "tense" => tags.push("low-key lighting".to_string()),
        "intense" => tags.push("handheld camera".to_string()),
        "light" => tags.push("high-key lighting".to_string()),
        "calm" => tags.push("static camera".to_string()),
        _ => {}
    }

    if !seg.location.is_empty() {
        tags.push("on-location".to_string());
    }
    if !seg.props.is_empty() {
        tags.push("practical props".to_string());
    }

    tags
}
