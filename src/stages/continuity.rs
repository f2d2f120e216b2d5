//! Continuity validation stage.
//!
//! A pure function over the segment list: detects inconsistencies and
//! returns them as data. Segments are never modified and issues never abort
//! the run.

use async_trait::async_trait;

use crate::core::error::PipelineError;
use crate::core::stage::StageKind;
use crate::domain::{ContinuityIssue, ModuleSettings, Segment, Severity};

use super::{StageContext, StageModule, StageOutput};

/// Detects continuity issues across segments
#[derive(Debug, Default)]
pub struct ContinuityModule {
    configured: bool,
}

impl ContinuityModule {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StageModule for ContinuityModule {
    fn kind(&self) -> StageKind {
        StageKind::Continuity
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

        Ok(StageOutput::Continuity(check_continuity(&ctx.segments)))
    }

    fn is_complete(&self) -> bool {
        self.configured
    }
}

/// Run every continuity check over a segment list
pub fn check_continuity(segments: &[Segment]) -> Vec<ContinuityIssue> {
    let mut issues = Vec::new();
    check_index_invariant(segments, &mut issues);
    check_location_jumps(segments, &mut issues);
    check_character_gaps(segments, &mut issues);
    check_prop_drops(segments, &mut issues);
    issues
}

/// Indices must be 0-based, unique and contiguous
fn check_index_invariant(segments: &[Segment], issues: &mut Vec<ContinuityIssue>) {
    for (pos, seg) in segments.iter().enumerate() {
        if seg.index != pos {
            issues.push(ContinuityIssue {
                segment_indices: vec![seg.index],
                description: format!(
                    "segment at position {} carries index {}; indices must be contiguous",
                    pos, seg.index
                ),
                severity: Severity::Error,
            });
        }
    }
}

fn check_location_jumps(segments: &[Segment], issues: &mut Vec<ContinuityIssue>) {
    for pair in segments.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if !a.location.is_empty() && !b.location.is_empty() && a.location != b.location {
            // A jump is fine when the segment narrates travel
            let travels = b.content.to_lowercase().contains("travel")
                || b.action == "rides"
                || b.action == "walks";
            if !travels {
                issues.push(ContinuityIssue {
                    segment_indices: vec![a.index, b.index],
                    description: format!(
                        "abrupt location change from '{}' to '{}'",
                        a.location, b.location
                    ),
                    severity: Severity::Warning,
                });
            }
        }
    }
}

/// A character who vanishes for two or more segments and then returns
fn check_character_gaps(segments: &[Segment], issues: &mut Vec<ContinuityIssue>) {
    let mut last_seen: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();

    for seg in segments {
        for name in &seg.characters {
            if let Some(&prev) = last_seen.get(name.as_str()) {
                if seg.index.saturating_sub(prev) > 2 {
                    issues.push(ContinuityIssue {
                        segment_indices: vec![prev, seg.index],
                        description: format!(
                            "character '{}' is absent between segments {} and {}",
                            name, prev, seg.index
                        ),
                        severity: Severity::Info,
                    });
                }
            }
            last_seen.insert(name.as_str(), seg.index);
        }
    }
}

/// A prop that disappears and later reappears
fn check_prop_drops(segments: &[Segment], issues: &mut Vec<ContinuityIssue>) {
    let mut last_seen: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();

    for seg in segments {
        for prop in &seg.props {
            if let Some(&prev) = last_seen.get(prop.as_str()) {
                if seg.index.saturating_sub(prev) > 1 {
                    issues.push(ContinuityIssue {
                        segment_indices: vec![prev, seg.index],
                        description: format!(
                            "prop '{}' last seen in segment {} reappears in segment {}",
                            prop, prev, seg.index
                        ),
                        severity: Severity::Info,
                    });
                }
            }
            last_seen.insert(prop.as_str(), seg.index);
        }
    }
}
