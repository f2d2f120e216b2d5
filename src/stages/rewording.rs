//! Text rewording stage.
//!
//! Rewrites each segment's `content` under the configured style and leaves
//! every other field untouched. Requires segmentation output.

use async_trait::async_trait;

use crate::core::error::PipelineError;
use crate::core::stage::StageKind;
use crate::domain::{ModuleSettings, RewordingStyle, Segment};

use super::{StageContext, StageModule, StageOutput};

/// Rewrites segment text for narration
#[derive(Debug, Default)]
pub struct RewordingModule {
    style: RewordingStyle,
    configured: bool,
}

impl RewordingModule {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StageModule for RewordingModule {
    fn kind(&self) -> StageKind {
        StageKind::Rewording
    }

    fn configure(&mut self, settings: &ModuleSettings) -> Result<(), PipelineError> {
        self.style = settings.rewording_style;
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

        let reworded = ctx
            .segments
            .iter()
            .map(|seg| Segment {
                content: apply_style(self.style, &seg.content),
                ..seg.clone()
            })
            .collect();

        Ok(StageOutput::Segments(reworded))
    }

    fn is_complete(&self) -> bool {
        self.configured
    }
}

/// Archaic-to-modern word substitutions
const MODERNIZATIONS: &[(&str, &str)] = &[
    ("thee", "you"),
    ("thou", "you"),
    ("thy", "your"),
    ("thine", "yours"),
    ("hath", "has"),
    ("doth", "does"),
    ("ye", "you"),
    ("shalt", "shall"),
    ("wherefore", "why"),
    ("hither", "here"),
];

fn apply_style(style: RewordingStyle, content: &str) -> String {
    match style {
        RewordingStyle::ModernizeOldEnglish => modernize(content),
        RewordingStyle::Cinematic => format!("The camera holds on the scene: {}", content),
        RewordingStyle::Simplify => simplify(content),
        RewordingStyle::Narration => format!("We see {}", lower_first(content)),
    }
}

fn modernize(content: &str) -> String {
    content
        .split_whitespace()
        .map(|raw| {
            let core: String = raw
                .chars()
                .filter(|c| c.is_alphanumeric() || *c == '\'')
                .collect();
            let lower = core.to_lowercase();
            match MODERNIZATIONS.iter().find(|(old, _)| *old == lower) {
                Some((_, new)) => {
                    let replacement = if core.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
                    {
                        capitalize(new)
                    } else {
                        (*new).to_string()
                    };
                    raw.replace(&core, &replacement)
                }
                None => raw.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drop adverbs; shorter sentences read simpler
fn simplify(content: &str) -> String {
    content
        .split_whitespace()
        .filter(|w| {
            let core = w.trim_matches(|c: char| !c.is_alphanumeric());
            !(core.len() > 4 && core.to_lowercase().ends_with("ly"))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn lower_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
