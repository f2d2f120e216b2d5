//! Story analysis stage.
//!
//! Derives genre, target audience and themes directly from the raw text.
//! Has no dependency on segmentation and runs concurrently with it.

use async_trait::async_trait;

use crate::core::error::PipelineError;
use crate::core::stage::StageKind;
use crate::domain::{ModuleSettings, StoryAnalysis};

use super::{StageContext, StageModule, StageOutput};

/// Produces a story-level analysis record
#[derive(Debug, Default)]
pub struct StoryAnalysisModule {
    configured: bool,
}

impl StoryAnalysisModule {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StageModule for StoryAnalysisModule {
    fn kind(&self) -> StageKind {
        StageKind::StoryAnalysis
    }

    fn configure(&mut self, _settings: &ModuleSettings) -> Result<(), PipelineError> {
        self.configured = true;
        Ok(())
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput, PipelineError> {
        if ctx.story.is_blank() {
            return Err(PipelineError::Validation(
                "story text is empty or whitespace-only".to_string(),
            ));
        }

        let lower = ctx.story.text.to_lowercase();

        let genre = detect_genre(&lower);
        let target_audience = detect_audience(&ctx.story.text);
        let themes = detect_themes(&lower);

        Ok(StageOutput::Analysis(StoryAnalysis {
            genre,
            target_audience,
            themes,
        }))
    }

    fn is_complete(&self) -> bool {
        self.configured
    }
}

const GENRE_KEYWORDS: &[(&[&str], &str)] = &[
    (
        &["knight", "castle", "dragon", "sword", "kingdom", "wizard"],
        "fantasy",
    ),
    (
        &["ship", "star", "planet", "robot", "galaxy", "orbit"],
        "science fiction",
    ),
    (
        &["detective", "murder", "clue", "suspect", "crime"],
        "mystery",
    ),
    (&["ghost", "haunted", "scream", "grave"], "horror"),
    (&["love", "heart", "kiss", "wedding"], "romance"),
];

fn detect_genre(lower: &str) -> String {
    let mut best: Option<(&str, usize)> = None;
    for (keywords, genre) in GENRE_KEYWORDS {
        let hits = keywords.iter().filter(|k| lower.contains(*k)).count();
        if hits > 0 && best.map(|(_, n)| hits > n).unwrap_or(true) {
            best = Some((genre, hits));
        }
    }
    best.map(|(g, _)| g.to_string())
        .unwrap_or_else(|| "drama".to_string())
}

fn detect_audience(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return "general".to_string();
    }
    let avg_len: f64 =
        words.iter().map(|w| w.len() as f64).sum::<f64>() / words.len() as f64;

    // Longer average word length reads as adult-oriented prose
    if avg_len > 6.0 {
        "adult".to_string()
    } else if avg_len < 4.0 {
        "children".to_string()
    } else {
        "general".to_string()
    }
}

const THEME_KEYWORDS: &[(&[&str], &str)] = &[
    (&["journey", "travel", "quest", "explore"], "journey"),
    (&["friend", "together", "ally"], "friendship"),
    (&["betray", "secret", "lie"], "betrayal"),
    (&["home", "return", "family"], "homecoming"),
    (&["courage", "brave", "fear"], "courage"),
];

fn detect_themes(lower: &str) -> Vec<String> {
    THEME_KEYWORDS
        .iter()
        .filter(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, theme)| theme.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_context;

    async fn analyze(story: &str) -> StoryAnalysis {
        let mut module = StoryAnalysisModule::new();
        module.configure(&ModuleSettings::default()).unwrap();
        match module.execute(&test_context(story)).await.unwrap() {
            StageOutput::Analysis(a) => a,
            other => panic!("unexpected output: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_genre_is_never_empty() {
        let analysis = analyze("A knight explores a castle.").await;
        assert_eq!(analysis.genre, "fantasy");

        let plain = analyze("Someone walks to work and thinks.").await;
        assert!(!plain.genre.is_empty());
        assert_eq!(plain.genre, "drama");
    }

    #[tokio::test]
    async fn test_themes_detected() {
        let analysis = analyze("A brave friend begins a long journey home.").await;
        assert!(analysis.themes.contains(&"journey".to_string()));
        assert!(analysis.themes.contains(&"friendship".to_string()));
    }

    #[tokio::test]
    async fn test_blank_story_rejected() {
        let mut module = StoryAnalysisModule::new();
        module.configure(&ModuleSettings::default()).unwrap();
        let err = module.execute(&test_context("  ")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }
}
