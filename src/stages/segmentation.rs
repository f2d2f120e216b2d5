//! Story segmentation stage.
//!
//! Splits the raw narrative into scene-level segments, one per sentence,
//! and fills the descriptive fields from lexical heuristics. Every later
//! segment-consuming stage depends on this output.

use async_trait::async_trait;

use crate::core::error::PipelineError;
use crate::core::stage::StageKind;
use crate::domain::{ModuleSettings, Segment};

use super::{StageContext, StageModule, StageOutput};

/// Words per second of narration, used to estimate segment duration
const WORDS_PER_SECOND: f64 = 2.5;

/// Segment durations are clamped to the backend's clip window
const MIN_SEGMENT_SECONDS: f64 = 3.0;
const MAX_SEGMENT_SECONDS: f64 = 20.0;

/// Breaks a story into ordered segments
#[derive(Debug, Default)]
pub struct SegmentationModule {
    target_duration: f64,
    configured: bool,
}

impl SegmentationModule {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StageModule for SegmentationModule {
    fn kind(&self) -> StageKind {
        StageKind::Segmentation
    }

    fn configure(&mut self, settings: &ModuleSettings) -> Result<(), PipelineError> {
        if settings.target_duration <= 0.0 {
            return Err(PipelineError::Configuration {
                stage: self.kind(),
                message: format!(
                    "target duration must be positive, got {}",
                    settings.target_duration
                ),
            });
        }
        self.target_duration = settings.target_duration;
        self.configured = true;
        Ok(())
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput, PipelineError> {
        if ctx.story.is_blank() {
            return Err(PipelineError::Validation(
                "story text is empty or whitespace-only".to_string(),
            ));
        }

        let sentences = split_sentences(&ctx.story.text);
        if sentences.is_empty() {
            return Err(PipelineError::Module {
                stage: self.kind(),
                message: "story text contains no parseable sentences".to_string(),
            });
        }

        let mut segments: Vec<Segment> = sentences
            .into_iter()
            .enumerate()
            .map(|(index, sentence)| build_segment(index, &sentence))
            .collect();

        // Scale down when the word-count estimate overshoots the target
        // duration; each clip still stays inside the backend's window.
        let total: f64 = segments.iter().map(|s| s.duration).sum();
        if total > self.target_duration {
            let scale = self.target_duration / total;
            for seg in &mut segments {
                seg.duration =
                    (seg.duration * scale).clamp(MIN_SEGMENT_SECONDS, MAX_SEGMENT_SECONDS);
            }
        }

        Ok(StageOutput::Segments(segments))
    }

    fn is_complete(&self) -> bool {
        self.configured
    }
}

/// Split text into sentences on terminal punctuation
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            let trimmed = current.trim();
            if trimmed.chars().any(|c| c.is_alphanumeric()) {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }

    // Trailing fragment without terminal punctuation still counts
    let trimmed = current.trim();
    if trimmed.chars().any(|c| c.is_alphanumeric()) {
        sentences.push(trimmed.to_string());
    }

    sentences
}

fn build_segment(index: usize, sentence: &str) -> Segment {
    let words: Vec<&str> = sentence.split_whitespace().collect();
    let duration =
        (words.len() as f64 / WORDS_PER_SECOND).clamp(MIN_SEGMENT_SECONDS, MAX_SEGMENT_SECONDS);

    let mut segment = Segment::new(index, duration, sentence);
    segment.characters = detect_characters(&words);
    segment.location = detect_location(&words);
    segment.setting = segment.location.clone();
    segment.action = detect_action(&words);
    segment.tone = detect_tone(sentence);
    segment.props = detect_props(&words);
    segment
}

/// Words that are capitalized mid-sentence but are not names
const NON_NAME_WORDS: &[&str] = &[
    "The", "A", "An", "In", "At", "On", "But", "And", "Then", "When", "While", "It", "He", "She",
    "They", "His", "Her", "Their",
];

fn strip_punct(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphanumeric())
}

fn detect_characters(words: &[&str]) -> Vec<String> {
    let mut characters = Vec::new();
    for (pos, raw) in words.iter().enumerate() {
        let word = strip_punct(raw);
        if pos == 0 || word.len() < 2 {
            continue;
        }
        let mut chars = word.chars();
        let first_upper = chars.next().map(|c| c.is_uppercase()).unwrap_or(false);
        let rest_lower = chars.all(|c| c.is_lowercase());
        if first_upper && rest_lower && !NON_NAME_WORDS.contains(&word) {
            let name = word.to_string();
            if !characters.contains(&name) {
                characters.push(name);
            }
        }
    }
    characters
}

fn detect_location(words: &[&str]) -> String {
    for (pos, raw) in words.iter().enumerate() {
        let word = strip_punct(raw).to_lowercase();
        if matches!(word.as_str(), "in" | "at" | "inside" | "near" | "through") {
            // Take "the X" or the bare next word
            let rest: Vec<String> = words
                .iter()
                .skip(pos + 1)
                .take(2)
                .map(|w| strip_punct(w).to_lowercase())
                .filter(|w| !w.is_empty())
                .collect();
            match rest.as_slice() {
                [article, noun] if article == "the" || article == "a" => return noun.clone(),
                [noun, ..] if noun != "the" && noun != "a" => return noun.clone(),
                _ => {}
            }
        }
    }
    String::new()
}

const ACTION_SUFFIXES: &[&str] = &["s", "ed", "ing"];

const KNOWN_VERBS: &[&str] = &[
    "explores", "runs", "walks", "rides", "fights", "enters", "leaves", "finds", "discovers",
    "opens", "climbs", "falls", "speaks", "whispers", "draws", "raises", "watches", "waits",
];

fn detect_action(words: &[&str]) -> String {
    for raw in words.iter().skip(1) {
        let word = strip_punct(raw).to_lowercase();
        if KNOWN_VERBS.contains(&word.as_str()) {
            return word;
        }
    }
    // Fall back to the first suffix-matching word past the subject
    for raw in words.iter().skip(1) {
        let word = strip_punct(raw).to_lowercase();
        if word.len() > 4 && ACTION_SUFFIXES.iter().any(|s| word.ends_with(s)) {
            return word;
        }
    }
    "unfolds".to_string()
}

fn detect_tone(sentence: &str) -> String {
    let lower = sentence.to_lowercase();
    let buckets: &[(&[&str], &str)] = &[
        (&["dark", "shadow", "fear", "dread", "cold"], "tense"),
        (&["battle", "fight", "clash", "storm"], "intense"),
        (&["laugh", "joy", "bright", "warm", "smile"], "light"),
        (&["quiet", "still", "calm", "gentle"], "calm"),
    ];
    for (keywords, tone) in buckets {
        if keywords.iter().any(|k| lower.contains(k)) {
            return tone.to_string();
        }
    }
    "neutral".to_string()
}

const KNOWN_PROPS: &[&str] = &[
    "sword", "torch", "map", "lantern", "shield", "crown", "book", "key", "banner", "rope",
    "letter", "ring",
];

fn detect_props(words: &[&str]) -> std::collections::BTreeSet<String> {
    words
        .iter()
        .map(|w| strip_punct(w).to_lowercase())
        .filter(|w| KNOWN_PROPS.contains(&w.as_str()))
        .collect()
}
