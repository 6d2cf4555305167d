//! Second scanning layer: scores how hostile a prompt reads.
//!
//! Scores are in `[0, 1]`; the scanner compares them against its threshold.

use crate::analyzer::{EntityKind, PiiAnalyzer};
use once_cell::sync::Lazy;
use providers::{ChatMessage, LlmProvider};
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait::async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn negative_score(&self, text: &str) -> anyhow::Result<f32>;
    fn name(&self) -> &'static str;
}

/// Never flags anything.
pub struct DisabledClassifier;

#[async_trait::async_trait]
impl IntentClassifier for DisabledClassifier {
    async fn negative_score(&self, _text: &str) -> anyhow::Result<f32> {
        Ok(0.0)
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z']+").unwrap());

const HOSTILE_TERMS: &[(&str, f32)] = &[
    ("hate", 2.0),
    ("terrible", 2.0),
    ("destroy", 2.0),
    ("kill", 2.5),
    ("murder", 2.5),
    ("attack", 1.5),
    ("bomb", 2.5),
    ("explode", 2.0),
    ("hurt", 1.5),
    ("stupid", 1.5),
    ("idiot", 1.5),
    ("worthless", 2.0),
    ("disgusting", 2.0),
    ("awful", 1.5),
    ("horrible", 2.0),
    ("die", 2.0),
    ("threat", 1.5),
    ("weapon", 1.5),
    ("poison", 2.0),
    ("revenge", 1.5),
    ("ruin", 1.5),
    ("annihilate", 2.5),
    ("malware", 2.0),
    ("ransomware", 2.5),
    ("exploit", 1.5),
];

/// Term-weighted lexicon scorer: `1 - exp(-sum of weights)`.
///
/// A single strong term stays well below the default 0.99 threshold; three
/// crosses it.
pub struct LexiconClassifier {
    weights: HashMap<&'static str, f32>,
}

impl Default for LexiconClassifier {
    fn default() -> Self {
        Self {
            weights: HOSTILE_TERMS.iter().copied().collect(),
        }
    }
}

impl LexiconClassifier {
    pub fn score(&self, text: &str) -> f32 {
        let total: f32 = WORD_RE
            .find_iter(text)
            .filter_map(|m| {
                let word = m.as_str().to_lowercase();
                self.weights
                    .get(word.as_str())
                    .or_else(|| self.weights.get(stem(&word)))
                    .copied()
            })
            .sum();
        1.0 - (-total).exp()
    }
}

fn stem(word: &str) -> &str {
    for suffix in ["ing", "ed", "es", "s"] {
        if let Some(stripped) = word.strip_suffix(suffix) {
            if stripped.len() >= 3 {
                return stripped;
            }
        }
    }
    word
}

#[async_trait::async_trait]
impl IntentClassifier for LexiconClassifier {
    async fn negative_score(&self, text: &str) -> anyhow::Result<f32> {
        let score = self.score(text);
        let preview: String = text.chars().take(30).collect();
        tracing::info!(preview = %preview, negative_score = score, "lexicon scan");
        Ok(score)
    }

    fn name(&self) -> &'static str {
        "lexicon"
    }
}

/// Asks an upstream model to rate the prompt.
///
/// Detected PII is replaced by `<KIND>` tags before the prompt leaves the
/// process; the judge only ever sees masked text.
pub struct LlmIntentClassifier {
    provider: Arc<dyn LlmProvider>,
    model: String,
    analyzer: PiiAnalyzer,
}

impl LlmIntentClassifier {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            analyzer: PiiAnalyzer::new(),
        }
    }
}

const RATING_PROMPT: &str = "Rate how hostile, abusive or malicious the following user message is. \
Reply with a single number between 0 and 1 and nothing else.";

// a standalone 0, 1 or 0.xx token
static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:0(?:\.\d+)?|1(?:\.0+)?)\b").unwrap());

/// Takes the last score-like token, so a restated scale does not win.
fn parse_score(reply: &str) -> anyhow::Result<f32> {
    let m = NUMBER_RE
        .find_iter(reply)
        .last()
        .ok_or_else(|| anyhow::anyhow!("no score in classifier reply: {:?}", reply))?;
    let score: f32 = m.as_str().parse()?;
    Ok(score.clamp(0.0, 1.0))
}

#[async_trait::async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn negative_score(&self, text: &str) -> anyhow::Result<f32> {
        let masked = self.analyzer.mask(text, &EntityKind::ALL);
        let messages = vec![ChatMessage::system(RATING_PROMPT), ChatMessage::user(masked)];
        let reply = self.provider.chat(&self.model, &messages).await?;
        parse_score(&reply)
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use providers::ProviderError;

    #[test]
    fn neutral_text_scores_zero() {
        let c = LexiconClassifier::default();
        assert_eq!(c.score("What is the capital of France?"), 0.0);
    }

    #[test]
    fn single_term_is_below_threshold() {
        let c = LexiconClassifier::default();
        let s = c.score("I hate Mondays");
        assert!(s > 0.5 && s < 0.99, "score {}", s);
    }

    #[test]
    fn stacked_hostility_crosses_threshold() {
        let c = LexiconClassifier::default();
        let s = c.score("I hate you and you are terrible and I want to destroy everything.");
        assert!(s > 0.99, "score {}", s);
    }

    #[test]
    fn inflected_forms_are_counted() {
        let c = LexiconClassifier::default();
        assert!(c.score("destroying") > 0.0);
        assert!(c.score("attacked") > 0.0);
    }

    #[test]
    fn parses_model_replies() {
        assert_eq!(parse_score("0.75").unwrap(), 0.75);
        assert_eq!(parse_score("Score: 1").unwrap(), 1.0);
        assert!(parse_score("no idea").is_err());
    }

    #[test]
    fn restated_scale_does_not_shadow_the_score() {
        assert!((parse_score("On a scale of 0 to 1: 0.97").unwrap() - 0.97).abs() < 1e-6);
        assert_eq!(parse_score("Rating 10/10? No: 0").unwrap(), 0.0);
    }

    struct Fixed(&'static str);

    #[async_trait::async_trait]
    impl LlmProvider for Fixed {
        async fn chat(&self, _m: &str, _msgs: &[ChatMessage]) -> Result<String, ProviderError> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn llm_classifier_uses_provider_reply() {
        let c = LlmIntentClassifier::new(Arc::new(Fixed("0.995")), "judge");
        let score = c.negative_score("anything").await.unwrap();
        assert!((score - 0.995).abs() < 1e-6);
    }

    #[derive(Default)]
    struct Recorder {
        seen: std::sync::Mutex<Vec<ChatMessage>>,
    }

    #[async_trait::async_trait]
    impl LlmProvider for Recorder {
        async fn chat(&self, _m: &str, msgs: &[ChatMessage]) -> Result<String, ProviderError> {
            *self.seen.lock().unwrap() = msgs.to_vec();
            Ok("0.1".to_string())
        }
    }

    #[tokio::test]
    async fn llm_judge_never_sees_raw_pii() {
        let recorder = Arc::new(Recorder::default());
        let c = LlmIntentClassifier::new(recorder.clone(), "judge");
        c.negative_score("My name is Alice and my email is alice@corp.com")
            .await
            .unwrap();
        let seen = recorder.seen.lock().unwrap().clone();
        let user = &seen.last().unwrap().content;
        assert!(!user.contains("Alice"), "{}", user);
        assert!(!user.contains("alice@corp.com"), "{}", user);
        assert!(user.contains("<EMAIL_ADDRESS>"));
    }
}
