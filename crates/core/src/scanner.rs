//! Multi-layered prompt scanner.
//!
//! Layer 1 matches known prompt-injection phrases. Layer 2 asks an
//! [`IntentClassifier`] for a hostility score. Layer 2 fails open: a
//! classifier error is logged and the prompt passes.

use crate::classifier::IntentClassifier;
use anyhow::Context;
use regex::{Regex, RegexBuilder};
use std::sync::Arc;
use tracing::{error, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum ScanVerdict {
    Safe,
    Injection { pattern: String },
    HostileIntent { score: f32 },
}

impl ScanVerdict {
    pub fn is_safe(&self) -> bool {
        matches!(self, ScanVerdict::Safe)
    }

    pub fn reason(&self) -> &'static str {
        match self {
            ScanVerdict::Safe => "none",
            ScanVerdict::Injection { .. } => "prompt_injection",
            ScanVerdict::HostileIntent { .. } => "malicious_content",
        }
    }
}

pub struct SecurityScanner {
    patterns: Vec<Regex>,
    classifier: Arc<dyn IntentClassifier>,
    threshold: f32,
}

impl SecurityScanner {
    pub fn new(
        patterns: &[String],
        classifier: Arc<dyn IntentClassifier>,
        threshold: f32,
    ) -> anyhow::Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .with_context(|| format!("invalid injection pattern {:?}", p))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        tracing::info!(
            patterns = patterns.len(),
            classifier = classifier.name(),
            threshold,
            "security scanner ready"
        );
        Ok(Self {
            patterns,
            classifier,
            threshold,
        })
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    pub async fn scan(&self, text: &str) -> ScanVerdict {
        if let Some(pattern) = self.patterns.iter().find(|p| p.is_match(text)) {
            warn!(pattern = pattern.as_str(), "prompt injection detected via pattern");
            return ScanVerdict::Injection {
                pattern: pattern.as_str().to_string(),
            };
        }

        match self.classifier.negative_score(text).await {
            Ok(score) if score > self.threshold => {
                warn!(score, classifier = self.classifier.name(), "malicious intent detected");
                ScanVerdict::HostileIntent { score }
            }
            Ok(_) => ScanVerdict::Safe,
            Err(err) => {
                error!(error = %err, classifier = self.classifier.name(), "intent classifier failed");
                ScanVerdict::Safe
            }
        }
    }

    pub async fn is_safe(&self, text: &str) -> bool {
        self.scan(text).await.is_safe()
    }
}
