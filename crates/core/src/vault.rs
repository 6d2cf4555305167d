//! Session-scoped PII vault.
//!
//! `anonymize` swaps detected PII for realistic surrogates and records
//! `surrogate -> original` per session with a TTL. `deanonymize` reverses the
//! swap using only that session's live mappings.

use crate::analyzer::{EntityKind, PiiAnalyzer};
use crate::faker::{self, FakeGenerator};
use crate::vaultstore::{VaultEntry, VaultStore};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const MAX_SURROGATE_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct Anonymized {
    pub text: String,
    pub redactions: usize,
}

impl Anonymized {
    pub fn redacted(&self) -> bool {
        self.redactions > 0
    }
}

pub struct PiiVault {
    analyzer: PiiAnalyzer,
    faker: FakeGenerator,
    store: Arc<dyn VaultStore>,
    ttl: Duration,
    max_entries: Option<u64>,
    entities: Vec<EntityKind>,
}

impl PiiVault {
    pub fn new(store: Arc<dyn VaultStore>, ttl: Duration) -> Self {
        info!(store = store.kind(), ttl_secs = ttl.as_secs(), "PII vault initialized");
        Self {
            analyzer: PiiAnalyzer::new(),
            faker: FakeGenerator::default(),
            store,
            ttl,
            max_entries: None,
            entities: EntityKind::ALL.to_vec(),
        }
    }

    pub fn with_max_entries(mut self, max_entries: Option<u64>) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_faker(mut self, faker: FakeGenerator) -> Self {
        self.faker = faker;
        self
    }

    pub fn with_entities(mut self, entities: Vec<EntityKind>) -> Self {
        self.entities = entities;
        self
    }

    pub fn store(&self) -> &Arc<dyn VaultStore> {
        &self.store
    }

    pub async fn anonymize(&self, text: &str, session_id: &str) -> anyhow::Result<Anonymized> {
        self.anonymize_at(text, session_id, now()).await
    }

    pub async fn anonymize_at(
        &self,
        text: &str,
        session_id: &str,
        now: i64,
    ) -> anyhow::Result<Anonymized> {
        let mut matches = self.analyzer.analyze(text, &self.entities);
        if matches.is_empty() {
            return Ok(Anonymized {
                text: text.to_string(),
                redactions: 0,
            });
        }

        // right to left so earlier offsets stay valid
        matches.sort_by(|a, b| b.start.cmp(&a.start));
        let mut out = text.to_string();
        for m in &matches {
            let original = &text[m.start..m.end];
            let placeholder = self.surrogate_for(session_id, original, m.kind, now).await?;
            out.replace_range(m.start..m.end, &placeholder);
        }

        if let Some(max) = self.max_entries {
            let evicted = self.store.enforce_capacity(max).await?;
            if evicted > 0 {
                debug!(evicted, "vault over capacity, evicted oldest mappings");
            }
        }

        Ok(Anonymized {
            text: out,
            redactions: matches.len(),
        })
    }

    async fn surrogate_for(
        &self,
        session_id: &str,
        original: &str,
        kind: EntityKind,
        now: i64,
    ) -> anyhow::Result<String> {
        if let Some(existing) = self
            .store
            .find_placeholder(session_id, original, kind.as_str(), now)
            .await?
        {
            return Ok(existing);
        }

        let mut entry = VaultEntry {
            session_id: session_id.to_string(),
            placeholder: String::new(),
            original: original.to_string(),
            entity: kind.as_str().to_string(),
            created_at: now,
            expires_at: now + self.ttl.as_secs() as i64,
        };
        for _ in 0..MAX_SURROGATE_ATTEMPTS {
            let candidate = self.faker.generate(kind);
            if candidate == original {
                continue;
            }
            entry.placeholder = candidate;
            if self.store.insert(entry.clone()).await? {
                return Ok(entry.placeholder);
            }
        }

        for _ in 0..MAX_SURROGATE_ATTEMPTS {
            entry.placeholder = faker::tagged(kind);
            if self.store.insert(entry.clone()).await? {
                return Ok(entry.placeholder);
            }
        }
        anyhow::bail!("no free {} placeholder in session {}", kind, session_id)
    }

    pub async fn deanonymize(&self, text: &str, session_id: &str) -> anyhow::Result<String> {
        self.deanonymize_at(text, session_id, now()).await
    }

    pub async fn deanonymize_at(
        &self,
        text: &str,
        session_id: &str,
        now: i64,
    ) -> anyhow::Result<String> {
        let entries = self.store.session_entries(session_id, now).await?;
        if entries.is_empty() {
            return Ok(text.to_string());
        }
        // one pass, longest placeholder first, so restored text is never rewritten
        let pattern = entries
            .iter()
            .map(|e| regex::escape(&e.placeholder))
            .collect::<Vec<_>>()
            .join("|");
        let re = Regex::new(&pattern)?;
        let originals: HashMap<&str, &str> = entries
            .iter()
            .map(|e| (e.placeholder.as_str(), e.original.as_str()))
            .collect();
        let restored = re.replace_all(text, |caps: &Captures| {
            let found = &caps[0];
            originals.get(found).copied().unwrap_or(found).to_string()
        });
        Ok(restored.into_owned())
    }

    pub async fn purge_expired(&self) -> anyhow::Result<u64> {
        self.store.purge_expired(now()).await
    }

    pub async fn clear_storage(&self) -> anyhow::Result<()> {
        self.store.clear().await
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
