use sqlx::SqlitePool;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
pub use storage::vault::VaultRow as VaultEntry;

#[async_trait::async_trait]
pub trait VaultStore: Send + Sync {
    async fn find_placeholder(
        &self,
        session_id: &str,
        original: &str,
        entity: &str,
        now: i64,
    ) -> anyhow::Result<Option<String>>;
    /// Stores a mapping unless its placeholder is live in the session.
    /// Returns `false` when the placeholder is already taken.
    async fn insert(&self, entry: VaultEntry) -> anyhow::Result<bool>;
    /// Live entries of one session, longest placeholder first.
    async fn session_entries(&self, session_id: &str, now: i64) -> anyhow::Result<Vec<VaultEntry>>;
    async fn purge_expired(&self, now: i64) -> anyhow::Result<u64>;
    async fn enforce_capacity(&self, max_entries: u64) -> anyhow::Result<u64>;
    async fn clear(&self) -> anyhow::Result<()>;
    fn kind(&self) -> &'static str;
}

pub struct SqliteVaultStore {
    pool: SqlitePool,
}

impl SqliteVaultStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connects and applies migrations.
    pub async fn open(path: &str) -> anyhow::Result<Self> {
        let pool = storage::connect(path).await?;
        storage::migrate(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl VaultStore for SqliteVaultStore {
    async fn find_placeholder(
        &self,
        session_id: &str,
        original: &str,
        entity: &str,
        now: i64,
    ) -> anyhow::Result<Option<String>> {
        let row = storage::vault::find_by_original(&self.pool, session_id, original, entity, now)
            .await?;
        Ok(row.map(|r| r.placeholder))
    }

    async fn insert(&self, entry: VaultEntry) -> anyhow::Result<bool> {
        storage::vault::insert(&self.pool, &entry).await
    }

    async fn session_entries(&self, session_id: &str, now: i64) -> anyhow::Result<Vec<VaultEntry>> {
        storage::vault::session_entries(&self.pool, session_id, now).await
    }

    async fn purge_expired(&self, now: i64) -> anyhow::Result<u64> {
        storage::vault::purge_expired(&self.pool, now).await
    }

    async fn enforce_capacity(&self, max_entries: u64) -> anyhow::Result<u64> {
        storage::vault::evict_oldest(&self.pool, max_entries).await
    }

    async fn clear(&self) -> anyhow::Result<()> {
        storage::vault::clear(&self.pool).await
    }

    fn kind(&self) -> &'static str {
        "sqlite"
    }
}

/// Process-local store; mappings vanish with the process.
#[derive(Default)]
pub struct MemoryVaultStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    entries: HashMap<(String, String), VaultEntry>,
    // insertion order, oldest first
    order: VecDeque<(String, String)>,
}

impl MemoryVaultStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(p) => p.into_inner(),
        }
    }
}

#[async_trait::async_trait]
impl VaultStore for MemoryVaultStore {
    async fn find_placeholder(
        &self,
        session_id: &str,
        original: &str,
        entity: &str,
        now: i64,
    ) -> anyhow::Result<Option<String>> {
        let inner = self.lock();
        Ok(inner
            .entries
            .values()
            .filter(|e| {
                e.session_id == session_id
                    && e.original == original
                    && e.entity == entity
                    && e.expires_at > now
            })
            .max_by_key(|e| e.created_at)
            .map(|e| e.placeholder.clone()))
    }

    async fn insert(&self, entry: VaultEntry) -> anyhow::Result<bool> {
        let key = (entry.session_id.clone(), entry.placeholder.clone());
        let mut inner = self.lock();
        if let Some(existing) = inner.entries.get(&key) {
            if existing.expires_at > entry.created_at {
                return Ok(false);
            }
            inner.order.retain(|k| k != &key);
        }
        inner.entries.insert(key.clone(), entry);
        inner.order.push_back(key);
        Ok(true)
    }

    async fn session_entries(&self, session_id: &str, now: i64) -> anyhow::Result<Vec<VaultEntry>> {
        let inner = self.lock();
        let mut rows: Vec<VaultEntry> = inner
            .entries
            .values()
            .filter(|e| e.session_id == session_id && e.expires_at > now)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.placeholder.len().cmp(&a.placeholder.len()));
        Ok(rows)
    }

    async fn purge_expired(&self, now: i64) -> anyhow::Result<u64> {
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, e| e.expires_at > now);
        let MemoryInner { entries, order } = &mut *inner;
        order.retain(|k| entries.contains_key(k));
        Ok((before - entries.len()) as u64)
    }

    async fn enforce_capacity(&self, max_entries: u64) -> anyhow::Result<u64> {
        let mut inner = self.lock();
        let mut removed = 0u64;
        while inner.entries.len() as u64 > max_entries {
            let Some(key) = inner.order.pop_front() else {
                break;
            };
            if inner.entries.remove(&key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn clear(&self) -> anyhow::Result<()> {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.order.clear();
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(placeholder: &str, original: &str, created: i64) -> VaultEntry {
        VaultEntry {
            session_id: "s".into(),
            placeholder: placeholder.into(),
            original: original.into(),
            entity: "PERSON".into(),
            created_at: created,
            expires_at: created + 100,
        }
    }

    #[tokio::test]
    async fn memory_store_keeps_live_mapping() {
        let store = MemoryVaultStore::new();
        assert!(store.insert(entry("Ravi Kumar", "Alice", 0)).await.unwrap());
        assert!(!store.insert(entry("Ravi Kumar", "Bob", 10)).await.unwrap());
        let live = store.session_entries("s", 20).await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].original, "Alice");

        assert!(store.insert(entry("Ravi Kumar", "Bob", 100)).await.unwrap());
        assert_eq!(store.session_entries("s", 120).await.unwrap()[0].original, "Bob");
    }

    #[tokio::test]
    async fn sqlite_store_keeps_live_mapping() {
        let store = SqliteVaultStore::open("sqlite://file:vaultstore_claim?mode=memory&cache=shared")
            .await
            .unwrap();
        assert!(store.insert(entry("Ravi Kumar", "Alice", 0)).await.unwrap());
        assert!(!store.insert(entry("Ravi Kumar", "Bob", 10)).await.unwrap());
        assert_eq!(
            store.session_entries("s", 20).await.unwrap()[0].original,
            "Alice"
        );
    }
}
