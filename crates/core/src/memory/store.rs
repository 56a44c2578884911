use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

use crate::error::AgentError;
use crate::types::{Context, MemoryEntry, MemoryRecall};

/// Fixed confidence reported for every recall. There is no relevance model
/// behind it; it is a placeholder until one exists.
pub const RECALL_CONFIDENCE: f64 = 0.8;

pub const DEFAULT_CAPACITY: usize = 1000;

/// Bounded, importance-weighted log of past interactions.
///
/// Holds at most `capacity` entries after every mutating call. On overflow the
/// whole log is re-sorted by (importance, timestamp) descending and truncated,
/// so eviction always drops the lowest-ranked entries.
#[derive(Debug)]
pub struct MemoryStore {
    entries: Vec<MemoryEntry>,
    capacity: usize,
    /// Keeps timestamps strictly increasing so recency ties never occur.
    last_timestamp: Option<DateTime<Utc>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl MemoryStore {
    /// `capacity` is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Vec::with_capacity(capacity.min(DEFAULT_CAPACITY) + 1),
            capacity,
            last_timestamp: None,
        }
    }

    /// Append a new entry, then evict if over capacity.
    /// Fails with `Validation` if `importance` is outside [0, 1].
    pub fn add(
        &mut self,
        content: impl Into<String>,
        metadata: Context,
        importance: f64,
    ) -> Result<Uuid, AgentError> {
        let mut entry = MemoryEntry::new(content, metadata, importance)?;
        if let Some(last) = self.last_timestamp
            && entry.timestamp <= last
        {
            entry.timestamp = last + TimeDelta::nanoseconds(1);
        }
        self.last_timestamp = Some(entry.timestamp);

        let id = entry.id;
        self.entries.push(entry);

        if self.entries.len() > self.capacity {
            self.evict_overflow();
        }
        Ok(id)
    }

    /// `add` at [`MemoryEntry::DEFAULT_IMPORTANCE`].
    pub fn remember(&mut self, content: impl Into<String>, metadata: Context) -> Result<Uuid, AgentError> {
        self.add(content, metadata, MemoryEntry::DEFAULT_IMPORTANCE)
    }

    /// Top `max_results` entries by (importance, timestamp) descending.
    ///
    /// `query` is not matched against content: there is no semantic scoring,
    /// only the importance/recency ranking. `max_results == 0` yields nothing.
    pub fn retrieve_relevant(&self, query: &str, max_results: usize) -> MemoryRecall {
        let mut ranked: Vec<&MemoryEntry> = self.entries.iter().collect();
        ranked.sort_by(|a, b| MemoryEntry::rank_cmp(a, b));
        ranked.truncate(max_results);

        let relevant_memories: Vec<MemoryEntry> = ranked.into_iter().cloned().collect();
        let context_summary = relevant_memories
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        tracing::debug!(
            query_len = query.len(),
            returned = relevant_memories.len(),
            stored = self.entries.len(),
            "memory recall"
        );

        MemoryRecall {
            relevant_memories,
            context_summary,
            confidence: RECALL_CONFIDENCE,
        }
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries in insertion order (or ranked order right after an eviction).
    pub fn entries(&self) -> &[MemoryEntry] {
        &self.entries
    }

    fn evict_overflow(&mut self) {
        let before = self.entries.len();
        self.entries.sort_by(MemoryEntry::rank_cmp);
        self.entries.truncate(self.capacity);
        tracing::debug!(evicted = before - self.entries.len(), capacity = self.capacity, "memory eviction");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(store: &MemoryStore) -> Vec<&str> {
        store.entries().iter().map(|e| e.content.as_str()).collect()
    }

    #[test]
    fn add_and_len() {
        let mut store = MemoryStore::new(4);
        store.remember("a", Context::new()).unwrap();
        store.add("b", Context::new(), 0.6).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(contents(&store), vec!["a", "b"]);
        assert_eq!(store.entries()[0].importance, MemoryEntry::DEFAULT_IMPORTANCE);
    }

    #[test]
    fn rejects_importance_out_of_range_without_mutating() {
        let mut store = MemoryStore::new(4);
        assert!(matches!(
            store.add("x", Context::new(), 1.5),
            Err(AgentError::Validation(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn evicts_lowest_importance() {
        let mut store = MemoryStore::new(2);
        store.add("low", Context::new(), 0.1).unwrap();
        store.add("high", Context::new(), 0.9).unwrap();
        store.add("mid", Context::new(), 0.5).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(contents(&store), vec!["high", "mid"]);
    }

    #[test]
    fn equal_importance_evicts_oldest() {
        let mut store = MemoryStore::new(2);
        store.add("first", Context::new(), 0.5).unwrap();
        store.add("second", Context::new(), 0.5).unwrap();
        store.add("third", Context::new(), 0.5).unwrap();
        assert_eq!(contents(&store), vec!["third", "second"]);
    }

    #[test]
    fn new_low_importance_entry_can_be_evicted_immediately() {
        let mut store = MemoryStore::new(1);
        store.add("keep", Context::new(), 0.9).unwrap();
        store.add("drop", Context::new(), 0.2).unwrap();
        assert_eq!(contents(&store), vec!["keep"]);
    }

    #[test]
    fn size_never_exceeds_capacity_and_survivors_dominate() {
        let mut store = MemoryStore::new(7);
        let importance_of = |i: u32| f64::from((i * 37) % 11) / 10.0;
        for i in 0..60u32 {
            store.add(format!("m{i}"), Context::new(), importance_of(i)).unwrap();
            assert!(store.len() <= store.capacity());
        }
        assert_eq!(store.len(), 7);

        let worst_survivor = store
            .entries()
            .iter()
            .map(|e| e.importance)
            .min_by(f64::total_cmp)
            .unwrap();
        for i in 0..60u32 {
            let name = format!("m{i}");
            let survived = store.entries().iter().any(|e| e.content == name);
            assert!(
                survived || importance_of(i) <= worst_survivor,
                "{name} was evicted while a lower-importance entry survived"
            );
        }
    }

    #[test]
    fn retrieve_ranks_by_importance_then_recency() {
        let mut store = MemoryStore::new(10);
        store.add("old-mid", Context::new(), 0.5).unwrap();
        store.add("top", Context::new(), 0.9).unwrap();
        store.add("new-mid", Context::new(), 0.5).unwrap();
        store.add("low", Context::new(), 0.1).unwrap();

        let recall = store.retrieve_relevant("anything", 3);
        let got: Vec<&str> = recall.relevant_memories.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(got, vec!["top", "new-mid", "old-mid"]);
        assert_eq!(recall.context_summary, "top new-mid old-mid");
        assert_eq!(recall.confidence, RECALL_CONFIDENCE);
    }

    #[test]
    fn retrieve_ignores_query_text() {
        let mut store = MemoryStore::new(10);
        store.add("chess openings", Context::new(), 0.3).unwrap();
        store.add("weather in NYC", Context::new(), 0.6).unwrap();
        let recall = store.retrieve_relevant("chess", 1);
        assert_eq!(recall.relevant_memories[0].content, "weather in NYC");
    }

    #[test]
    fn retrieve_zero_is_empty() {
        let mut store = MemoryStore::new(10);
        store.add("a", Context::new(), 0.5).unwrap();
        let recall = store.retrieve_relevant("q", 0);
        assert!(recall.relevant_memories.is_empty());
        assert_eq!(recall.context_summary, "");
    }

    #[test]
    fn retrieve_more_than_stored() {
        let mut store = MemoryStore::new(10);
        store.add("only", Context::new(), 0.5).unwrap();
        assert_eq!(store.retrieve_relevant("q", 5).relevant_memories.len(), 1);
    }

    #[test]
    fn clear_empties_store() {
        let mut store = MemoryStore::default();
        store.add("a", Context::new(), 0.5).unwrap();
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.capacity(), DEFAULT_CAPACITY);
    }
}
