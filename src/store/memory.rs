use super::DocumentStore;
use anyhow::Result;
use std::collections::BTreeMap;

/// Process-local store, mainly for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    documents: BTreeMap<String, String>,
    writes: usize,
}

impl MemoryStore {
    /// Number of `write` calls seen so far.
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl DocumentStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.documents.get(key).cloned())
    }

    fn write(&mut self, key: &str, contents: &str) -> Result<()> {
        self.writes += 1;
        self.documents.insert(key.to_string(), contents.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.documents.remove(key);
        Ok(())
    }
}
