//! Durable key-value documents backing the library, history and dictionary.
//!
//! Every document is a whole JSON value read and replaced as a unit. There is
//! no transactional isolation: one writer per store at a time.
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

mod file;
mod history;
mod library;
mod memory;

pub use file::{resolve_data_dir, FileStore};
pub use history::{append_batch, clear_history, find_batch, load_history};
pub use library::{
    approve_batch, delete_record, load_library, save_library, search_library, set_field,
    update_record, upsert_records,
};
pub use memory::MemoryStore;

pub const LIBRARY_KEY: &str = "library";
pub const HISTORY_KEY: &str = "history";
pub const STANDARDIZED_VALUES_KEY: &str = "standardized_values";
pub const SETTINGS_KEY: &str = "settings";
pub const CHECKPOINT_KEY: &str = "checkpoint";

/// Abstract durable store of named text documents.
pub trait DocumentStore {
    /// Return the document text, or `None` when it was never written.
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Replace the document with `contents`.
    fn write(&mut self, key: &str, contents: &str) -> Result<()>;

    /// Delete the document; missing documents are not an error.
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Read and decode a JSON document.
pub fn load_document<T: DeserializeOwned>(store: &dyn DocumentStore, key: &str) -> Result<Option<T>> {
    let Some(text) = store.read(key)? else {
        return Ok(None);
    };
    let value = serde_json::from_str(&text).with_context(|| format!("parse {key} document"))?;
    Ok(Some(value))
}

/// Encode and persist a JSON document in a stable, pretty format.
pub fn save_document<T: Serialize + ?Sized>(
    store: &mut dyn DocumentStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let text = serde_json::to_string_pretty(value).with_context(|| format!("serialize {key}"))?;
    store.write(key, &text)?;
    tracing::debug!(key, bytes = text.len(), "document saved");
    Ok(())
}
