//! Directory-backed store: one `<key>.json` file per document.
use super::DocumentStore;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Environment override for the data directory.
pub const DATA_DIR_ENV: &str = "PENRICH_DATA_DIR";

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Return the file path for a document key.
    pub fn document_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl DocumentStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.document_path(key);
        if !path.is_file() {
            return Ok(None);
        }
        let text =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        Ok(Some(text))
    }

    fn write(&mut self, key: &str, contents: &str) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("create data dir {}", self.root.display()))?;
        let path = self.document_path(key);
        // Replace atomically so a crash never leaves a half-written document.
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)
            .with_context(|| format!("create temp file in {}", self.root.display()))?;
        tmp.write_all(contents.as_bytes())
            .with_context(|| format!("write {}", path.display()))?;
        tmp.persist(&path)
            .map_err(|err| err.error)
            .with_context(|| format!("replace {}", path.display()))?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.document_path(key);
        if path.is_file() {
            fs::remove_file(&path).with_context(|| format!("remove {}", path.display()))?;
        }
        Ok(())
    }
}

/// Resolve the data directory: explicit flag > env var > platform data dir.
pub fn resolve_data_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(DATA_DIR_ENV) {
        return Ok(PathBuf::from(path));
    }
    let data_dir = dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(data_dir.join("product-enricher"))
}
