//! In-memory configuration store for tests.

use std::path::{Path, PathBuf};

use super::ConfigError;
use super::document::Document;
use super::settings::Section;
use super::store::ConfigStore;

/// Configuration store that never touches the disk.
///
/// Unlike [`FileStore`](super::FileStore) it does not refuse incomplete
/// writes, so tests can seed only the sections they care about.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    path: PathBuf,
    doc: Document,
    written: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            path: PathBuf::from("memory://gdg.cfg"),
            doc: Document::default(),
            written: false,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryStore {
    fn path(&self) -> &Path {
        &self.path
    }

    fn load(&mut self) -> Result<(), ConfigError> {
        if !self.written {
            return Err(ConfigError::Missing(self.path.clone()));
        }
        let missing = self.doc.missing_globals();
        if !missing.is_empty() {
            return Err(ConfigError::Corrupt {
                path: self.path.clone(),
                reason: format!("missing keys: {}", missing.join(", ")),
            });
        }
        Ok(())
    }

    fn get(&self, section: Section, key: &str) -> Result<String, ConfigError> {
        self.doc.get(section, key)
    }

    fn set(&mut self, section: Section, key: &str, value: &str) -> Result<(), ConfigError> {
        self.doc.set(section, key, value);
        self.written = true;
        Ok(())
    }

    fn entries(&self, section: Section) -> Vec<(String, String)> {
        self.doc.entries(section)
    }

    fn clear_section(&mut self, section: Section) -> Result<(), ConfigError> {
        self.doc.clear_section(section);
        self.written = true;
        Ok(())
    }
}
