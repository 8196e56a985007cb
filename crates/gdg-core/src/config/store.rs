use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use super::ConfigError;
use super::document::Document;
use super::settings::Section;

/// Sectioned key/value store holding all agent state.
///
/// Stores are passed explicitly to every entry point; nothing reads the
/// configuration through global state.
pub trait ConfigStore {
    /// Location of the backing file (reported by `--status`).
    fn path(&self) -> &Path;

    /// Re-reads the store from its backing storage.
    ///
    /// Fails with [`ConfigError::Missing`] when there is nothing to read and
    /// [`ConfigError::Corrupt`] when the content cannot be trusted.
    fn load(&mut self) -> Result<(), ConfigError>;

    fn get(&self, section: Section, key: &str) -> Result<String, ConfigError>;

    /// Sets a single key and persists it immediately.
    fn set(&mut self, section: Section, key: &str, value: &str) -> Result<(), ConfigError>;

    /// Sets several keys of one section. File-backed stores persist them in a
    /// single write.
    fn set_all(&mut self, section: Section, entries: &[(String, String)]) -> Result<(), ConfigError> {
        for (key, value) in entries {
            self.set(section, key, value)?;
        }
        Ok(())
    }

    /// Entries of a section in stored order.
    fn entries(&self, section: Section) -> Vec<(String, String)>;

    /// Removes every key of a section and persists the result.
    fn clear_section(&mut self, section: Section) -> Result<(), ConfigError>;

    /// Reads a key and parses it.
    fn get_parsed<T: FromStr>(&self, section: Section, key: &str) -> Result<T, ConfigError>
    where
        Self: Sized,
    {
        let value = self.get(section, key)?;
        value.trim().parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value,
        })
    }
}

/// Configuration store backed by a TOML file.
///
/// Writes go to a `.tmp` sibling which is then renamed over the file. A
/// write that would leave the file without the required global keys is
/// refused, so a store on disk is always complete.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    doc: Document,
}

impl FileStore {
    /// Creates a handle for `path` without touching the disk.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            doc: Document::default(),
        }
    }

    /// Creates a handle and loads it.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let mut store = Self::new(path);
        store.load()?;
        Ok(store)
    }

    fn corrupt(&self, reason: impl Into<String>) -> ConfigError {
        ConfigError::Corrupt {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    fn io_error(&self, source: std::io::Error) -> ConfigError {
        ConfigError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn flush(&mut self) -> Result<(), ConfigError> {
        let missing = self.doc.missing_globals();
        if !missing.is_empty() {
            return Err(self.corrupt(format!(
                "refusing to write store without keys: {}",
                missing.join(", ")
            )));
        }

        let content = self.doc.render().map_err(|e| self.corrupt(e))?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, content).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| self.io_error(e))?;
        debug!("Config written to {}", self.path.display());
        Ok(())
    }
}

impl ConfigStore for FileStore {
    fn path(&self) -> &Path {
        &self.path
    }

    fn load(&mut self) -> Result<(), ConfigError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::Missing(self.path.clone()));
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let doc = Document::parse(&content).map_err(|e| self.corrupt(e))?;
        let missing = doc.missing_globals();
        if !missing.is_empty() {
            return Err(self.corrupt(format!("missing keys: {}", missing.join(", "))));
        }

        self.doc = doc;
        Ok(())
    }

    fn get(&self, section: Section, key: &str) -> Result<String, ConfigError> {
        self.doc.get(section, key)
    }

    fn set(&mut self, section: Section, key: &str, value: &str) -> Result<(), ConfigError> {
        self.doc.set(section, key, value);
        self.flush()
    }

    fn set_all(&mut self, section: Section, entries: &[(String, String)]) -> Result<(), ConfigError> {
        for (key, value) in entries {
            self.doc.set(section, key, value);
        }
        self.flush()
    }

    fn entries(&self, section: Section) -> Vec<(String, String)> {
        self.doc.entries(section)
    }

    fn clear_section(&mut self, section: Section) -> Result<(), ConfigError> {
        self.doc.clear_section(section);
        self.flush()
    }
}
