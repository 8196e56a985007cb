//! In-memory representation of the configuration file.
//!
//! Backed by an order-preserving `toml::Table`, so the probe table keeps its
//! insertion order and keys gdg does not know about survive a rewrite.

use toml::{Table, Value};

use super::ConfigError;
use super::settings::{REQUIRED_GLOBAL_KEYS, Section};

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Document {
    table: Table,
}

impl Document {
    pub(crate) fn parse(content: &str) -> Result<Self, String> {
        content
            .parse::<Table>()
            .map(|table| Self { table })
            .map_err(|e| e.message().to_string())
    }

    pub(crate) fn render(&self) -> Result<String, String> {
        toml::to_string(&self.table).map_err(|e| e.to_string())
    }

    fn section(&self, section: Section) -> Option<&Table> {
        match section {
            Section::Global => Some(&self.table),
            other => self.table.get(other.name()).and_then(Value::as_table),
        }
    }

    pub(crate) fn get(&self, section: Section, key: &str) -> Result<String, ConfigError> {
        self.section(section)
            .and_then(|t| t.get(key))
            .filter(|v| !v.is_table())
            .map(scalar_to_string)
            .ok_or_else(|| ConfigError::NotFound {
                section,
                key: key.to_string(),
            })
    }

    /// Sets a key, creating the section table if needed. A non-table value
    /// sitting where a section belongs is replaced in place.
    pub(crate) fn set(&mut self, section: Section, key: &str, value: &str) {
        let value = Value::String(value.to_string());
        if section == Section::Global {
            self.table.insert(key.to_string(), value);
            return;
        }

        match self.table.get_mut(section.name()) {
            Some(Value::Table(table)) => {
                table.insert(key.to_string(), value);
            }
            _ => {
                let mut table = Table::new();
                table.insert(key.to_string(), value);
                self.table
                    .insert(section.name().to_string(), Value::Table(table));
            }
        }
    }

    /// Scalar entries of a section in file order. Nested tables are skipped,
    /// so the global section does not report `utility` or `d-state`.
    pub(crate) fn entries(&self, section: Section) -> Vec<(String, String)> {
        self.section(section)
            .map(|t| {
                t.iter()
                    .filter(|(_, v)| !v.is_table())
                    .map(|(k, v)| (k.clone(), scalar_to_string(v)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn clear_section(&mut self, section: Section) {
        match section {
            Section::Global => self.table.retain(|_, v| v.is_table()),
            other => {
                self.table
                    .insert(other.name().to_string(), Value::Table(Table::new()));
            }
        }
    }

    /// Required global keys that are absent.
    pub(crate) fn missing_globals(&self) -> Vec<&'static str> {
        REQUIRED_GLOBAL_KEYS
            .iter()
            .copied()
            .filter(|k| self.get(Section::Global, k).is_err())
            .collect()
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
