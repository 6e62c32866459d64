//! Run statistics registry.
//!
//! Components register `key = value` lines at the end of a run; the
//! registry writes them, in registration order, to the output path. A
//! JSON snapshot of the same entries (plus the resolved configuration)
//! can be emitted next to it.

use std::fmt::Display;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use serde_json::{Map, Value};

/// Ordered collection of `key = value` stat lines.
#[derive(Debug, Default)]
pub struct Stats {
    entries: Vec<(String, String)>,
}

impl Stats {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one entry. Later entries with the same key are kept;
    /// the text output reports both.
    pub fn register(&mut self, key: impl Into<String>, value: impl Display) {
        self.entries.push((key.into(), value.to_string()));
    }

    /// Registered entries in registration order.
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Looks up the first entry registered under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Writes the plain-text report, one `key = value` per line.
    ///
    /// # Errors
    ///
    /// Propagates the underlying I/O error.
    pub fn write_text(&self, path: &Path) -> io::Result<()> {
        let mut file = File::create(path)?;
        for (key, value) in &self.entries {
            writeln!(file, "{key} = {value}")?;
        }
        Ok(())
    }

    /// The entries as a JSON object. Duplicate keys keep the last value.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (key, value) in &self.entries {
            let _ = map.insert(key.clone(), Value::String(value.clone()));
        }
        Value::Object(map)
    }

    /// Writes the JSON snapshot, embedding the resolved configuration.
    ///
    /// # Errors
    ///
    /// Propagates the underlying I/O or serialization error.
    pub fn write_json(&self, path: &Path, config: &crate::config::Config) -> io::Result<()> {
        let mut root = Map::new();
        let cfg = serde_json::to_value(config).map_err(io::Error::other)?;
        let _ = root.insert(String::from("config"), cfg);
        let _ = root.insert(String::from("stats"), self.to_json());

        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, &Value::Object(root)).map_err(io::Error::other)
    }
}
