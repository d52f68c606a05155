//! Label Table

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

use crate::LabelError;

/// Ordered class names indexed by model output position.
///
/// Built once at startup and immutable afterwards. Indices outside the table
/// resolve to a synthesized `class_<index>` name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    /// Create a table from labels already in index order
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Empty table; every index resolves to `class_<index>`
    pub fn empty() -> Self {
        Self::default()
    }

    /// Read a line-delimited source. Each non-blank line, trimmed, is one label.
    pub fn from_reader<R: BufRead>(reader: R) -> std::io::Result<Self> {
        let mut labels = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let label = line.trim();
            if !label.is_empty() {
                labels.push(label.to_string());
            }
        }
        Ok(Self { labels })
    }

    /// Load labels from a file
    pub fn load(path: &Path) -> Result<Self, LabelError> {
        let io_err = |source| LabelError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(io_err)?;
        let table = Self::from_reader(BufReader::new(file)).map_err(io_err)?;
        info!("Loaded {} labels from {}", table.len(), path.display());
        Ok(table)
    }

    /// Resolve an output index to its label
    pub fn resolve(&self, index: usize) -> Cow<'_, str> {
        match self.labels.get(index) {
            Some(label) => Cow::Borrowed(label.as_str()),
            None => Cow::Owned(format!("class_{}", index)),
        }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

impl FromIterator<String> for LabelTable {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
