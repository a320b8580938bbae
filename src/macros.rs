//! Named groups of handles loaded from an INI-style macro file.
//!
//! ```ini
//! [quick]
//! wayback
//! archivetoday
//!
//! [full]
//! monolith
//! video = best
//! ```
//!
//! Each section is a macro; each key in it is a handle name. Values are
//! accepted but ignored. The `DEFAULT` section belongs to the file format and
//! is never returned as a macro. Macro names may not contain `.` or `/`,
//! since such a token on the command line is read as a URL.

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::cli::looks_like_url;
use crate::constants::DEFAULT_SECTION;

#[derive(Debug, Error)]
pub enum MacroError {
    #[error("failed to read macro file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("macro file line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// Macro name to ordered handle names. Immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroStore {
    macros: BTreeMap<String, Vec<String>>,
}

impl MacroStore {
    /// Load macros from `path`.
    ///
    /// A missing file yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, MacroError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Macro file not found, no macros loaded");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(MacroError::Read {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        };

        let store = Self::parse(&text)?;
        debug!(path = %path.display(), count = store.macros.len(), "Loaded macros");
        Ok(store)
    }

    /// Parse macro file contents.
    ///
    /// # Errors
    ///
    /// Returns an error on a malformed section header or a key outside any section.
    pub fn parse(text: &str) -> Result<Self, MacroError> {
        let mut macros: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut current: Option<String> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let Some(name) = rest.strip_suffix(']') else {
                    return Err(MacroError::Parse {
                        line: line_no,
                        message: format!("unterminated section header '{line}'"),
                    });
                };
                let name = name.trim();
                if name.is_empty() {
                    return Err(MacroError::Parse {
                        line: line_no,
                        message: "empty section name".to_string(),
                    });
                }
                if looks_like_url(name) {
                    return Err(MacroError::Parse {
                        line: line_no,
                        message: format!(
                            "macro name '{name}' contains '.' or '/' and could never be selected"
                        ),
                    });
                }
                macros.entry(name.to_string()).or_default();
                current = Some(name.to_string());
                continue;
            }

            let Some(section) = current.as_ref() else {
                return Err(MacroError::Parse {
                    line: line_no,
                    message: format!("key '{line}' appears before any section header"),
                });
            };

            let key = line
                .split(['=', ':'])
                .next()
                .unwrap_or(line)
                .trim()
                .to_lowercase();
            if key.is_empty() {
                return Err(MacroError::Parse {
                    line: line_no,
                    message: "empty key".to_string(),
                });
            }

            let handles = macros.entry(section.clone()).or_default();
            if !handles.contains(&key) {
                handles.push(key);
            }
        }

        macros.remove(DEFAULT_SECTION);
        Ok(Self { macros })
    }

    /// Handles of the named macro, in file order.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.macros.get(name).map(Vec::as_slice)
    }

    /// All macro names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.macros.keys().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.macros.len()
    }
}
