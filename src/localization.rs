use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use log::{debug, info, trace};
use regex::{Captures, Regex};
use serde_json::Value;

use crate::blackboard::Blackboard;
use crate::error::LocalizationError;

// ---------------------------------------------------------------------------
// Provider contract
// ---------------------------------------------------------------------------

/// Result of looking a key up in a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translation {
    Text(String),
    List(Vec<String>),
    Missing,
}

impl Translation {
    /// Normalise to an ordered list. An empty string counts as missing.
    pub fn into_list(self) -> Vec<String> {
        match self {
            Translation::Text(text) if text.is_empty() => Vec::new(),
            Translation::Text(text) => vec![text],
            Translation::List(items) => items,
            Translation::Missing => Vec::new(),
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Translation::Text(text) => Some(text),
            Translation::List(items) => items.into_iter().next(),
            Translation::Missing => None,
        }
    }
}

/// Source of localized content for dialog nodes.
pub trait LocalizationProvider {
    /// Look up a fully-qualified key (`object.node` or `node`) in a namespace.
    fn lookup(&self, key: &str, namespace: &str) -> Translation;

    /// Replace embedded placeholder expressions.
    fn expand(&self, text: &str, variables: &Blackboard) -> String {
        expand_placeholders(text, variables)
    }

    fn translate(&self, key: &str, namespace: &str) -> Option<String> {
        self.lookup(key, namespace).into_text()
    }

    fn translate_list(&self, key: &str, namespace: &str) -> Vec<String> {
        self.lookup(key, namespace).into_list()
    }
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("placeholder pattern is valid")
    })
}

/// Replace `{{name}}` with the blackboard value. Unknown names are left as-is.
pub fn expand_placeholders(text: &str, variables: &Blackboard) -> String {
    placeholder_regex()
        .replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            match variables.get(name) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => {
                    trace!("No value for placeholder '{name}'");
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

// ---------------------------------------------------------------------------
// JSON-backed provider
// ---------------------------------------------------------------------------

/// One JSON document per namespace, typically `<dir>/<namespace>.json`.
#[derive(Debug, Clone, Default)]
pub struct JsonLocalization {
    language: String,
    namespaces: HashMap<String, Value>,
}

impl JsonLocalization {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            namespaces: HashMap::new(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>, document: Value) -> Self {
        self.insert_namespace(namespace, document);
        self
    }

    pub fn insert_namespace(&mut self, namespace: impl Into<String>, document: Value) {
        self.namespaces.insert(namespace.into(), document);
    }

    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.namespaces.contains_key(namespace)
    }

    /// Load every `*.json` file in `dir`, naming each namespace after the file stem.
    pub fn load_dir<P: AsRef<Path>>(
        dir: P,
        language: impl Into<String>,
    ) -> Result<Self, LocalizationError> {
        let dir = dir.as_ref();
        let mut localization = Self::new(language);

        let entries = fs::read_dir(dir).map_err(|source| LocalizationError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        for entry in entries {
            let path = entry
                .map_err(|source| LocalizationError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?
                .path();

            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(namespace) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let raw = fs::read_to_string(&path).map_err(|source| LocalizationError::Io {
                path: path.clone(),
                source,
            })?;
            let document: Value =
                serde_json::from_str(&raw).map_err(|source| LocalizationError::Parse {
                    path: path.clone(),
                    source,
                })?;

            debug!("Loaded namespace '{namespace}' from {}", path.display());
            localization.insert_namespace(namespace, document);
        }

        info!(
            "Loaded {} localization namespaces for '{}'",
            localization.namespaces.len(),
            localization.language
        );
        Ok(localization)
    }

    /// Flat keys win over dotted paths.
    fn resolve(&self, key: &str, namespace: &str) -> Option<&Value> {
        let document = self.namespaces.get(namespace)?;
        if let Some(value) = document.get(key) {
            return Some(value);
        }
        key.split('.')
            .try_fold(document, |current, part| current.get(part))
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("text").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

impl LocalizationProvider for JsonLocalization {
    fn lookup(&self, key: &str, namespace: &str) -> Translation {
        let Some(value) = self.resolve(key, namespace) else {
            debug!("Missing translation '{namespace}:{key}'");
            return Translation::Missing;
        };

        match value {
            Value::Array(items) => Translation::List(items.iter().filter_map(text_of).collect()),
            other => text_of(other).map_or(Translation::Missing, Translation::Text),
        }
    }
}
