use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name a document gets before the user has picked one.
pub const DEFAULT_DOC_NAME: &str = "untitled";

#[derive(Clone, Debug, Error, PartialEq)]
pub enum StorageError {
    #[error("storage write failed for key `{key}`")]
    WriteFailed { key: String },
    #[error("stored payload under `{key}` is corrupt: {message}")]
    CorruptPayload { key: String, message: String },
    #[error("`{name}` is reserved for internal bookkeeping")]
    ReservedName { name: String },
}

/// True for document names that would collide with a namespace's own
/// bookkeeping keys. A document named `last-filename` would share its key
/// with the active-document sentinel.
pub fn reserved_name(name: &str) -> bool {
    name == "last-filename"
}

/// Minimal key-value surface over whatever holds the documents.
///
/// The browser implementation wraps `localStorage`; tests inject
/// `MemoryStorage` instead.
pub trait KeyValue {
    fn read(&self, key: &str) -> Option<String>;
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn delete(&self, key: &str);
    fn keys(&self) -> Vec<String>;
}

impl<T: KeyValue + ?Sized> KeyValue for &T {
    fn read(&self, key: &str) -> Option<String> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).write(key, value)
    }

    fn delete(&self, key: &str) {
        (**self).delete(key)
    }

    fn keys(&self) -> Vec<String> {
        (**self).keys()
    }
}

pub struct BrowserStorage {
    inner: web_sys::Storage,
}

impl BrowserStorage {
    pub fn local() -> Option<Self> {
        let inner = web_sys::window()?.local_storage().ok().flatten()?;
        Some(Self { inner })
    }
}

impl KeyValue for BrowserStorage {
    fn read(&self, key: &str) -> Option<String> {
        self.inner.get_item(key).ok().flatten()
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.inner
            .set_item(key, value)
            .map_err(|_| StorageError::WriteFailed {
                key: key.to_string(),
            })
    }

    fn delete(&self, key: &str) {
        let _ = self.inner.remove_item(key);
    }

    fn keys(&self) -> Vec<String> {
        let len = self.inner.length().unwrap_or(0);
        (0..len)
            .filter_map(|i| self.inner.key(i).ok().flatten())
            .collect()
    }
}

/// In-memory stand-in for `localStorage`.
#[derive(Default)]
pub struct MemoryStorage {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValue for MemoryStorage {
    fn read(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) {
        self.entries.borrow_mut().remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }
}

/// Key prefix isolating one editor surface's documents from the others.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Namespace(pub &'static str);

pub const MARKDOWN_PAD: Namespace = Namespace("markdown-pad");
pub const CHART_PAD: Namespace = Namespace("chart-pad");
pub const BLOCK_PAD: Namespace = Namespace("block-pad");

impl Namespace {
    fn doc_key(&self, name: &str) -> String {
        format!("{}-{}", self.0, name)
    }

    fn last_name_key(&self) -> String {
        format!("{}-last-filename", self.0)
    }
}

/// How a surface serializes document payloads.
///
/// The markdown surface stores raw text; the chart and multi-block surfaces
/// wrap it in a JSON record so the listing can sort by recency.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadFormat {
    PlainText,
    Timestamped,
}

#[derive(Serialize, Deserialize)]
struct StoredDoc {
    text: String,
    #[serde(rename = "lastModified")]
    last_modified: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DocumentEntry {
    pub name: String,
    pub last_modified: f64,
}

pub struct DocumentStore<S> {
    backend: S,
    namespace: Namespace,
    format: PayloadFormat,
}

impl<S: KeyValue> DocumentStore<S> {
    pub fn new(backend: S, namespace: Namespace, format: PayloadFormat) -> Self {
        Self {
            backend,
            namespace,
            format,
        }
    }

    pub fn put(&self, name: &str, text: &str, now: f64) -> Result<(), StorageError> {
        if reserved_name(name) {
            return Err(StorageError::ReservedName {
                name: name.to_string(),
            });
        }
        let key = self.namespace.doc_key(name);
        let payload = match self.format {
            PayloadFormat::PlainText => text.to_string(),
            PayloadFormat::Timestamped => serde_json::to_string(&StoredDoc {
                text: text.to_string(),
                last_modified: now,
            })
            .map_err(|_| StorageError::WriteFailed { key: key.clone() })?,
        };
        self.backend.write(&key, &payload)
    }

    pub fn get(&self, name: &str) -> Result<Option<String>, StorageError> {
        let key = self.namespace.doc_key(name);
        let Some(payload) = self.backend.read(&key) else {
            return Ok(None);
        };
        match self.format {
            PayloadFormat::PlainText => Ok(Some(payload)),
            PayloadFormat::Timestamped => serde_json::from_str::<StoredDoc>(&payload)
                .map(|doc| Some(doc.text))
                .map_err(|err| StorageError::CorruptPayload {
                    key,
                    message: err.to_string(),
                }),
        }
    }

    pub fn remove(&self, name: &str) {
        self.backend.delete(&self.namespace.doc_key(name));
    }

    /// Move a document to a new name. The new key is written before the old
    /// one is deleted, so a failed write leaves the original untouched.
    pub fn rename(&self, old: &str, new: &str) -> Result<(), StorageError> {
        if old == new {
            return Ok(());
        }
        if reserved_name(new) {
            return Err(StorageError::ReservedName {
                name: new.to_string(),
            });
        }
        if let Some(payload) = self.backend.read(&self.namespace.doc_key(old)) {
            self.backend.write(&self.namespace.doc_key(new), &payload)?;
            self.backend.delete(&self.namespace.doc_key(old));
        }
        Ok(())
    }

    /// Every saved document in this namespace, most recently modified first.
    /// Payloads that fail to parse sort as if modified right now rather than
    /// failing the whole listing.
    pub fn list(&self, now: f64) -> Vec<DocumentEntry> {
        let prefix = format!("{}-", self.namespace.0);
        let last_key = self.namespace.last_name_key();
        let mut entries: Vec<DocumentEntry> = self
            .backend
            .keys()
            .into_iter()
            .filter(|key| *key != last_key)
            .filter_map(|key| {
                let name = key.strip_prefix(&prefix)?.to_string();
                let last_modified = match self.format {
                    PayloadFormat::PlainText => now,
                    PayloadFormat::Timestamped => self
                        .backend
                        .read(&key)
                        .and_then(|payload| serde_json::from_str::<StoredDoc>(&payload).ok())
                        .map(|doc| doc.last_modified)
                        .unwrap_or(now),
                };
                Some(DocumentEntry {
                    name,
                    last_modified,
                })
            })
            .collect();
        entries.sort_by(|a, b| {
            b.last_modified
                .partial_cmp(&a.last_modified)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        entries
    }

    pub fn last_used_name(&self) -> String {
        self.backend
            .read(&self.namespace.last_name_key())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_DOC_NAME.to_string())
    }

    pub fn set_last_used_name(&self, name: &str) -> Result<(), StorageError> {
        self.backend.write(&self.namespace.last_name_key(), name)
    }
}
