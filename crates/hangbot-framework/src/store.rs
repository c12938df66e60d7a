//! JSON document stores.
//!
//! The bot keeps two documents, each a single JSON object on disk:
//!
//! | Document | Written by | Typical keys |
//! |----------|-----------|--------------|
//! | config   | the operator | `admins`, `conversations`, `webhooks`, `plugins` |
//! | memory   | the bot at runtime | `command_aliases`, plugin state |
//!
//! Both are loaded once at startup and rewritten wholesale on save. A store
//! tracks whether it changed since the last save; [`JsonStore::save`] is a
//! no-op on a clean store, so it is cheap to call from a periodic ticker.
//! Output is pretty-printed and keys are sorted (`serde_json::Map` is
//! ordered).
//!
//! Saving serializes under a short read lock and does the file I/O after
//! releasing it, so readers on other tasks never wait for the disk.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};

#[derive(Debug, Default)]
struct StoreState {
    data: Map<String, Value>,
    /// Bumped on every change.
    generation: u64,
    /// Generation last written to disk.
    saved: u64,
}

impl StoreState {
    fn new(data: Map<String, Value>) -> Self {
        Self {
            data,
            generation: 0,
            saved: 0,
        }
    }

    fn is_dirty(&self) -> bool {
        self.generation != self.saved
    }

    fn touch(&mut self) {
        self.generation += 1;
    }
}

/// A JSON object document with dirty tracking.
#[derive(Debug)]
pub struct JsonStore {
    path: Option<PathBuf>,
    state: RwLock<StoreState>,
    /// Serializes writers of the backing file.
    io: Mutex<()>,
}

impl JsonStore {
    /// Loads the document at `path`.
    ///
    /// A missing file yields an empty document (written on the first save).
    pub fn load(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let data = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Map::new(),
            Ok(text) => {
                let value: Value =
                    serde_json::from_str(&text).map_err(|source| StoreError::Parse {
                        path: path.clone(),
                        source,
                    })?;
                match value {
                    Value::Object(map) => map,
                    _ => return Err(StoreError::NotAnObject(path)),
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "Document not found, starting empty");
                Map::new()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        debug!(path = %path.display(), keys = data.len(), "Document loaded");
        Ok(Self {
            path: Some(path),
            state: RwLock::new(StoreState::new(data)),
            io: Mutex::new(()),
        })
    }

    /// A store with no backing file.
    ///
    /// Anything other than a JSON object starts empty. Saving only clears
    /// the dirty flag.
    pub fn in_memory(initial: Value) -> Self {
        let data = match initial {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            path: None,
            state: RwLock::new(StoreState::new(data)),
            io: Mutex::new(()),
        }
    }

    /// The backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // ─── Reading ─────────────────────────────────────────────────────────────

    /// Reads and deserializes a top-level key.
    ///
    /// Returns `None` when the key is missing or has the wrong shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get_value(key)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key, error = %e, "Stored value has an unexpected shape");
                None
            }
        }
    }

    /// Raw value of a top-level key.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.state.read().data.get(key).cloned()
    }

    /// Follows a path of object keys from the root.
    pub fn get_path(&self, path: &[&str]) -> Option<Value> {
        let state = self.state.read();
        let (first, rest) = path.split_first()?;
        let mut current = state.data.get(*first)?;
        for key in rest {
            current = current.as_object()?.get(*key)?;
        }
        Some(current.clone())
    }

    /// Whether a top-level key exists.
    pub fn contains(&self, key: &str) -> bool {
        self.state.read().data.contains_key(key)
    }

    /// Top-level keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.state.read().data.keys().cloned().collect()
    }

    /// A copy of the whole document.
    pub fn snapshot(&self) -> Value {
        Value::Object(self.state.read().data.clone())
    }

    /// Whether the document changed since the last save.
    pub fn is_dirty(&self) -> bool {
        self.state.read().is_dirty()
    }

    // ─── Writing ─────────────────────────────────────────────────────────────

    /// Stores `value` under `key`. Only an actual change marks the store dirty.
    pub fn set<T: Serialize>(&self, key: &str, value: T) -> StoreResult<()> {
        let value = serde_json::to_value(value)?;
        let mut state = self.state.write();
        if state.data.get(key) != Some(&value) {
            state.data.insert(key.to_string(), value);
            state.touch();
        }
        Ok(())
    }

    /// Removes a top-level key, returning its value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut state = self.state.write();
        let removed = state.data.remove(key);
        if removed.is_some() {
            state.touch();
        }
        removed
    }

    /// Stores `value` at a path of object keys, creating missing objects on
    /// the way.
    ///
    /// Fails with [`StoreError::PathConflict`] when the path is empty or an
    /// intermediate value exists but is not an object.
    pub fn set_path<T: Serialize>(&self, path: &[&str], value: T) -> StoreResult<()> {
        let Some((last, parents)) = path.split_last() else {
            return Err(StoreError::PathConflict(String::new()));
        };
        let value = serde_json::to_value(value)?;

        let mut state = self.state.write();
        let mut current = &mut state.data;
        for (depth, key) in parents.iter().enumerate() {
            let slot = current
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            current = match slot {
                Value::Object(map) => map,
                _ => return Err(StoreError::PathConflict(path[..=depth].join("."))),
            };
        }

        if current.get(*last) == Some(&value) {
            return Ok(());
        }
        current.insert(last.to_string(), value);
        state.touch();
        Ok(())
    }

    /// Removes the value at a path of object keys, returning it.
    pub fn remove_path(&self, path: &[&str]) -> Option<Value> {
        let (last, parents) = path.split_last()?;
        let mut state = self.state.write();
        let mut current = &mut state.data;
        for key in parents {
            current = current.get_mut(*key)?.as_object_mut()?;
        }
        let removed = current.remove(*last);
        if removed.is_some() {
            state.touch();
        }
        removed
    }

    /// Writes the document if it is dirty.
    ///
    /// Returns `true` when a file was written. A change made while the file
    /// is being written keeps the store dirty.
    pub fn save(&self) -> StoreResult<bool> {
        self.persist(false)
    }

    /// Writes the document regardless of the dirty flag.
    pub fn force_save(&self) -> StoreResult<()> {
        self.persist(true).map(|_| ())
    }

    fn persist(&self, force: bool) -> StoreResult<bool> {
        let _io = self.io.lock();
        let Some((text, generation)) = self.prepare(force)? else {
            return Ok(false);
        };
        let written = self.write_file(&text)?;
        self.commit(generation);
        Ok(written)
    }

    /// Serializes the document under the read lock.
    fn prepare(&self, force: bool) -> StoreResult<Option<(String, u64)>> {
        let state = self.state.read();
        if !force && !state.is_dirty() {
            return Ok(None);
        }
        let mut text = serde_json::to_string_pretty(&state.data)?;
        text.push('\n');
        Ok(Some((text, state.generation)))
    }

    fn commit(&self, generation: u64) {
        let mut state = self.state.write();
        state.saved = state.saved.max(generation);
    }

    fn write_file(&self, text: &str) -> StoreResult<bool> {
        let Some(path) = &self.path else {
            return Ok(false);
        };

        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = path.with_file_name(tmp_name);

        fs::write(&tmp, text).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;

        debug!(path = %path.display(), bytes = text.len(), "Document saved");
        Ok(true)
    }
}
