//! File-backed status store
//!
//! Every read and every read-modify-write runs under one process-wide lock.
//! Writes go to a temporary file in the target's directory which is then
//! renamed over the target, so readers only ever see a complete document.

use crate::document::{FieldUpdate, StateUpdate, StatusDocument};
use crate::error::{StatusError, StatusResult, StoreError, ValidationError};
use parking_lot::Mutex;
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Shared handle passed to request handlers and the watchdog
pub type StoreHandle = Arc<Store>;

/// Owner of the status file
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    lock: Mutex<()>,
}

impl Store {
    /// Create store for the file at `path` (the file is not touched)
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Create a shareable store handle
    #[inline]
    #[must_use]
    pub fn shared(path: impl Into<PathBuf>) -> StoreHandle {
        Arc::new(Self::new(path))
    }

    /// Path of the status file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load a consistent snapshot of the document
    ///
    /// # Errors
    /// - `StoreError::NotFound` if the file is absent
    /// - `StoreError::Parse` if the content is not a JSON object
    /// - `StoreError::Read` for any other IO failure
    pub fn read(&self) -> Result<StatusDocument, StoreError> {
        let _guard = self.lock.lock();
        self.load()
    }

    /// Run `f` against the current document and persist the result
    ///
    /// The whole read-modify-write sequence holds the store lock. If `f`
    /// fails, or introduces an invariant violation the loaded document did
    /// not already have, nothing is written. Violations present in the file
    /// before `f` ran do not block the write. A document left unchanged by
    /// `f` is not rewritten.
    ///
    /// # Errors
    /// Whatever `f` returns, plus `StoreError` from loading or writing and
    /// `ValidationError::InvalidDocument` from the pre-write check.
    pub fn mutate<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut StatusDocument) -> Result<T, E>,
        E: From<StoreError> + From<ValidationError>,
    {
        let _guard = self.lock.lock();
        let mut document = self.load()?;
        let before = document.clone();

        let output = f(&mut document)?;

        if document == before {
            tracing::debug!(path = %self.path.display(), "document unchanged, skipping write");
            return Ok(output);
        }

        let existing = before.violations();
        if let Some(introduced) = document
            .violations()
            .into_iter()
            .find(|violation| !existing.contains(violation))
        {
            return Err(introduced.into());
        }
        if !existing.is_empty() {
            tracing::warn!(
                path = %self.path.display(),
                violations = existing.len(),
                "status document has foreign content that fails validation"
            );
        }

        self.persist(&document)?;
        Ok(output)
    }

    /// Apply a single coerced field update
    ///
    /// Returns the value (or sensor record) that now sits at the target path.
    pub fn apply(&self, update: &FieldUpdate) -> StatusResult<Value> {
        let written = self.mutate(|document| Ok::<_, StatusError>(document.apply(update)))?;
        tracing::info!(field = %update.field(), value = %written, "status updated");
        Ok(written)
    }

    /// Apply a partial update of the `state` section
    ///
    /// Returns the resulting `state` section.
    pub fn apply_state(&self, update: &StateUpdate) -> StatusResult<Value> {
        let state = self.mutate(|document| Ok::<_, StatusError>(document.apply_state(update)))?;
        if !update.is_empty() {
            tracing::info!(state = %state, "state updated");
        }
        Ok(state)
    }

    /// Write `document` only if no status file exists yet
    ///
    /// Returns whether a file was created.
    pub fn init_if_missing(&self, document: &StatusDocument) -> Result<bool, StoreError> {
        let _guard = self.lock.lock();
        if self.path.exists() {
            return Ok(false);
        }
        self.persist(document)?;
        tracing::info!(path = %self.path.display(), "created status document");
        Ok(true)
    }

    fn load(&self) -> Result<StatusDocument, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    path: self.path.clone(),
                })
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let value: Value = serde_json::from_str(&content)
            .map_err(|e| StoreError::parse(&self.path, e.to_string()))?;
        StatusDocument::from_value(value).map_err(|e| StoreError::parse(&self.path, e.to_string()))
    }

    fn persist(&self, document: &StatusDocument) -> Result<(), StoreError> {
        let mut bytes = serde_json::to_vec_pretty(document.as_map())
            .map_err(|e| StoreError::write(&self.path, io::Error::other(e)))?;
        bytes.push(b'\n');

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp =
            NamedTempFile::new_in(dir).map_err(|e| StoreError::write(&self.path, e))?;
        temp.write_all(&bytes)
            .map_err(|e| StoreError::write(&self.path, e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| StoreError::write(&self.path, e))?;

        // Temp files are created owner-only; keep the target's mode
        if let Ok(metadata) = fs::metadata(&self.path) {
            temp.as_file()
                .set_permissions(metadata.permissions())
                .map_err(|e| StoreError::write(&self.path, e))?;
        }

        temp.persist(&self.path)
            .map_err(|e| StoreError::write(&self.path, e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Sensor;
    use serde_json::json;

    fn store_with(value: Value) -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api.json");
        fs::write(&path, serde_json::to_vec_pretty(&value).unwrap()).unwrap();
        (dir, Store::new(path))
    }

    #[test]
    fn read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("absent.json"));
        assert!(store.read().unwrap_err().is_not_found());
    }

    #[test]
    fn read_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api.json");
        fs::write(&path, "{\"state\": ").unwrap();

        let err = Store::new(path).read().unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
    }

    #[test]
    fn read_non_object_is_parse_error() {
        let (_dir, store) = store_with(json!(["not", "a", "document"]));
        assert!(matches!(store.read().unwrap_err(), StoreError::Parse { .. }));
    }

    #[test]
    fn apply_persists_pretty_json() {
        let (_dir, store) = store_with(json!({"state": {"open": false, "message": ""}}));

        store.apply(&FieldUpdate::Open(true)).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\n  \"state\""));
        assert_eq!(store.read().unwrap().open(), Some(true));
    }

    #[test]
    fn failed_closure_leaves_file_untouched() {
        let (_dir, store) = store_with(json!({"state": {"open": false, "message": "x"}}));
        let before = fs::read(store.path()).unwrap();

        let result: StatusResult<()> = store.mutate(|document| {
            document.set_open(true);
            Err(ValidationError::MissingField("value").into())
        });

        assert!(result.is_err());
        assert_eq!(fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn introduced_violation_is_not_written() {
        let (_dir, store) = store_with(json!({"state": {"open": false, "message": ""}}));
        let before = fs::read(store.path()).unwrap();

        let err = store
            .mutate(|document| -> StatusResult<()> {
                *document = StatusDocument::from_value(json!({"state": {"open": "yes"}}))?;
                Ok(())
            })
            .unwrap_err();

        assert!(matches!(
            err,
            StatusError::Validation(ValidationError::InvalidDocument(_))
        ));
        assert_eq!(fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn foreign_content_does_not_block_unrelated_writes() {
        let (_dir, store) = store_with(json!({
            "state": {"open": true, "message": 5},
            "sensors": {"temperature": [{"value": 21.5}]}
        }));

        store.apply(&FieldUpdate::Open(false)).unwrap();

        let raw: Value = serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(raw["state"], json!({"open": false, "message": 5}));
        assert_eq!(raw["sensors"]["temperature"][0]["value"], json!(21.5));
    }

    #[test]
    fn preserves_key_order() {
        let (_dir, store) = store_with(json!({
            "space": "Odenwilusenz",
            "state": {"open": false, "message": ""},
            "api_compatibility": ["14"]
        }));

        store.apply(&FieldUpdate::Sensor(Sensor::Humidity, 40)).unwrap();

        let keys: Vec<_> = store.read().unwrap().as_map().keys().cloned().collect();
        assert_eq!(keys, ["space", "state", "api_compatibility", "sensors"]);
    }

    #[test]
    fn init_if_missing_only_creates_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("api.json"));
        let template = StatusDocument::template("Test");

        assert!(store.init_if_missing(&template).unwrap());
        store.apply(&FieldUpdate::Open(true)).unwrap();
        assert!(!store.init_if_missing(&template).unwrap());
        assert_eq!(store.read().unwrap().open(), Some(true));
    }

    #[test]
    fn no_temp_files_left_behind() {
        let (dir, store) = store_with(json!({}));
        for value in 0..5 {
            store.apply(&FieldUpdate::Sensor(Sensor::Temperature, value)).unwrap();
        }
        let entries = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }
}
