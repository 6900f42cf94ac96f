//! Testing utilities for the SpaceAPI workspace
//!
//! Shared fixtures: a realistic status document and throwaway stores.

#![allow(missing_docs)]

use serde_json::{json, Value};
use spaceapi_core::{Store, StoreHandle};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// File name used for fixture documents
pub const FIXTURE_FILE: &str = "api.json";

/// A status document shaped like a deployed SpaceAPI endpoint
pub fn sample_document() -> Value {
    json!({
        "api_compatibility": ["14"],
        "space": "Odenwilusenz",
        "logo": "https://www.odenwilusenz.ch/logo.png",
        "url": "https://www.odenwilusenz.ch",
        "location": {"address": "Lindenplatz 5, 5430 Wettingen", "lat": 47.4667, "lon": 8.3167},
        "contact": {"email": "info@odenwilusenz.ch"},
        "state": {"open": false, "message": "Geschlossen"},
        "sensors": {
            "temperature": [{"unit": "°C", "location": "Im Space", "value": 21}],
            "humidity": [{"unit": "%", "location": "Im Space", "value": 45}],
            "power_consumption": [{"unit": "W", "location": "Im Space", "value": 120}],
            "network_connections": [{"location": "Im Odenwilusenz_WLAN / Odenwilusenz_LAN", "value": 4}],
            "network_traffic": [{
                "properties": {
                    "bits_per_second": {"name": "Durchschnittswert Upstream und Downstream", "value": 1000}
                }
            }],
            "people_now_present": [{"value": 2}]
        }
    })
}

/// Write `value` pretty-printed into `dir`, returning the file path
pub fn write_document(dir: &Path, value: &Value) -> PathBuf {
    let path = dir.join(FIXTURE_FILE);
    std::fs::write(&path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
    path
}

/// Read the raw file back as JSON, bypassing the store
pub fn read_raw(path: &Path) -> Value {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

/// Store over a temp copy of `value`; keep the `TempDir` alive for the test
pub fn temp_store_with(value: &Value) -> (TempDir, StoreHandle) {
    let dir = tempfile::tempdir().unwrap();
    let path = write_document(dir.path(), value);
    (dir, Store::shared(path))
}

/// Store over a temp copy of [`sample_document`]
pub fn temp_store() -> (TempDir, StoreHandle) {
    temp_store_with(&sample_document())
}

/// Store whose file does not exist
pub fn missing_store() -> (TempDir, StoreHandle) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(FIXTURE_FILE);
    (dir, Store::shared(path))
}
