//! Store tests
//!
//! Linearized mutations, snapshot reads during writes, idempotence and
//! sensor round-trips against a real file.

use pretty_assertions::assert_eq;
use serde_json::json;
use spaceapi_core::prelude::*;
use spaceapi_core::{StatusResult, ValidationError};
use spaceapi_test_utils::{read_raw, sample_document, temp_store, temp_store_with};
use std::sync::Arc;
use std::thread;

#[test]
fn test_open_true_is_idempotent() {
    let (_dir, store) = temp_store();

    store.apply(&FieldUpdate::Open(true)).unwrap();
    let once = read_raw(store.path());
    store.apply(&FieldUpdate::Open(true)).unwrap();
    let twice = read_raw(store.path());

    assert_eq!(once, twice);
    assert_eq!(once["state"]["open"], json!(true));
}

#[test]
fn test_every_sensor_round_trips() {
    let (_dir, store) = temp_store();

    for (offset, sensor) in Sensor::ALL.into_iter().enumerate() {
        let value = 1000 + offset as i64;
        store.apply(&FieldUpdate::Sensor(sensor, value)).unwrap();
        assert_eq!(store.read().unwrap().sensor_value(sensor), Some(value), "{sensor}");
    }
}

#[test]
fn test_unrelated_fields_survive_writes() {
    let (_dir, store) = temp_store();

    store.apply(&FieldUpdate::Message("Offen bis 22 Uhr".to_string())).unwrap();

    let mut expected = sample_document();
    expected["state"]["message"] = json!("Offen bis 22 Uhr");
    assert_eq!(read_raw(store.path()), expected);
}

#[test]
fn test_first_write_into_bare_document() {
    let (_dir, store) = temp_store_with(&json!({"state": {"open": false, "message": ""}}));

    store
        .apply(&FieldUpdate::Sensor(Sensor::NetworkTraffic, 512))
        .unwrap();

    assert_eq!(
        read_raw(store.path())["sensors"]["network_traffic"],
        json!([{
            "properties": {
                "bits_per_second": {"name": "Durchschnittswert Upstream und Downstream", "value": 512}
            }
        }])
    );
}

#[test]
fn test_concurrent_mutations_are_linearized() {
    let (_dir, store) = temp_store_with(&json!({"sensors": {"people_now_present": [{"value": 0}]}}));
    let threads = 8;
    let per_thread = 25;

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..per_thread {
                    store
                        .mutate(|document| -> StatusResult<()> {
                            let current = document
                                .sensor_value(Sensor::PeopleNowPresent)
                                .unwrap_or_default();
                            document.set_sensor_value(Sensor::PeopleNowPresent, current + 1);
                            Ok(())
                        })
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(
        store.read().unwrap().sensor_value(Sensor::PeopleNowPresent),
        Some(threads * per_thread)
    );
}

#[test]
fn test_reads_during_writes_see_complete_documents() {
    let (_dir, store) = temp_store();

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for value in 0..100 {
                store
                    .apply(&FieldUpdate::Sensor(Sensor::Temperature, value))
                    .unwrap();
                store.apply(&FieldUpdate::Open(value % 2 == 0)).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..100 {
                    // bypass the lock too: the rename must never expose a partial file
                    let raw = read_raw(store.path());
                    assert!(raw["state"]["open"].is_boolean());
                    assert!(raw["sensors"]["temperature"][0]["value"].is_i64());

                    let document = store.read().unwrap();
                    assert!(document.validate().is_ok());
                    assert!(document.message().is_some());
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
}

#[test]
fn test_rejected_mutation_changes_nothing() {
    let (_dir, store) = temp_store();
    let before = read_raw(store.path());

    let result = store.mutate(|document| -> StatusResult<()> {
        document.set_open(true);
        Err(ValidationError::invalid_value("temperature", "abc").into())
    });

    assert!(result.unwrap_err().is_client_error());
    assert_eq!(read_raw(store.path()), before);
}

#[test]
fn test_state_update_on_missing_file() {
    let (_dir, store) = spaceapi_test_utils::missing_store();

    let err = store.apply_state(&StateUpdate::default()).unwrap_err();
    assert!(matches!(err, StatusError::Store(e) if e.is_not_found()));
}
