//! In-memory status document
//!
//! The document is a JSON object with a `state` section and a `sensors`
//! section. Writers go through [`StatusDocument::apply`] and
//! [`StatusDocument::apply_state`], which create any missing structure with
//! the sensor's default record shape before setting the value.

use crate::error::ValidationError;
use serde_json::{json, Map, Value};
use std::fmt;

/// Top-level section holding `open` and `message`
pub const STATE: &str = "state";

/// Top-level section holding sensor readings
pub const SENSORS: &str = "sensors";

/// Sensors with a fixed value path in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sensor {
    Temperature,
    Humidity,
    PowerConsumption,
    NetworkConnections,
    NetworkTraffic,
    PeopleNowPresent,
}

impl Sensor {
    /// Every known sensor, in document order
    pub const ALL: [Sensor; 6] = [
        Sensor::Temperature,
        Sensor::Humidity,
        Sensor::PowerConsumption,
        Sensor::NetworkConnections,
        Sensor::NetworkTraffic,
        Sensor::PeopleNowPresent,
    ];

    /// Name under `sensors` (also the `update_<name>` endpoint suffix)
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::PowerConsumption => "power_consumption",
            Self::NetworkConnections => "network_connections",
            Self::NetworkTraffic => "network_traffic",
            Self::PeopleNowPresent => "people_now_present",
        }
    }

    /// Look up a sensor by its document name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|sensor| sensor.name() == name)
    }

    /// Object keys between the first reading record and its `value`
    #[inline]
    #[must_use]
    pub const fn data_path(self) -> &'static [&'static str] {
        match self {
            Self::NetworkTraffic => &["properties", "bits_per_second"],
            _ => &[],
        }
    }

    /// Record inserted when the sensor has no reading yet
    #[must_use]
    pub fn default_record(self) -> Value {
        match self {
            Self::Temperature => json!({"unit": "°C", "location": "Im Space", "value": 0}),
            Self::Humidity => json!({"unit": "%", "location": "Im Space", "value": 0}),
            Self::PowerConsumption => json!({"unit": "W", "location": "Im Space", "value": 0}),
            Self::NetworkConnections => json!({
                "location": "Im Odenwilusenz_WLAN / Odenwilusenz_LAN",
                "value": 0
            }),
            Self::NetworkTraffic => json!({
                "properties": {
                    "bits_per_second": {
                        "name": "Durchschnittswert Upstream und Downstream",
                        "value": 0
                    }
                }
            }),
            Self::PeopleNowPresent => json!({"value": 0}),
        }
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(SENSORS)?;
        write!(f, ".{}[0]", self.name())?;
        for key in self.data_path() {
            write!(f, ".{key}")?;
        }
        f.write_str(".value")
    }
}

/// Writable location in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// `state.open`
    Open,
    /// `state.message`
    Message,
    /// Value of the first reading of a sensor
    Sensor(Sensor),
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "{STATE}.open"),
            Self::Message => write!(f, "{STATE}.message"),
            Self::Sensor(sensor) => fmt::Display::fmt(sensor, f),
        }
    }
}

/// A coerced, ready-to-apply write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate {
    Open(bool),
    Message(String),
    Sensor(Sensor, i64),
}

impl FieldUpdate {
    /// Update the watchdog applies on timeout
    #[inline]
    #[must_use]
    pub const fn close() -> Self {
        Self::Open(false)
    }

    /// Target field
    #[must_use]
    pub fn field(&self) -> Field {
        match self {
            Self::Open(_) => Field::Open,
            Self::Message(_) => Field::Message,
            Self::Sensor(sensor, _) => Field::Sensor(*sensor),
        }
    }
}

/// Partial update of the `state` section; absent fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateUpdate {
    pub message: Option<String>,
    pub open: Option<bool>,
}

impl StateUpdate {
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.message.is_none() && self.open.is_none()
    }
}

/// The status document, always rooted at a JSON object
#[derive(Debug, Clone, PartialEq)]
pub struct StatusDocument {
    root: Map<String, Value>,
}

impl StatusDocument {
    /// Wrap a parsed JSON value
    ///
    /// # Errors
    /// `ValidationError::InvalidDocument` if the value is not an object
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        match value {
            Value::Object(root) => Ok(Self { root }),
            other => Err(ValidationError::InvalidDocument(format!(
                "expected a JSON object at the root, found {}",
                kind(&other)
            ))),
        }
    }

    /// Fresh SpaceAPI document: space closed, every sensor at its default
    #[must_use]
    pub fn template(space_name: &str) -> Self {
        let sensors: Map<String, Value> = Sensor::ALL
            .into_iter()
            .map(|sensor| (sensor.name().to_string(), json!([sensor.default_record()])))
            .collect();

        let root = json!({
            "api_compatibility": ["14"],
            "space": space_name,
            "logo": "",
            "url": "",
            "location": {"lat": 0.0, "lon": 0.0},
            "contact": {},
            "state": {"open": false, "message": ""},
            "sensors": sensors,
        });

        match root {
            Value::Object(root) => Self { root },
            _ => unreachable!("json! object literal"),
        }
    }

    /// Borrow the whole document as a JSON object
    #[inline]
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.root
    }

    /// Consume into a JSON value
    #[inline]
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.root)
    }

    /// Copy of the `state` section (empty object if absent)
    #[must_use]
    pub fn state(&self) -> Value {
        self.root
            .get(STATE)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    #[must_use]
    pub fn open(&self) -> Option<bool> {
        self.root.get(STATE)?.get("open")?.as_bool()
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.root.get(STATE)?.get("message")?.as_str()
    }

    /// Value stored at the sensor's fixed path
    #[must_use]
    pub fn sensor_value(&self, sensor: Sensor) -> Option<i64> {
        self.sensor_data(sensor)?.get("value")?.as_i64()
    }

    /// Current value of a field, `None` if the path is absent
    #[must_use]
    pub fn get(&self, field: Field) -> Option<Value> {
        match field {
            Field::Open => self.open().map(Value::Bool),
            Field::Message => self.message().map(Value::from),
            Field::Sensor(sensor) => self.sensor_value(sensor).map(Value::from),
        }
    }

    fn sensor_data(&self, sensor: Sensor) -> Option<&Value> {
        let mut current = self.root.get(SENSORS)?.get(sensor.name())?.get(0)?;
        for key in sensor.data_path() {
            current = current.get(*key)?;
        }
        Some(current)
    }

    pub fn set_open(&mut self, open: bool) {
        object_entry(&mut self.root, STATE).insert("open".to_string(), Value::Bool(open));
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        object_entry(&mut self.root, STATE)
            .insert("message".to_string(), Value::String(message.into()));
    }

    /// Set a sensor value, creating the reading with its default shape first
    ///
    /// Returns the object that now holds `value`.
    pub fn set_sensor_value(&mut self, sensor: Sensor, value: i64) -> Value {
        let mut target = self.first_reading_mut(sensor);
        for key in sensor.data_path() {
            target = object_entry(target, key);
        }
        target.insert("value".to_string(), Value::from(value));
        Value::Object(target.clone())
    }

    fn first_reading_mut(&mut self, sensor: Sensor) -> &mut Map<String, Value> {
        let sensors = object_entry(&mut self.root, SENSORS);
        let readings = sensors
            .entry(sensor.name().to_string())
            .or_insert_with(|| Value::Array(Vec::new()));

        let usable = matches!(
            &*readings,
            Value::Array(items) if items.first().is_some_and(Value::is_object)
        );
        if !usable {
            *readings = Value::Array(vec![sensor.default_record()]);
        }

        match readings {
            Value::Array(items) => match items.first_mut() {
                Some(Value::Object(record)) => record,
                _ => unreachable!("first reading was just ensured to be an object"),
            },
            _ => unreachable!("readings were just ensured to be an array"),
        }
    }

    /// Apply a single field update, returning what was written
    pub fn apply(&mut self, update: &FieldUpdate) -> Value {
        match update {
            FieldUpdate::Open(open) => {
                self.set_open(*open);
                Value::Bool(*open)
            }
            FieldUpdate::Message(message) => {
                self.set_message(message.clone());
                Value::String(message.clone())
            }
            FieldUpdate::Sensor(sensor, value) => self.set_sensor_value(*sensor, *value),
        }
    }

    /// Apply a partial state update, returning the resulting `state` section
    pub fn apply_state(&mut self, update: &StateUpdate) -> Value {
        if let Some(message) = &update.message {
            self.set_message(message.clone());
        }
        if let Some(open) = update.open {
            self.set_open(open);
        }
        self.state()
    }

    /// Check the structural invariants a persisted document must hold
    ///
    /// # Errors
    /// `ValidationError::InvalidDocument` naming the first offending path
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.violations().into_iter().next() {
            Some(violation) => Err(violation),
            None => Ok(()),
        }
    }

    /// Every structural invariant the document currently breaks
    #[must_use]
    pub fn violations(&self) -> Vec<ValidationError> {
        let mut found = Vec::new();

        if let Some(state) = self.root.get(STATE) {
            match state.as_object() {
                None => found.push(invalid(STATE, "an object", state)),
                Some(state) => {
                    if let Some(open) = state.get("open").filter(|v| !v.is_boolean()) {
                        found.push(invalid(&Field::Open.to_string(), "a boolean", open));
                    }
                    if let Some(message) = state.get("message").filter(|v| !v.is_string()) {
                        found.push(invalid(&Field::Message.to_string(), "a string", message));
                    }
                }
            }
        }

        if let Some(sensors) = self.root.get(SENSORS) {
            let Some(sensors) = sensors.as_object() else {
                found.push(invalid(SENSORS, "an object", sensors));
                return found;
            };
            for sensor in Sensor::ALL {
                let Some(readings) = sensors.get(sensor.name()) else {
                    continue;
                };
                if !readings.is_array() {
                    let path = format!("{SENSORS}.{}", sensor.name());
                    found.push(invalid(&path, "an array", readings));
                    continue;
                }
                if let Some(value) = self.sensor_data(sensor).and_then(|data| data.get("value")) {
                    if !(value.is_i64() || value.is_u64()) {
                        found.push(invalid(&sensor.to_string(), "an integer", value));
                    }
                }
            }
        }

        found
    }
}

fn object_entry<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    let slot = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(inner) => inner,
        _ => unreachable!("slot was just ensured to be an object"),
    }
}

fn invalid(path: &str, expected: &str, found: &Value) -> ValidationError {
    ValidationError::InvalidDocument(format!(
        "{path} must be {expected}, found {}",
        kind(found)
    ))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn doc(value: Value) -> StatusDocument {
        StatusDocument::from_value(value).unwrap()
    }

    #[test]
    fn rejects_non_object_root() {
        let err = StatusDocument::from_value(json!([1, 2])).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidDocument(_)));
    }

    #[test]
    fn template_is_valid_and_closed() {
        let template = StatusDocument::template("Odenwilusenz");
        assert!(template.validate().is_ok());
        assert_eq!(template.open(), Some(false));
        assert_eq!(template.message(), Some(""));
        for sensor in Sensor::ALL {
            assert_eq!(template.sensor_value(sensor), Some(0), "{sensor}");
        }
    }

    #[test]
    fn sensor_path_display() {
        assert_eq!(
            Sensor::NetworkTraffic.to_string(),
            "sensors.network_traffic[0].properties.bits_per_second.value"
        );
        assert_eq!(Field::Sensor(Sensor::Humidity).to_string(), "sensors.humidity[0].value");
        assert_eq!(Field::Open.to_string(), "state.open");
    }

    #[test]
    fn sensor_names_round_trip() {
        for sensor in Sensor::ALL {
            assert_eq!(Sensor::from_name(sensor.name()), Some(sensor));
        }
        assert_eq!(Sensor::from_name("state"), None);
    }

    #[test]
    fn set_sensor_creates_default_shape() {
        let mut document = doc(json!({"state": {"open": true, "message": ""}}));

        let data = document.set_sensor_value(Sensor::Temperature, 21);

        assert_eq!(data, json!({"unit": "°C", "location": "Im Space", "value": 21}));
        assert_eq!(document.sensor_value(Sensor::Temperature), Some(21));
    }

    #[test]
    fn set_traffic_creates_nested_path_in_existing_record() {
        let mut document = doc(json!({"sensors": {"network_traffic": [{"location": "rack"}]}}));

        let data = document.set_sensor_value(Sensor::NetworkTraffic, 1000);

        assert_eq!(data, json!({"value": 1000}));
        assert_eq!(
            document.as_map()["sensors"]["network_traffic"][0],
            json!({"location": "rack", "properties": {"bits_per_second": {"value": 1000}}})
        );
    }

    #[test]
    fn set_sensor_keeps_existing_labels() {
        let mut document = doc(json!({
            "sensors": {"humidity": [{"unit": "%", "location": "Werkstatt", "value": 40}]}
        }));

        document.set_sensor_value(Sensor::Humidity, 55);

        assert_eq!(
            document.as_map()["sensors"]["humidity"],
            json!([{"unit": "%", "location": "Werkstatt", "value": 55}])
        );
    }

    #[test]
    fn empty_reading_list_gets_default_record() {
        let mut document = doc(json!({"sensors": {"people_now_present": []}}));
        document.set_sensor_value(Sensor::PeopleNowPresent, 3);
        assert_eq!(document.as_map()["sensors"]["people_now_present"], json!([{"value": 3}]));
    }

    #[test]
    fn empty_state_update_changes_nothing() {
        let mut document = doc(json!({"state": {"open": true, "message": "hi"}}));
        let before = document.clone();

        let state = document.apply_state(&StateUpdate::default());

        assert_eq!(document, before);
        assert_eq!(state, json!({"open": true, "message": "hi"}));
    }

    #[test]
    fn partial_state_update() {
        let mut document = doc(json!({"state": {"open": true, "message": "hi"}}));

        let state = document.apply_state(&StateUpdate {
            message: Some("bye".to_string()),
            open: None,
        });

        assert_eq!(state, json!({"open": true, "message": "bye"}));
    }

    #[test]
    fn validate_rejects_wrong_types() {
        let err = doc(json!({"state": {"open": "yes"}})).validate().unwrap_err();
        assert!(err.to_string().contains("state.open"));

        let err = doc(json!({"sensors": {"temperature": [{"value": "hot"}]}}))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("sensors.temperature[0].value"));

        let err = doc(json!({"sensors": {"humidity": 4}})).validate().unwrap_err();
        assert!(err.to_string().contains("sensors.humidity"));
    }

    #[test]
    fn violations_lists_every_offending_path() {
        let document = doc(json!({
            "state": {"open": "yes", "message": 5},
            "sensors": {"temperature": [{"value": 21.5}], "humidity": [{"value": 40}]}
        }));

        let paths: Vec<_> = document.violations().iter().map(ToString::to_string).collect();
        assert_eq!(paths.len(), 3);
        assert!(paths[0].contains("state.open"));
        assert!(paths[1].contains("state.message"));
        assert!(paths[2].contains("sensors.temperature[0].value"));
    }

    #[test]
    fn apply_returns_written_value() {
        let mut document = doc(json!({}));
        assert_eq!(document.apply(&FieldUpdate::close()), json!(false));
        assert_eq!(
            document.apply(&FieldUpdate::Message("back soon".to_string())),
            json!("back soon")
        );
        assert_eq!(document.get(Field::Open), Some(json!(false)));
        assert_eq!(FieldUpdate::Sensor(Sensor::Humidity, 1).field(), Field::Sensor(Sensor::Humidity));
    }
}
