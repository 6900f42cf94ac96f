//! SpaceAPI status core
//!
//! Owns the JSON status document of a space:
//! - Reads and atomically rewrites the document under a single lock
//! - Maps short keys to document paths with typed coercion
//! - Closes the space when keepalive signals stop arriving
//!
//! # Architecture
//!
//! ```text
//! HTTP handler ─┐                 ┌─> StatusDocument (in memory)
//!               ├─> KeyRegistry ─>│
//! Watchdog ─────┘     Store ──────┴─> api.json (temp file + rename)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use spaceapi_core::{KeyRegistry, Store};
//!
//! let store = Store::shared("api.json");
//! let registry = KeyRegistry::with_defaults();
//!
//! let update = registry.resolve("temperature", "21")?;
//! store.apply(&update)?;
//!
//! let (label, value) = registry.read(&store.read()?, "temperature")?;
//! assert_eq!(label, "temperature");
//! ```

#![warn(unreachable_pub)]

pub mod document;
pub mod error;
pub mod registry;
pub mod store;
pub mod watchdog;

// Re-exports for convenience
pub use document::{Field, FieldUpdate, Sensor, StateUpdate, StatusDocument};
pub use error::{StatusError, StatusResult, StoreError, ValidationError};
pub use registry::{bool_from_json, int_from_json, parse_bool, parse_int, KeyRegistry, KeySpec};
pub use store::{Store, StoreHandle};
pub use watchdog::{KeepaliveWatchdog, PollOutcome, WatchdogConfig, WatchdogError};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the status core
    pub use crate::{
        FieldUpdate, KeepaliveWatchdog, KeyRegistry, Sensor, StateUpdate, StatusDocument,
        StatusError, Store, StoreHandle, WatchdogConfig,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
