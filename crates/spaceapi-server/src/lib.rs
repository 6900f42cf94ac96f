//! SpaceAPI HTTP surface
//!
//! warp routes over the status core:
//! - Public reads of the whole document and of single keys
//! - Token-protected JSON `update_*` endpoints
//! - Key/value `change` endpoints backed by the key registry
//! - A keepalive endpoint feeding the watchdog
//!
//! # Example
//!
//! ```rust,ignore
//! use spaceapi_server::{routes, ApiToken, AppState};
//!
//! let state = AppState::new(store, KeyRegistry::with_defaults(), watchdog, ApiToken::disabled());
//! warp::serve(routes(state)).run(([0, 0, 0, 0], 5000)).await;
//! ```

#![warn(unreachable_pub)]

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

// Re-exports for convenience
pub use auth::{ApiToken, TOKEN_HEADER};
pub use config::{command, ConfigError, ServerConfig};
pub use error::{ApiError, ApiResult, Surface};
pub use routes::{api, handle_rejection, routes};
pub use state::AppState;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
