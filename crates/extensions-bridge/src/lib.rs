//! HideBox messaging bridge.
//!
//! Defines the messages a controller and page runtimes exchange, the
//! [`TabHost`] seam the controller talks through, an in-process
//! [`TabRegistry`] host, and the delivery helpers that decide how failures
//! are treated.

pub mod config;
pub mod delivery;
pub mod errors;
pub mod host;
pub mod messages;

pub use config::BridgeConfig;
pub use delivery::{ensure_injected, notify_best_effort, request_with_reinject};
pub use errors::BridgeError;
pub use host::{BridgeEvent, Injector, PageEndpoint, TabHost, TabRegistry};
pub use messages::{
    hostname_of, BridgeResponse, ControllerRequest, PageRequest, PageResponse, TabId, TabInfo,
};
