//! HideBox library
//!
//! Page runtime, controller and CLI on top of the workspace crates.

pub mod background;
pub mod cli;
pub mod config;
pub mod content;
pub mod errors;

pub use background::{Controller, HostCommand, InstallReason, TabStatus};
pub use config::Config;
pub use content::{InitReport, PageRuntime, SharedPage};
pub use errors::{HideBoxError, HideBoxResult};
