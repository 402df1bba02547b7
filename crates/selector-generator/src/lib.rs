//! Selector generation for HideBox
//!
//! Derives a CSS selector for an element that is likely to survive reloads:
//! - Unique id (highest confidence)
//! - Stable `data-*` and semantic attributes
//! - Stable class combinations
//! - Structural path from the nearest stable ancestor
//! - Positional fallback
//!
//! Values that look generated (timestamps, hashes, session tokens,
//! framework state classes) are never used as selector material.

pub mod dynamic;
pub mod errors;
pub mod escape;
pub mod generator;
pub mod strategies;
pub mod types;

pub use dynamic::{is_dynamic_class, is_dynamic_value};
pub use errors::*;
pub use generator::*;
pub use strategies::{default_strategies, Strategy};
pub use types::*;
