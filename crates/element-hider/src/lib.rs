//! Element hiding for HideBox
//!
//! [`ElementHider`] turns rules into a managed stylesheet plus per-element
//! markers, restores elements exactly when rules go away, and reconciles
//! after DOM insertions through a debounced full reapply.

pub mod debounce;
pub mod errors;
pub mod hider;
pub mod stats;

pub use debounce::{Debouncer, DEFAULT_DEBOUNCE};
pub use errors::HiderError;
pub use hider::{is_own_node, ElementHider, HideRecord, HiderConfig};
pub use stats::{HiderStats, RuleStats};
