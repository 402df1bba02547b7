//! Document model for HideBox.
//!
//! [`DocumentHandle`] is the seam between HideBox logic and a page. The
//! crate ships a CSS selector engine and [`SyntheticDocument`], an arena DOM
//! that implements the trait for fixtures, the CLI and tests.

pub mod errors;
pub mod handle;
pub mod matcher;
pub mod selector;
pub mod synthetic;

pub use errors::{DomError, SelectorError};
pub use handle::{BoundingBox, DocumentHandle, MutationRecord, NodeId, StyleRule};
pub use selector::SelectorList;
pub use synthetic::{ElementSpec, PageFixture, SyntheticDocument};

/// Whether `selector` parses under the supported grammar.
pub fn is_valid_selector(selector: &str) -> bool {
    selector::parse(selector).is_ok()
}
