//! Content validation against theme schemas.
//!
//! Pure logic: the evaluator walks a submitted snapshot against a
//! [`ThemeSchema`](crate::theme::ThemeSchema) and reports every violation it
//! finds rather than stopping at the first one.

pub mod evaluator;
pub mod rules;

pub use evaluator::{apply_defaults, validate_snapshot};
pub use rules::{FieldViolation, ValidationResult};
