use crate::types::DbId;
use crate::validation::FieldViolation;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Theme not found: {0}")]
    ThemeNotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    /// Submitted content failed the theme schema. Carries every violation found.
    #[error("Validation failed: {} field(s) invalid", .0.len())]
    InvalidFields(Vec<FieldViolation>),

    /// The external site generator failed. `output` holds captured stdout/stderr.
    #[error("Build failed: {message}")]
    Build { message: String, output: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// `true` for errors the user can fix by changing their input.
    pub fn is_user_fixable(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::InvalidFields(_))
    }
}
