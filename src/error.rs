use thiserror::Error;

/// Errors raised by the content store, the element reconciler and the document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// An offset or length outside the valid range.
    #[error("bad location {offset}: {reason}")]
    BadLocation { offset: usize, reason: String },

    #[error("cannot undo")]
    CannotUndo,

    #[error("cannot redo")]
    CannotRedo,

    /// Lock discipline or edit lifecycle violated.
    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("invalid element specs: {0}")]
    InvalidSpecs(String),
}

impl DocumentError {
    pub fn bad_location(offset: usize, reason: impl Into<String>) -> Self {
        Self::BadLocation {
            offset,
            reason: reason.into(),
        }
    }

    pub fn is_location_error(&self) -> bool {
        matches!(self, Self::BadLocation { .. })
    }
}

pub type Result<T> = std::result::Result<T, DocumentError>;
