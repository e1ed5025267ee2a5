//! Typed error taxonomy for the core (see spec §7).
//!
//! Errors split into two classes by [`Severity`]: recoverable errors are
//! logged and the offending item is dropped; fatal errors unwind to the
//! pipeline controller, which aborts workers and reports non-zero.

use thiserror::Error;

/// Whether a [`CoreError`] should abort the pipeline or just be logged and
/// skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The offending row/geometry/tile is dropped, processing continues.
    Recoverable,
    /// The pipeline must abort and report a non-zero exit status.
    Fatal,
}

/// The core's error taxonomy, per spec §7.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed primitive, style file, or configuration.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Geometry failed to assemble (degenerate ring, single-vertex line,
    /// self-intersecting polygon). Recoverable.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// The row sink reported a failure (constraint violation, connection
    /// drop, out of disk). Fatal.
    #[error("backend failure: {0}")]
    BackendFailure(String),

    /// The reprojection library rejected a coordinate. Recoverable.
    #[error("projection failure: {0}")]
    ProjectionFailure(String),

    /// An expiry set, flat-node file, or allocation ran out of room.
    /// Recoverable when it is a per-geometry cap (the offending tile is
    /// dropped); fatal when the backing store itself cannot grow, e.g. a
    /// flat-node file id falling outside its allocated capacity.
    #[error("resource exhausted: {message}")]
    ResourceExhausted { message: String, fatal: bool },

    /// An internal invariant was violated (e.g. quadkey out of range).
    /// Always fatal.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

impl CoreError {
    /// Classify this error per the propagation policy in spec §7.
    pub fn severity(&self) -> Severity {
        match self {
            CoreError::InvalidGeometry(_) | CoreError::ProjectionFailure(_) => {
                Severity::Recoverable
            }
            CoreError::ResourceExhausted { fatal, .. } => {
                if *fatal {
                    Severity::Fatal
                } else {
                    Severity::Recoverable
                }
            }
            CoreError::InvalidInput(_)
            | CoreError::BackendFailure(_)
            | CoreError::InternalInvariant(_) => Severity::Fatal,
        }
    }

    /// True if the pipeline must abort on this error.
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_geometry_cap_is_recoverable() {
        let err = CoreError::ResourceExhausted { message: "cap".to_string(), fatal: false };
        assert_eq!(err.severity(), Severity::Recoverable);
        assert!(!err.is_fatal());
    }

    #[test]
    fn backing_store_exhaustion_is_fatal() {
        let err = CoreError::ResourceExhausted { message: "full".to_string(), fatal: true };
        assert_eq!(err.severity(), Severity::Fatal);
        assert!(err.is_fatal());
    }
}
