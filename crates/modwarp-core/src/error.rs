//! Error types for modwarp-core

use thiserror::Error;

/// Result type alias using modwarp-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for Modwarp
///
/// Every variant describes a failure that affects a single unit; none of
/// them abort registration, resolution or lifecycle processing for any
/// other unit.
#[derive(Error, Debug)]
pub enum Error {
    /// Manifest file unreadable or malformed
    #[error("Metadata error for '{unit}': {message}")]
    MetadataError { unit: String, message: String },

    /// Declared id/version disagrees with the unit's registration identity
    #[error("Identity mismatch for '{unit}': {message}")]
    IdentityMismatch { unit: String, message: String },

    /// Re-registration of an already known id (ignored, first wins)
    #[error("Duplicate identity: '{unit}' is already registered")]
    DuplicateIdentity { unit: String },

    /// A declared dependency cannot be satisfied
    #[error("Missing dependency for '{unit}': {dependency}")]
    MissingDependency { unit: String, dependency: String },

    /// Two resolved units declare a conflict with each other (non-fatal)
    #[error("Conflict detected: '{unit}' conflicts with '{other}'")]
    ConflictDetected { unit: String, other: String },

    /// Fixpoint resolution stalled with this unit still pending
    #[error("Unresolved cycle involving '{unit}': blocked on {blocked_on}")]
    CycleUnresolved { unit: String, blocked_on: String },

    /// A lifecycle callback or staged action failed during a phase
    #[error("Load error for '{unit}' during {phase}: {message}")]
    LoadError {
        unit: String,
        phase: String,
        message: String,
    },

    /// Invalid version string
    #[error("Invalid version format: {version}")]
    InvalidVersion { version: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl Error {
    /// Create a metadata error
    pub fn metadata(unit: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MetadataError {
            unit: unit.into(),
            message: message.into(),
        }
    }

    /// Create an identity mismatch error
    pub fn identity_mismatch(unit: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IdentityMismatch {
            unit: unit.into(),
            message: message.into(),
        }
    }

    /// Create a duplicate identity error
    pub fn duplicate_identity(unit: impl Into<String>) -> Self {
        Self::DuplicateIdentity { unit: unit.into() }
    }

    /// Create a missing dependency error
    pub fn missing_dependency(unit: impl Into<String>, dependency: impl Into<String>) -> Self {
        Self::MissingDependency {
            unit: unit.into(),
            dependency: dependency.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(unit: impl Into<String>, other: impl Into<String>) -> Self {
        Self::ConflictDetected {
            unit: unit.into(),
            other: other.into(),
        }
    }

    /// Create an unresolved cycle error
    pub fn cycle(unit: impl Into<String>, blocked_on: impl Into<String>) -> Self {
        Self::CycleUnresolved {
            unit: unit.into(),
            blocked_on: blocked_on.into(),
        }
    }

    /// Create a load error
    pub fn load(
        unit: impl Into<String>,
        phase: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::LoadError {
            unit: unit.into(),
            phase: phase.into(),
            message: message.into(),
        }
    }

    /// Create an invalid version error
    pub fn invalid_version(version: impl Into<String>) -> Self {
        Self::InvalidVersion {
            version: version.into(),
        }
    }
}
