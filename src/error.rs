use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{op}: {reason}")]
    Arity { op: &'static str, reason: String },

    #[error("{what} out of range: {value}")]
    Range { what: &'static str, value: String },

    #[error("{what}: expected {expected}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("leaf count {0} is not a power of two")]
    InvalidLeafCount(usize),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("constraint #{index} is not satisfied")]
    Unsatisfied { index: usize },

    #[error("missing witness value for {0}")]
    MissingWitness(&'static str),

    #[error("failed to access artifact {path}")]
    ArtifactIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed artifact {path}: {reason}")]
    ArtifactDecode { path: PathBuf, reason: String },

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("setup failed: {0}")]
    Setup(String),

    #[error("proof generation failed: {0}")]
    ProofGeneration(String),

    #[error("artifacts were built for {found}, not {expected}")]
    BackendMismatch { expected: String, found: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn arity(op: &'static str, reason: impl Into<String>) -> Self {
        Error::Arity {
            op,
            reason: reason.into(),
        }
    }

    pub(crate) fn length(what: &'static str, expected: usize, actual: usize) -> Self {
        Error::LengthMismatch {
            what,
            expected,
            actual,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::ArtifactIo {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn decode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::ArtifactDecode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True when the error means "the witness or proof is invalid" rather than a
    /// structural or I/O problem.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Error::Unsatisfied { .. })
    }
}
