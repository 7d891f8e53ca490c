//! Error module for the Rusty Epidemic library.
use std::error::Error;
use std::fmt;

/// Error types for the library.
#[derive(Debug, PartialEq)]
pub enum EpiError {
    /// Error for invalid parameters, e.g., negative rates or too many initial seeds.
    InvalidParameter(String),
    /// Error for a compartment referenced by an event rule but not declared by the process.
    UndeclaredCompartment(String),
    /// Error for out of bounds access, e.g., node or edge not found.
    OutOfBounds(String),
    /// Error for a broken internal invariant, e.g., a locus out of sync with the network.
    InvariantViolation(String),
    /// Error for invalid operation, e.g., running a dynamics that was never set up.
    InvalidOperation(String),
    /// Error for registering more loci than an element can track.
    TooManyLoci(usize),
    /// Error while (de)serializing experiment parameters.
    Serialization(String),
}

impl fmt::Display for EpiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EpiError::InvalidParameter(e) => write!(f, "Invalid parameters: {}", e),
            EpiError::UndeclaredCompartment(e) => write!(f, "Undeclared compartment: {}", e),
            EpiError::OutOfBounds(e) => write!(f, "Index out of bounds: {}", e),
            EpiError::InvariantViolation(e) => write!(f, "Invariant violation: {}", e),
            EpiError::InvalidOperation(e) => write!(f, "Invalid operation: {}", e),
            EpiError::TooManyLoci(n) => write!(
                f,
                "Too many loci: {} registered, at most {} supported",
                n,
                crate::core::MAX_LOCI
            ),
            EpiError::Serialization(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl Error for EpiError {}

impl From<serde_json::Error> for EpiError {
    fn from(e: serde_json::Error) -> Self {
        EpiError::Serialization(e.to_string())
    }
}
