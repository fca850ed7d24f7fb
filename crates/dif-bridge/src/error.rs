//! Error types for reference synchronization

use thiserror::Error;

/// Main error type for dif-bridge operations
#[derive(Error, Debug)]
pub enum DifError {
    /// Observing or mutating a reference that was created immutable
    #[error("Cannot modify or observe immutable reference ${address}")]
    ImmutableReference {
        /// Address of the immutable reference
        address: String,
    },

    /// Creating a second reference for a value that is already bound to one
    #[error("Value is already bound to a reference (${address}); cannot create a new reference for the same value")]
    AlreadyBound {
        /// Address the value is bound to
        address: String,
    },

    /// A synchronous API was asked to do something that needs awaiting
    #[error("{operation} cannot complete synchronously; use the asynchronous variant instead")]
    RequiresAsync {
        /// The operation that was attempted
        operation: String,
    },

    /// Observer or pointer lookup failed
    #[error("{what} not found")]
    NotFound {
        /// Description of the missing item
        what: String,
    },

    /// Feature not yet implemented
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// A moved-from original container was accessed outside its access window
    #[error("Invalid access to original value that was moved to a reference")]
    OriginalValueAccess,

    /// The runtime has no pointer with this address
    #[error("Unknown reference ${address}")]
    UnknownReference {
        /// The unknown address
        address: String,
    },

    /// An update could not be applied to its target
    #[error("Invalid update: {0}")]
    InvalidUpdate(String),

    /// A wire value does not have the shape its type requires
    #[error("Invalid wire value: {0}")]
    InvalidWireValue(String),

    /// The runtime does not offer this capability
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Failure reported by the foreign runtime
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// JSON (de)serialization of wire values failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DifError {
    /// Build an [`DifError::ImmutableReference`] for the given address
    pub fn immutable(address: impl Into<String>) -> Self {
        DifError::ImmutableReference {
            address: address.into(),
        }
    }

    /// Build a [`DifError::RequiresAsync`] for the given operation
    pub fn requires_async(operation: impl Into<String>) -> Self {
        DifError::RequiresAsync {
            operation: operation.into(),
        }
    }

    /// Build a [`DifError::NotFound`] describing the missing item
    pub fn not_found(what: impl Into<String>) -> Self {
        DifError::NotFound { what: what.into() }
    }
}

/// Result type alias for dif-bridge operations
pub type Result<T> = std::result::Result<T, DifError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immutable_message_names_address() {
        let err = DifError::immutable("abc123");
        assert!(err.to_string().contains("immutable reference"));
        assert!(err.to_string().contains("$abc123"));
    }

    #[test]
    fn test_not_found_message() {
        let err = DifError::not_found("Observer 3 for $00ff");
        assert_eq!(err.to_string(), "Observer 3 for $00ff not found");
    }

    #[test]
    fn test_already_bound_message() {
        let err = DifError::AlreadyBound {
            address: "0a".to_string(),
        };
        assert!(err.to_string().contains("already bound"));
    }
}
