//! Error type for encode and decode passes.
//!
//! Every variant is fatal to the call that raised it. The only soft failure
//! in the codec (a dangling pointer on decode) is logged and never surfaces
//! here.

/// Error type for codec operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// An object's Rust type has no entry in the class registry.
    #[error("Missing constructor for {class} at {trail}")]
    MissingConstructor {
        /// Type name of the unregistered object.
        class: String,
        /// Rendered trail at the point of failure.
        trail: String,
    },

    /// A document names a class the registry cannot build.
    #[error("Unhandled class {class} at {trail}")]
    UnhandledClass {
        /// Class name found in the document.
        class: String,
        /// Rendered trail at the point of failure.
        trail: String,
    },

    /// A custom conversion hook claimed an object but produced nothing.
    #[error("Bad conversion from {0}")]
    BadConversion(String),

    /// Two different objects were assigned the same address.
    #[error("Address collision at {addr}: {detail}")]
    AddressCollision {
        /// The contested address.
        addr: usize,
        /// What occupied the address and what tried to take it.
        detail: String,
    },

    /// The trail grew past the configured ceiling.
    #[error("Maximum recursion depth {max_depth} exceeded at {trail}")]
    DepthExceeded {
        /// Configured ceiling.
        max_depth: usize,
        /// Rendered trail at the point of failure.
        trail: String,
    },

    /// A structural cycle that does not go through a pointer.
    #[error("Loop detected: {0}")]
    LoopDetected(String),

    /// A conversion hook asked for a field the object does not expose.
    #[error("No field {field} in {class}")]
    MissingField {
        /// Class of the object.
        class: String,
        /// Requested field name.
        field: String,
    },

    /// An unresolved placeholder was handed to the encoder.
    #[error("Unresolved pointer to address {0} in source graph")]
    UnresolvedPointer(usize),

    /// A reserved field has the wrong shape.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Text (de)serialization of a document failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CodecError {
    /// Create an invalid-document error from any displayable reason.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidDocument(reason.into())
    }

    /// Whether this error signals a caller mistake in the class registry.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingConstructor { .. } | Self::UnhandledClass { .. } | Self::BadConversion(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = CodecError::MissingConstructor {
            class: "Widget".to_string(),
            trail: "[0] (Widget)".to_string(),
        };
        assert_eq!(err.to_string(), "Missing constructor for Widget at [0] (Widget)");
        assert!(err.is_configuration());

        let err = CodecError::AddressCollision { addr: 3, detail: "A, B".to_string() };
        assert!(err.to_string().contains("at 3"));
        assert!(!err.is_configuration());
    }
}
