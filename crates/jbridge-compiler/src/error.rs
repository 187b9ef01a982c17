//! Errors raised while generating a bridge
//!
//! Every variant is fatal for the one method being compiled; callers fall
//! back to another execution strategy for that method and carry on.

/// Result alias used throughout the compiler
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Error during bridge generation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    /// The method index did not resolve
    #[error("Unresolved method: index {method_idx}")]
    UnresolvedMethod {
        /// Method index that failed to resolve
        method_idx: u32,
    },

    /// The method is not declared `native`
    #[error("Method {name} is not native (access flags {access_flags:#06x})")]
    NotNative {
        /// Method name
        name: String,
        /// Access flags of the method
        access_flags: u32,
    },

    /// The type descriptor or shorty could not be parsed
    #[error("Malformed descriptor \"{descriptor}\": {reason}")]
    MalformedDescriptor {
        /// Offending descriptor text
        descriptor: String,
        /// What was wrong with it
        reason: String,
    },

    /// The generated function failed structural verification
    #[error("Verification of {symbol} failed: {errors}")]
    Verification {
        /// Bridge symbol
        symbol: String,
        /// Verifier report
        errors: String,
    },

    /// Symbol declaration, definition or finalization failed
    #[error("Module error: {0}")]
    Module(String),

    /// Target ISA could not be configured
    #[error("ISA error: {0}")]
    Isa(String),
}

impl BridgeError {
    pub(crate) fn malformed(descriptor: &str, reason: impl Into<String>) -> Self {
        BridgeError::MalformedDescriptor {
            descriptor: descriptor.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<cranelift_module::ModuleError> for BridgeError {
    fn from(e: cranelift_module::ModuleError) -> Self {
        BridgeError::Module(e.to_string())
    }
}
