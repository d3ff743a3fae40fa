//! Error types for shim operations
//!
//! All fallible operations return `Result<T, Error>`. The variants separate
//! "unknown to the contract" from "known but inaccessible in this direction".
//! Coercion failures on the read path are not errors: they degrade to the
//! declared type's default value.

use thiserror::Error;

/// Shim engine error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The contract (or the backing chain, on writes) declares no such member
    #[error("member '{member}' is not declared by {target}")]
    MemberNotFound { member: String, target: String },

    /// No method with that name and arity
    #[error("no method '{method}' taking {arity} argument(s) on {target}")]
    MethodNotFound {
        method: String,
        arity: usize,
        target: String,
    },

    /// Write attempted against a read-only contract member
    #[error("member '{member}' of contract '{contract}' is read-only")]
    ReadOnlyMember { member: String, contract: String },

    /// Read attempted against a write-only contract member
    #[error("member '{member}' of contract '{contract}' is write-only")]
    WriteOnlyMember { member: String, contract: String },

    /// Operation not permitted in the current state (e.g. read-only collection)
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Contract descriptor failed validation
    #[error("invalid contract '{contract}': {}", diagnostics.join("; "))]
    InvalidContract {
        contract: String,
        diagnostics: Vec<String>,
    },

    /// Argument not assignable to the callee's parameter type
    #[error("argument {index} of '{method}': expected {expected}, found {found}")]
    ArgumentMismatch {
        method: String,
        index: usize,
        expected: String,
        found: String,
    },

    /// Backing method reported a failure of its own
    #[error("invocation of '{method}' failed: {reason}")]
    InvocationFailed { method: String, reason: String },

    /// Contract schema document could not be read
    #[error("schema error: {0}")]
    Schema(String),

    /// Shim configuration document could not be read
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// True for errors that a best-effort call-through may recover from
    pub fn is_argument_mismatch(&self) -> bool {
        matches!(self, Error::ArgumentMismatch { .. })
    }
}

/// Result type alias for shim operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_not_found_display() {
        let err = Error::MemberNotFound {
            member: "Name".into(),
            target: "contract 'Person'".into(),
        };
        assert_eq!(
            err.to_string(),
            "member 'Name' is not declared by contract 'Person'"
        );
    }

    #[test]
    fn test_invalid_contract_joins_diagnostics() {
        let err = Error::InvalidContract {
            contract: "Broken".into(),
            diagnostics: vec!["first".into(), "second".into()],
        };
        assert_eq!(err.to_string(), "invalid contract 'Broken': first; second");
    }

    #[test]
    fn test_argument_mismatch_is_recoverable() {
        let err = Error::ArgumentMismatch {
            method: "Add".into(),
            index: 0,
            expected: "Integer".into(),
            found: "String".into(),
        };
        assert!(err.is_argument_mismatch());
        assert!(!Error::InvalidOperation("x".into()).is_argument_mismatch());
    }
}
