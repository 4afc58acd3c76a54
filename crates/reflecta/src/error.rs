//! Error types for the Reflecta runtime.
//!
//! Two families live here:
//!
//! - [`Error`]: failures while *building* reflection data (type registration,
//!   class tables, signature parsing).
//! - [`InvokeError`]: the tagged outcome of a dynamic invocation. It is
//!   always returned, never unwound, and separates "no such method, try
//!   another overload" from "method found but the call failed".

use reflecta_mem::StringPoolError;

/// Errors raised while registering types or building class tables.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A signature string could not be parsed.
    #[error("invalid signature `{signature}`: {reason}")]
    InvalidSignature {
        /// The offending signature.
        signature: String,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// A method with the same normalized signature was declared twice on one class.
    #[error("duplicate method `{signature}` in class `{class}`")]
    DuplicateMethod {
        /// Class being built.
        class: String,
        /// Normalized signature.
        signature: String,
    },

    /// A property with the same name was declared twice on one class.
    #[error("duplicate property `{name}` in class `{class}`")]
    DuplicateProperty {
        /// Class being built.
        class: String,
        /// Property name.
        name: String,
    },

    /// A method declares more parameters than the invocation protocol carries.
    #[error("`{signature}` has {count} parameters, at most {max} are supported")]
    TooManyParameters {
        /// The offending signature.
        signature: String,
        /// Declared parameter count.
        count: usize,
        /// Supported maximum.
        max: usize,
    },

    /// Parameter names were given but do not match the parameter count.
    #[error("`{signature}` declares {expected} parameters but {got} names were given")]
    ParameterNameCount {
        /// The method signature.
        signature: String,
        /// Parameter count.
        expected: usize,
        /// Names given.
        got: usize,
    },

    /// A notify signal could not be found and the table revision cannot
    /// record it unresolved.
    #[error("notify signal `{signal}` of property `{property}` not found")]
    NotifySignalNotFound {
        /// Property name.
        property: String,
        /// Signal name.
        signal: String,
    },

    /// Unsupported table revision.
    #[error("unsupported revision {revision} (supported: 1..={current})")]
    InvalidRevision {
        /// Requested revision.
        revision: u32,
        /// Highest supported revision.
        current: u32,
    },

    /// A class with this name is already registered.
    #[error("class `{name}` is already registered")]
    ClassAlreadyRegistered {
        /// Class name.
        name: String,
    },

    /// A signal, slot or method named in a connection does not exist.
    #[error("no member `{member}` in class `{class}`")]
    MemberNotFound {
        /// Class searched.
        class: String,
        /// Requested signature.
        member: String,
    },

    /// The receiving method cannot accept the signal's arguments.
    #[error("cannot connect `{signal}` to `{method}`: incompatible parameters")]
    IncompatibleConnection {
        /// Signal signature.
        signal: String,
        /// Receiving method signature.
        method: String,
    },

    /// An alias already denotes a different type.
    #[error("type alias `{alias}` already refers to `{existing}`")]
    AliasConflict {
        /// The alias.
        alias: String,
        /// Type it already refers to.
        existing: String,
    },

    /// An operation was given an invalid type handle.
    #[error("invalid type")]
    InvalidType,

    /// Interning a name into the class string table failed.
    #[error(transparent)]
    StringPool(#[from] StringPoolError),
}

/// Result type for building and registration APIs.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reasons of a dynamic invocation.
///
/// `index` fields name an argv slot: 0 is the return value, 1.. are the
/// parameters in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvokeError {
    /// No method with the requested name exists anywhere in the chain.
    #[error("no method named `{name}` in class `{class}`")]
    MethodNotFound {
        /// Class searched.
        class: String,
        /// Requested name.
        name: String,
    },

    /// A method was found but the number of arguments differs.
    #[error("`{signature}` expects {expected} arguments, got {got}")]
    ArgumentCountMismatch {
        /// The candidate's signature.
        signature: String,
        /// Declared parameter count.
        expected: usize,
        /// Supplied argument count.
        got: usize,
    },

    /// An argument's type is not compatible with the formal parameter.
    #[error("`{signature}`: argument {index} has type `{got}`, expected `{expected}`")]
    FormalParameterMismatch {
        /// The candidate's signature.
        signature: String,
        /// Argv slot of the offending argument.
        index: usize,
        /// Declared type name.
        expected: String,
        /// Supplied type name.
        got: String,
    },

    /// The requested return slot does not match the declared return type.
    #[error("`{signature}` returns `{expected}`, return slot has type `{got}`")]
    ReturnTypeMismatch {
        /// The method's signature.
        signature: String,
        /// Declared return type.
        expected: String,
        /// Return slot type.
        got: String,
    },

    /// A blocking queued call targets an object living on the calling thread.
    #[error("dead lock detected: blocking queued call to `{signature}` on the current thread")]
    DeadLockDetected {
        /// The method's signature.
        signature: String,
    },

    /// An argument (or the return value) cannot be marshaled into a queued call.
    #[error("`{signature}`: cannot queue argument {index} of type `{type_name}`")]
    CouldNotQueueParameter {
        /// The method's signature.
        signature: String,
        /// Argv slot that could not be queued.
        index: usize,
        /// Type of that slot.
        type_name: String,
    },

    /// The target has no event loop to receive a queued call.
    #[error("`{signature}`: target object has no event loop")]
    NoEventLoop {
        /// The method's signature.
        signature: String,
    },

    /// The target was destroyed before a blocking call could execute.
    #[error("`{signature}`: target destroyed before the call executed")]
    TargetDestroyed {
        /// The method's signature.
        signature: String,
    },

    /// A constructor was invoked on an existing instance.
    #[error("constructor `{signature}` invoked on an instance")]
    ConstructorOnInstance {
        /// The constructor's signature.
        signature: String,
    },

    /// A constructor was invoked without a destination for the new instance.
    #[error("constructor `{signature}` invoked without a result destination")]
    NoConstructorDestination {
        /// The constructor's signature.
        signature: String,
    },

    /// The constructor was rejected or produced no instance.
    #[error("constructor `{signature}` failed")]
    ConstructionFailed {
        /// The constructor's signature.
        signature: String,
    },

    /// The method handle is invalid or its class has no dispatch entry point.
    #[error("invalid method")]
    InvalidMethod,

    /// The dispatch entry point rejected the call.
    #[error("call to `{signature}` failed")]
    CallFailed {
        /// The method's signature.
        signature: String,
    },
}

impl InvokeError {
    /// Returns true if the failure means "this method does not fit".
    ///
    /// Callers resolving overloads should try the next candidate on these
    /// errors and stop on every other one.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            InvokeError::MethodNotFound { .. }
                | InvokeError::ArgumentCountMismatch { .. }
                | InvokeError::FormalParameterMismatch { .. }
        )
    }

    /// Returns true for constructor-specific failures.
    #[must_use]
    pub fn is_construction_failure(&self) -> bool {
        matches!(
            self,
            InvokeError::ConstructorOnInstance { .. }
                | InvokeError::NoConstructorDestination { .. }
                | InvokeError::ConstructionFailed { .. }
        )
    }

    /// Ranks not-found errors so overload resolution reports the closest miss.
    pub(crate) fn specificity(&self) -> u8 {
        match self {
            InvokeError::MethodNotFound { .. } => 0,
            InvokeError::ArgumentCountMismatch { .. } => 1,
            InvokeError::FormalParameterMismatch { .. } => 2,
            _ => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        let not_found = InvokeError::MethodNotFound {
            class: "Counter".into(),
            name: "nope".into(),
        };
        let mismatch = InvokeError::FormalParameterMismatch {
            signature: "f(String)".into(),
            index: 1,
            expected: "String".into(),
            got: "i32".into(),
        };
        let deadlock = InvokeError::DeadLockDetected {
            signature: "f()".into(),
        };

        assert!(not_found.is_not_found());
        assert!(mismatch.is_not_found());
        assert!(!deadlock.is_not_found());
        assert!(!InvokeError::InvalidMethod.is_not_found());
    }

    #[test]
    fn test_construction_failures() {
        let err = InvokeError::NoConstructorDestination {
            signature: "Counter()".into(),
        };
        assert!(err.is_construction_failure());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_display_mentions_index() {
        let err = InvokeError::CouldNotQueueParameter {
            signature: "f(Raw)".into(),
            index: 1,
            type_name: "Raw".into(),
        };
        let text = err.to_string();
        assert!(text.contains("argument 1"));
        assert!(text.contains("Raw"));
    }

    #[test]
    fn test_string_pool_error_converts() {
        let err: Error = StringPoolError::Overflow {
            needed: 10,
            available: 0,
        }
        .into();
        assert!(matches!(err, Error::StringPool(_)));
    }
}
