//! The error taxonomy of the library.

/// Error raised by tree-structure operations.
///
/// Every failure propagates to the caller unchanged; nothing is retried
/// internally. [`PyTreeError::Malformed`] signals a programmer error (a
/// decoded structure or internal invariant that does not hold); the other
/// variants are expected user errors.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum PyTreeError {
    /// Flattening descended past the maximum recursion depth.
    RecursionLimit {
        /// The depth cap that was exceeded.
        limit: usize,
    },

    /// A leaf or child count did not match the structure.
    ArityMismatch {
        /// What was being counted (`"leaves"`, `"children"`, ...).
        what: &'static str,
        /// The count the structure requires.
        expected: usize,
        /// The count that was supplied.
        actual: usize,
    },

    /// A value's structure diverged from the spec it was matched against.
    StructureMismatch {
        /// Rendering of the expected structure at the mismatching node.
        expected: String,
        /// Rendering of the actual value at the mismatching node.
        actual: String,
    },

    /// Two structures with different non-empty namespaces were combined.
    NamespaceMismatch {
        /// The first namespace.
        left: String,
        /// The second namespace.
        right: String,
    },

    /// Two structures with different `none_is_leaf` modes were combined.
    NoneIsLeafMismatch {
        /// The mode of the structure the operation was called on.
        left: bool,
        /// The mode of the other structure.
        right: bool,
    },

    /// A type was registered twice under the same namespace.
    AlreadyRegistered {
        /// The conflicting type name.
        type_name: String,
        /// The namespace of the conflict (empty for the default namespace).
        namespace: String,
    },

    /// A decoded structure references a custom type with no registration.
    UnknownCustomType {
        /// The unresolvable type name.
        type_name: String,
        /// The namespace the lookup ran in.
        namespace: String,
    },

    /// A decoded structure has the wrong shape, or an internal invariant
    /// was violated.
    Malformed {
        /// What exactly does not hold.
        reason: String,
    },

    /// A user callback (leaf predicate, `to_iterable`, `from_iterable`)
    /// failed; the message is the callback's own.
    Callback {
        /// The callback's error message.
        message: String,
    },
}

impl PyTreeError {
    /// Shorthand for a [`PyTreeError::Malformed`] error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        PyTreeError::Malformed {
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`PyTreeError::Callback`] error, for use inside
    /// user callbacks.
    pub fn callback(message: impl Into<String>) -> Self {
        PyTreeError::Callback {
            message: message.into(),
        }
    }
}

impl core::fmt::Display for PyTreeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PyTreeError::RecursionLimit { limit } => {
                write!(
                    f,
                    "the tree is nested deeper than the maximum recursion depth ({limit})"
                )
            }
            PyTreeError::ArityMismatch {
                what,
                expected,
                actual,
            } => {
                write!(f, "expected {expected} {what}, got {actual}")
            }
            PyTreeError::StructureMismatch { expected, actual } => {
                write!(
                    f,
                    "structure mismatch: expected {expected}, got {actual}"
                )
            }
            PyTreeError::NamespaceMismatch { left, right } => {
                write!(
                    f,
                    "tree structures must share a namespace, got '{left}' vs. '{right}'"
                )
            }
            PyTreeError::NoneIsLeafMismatch { left, right } => {
                write!(
                    f,
                    "tree structures must share the same none_is_leaf value, got {left} vs. {right}"
                )
            }
            PyTreeError::AlreadyRegistered {
                type_name,
                namespace,
            } => {
                if namespace.is_empty() {
                    write!(f, "type '{type_name}' is already registered")
                } else {
                    write!(
                        f,
                        "type '{type_name}' is already registered in namespace '{namespace}'"
                    )
                }
            }
            PyTreeError::UnknownCustomType {
                type_name,
                namespace,
            } => {
                if namespace.is_empty() {
                    write!(f, "unknown custom type '{type_name}' in encoded structure")
                } else {
                    write!(
                        f,
                        "unknown custom type '{type_name}' in encoded structure (namespace '{namespace}')"
                    )
                }
            }
            PyTreeError::Malformed { reason } => {
                write!(f, "malformed tree structure: {reason}")
            }
            PyTreeError::Callback { message } => f.write_str(message),
        }
    }
}

impl core::error::Error for PyTreeError {}
