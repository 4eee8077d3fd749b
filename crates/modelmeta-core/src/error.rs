//! Error types for field binding.
//!
//! Metadata resolution itself never fails: relationships that cannot be
//! inferred degrade to ignored fields. Only the binder reports errors, and it
//! always hands them back to the immediate caller.

use std::error::Error as StdError;
use std::fmt;

/// Boxed failure produced by a custom decode hook.
///
/// The binder never inspects or rewraps it; callers can downcast through
/// [`Error::source`](std::error::Error::source).
pub type DecodeError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors surfaced by the field value binder.
#[derive(Debug)]
pub enum Error {
    /// The record has no addressable slot for the field.
    InvalidTarget {
        /// Storage name of the field that was targeted.
        field: String,
        /// Why the slot could not be reached.
        reason: &'static str,
    },
    /// No conversion exists from the value's runtime type to the field's type.
    Inconvertible {
        /// Storage name of the field that was targeted.
        field: String,
        /// Kind of the value that was supplied.
        from: &'static str,
        /// Declared Rust type of the field.
        to: &'static str,
    },
    /// The field's custom decode hook rejected the value.
    Decode {
        /// Storage name of the field that was targeted.
        field: String,
        /// The hook's own error, unchanged.
        source: DecodeError,
    },
}

impl Error {
    /// Storage name of the field the failed operation targeted.
    pub fn field(&self) -> &str {
        match self {
            Error::InvalidTarget { field, .. }
            | Error::Inconvertible { field, .. }
            | Error::Decode { field, .. } => field,
        }
    }

    /// True for [`Error::InvalidTarget`].
    pub const fn is_invalid_target(&self) -> bool {
        matches!(self, Error::InvalidTarget { .. })
    }

    /// True for [`Error::Inconvertible`].
    pub const fn is_inconvertible(&self) -> bool {
        matches!(self, Error::Inconvertible { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidTarget { field, reason } => {
                write!(f, "invalid target for field `{}`: {}", field, reason)
            }
            Error::Inconvertible { field, from, to } => {
                write!(
                    f,
                    "could not convert {} into `{}` for field `{}`",
                    from, to, field
                )
            }
            Error::Decode { field, source } => {
                write!(f, "decode hook failed for field `{}`: {}", field, source)
            }
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Decode { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Result alias used by the binder.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A failed generic conversion, before the binder attaches the field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertError {
    /// Kind of the value that was supplied.
    pub from: &'static str,
    /// Rust type that could not accept it.
    pub to: &'static str,
}

impl ConvertError {
    /// Create a conversion failure.
    pub const fn new(from: &'static str, to: &'static str) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot convert {} into `{}`", self.from, self.to)
    }
}

impl StdError for ConvertError {}
