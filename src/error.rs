//! Error types for the bridge.

use std::sync::Arc;

use crate::exception::ScriptException;

/// Errors produced by bridge operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A value was accessed as a kind it does not have
    #[error("invalid cast")]
    InvalidCast,

    /// String construction exceeded the engine's maximum string length
    #[error("string too long")]
    StringTooLong,

    /// A non-buffer object was accessed as an ArrayBuffer
    #[error("type error: object is not an ArrayBuffer")]
    TypeError,

    /// Uncaught exception while evaluating, calling or constructing
    #[error("script exception: {0}")]
    Script(Arc<ScriptException>),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Arc<ScriptException>> for Error {
    fn from(exception: Arc<ScriptException>) -> Self {
        Error::Script(exception)
    }
}

/// Value-level error code of the flat surface.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeError {
    NoError,
    InvalidCast,
    StringTooLong,
    TypeError,
}

impl RuntimeError {
    /// Code for a value-level error; `None` for script exceptions, which
    /// travel through their own out parameter.
    pub fn from_error(error: &Error) -> Option<Self> {
        match error {
            Error::InvalidCast => Some(RuntimeError::InvalidCast),
            Error::StringTooLong => Some(RuntimeError::StringTooLong),
            Error::TypeError => Some(RuntimeError::TypeError),
            Error::Script(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_error_codes() {
        assert_eq!(RuntimeError::NoError as i32, 0);
        assert_eq!(RuntimeError::InvalidCast as i32, 1);
        assert_eq!(RuntimeError::StringTooLong as i32, 2);
        assert_eq!(RuntimeError::TypeError as i32, 3);

        assert_eq!(
            RuntimeError::from_error(&Error::InvalidCast),
            Some(RuntimeError::InvalidCast)
        );
        assert_eq!(
            RuntimeError::from_error(&Error::StringTooLong),
            Some(RuntimeError::StringTooLong)
        );
        assert_eq!(
            RuntimeError::from_error(&Error::TypeError),
            Some(RuntimeError::TypeError)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Error::InvalidCast.to_string(), "invalid cast");
        assert_eq!(Error::StringTooLong.to_string(), "string too long");
    }
}
