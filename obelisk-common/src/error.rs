use thiserror::Error;

/// The result type used throughout Obelisk.
pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// The error type used throughout Obelisk.
///
/// The kind is boxed to keep `Result<T>` a single pointer wide on the
/// success path.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_operation(name: impl Into<String>) -> Error {
        Error(ErrorKind::InvalidOperation { name: name.into() }.into())
    }

    pub fn unsupported(name: impl Into<String>) -> Error {
        Error(ErrorKind::Unsupported { name: name.into() }.into())
    }

    pub fn invalid_format(element: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidFormat {
                element: element.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Error {
        Error(
            ErrorKind::TypeMismatch {
                expected: expected.into(),
                actual: actual.into(),
            }
            .into(),
        )
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error(
            ErrorKind::Io {
                context: context.into(),
                source,
            }
            .into(),
        )
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("invalid operation {name}")]
    InvalidOperation { name: String },

    #[error("operation {name} is not supported")]
    Unsupported { name: String },

    #[error("invalid storage format for '{element}': {message}")]
    InvalidFormat { element: String, message: String },

    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("IO error for '{context}': {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::io("", e)
    }
}

/// Bails out of the enclosing `Result` function with an `InvalidArgument`
/// error when a caller-supplied argument fails its condition.
///
/// The argument name and the failed condition are both captured in the
/// error message.
#[macro_export]
macro_rules! verify_arg {
    ($name:expr, $cond:expr) => {
        if !$cond {
            return Err($crate::Error::invalid_arg(
                stringify!($name),
                concat!("condition failed: ", stringify!($cond)),
            ));
        }
    };
}

/// Bails out of the enclosing `Result` function with an `InvalidFormat`
/// error when stored or deserialized data fails an integrity condition.
#[macro_export]
macro_rules! verify_data {
    ($element:expr, $cond:expr) => {
        if !$cond {
            return Err($crate::Error::invalid_format(
                stringify!($element),
                concat!("condition failed: ", stringify!($cond)),
            ));
        }
    };
}
