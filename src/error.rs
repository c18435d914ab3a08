//! Error types for folio operations.

use std::fmt;
use std::io;

use thiserror::Error;

/// Stable, machine-readable classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NoSuchPath,
    NoSuchFile,
    AlreadyExists,
    InvalidArgument,
    MissingElement,
    MissingAttribute,
    MissingParameter,
    Interrupted,
    CryptorInternal,
    DocumentLibrary,
    NotImplemented,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NoSuchPath => "no-such-path",
            ErrorCode::NoSuchFile => "no-such-file",
            ErrorCode::AlreadyExists => "already-exists",
            ErrorCode::InvalidArgument => "invalid-argument",
            ErrorCode::MissingElement => "missing-element",
            ErrorCode::MissingAttribute => "missing-attribute",
            ErrorCode::MissingParameter => "missing-parameter",
            ErrorCode::Interrupted => "interrupted",
            ErrorCode::CryptorInternal => "cryptor-internal",
            ErrorCode::DocumentLibrary => "document-library",
            ErrorCode::NotImplemented => "not-implemented",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while parsing or reading a container.
#[derive(Error, Debug)]
pub enum Error {
    #[error("no such file or directory: {0}")]
    NoSuchPath(String),

    #[error("no such file: {0}")]
    NoSuchFile(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid option `{field}`: expected {expected}, got {received}")]
    InvalidOption {
        field: String,
        expected: String,
        received: String,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("missing required element: {0}")]
    MissingElement(String),

    #[error("missing attribute `{attribute}` on {element}")]
    MissingAttribute { element: String, attribute: String },

    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    #[error("cryptor internal error: {message}")]
    Cryptor {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("{0} is not implemented")]
    NotImplemented(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// The stable code carried by this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::NoSuchPath(_) => ErrorCode::NoSuchPath,
            Error::NoSuchFile(_) => ErrorCode::NoSuchFile,
            Error::AlreadyExists(_) => ErrorCode::AlreadyExists,
            Error::InvalidOption { .. } | Error::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Error::MissingElement(_) => ErrorCode::MissingElement,
            Error::MissingAttribute { .. } => ErrorCode::MissingAttribute,
            Error::MissingParameter(_) => ErrorCode::MissingParameter,
            Error::Cryptor { .. } => ErrorCode::CryptorInternal,
            Error::NotImplemented(_) => ErrorCode::NotImplemented,
            Error::Io(e) => match e.kind() {
                io::ErrorKind::NotFound => ErrorCode::NoSuchFile,
                io::ErrorKind::AlreadyExists => ErrorCode::AlreadyExists,
                io::ErrorKind::InvalidInput => ErrorCode::InvalidArgument,
                _ => ErrorCode::Interrupted,
            },
            Error::Zip(_) | Error::Json(_) => ErrorCode::DocumentLibrary,
        }
    }

    pub(crate) fn cryptor(message: impl Into<String>) -> Self {
        Error::Cryptor {
            message: message.into(),
            source: None,
        }
    }

    /// A cipher library failure, kept as the error's source.
    pub(crate) fn cryptor_caused(what: &str, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Cryptor {
            message: format!("{what}: {cause}"),
            source: Some(Box::new(cause)),
        }
    }

    pub(crate) fn invalid_option(
        field: impl Into<String>,
        expected: impl fmt::Display,
        received: impl fmt::Display,
    ) -> Self {
        Error::InvalidOption {
            field: field.into(),
            expected: expected.to_string(),
            received: received.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
