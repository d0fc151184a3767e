use std::fmt;
use std::io;

use super::multipart::MultipartError;

/// Errors produced by the engine or returned by route handlers.
///
/// Handlers report failures by returning one of these; the engine's error
/// handler turns it into a response. [`App::test`](super::App::test) returns
/// one when the in-process execution itself cannot complete.
#[derive(Debug)]
pub enum Error {
    /// Respond with `code` and `message`.
    Status {
        /// HTTP status code to send
        code: u16,
        /// Plain-text explanation placed in the error body
        message: String,
    },
    /// The handler wrote a response header the HTTP layer cannot carry.
    InvalidHeader {
        /// The offending header name
        name: String,
    },
    /// The handler set a status code outside `100..=999`.
    InvalidStatus(u16),
    /// Reading the request or writing the response failed.
    Io(io::Error),
    /// The request body was not a valid multipart form.
    Multipart(MultipartError),
}

impl Error {
    /// Shorthand for [`Error::Status`].
    #[must_use]
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Error::Status {
            code,
            message: message.into(),
        }
    }

    /// Status code the default error handler responds with.
    #[must_use]
    pub fn code(&self) -> u16 {
        match self {
            Error::Status { code, .. } => *code,
            Error::Multipart(_) => 400,
            _ => 500,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Status { message, .. } => write!(f, "{message}"),
            Error::InvalidHeader { name } => {
                write!(f, "invalid response header '{name}'")
            }
            Error::InvalidStatus(code) => write!(f, "invalid status code {code}"),
            Error::Io(err) => write!(f, "I/O error: {err}"),
            Error::Multipart(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Multipart(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<MultipartError> for Error {
    fn from(err: MultipartError) -> Self {
        Error::Multipart(err)
    }
}
