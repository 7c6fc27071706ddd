//! Error handling for ncmapi.
//!
//! Provides a single error type whose [`ErrorKind`] tells callers which layer
//! failed, so that a user interface can tell "the network is down" apart from
//! "the service sent something we don't understand".
//!
//! # Error Categories
//!
//! * [`ErrorKind::Crypto`] - malformed cipher text, hex or base64 input
//! * [`ErrorKind::Transport`] and [`ErrorKind::Timeout`] - the request never
//!   produced a response
//! * [`ErrorKind::Decode`] - the response is not the JSON shape we expected
//! * [`ErrorKind::Api`] - the service answered with a non-success `code`
//! * [`ErrorKind::InvalidArgument`] and [`ErrorKind::Internal`] - everything
//!   that is a bug on our side
//!
//! # Example
//!
//! ```rust
//! use ncmapi::error::{Error, ErrorKind, Result};
//!
//! fn lookup() -> Result<()> {
//!     if condition {
//!         return Err(Error::invalid_argument("resource id must not be zero"));
//!     }
//!
//!     // Convert from library errors
//!     let value: serde_json::Value = serde_json::from_str(body)?;
//!
//!     Ok(())
//! }
//! ```

use std::fmt;
use thiserror::Error;

/// Main error type combining error kind and details.
#[derive(Debug)]
pub struct Error {
    /// Classification of the error
    pub kind: ErrorKind,

    /// Details of the underlying error
    pub error: Box<dyn std::error::Error + Send + Sync>,
}

impl Error {
    /// Attempts to downcast the underlying error to a concrete type.
    ///
    /// # Example
    /// ```
    /// if let Some(e) = error.downcast::<reqwest::Error>() {
    ///     println!("status: {:?}", e.status());
    /// }
    /// ```
    #[must_use]
    pub fn downcast<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        self.error.downcast_ref::<E>()
    }

    /// Whether the request failed before a response was received.
    ///
    /// Callers use this to offer a "retry" affordance; facades themselves
    /// never retry.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self.kind, ErrorKind::Transport | ErrorKind::Timeout)
    }

    /// Whether a response was received but could not be understood.
    #[must_use]
    pub fn is_decode(&self) -> bool {
        self.kind == ErrorKind::Decode
    }
}

/// Standard result type for ncmapi operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories.
#[expect(clippy::module_name_repetitions)]
#[derive(Clone, Copy, Debug, Eq, Error, Hash, Ord, PartialEq, PartialOrd)]
pub enum ErrorKind {
    /// Cipher text, hex or base64 input could not be processed.
    #[error("cryptographic failure")]
    Crypto,

    /// Network unreachable, connection reset, TLS failure.
    #[error("transport failure")]
    Transport,

    /// The request did not complete in time.
    #[error("operation timed out")]
    Timeout,

    /// The response body is not the JSON shape that was expected.
    #[error("unexpected response data")]
    Decode,

    /// The service answered with a non-success `code`.
    #[error("request rejected by service")]
    Api,

    /// Caller supplied something that cannot be sent.
    #[error("invalid argument specified")]
    InvalidArgument,

    /// Unexpected internal state.
    #[error("internal error")]
    Internal,
}

impl Error {
    /// Creates a new error with specified kind and details.
    pub fn new<E>(kind: ErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self {
            kind,
            error: error.into(),
        }
    }

    /// Creates an error for cipher, hex or base64 failures.
    ///
    /// These are never retried: the same input will fail the same way.
    pub fn crypto<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Crypto, error)
    }

    /// Creates an error for requests that never produced a response.
    pub fn transport<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Transport, error)
    }

    /// Creates an error for requests that exceeded their deadline.
    pub fn timeout<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Timeout, error)
    }

    /// Creates an error for response bodies that could not be decoded.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let err = Error::decode("missing field `data`");
    /// assert!(err.is_decode());
    /// ```
    pub fn decode<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Decode, error)
    }

    /// Creates an error for a service response with a non-success `code`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let err = Error::api(301, Some("need login"));
    /// assert_eq!(err.to_string(), "request rejected by service: code 301: need login");
    /// ```
    #[must_use]
    pub fn api(code: i64, message: Option<&str>) -> Self {
        let details = match message {
            Some(message) => format!("code {code}: {message}"),
            None => format!("code {code}"),
        };
        Self::new(ErrorKind::Api, details)
    }

    /// Creates an error for arguments that cannot be sent.
    pub fn invalid_argument<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::InvalidArgument, error)
    }

    /// Creates an error for unexpected internal state.
    pub fn internal<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Internal, error)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error.source()
    }
}

/// Formats the error as "{kind}: {details}".
impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}: ", self.kind)?;
        self.error.fmt(fmt)
    }
}

/// Converts IO errors.
///
/// The only IO this crate does is decompressing response bodies and reading
/// the configuration file, so everything but a missing file is a decode
/// failure.
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind::*;
        match err.kind() {
            NotFound | PermissionDenied => Self::invalid_argument(err),
            TimedOut => Self::timeout(err),
            _ => Self::decode(err),
        }
    }
}

/// Converts HTTP client errors.
///
/// * Decode errors -> `Decode`
/// * Builder errors -> `InvalidArgument`
/// * Timeout errors -> `Timeout`
/// * Everything else -> `Transport`
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::decode(err);
        }

        if err.is_builder() {
            return Self::invalid_argument(err);
        }

        if err.is_timeout() {
            return Self::timeout(err);
        }

        Self::transport(err)
    }
}

/// Converts JSON errors.
///
/// Serializing our own parameter maps cannot fail, so any JSON error comes
/// from a response body.
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::decode(err)
    }
}

/// Converts configuration file errors to `InvalidArgument`.
impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::invalid_argument(e.to_string())
    }
}

/// Converts hex decoding errors to `Crypto`.
impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Self::crypto(e)
    }
}

/// Converts Base64 decoding errors to `Crypto`.
impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Self::crypto(e)
    }
}

/// Converts cipher key or IV length errors to `Crypto`.
impl From<cbc::cipher::InvalidLength> for Error {
    fn from(e: cbc::cipher::InvalidLength) -> Self {
        Self::crypto(e.to_string())
    }
}

/// Converts PKCS#7 unpadding errors to `Crypto`.
impl From<cbc::cipher::block_padding::UnpadError> for Error {
    fn from(e: cbc::cipher::block_padding::UnpadError) -> Self {
        Self::crypto(e.to_string())
    }
}

/// Converts UTF-8 errors of decrypted payloads to `Crypto`.
impl From<std::string::FromUtf8Error> for Error {
    fn from(e: std::string::FromUtf8Error) -> Self {
        Self::crypto(e)
    }
}

/// Converts invalid header errors to `InvalidArgument`.
impl From<http::header::InvalidHeaderValue> for Error {
    fn from(e: http::header::InvalidHeaderValue) -> Self {
        Self::invalid_argument(e.to_string())
    }
}

/// Converts cookie jar errors to `InvalidArgument`: the jar refuses
/// expired cookies and cookies for other domains.
impl From<cookie_store::CookieError> for Error {
    fn from(e: cookie_store::CookieError) -> Self {
        Self::invalid_argument(e.to_string())
    }
}

/// Converts URL parsing errors to `InvalidArgument`.
impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Self::invalid_argument(e.to_string())
    }
}
