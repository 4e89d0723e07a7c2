use std::path::PathBuf;

use strum::{Display, IntoStaticStr};
use thiserror::Error;

use crate::metadata::token::Token;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The variants fall into three groups:
///
/// ## Image parsing and I/O
/// - [`Error::Malformed`] - Corrupted or invalid module image
/// - [`Error::OutOfBounds`] - Attempted to read beyond the end of a buffer
/// - [`Error::NotSupported`] - Unknown image magic or version
/// - [`Error::Empty`] - Empty input provided
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::Load`] / [`Error::Write`] - Module level wrappers carrying the affected path
///
/// ## Reference resolution
/// - [`Error::UnresolvedReference`] - A type, method or module could not be matched
///
/// ## Injection
/// - [`Error::AnchorNotFound`] - A call-site or exit anchor has no match
/// - [`Error::IndexOutOfRange`] - An instruction-index anchor is outside the stream
/// - [`Error::MissingBody`] - The target method has no instruction stream
/// - [`Error::InvalidPayload`] - The payload references positions it cannot reach
/// - [`Error::StalePosition`] - A stream position outlived a splice on its method
/// - [`Error::Injection`] - Batch wrapper naming the failing spec
///
/// # Examples
///
/// ```rust,no_run
/// use cilsplice::{CompiledModule, Error};
///
/// match CompiledModule::load("Game.cmod") {
///     Ok(module) => println!("{} types", module.types().len()),
///     Err(Error::Load { path, source }) => eprintln!("{}: {source}", path.display()),
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The image is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the image.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// The image magic or format version is not supported.
    #[error("This file type is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Reading or decoding a module image failed.
    #[error("Failed to load module '{}' - {source}", path.display())]
    Load {
        /// Path of the image that failed to load
        path: PathBuf,
        /// The underlying failure
        source: Box<Error>,
    },

    /// Encoding or writing a module image failed.
    #[error("Failed to write module '{}' - {source}", path.display())]
    Write {
        /// Destination path of the failed write
        path: PathBuf,
        /// The underlying failure
        source: Box<Error>,
    },

    /// A logical type, method or module reference could not be matched.
    ///
    /// Fatal for the injection that required the reference, injection cannot proceed
    /// without a valid operand.
    #[error("Unresolved reference - {0}")]
    UnresolvedReference(String),

    /// A call-site anchor (or the requested occurrence of it), or a method exit, does not
    /// exist in the target method.
    #[error("Anchor not found in method {method} - {message}")]
    AnchorNotFound {
        /// The method that was searched
        method: Token,
        /// What was searched for and how many candidates were present
        message: String,
    },

    /// An instruction-index anchor lies outside of the current instruction stream.
    #[error("Instruction index {index} is out of range for a stream of {len} instructions")]
    IndexOutOfRange {
        /// The requested index
        index: i64,
        /// The stream length at the time of resolution
        len: usize,
    },

    /// The method has no body (abstract, extern or runtime provided).
    #[error("Method {0} has no instruction stream")]
    MissingBody(Token),

    /// The payload is not a self-contained instruction sequence.
    #[error("Invalid payload - {0}")]
    InvalidPayload(String),

    /// A stream position was used after a splice modified its method.
    #[error("Stale position in method {method} - generation {expected}, body is at {actual}")]
    StalePosition {
        /// The method the position belongs to
        method: Token,
        /// Generation recorded in the position
        expected: u64,
        /// Current generation of the method body
        actual: u64,
    },

    /// An instruction stream could not be encoded.
    #[error("Encoding failed - {0}")]
    Encoding(String),

    /// A payload could not be emitted (e.g. undefined label).
    #[error("Emit failed - {0}")]
    Emit(String),

    /// An injection batch aborted on the spec at `index`.
    ///
    /// Specs before `index` remain applied to the in-memory module.
    #[error("Injection {index} failed - {source}")]
    Injection {
        /// Zero based position of the failing spec inside the batch
        index: usize,
        /// The failure of that spec
        source: Box<Error>,
    },
}

/// Coarse classification of an [`Error`], used for batch reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
pub enum ErrorKind {
    /// Image format violation or out of bound read
    Format,
    /// Filesystem failure
    Io,
    /// Module failed to load
    Load,
    /// Module failed to write
    Write,
    /// Reference could not be resolved
    UnresolvedReference,
    /// Anchor has no match
    AnchorNotFound,
    /// Index anchor outside of the stream
    IndexOutOfRange,
    /// Method without body
    MissingBody,
    /// Payload not self-contained
    InvalidPayload,
    /// Position used after a splice
    StalePosition,
    /// Stream not encodable
    Encoding,
    /// Emitter failure
    Emit,
}

impl Error {
    /// Returns the kind of this error. Batch wrappers report the kind of the failing spec.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Malformed { .. } | Error::OutOfBounds | Error::NotSupported | Error::Empty => {
                ErrorKind::Format
            }
            Error::FileError(_) => ErrorKind::Io,
            Error::Load { .. } => ErrorKind::Load,
            Error::Write { .. } => ErrorKind::Write,
            Error::UnresolvedReference(_) => ErrorKind::UnresolvedReference,
            Error::AnchorNotFound { .. } => ErrorKind::AnchorNotFound,
            Error::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
            Error::MissingBody(_) => ErrorKind::MissingBody,
            Error::InvalidPayload(_) => ErrorKind::InvalidPayload,
            Error::StalePosition { .. } => ErrorKind::StalePosition,
            Error::Encoding(_) => ErrorKind::Encoding,
            Error::Emit(_) => ErrorKind::Emit,
            Error::Injection { source, .. } => source.kind(),
        }
    }
}
