use std::fmt;
use std::io;
use std::sync::PoisonError;

/// Error type for every fallible operation in the core.
///
/// Logical no-ops (duplicate insert, missing update/delete, select miss)
/// are never represented here — callers see them as `Ok(Outcome::NoOp)`.
/// Only I/O failures and invariant violations are errors.
#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Poisoned,
    InvalidSlot(String),
    InvalidLogLine(String),
    Unsupported(&'static str),
    Config(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {}", err),
            Error::Poisoned => write!(f, "lock poisoned"),
            Error::InvalidSlot(msg) => write!(f, "invalid slot: {}", msg),
            Error::InvalidLogLine(msg) => write!(f, "invalid log line: {}", msg),
            Error::Unsupported(op) => write!(f, "unsupported operation: {}", op),
            Error::Config(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(_: PoisonError<T>) -> Error {
        Error::Poisoned
    }
}

pub type Result<T> = std::result::Result<T, Error>;
