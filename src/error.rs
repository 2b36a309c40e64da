use std::convert::From;
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::sync::mpsc::SendError;

use crate::orchestrator::Message;
use crate::storage::DispatchStorageError;

#[derive(Debug)]
pub enum Error {
    /// The orchestrator thread is gone and its channel is closed
    Send(SendError<Message>),

    /// A storage operation failed
    Storage(String),

    /// The engine configuration failed validation
    InvalidConfig(String),

    /// A campaign's dispatch settings failed validation
    InvalidSettings(String),

    /// A shared lock was poisoned by a panicking thread
    Lock,

    Io(io::Error),

    Toml(toml::de::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Send(ref e) => write!(f, "Unable to reach the orchestrator: {}", e),
            Error::Storage(ref s) => write!(f, "Storage error: {}", s),
            Error::InvalidConfig(ref s) => write!(f, "Invalid configuration: {}", s),
            Error::InvalidSettings(ref s) => write!(f, "Invalid dispatch settings: {}", s),
            Error::Lock => write!(f, "A shared lock was poisoned"),
            Error::Io(ref e) => write!(f, "I/O error: {}", e),
            Error::Toml(ref e) => write!(f, "TOML parse error: {}", e),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self {
            Error::Send(ref e) => Some(e),
            Error::Io(ref e) => Some(e),
            Error::Toml(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<SendError<Message>> for Error {
    fn from(e: SendError<Message>) -> Error {
        Error::Send(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::Io(e)
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Error {
        Error::Toml(e)
    }
}

impl<S: DispatchStorageError> From<S> for Error {
    fn from(e: S) -> Error {
        Error::Storage(format!("{}", e))
    }
}
