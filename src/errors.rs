use std::fmt;

/// Builds an [`Error`] variant from a format string, e.g.
/// `err!(Validation, "unknown column {}", name)`.
macro_rules! err {
    ($kind:ident, $($arg:tt)*) => {
        $crate::errors::Error::$kind(format!($($arg)*))
    };
}

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    /// Malformed SQL.
    Syntax(String),
    /// Unknown column, type mismatch, duplicate key, oversize row and friends.
    Validation(String),
    /// Unknown table.
    NotFound(String),
    /// Table already exists.
    Conflict(String),
    /// Page cache or internal node is out of slots.
    Capacity(String),
    /// A page failed to decode.
    Corruption(String),
    /// Internal pager/tree failure.
    Storage(String),
    /// A stored value does not match its declared column kind.
    Encoding(String),
    LockPage(String),
    /// Cancellation observed at a suspension point.
    Cancelled,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error. {}", e),
            Error::Syntax(msg) => write!(f, "SQL Syntax Error. {}", msg),
            Error::Validation(msg) => write!(f, "Validation Error. {}", msg),
            Error::NotFound(msg) => write!(f, "Not Found. {}", msg),
            Error::Conflict(msg) => write!(f, "Conflict. {}", msg),
            Error::Capacity(msg) => write!(f, "Capacity Exceeded. {}", msg),
            Error::Corruption(msg) => write!(f, "Corruption. {}", msg),
            Error::Storage(msg) => write!(f, "Storage Error. {}", msg),
            Error::Encoding(msg) => write!(f, "Encoding Error. {}", msg),
            Error::LockPage(msg) => write!(f, "Page Lock Error. {}", msg),
            Error::Cancelled => write!(f, "Cancelled."),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}
