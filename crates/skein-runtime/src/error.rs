use skein_types::ThreadId;
use std::error::Error;
use std::fmt;

/// A location lookup that found nothing usable. Always recovered by
/// synthesizing a placeholder; never surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionFailure {
    TypeNotLoaded { declaring_type: String },
    AbsentInformation { declaring_type: String },
    UnknownLine { line: i32 },
    /// The line exists but none of the methods on it has the wanted name.
    NoMatchingMethod { method_name: String, line: i32 },
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeNotLoaded { declaring_type } => {
                write!(f, "type {declaring_type} is not loaded in the target")
            }
            Self::AbsentInformation { declaring_type } => {
                write!(f, "type {declaring_type} has no line information")
            }
            Self::UnknownLine { line } => write!(f, "line {line} is not a known line"),
            Self::NoMatchingMethod { method_name, line } => {
                write!(f, "no method {method_name} on line {line}")
            }
        }
    }
}

impl Error for ResolutionFailure {}

/// Failure reading native thread state from the host engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    ThreadNotFound { thread: ThreadId },
    Unavailable(String),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ThreadNotFound { thread } => write!(f, "thread {thread} is not known to the host"),
            Self::Unavailable(reason) => write!(f, "host engine unavailable: {reason}"),
        }
    }
}

impl Error for HostError {}

/// The instrumentation library could not produce a coroutine dump.
///
/// This is the only error shown to the user, as a single error node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    Remote(String),
    NotSuspended,
    Protocol(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(reason) => write!(f, "coroutine dump failed: {reason}"),
            Self::NotSuspended => write!(f, "target process is not suspended"),
            Self::Protocol(reason) => write!(f, "unexpected coroutine dump format: {reason}"),
        }
    }
}

impl Error for FetchError {}

/// Work finished, or was submitted, after its suspend point ended. The
/// result is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stale;

impl fmt::Display for Stale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("suspend point ended before the work completed")
    }
}

impl Error for Stale {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Fetch(FetchError),
    Stale,
}

impl From<FetchError> for StoreError {
    fn from(error: FetchError) -> Self {
        Self::Fetch(error)
    }
}

impl From<Stale> for StoreError {
    fn from(_: Stale) -> Self {
        Self::Stale
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(error) => write!(f, "{error}"),
            Self::Stale => write!(f, "{Stale}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Fetch(error) => Some(error),
            Self::Stale => None,
        }
    }
}
