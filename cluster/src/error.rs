use std::{error::Error, fmt, io};

/// The cluster module's result type.
pub type Result<T> = std::result::Result<T, ClusterError>;

/// All errors that can occur on the cluster side of the protocol.
#[derive(Debug)]
pub enum ClusterError {
    /// Invalid configuration — caught before any message is sent.
    InvalidConfig(String),
    /// A caller requested an index outside the population.
    UnknownIndex { index: usize, pop_size: usize },
    /// A reply's shape did not match the issued instruction.
    Protocol(String),
    /// An underlying transport failure. Fatal; rounds are not safe to
    /// retry blindly since training has side effects.
    Io(io::Error),
}

impl fmt::Display for ClusterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::UnknownIndex { index, pop_size } => {
                write!(
                    f,
                    "index {index} is outside the population of size {pop_size}"
                )
            }
            Self::Protocol(msg) => write!(f, "protocol violation: {msg}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for ClusterError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ClusterError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<ClusterError> for io::Error {
    fn from(value: ClusterError) -> Self {
        match value {
            ClusterError::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
