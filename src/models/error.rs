use std::io;

/// Failure while saving or loading a session file. On a load failure the
/// in-memory stroke set is left untouched.
#[derive(Debug)]
pub enum PersistError {
    Io(io::Error),
    Parse(serde_json::Error),
}

impl std::fmt::Display for PersistError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistError::Io(e) => write!(f, "session file I/O error: {}", e),
            PersistError::Parse(e) => write!(f, "malformed session file: {}", e),
        }
    }
}

impl std::error::Error for PersistError {}

impl From<io::Error> for PersistError {
    fn from(e: io::Error) -> Self {
        PersistError::Io(e)
    }
}

/// Failure in the peer mesh transport.
#[derive(Debug)]
pub enum TransportError {
    /// The listener could not bind. Fatal: the process cannot act as host.
    Bind(io::Error),
    Dial(io::Error),
    /// The DNS-SD daemon could not be started or the record not registered.
    Discovery(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Bind(e) => write!(f, "failed to bind listener: {}", e),
            TransportError::Dial(e) => write!(f, "failed to dial peer: {}", e),
            TransportError::Discovery(e) => write!(f, "service discovery error: {}", e),
        }
    }
}

impl std::error::Error for TransportError {}
