//! Errors raised while reading entities

/// Error from a record source.
#[derive(Debug)]
pub enum SourceError {
    Io(std::io::Error),
    /// Line `line` (1-based) could not be decoded into an entity
    Decode { line: usize, message: String },
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO: {e}"),
            Self::Decode { line, message } => write!(f, "line {line}: {message}"),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Decode { .. } => None,
        }
    }
}

impl From<std::io::Error> for SourceError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
