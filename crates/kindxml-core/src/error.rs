//! Serialization error type

/// Error from converting a single record to XML.
///
/// `path` locates the offending value inside the record, e.g. `tags[1].id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerializeError {
    /// Value type has no XML rendering (blobs, entity keys)
    Unsupported { path: String, kind: &'static str },
    /// Record nests deeper than the configured limit
    DepthExceeded { path: String, max_depth: usize },
    /// Root tag was empty
    EmptyRootTag,
}

impl std::fmt::Display for SerializeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unsupported { path, kind } => {
                write!(f, "unsupported {kind} value at `{path}`")
            }
            Self::DepthExceeded { path, max_depth } => {
                write!(f, "nesting deeper than {max_depth} levels at `{path}`")
            }
            Self::EmptyRootTag => write!(f, "root tag must not be empty"),
        }
    }
}

impl std::error::Error for SerializeError {}

impl SerializeError {
    pub(crate) fn unsupported(kind: &'static str) -> Self {
        Self::Unsupported {
            path: String::new(),
            kind,
        }
    }

    pub(crate) fn depth_exceeded(max_depth: usize) -> Self {
        Self::DepthExceeded {
            path: String::new(),
            max_depth,
        }
    }

    /// Path of the offending value, empty for record-level errors
    pub fn path(&self) -> &str {
        match self {
            Self::Unsupported { path, .. } | Self::DepthExceeded { path, .. } => path,
            Self::EmptyRootTag => "",
        }
    }

    /// Prefix the path with the property key the error was raised under
    pub(crate) fn within_key(self, key: &str) -> Self {
        self.map_path(|path| {
            if path.is_empty() {
                key.to_string()
            } else if path.starts_with('[') {
                format!("{key}{path}")
            } else {
                format!("{key}.{path}")
            }
        })
    }

    /// Prefix the path with an array position
    pub(crate) fn within_index(self, index: usize) -> Self {
        self.map_path(|path| {
            if path.is_empty() || path.starts_with('[') {
                format!("[{index}]{path}")
            } else {
                format!("[{index}].{path}")
            }
        })
    }

    fn map_path(self, f: impl FnOnce(&str) -> String) -> Self {
        match self {
            Self::Unsupported { path, kind } => Self::Unsupported {
                path: f(&path),
                kind,
            },
            Self::DepthExceeded { path, max_depth } => Self::DepthExceeded {
                path: f(&path),
                max_depth,
            },
            Self::EmptyRootTag => Self::EmptyRootTag,
        }
    }
}
