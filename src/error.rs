use std::io;

/// Error types for the model codec and assembler
#[derive(Debug)]
pub enum ModelError {
    /// IO error occurred
    Io(io::Error),

    /// Stream truncated or a field count mismatch at a specific position
    Format { position: u64, message: String },

    /// A "must be zero" / sentinel field check failed, or an unrecognized
    /// shader-uniform or component type tag was encountered
    Invariant { position: u64, message: String },

    /// A bone id or vertex index points outside the collated model
    CrossReference(String),
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::Io(e) => write!(f, "IO error: {}", e),
            ModelError::Format { position, message } => {
                write!(f, "Format error at position {}: {}", position, message)
            }
            ModelError::Invariant { position, message } => {
                write!(f, "Invariant violation at position {}: {}", position, message)
            }
            ModelError::CrossReference(msg) => write!(f, "Cross-reference error: {}", msg),
        }
    }
}

impl std::error::Error for ModelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ModelError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ModelError {
    fn from(err: io::Error) -> Self {
        ModelError::Io(err)
    }
}

impl From<binrw::Error> for ModelError {
    fn from(err: binrw::Error) -> Self {
        match err {
            // assertion failures carry the sentinel / padding / lookup-table
            // checks scattered through the record decoders
            binrw::Error::AssertFail { pos, message } => ModelError::Invariant {
                position: pos,
                message,
            },
            binrw::Error::BadMagic { pos, found } => ModelError::Invariant {
                position: pos,
                message: format!("unexpected constant: {:?}", found),
            },
            binrw::Error::Io(e) => ModelError::Io(e),
            binrw::Error::Backtrace(bt) => ModelError::from(*bt.error),
            other => ModelError::Format {
                position: 0,
                message: other.to_string(),
            },
        }
    }
}

/// Result type for codec and assembly operations
pub type Result<T> = std::result::Result<T, ModelError>;
