use crate::config::ConfigError;

/// Failures surfaced by [`crate::pipeline::Chunker`].
///
/// Oracle and matching problems never show up here; they degrade to the deterministic
/// fallback inside the decomposer.
#[derive(Debug)]
pub enum ChunkError {
    Config(ConfigError),
    /// Emitted chunks do not tile the source document. Always a bug.
    Coverage { source: String, detail: String },
}

impl std::fmt::Display for ChunkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkError::Config(err) => write!(f, "{err}"),
            ChunkError::Coverage { source, detail } => {
                write!(f, "coverage invariant violated for {source}: {detail}")
            }
        }
    }
}

impl std::error::Error for ChunkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChunkError::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for ChunkError {
    fn from(err: ConfigError) -> Self {
        ChunkError::Config(err)
    }
}
