pub mod config;
pub mod index;
pub mod presenter;
pub mod types;

pub use config::{OutputConfig, OutputFormat};
pub use index::{ChunkEntry, ChunksIndex, write_chunks, write_index, copy_passthrough};
pub use presenter::Emitter;
pub use types::{Envelope, Meta, SCHEMA_VERSION};

use anyhow::Result;

/// Print an envelope to stdout, honouring `--json` and the output env vars.
pub fn emit(env: &Envelope) -> Result<()> {
    let cfg = OutputConfig::from_env().with_json(crate::telemetry::config::json_mode());
    Emitter::from_env(cfg).emit(env)?;
    Ok(())
}
