use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Split;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Read, Chunk, WriteChunks }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Read => "read",
        Phase::Chunk => "chunk",
        Phase::WriteChunks => "write_chunks",
    }}
    fn span(&self) -> Span { match self {
        Phase::Read => info_span!("read"),
        Phase::Chunk => info_span!("chunk"),
        Phase::WriteChunks => info_span!("write_chunks"),
    }}
}

impl OpMarker for Split {
    const NAME: &'static str = "split";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("split") }
}
