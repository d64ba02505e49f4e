use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Run;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Discover, Plan, Chunk, WriteChunks, Passthrough, WriteIndex }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Discover => "discover",
        Phase::Plan => "plan",
        Phase::Chunk => "chunk",
        Phase::WriteChunks => "write_chunks",
        Phase::Passthrough => "passthrough",
        Phase::WriteIndex => "write_index",
    }}
    fn span(&self) -> Span { match self {
        Phase::Discover => info_span!("discover"),
        Phase::Plan => info_span!("plan"),
        Phase::Chunk => info_span!("chunk"),
        Phase::WriteChunks => info_span!("write_chunks"),
        Phase::Passthrough => info_span!("passthrough"),
        Phase::WriteIndex => info_span!("write_index"),
    }}
}

impl OpMarker for Run {
    const NAME: &'static str = "run";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("run") }
}
