pub mod section;
pub mod tree;

pub use section::{parse_sections, Section};
pub use tree::{NodeId, SectionNode, SectionTree};
