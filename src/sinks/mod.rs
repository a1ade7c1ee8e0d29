//! In-process sinks: memory capture, tracing output, JSON lines and text digests.

pub mod digest;
pub mod json_lines;
pub mod memory;
pub mod trace;

pub use digest::{DigestMessage, DigestSink};
pub use json_lines::{JsonLinesSink, LineSegment, RotationPolicy};
pub use memory::MemorySink;
pub use trace::TraceSink;
