//! Event-based class emission
//!
//! Generators describe a class as a stream of events sent to a `ClassSink`. Usually the last sink
//! in the chain is a `ClassWriter`, but transformers can be slotted in front of it to rewrite
//! method bodies on the fly.

mod class_writer;
mod emitter;
mod emitter_exts;
mod sink;

pub use class_writer::*;
pub use emitter::*;
pub use emitter_exts::*;
pub use sink::*;
