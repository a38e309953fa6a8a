//! Generation of JVM classes whose methods are implemented by pluggable callbacks
//!
//! Generators (`proxy`, `beans`) emit classes as a stream of events into a `emit::ClassSink`.
//! Transformers (`transform`) can be put in front of the sink to rewrite methods on the fly, and
//! `emit::ClassWriter` turns the events into class files (`jvm`).

pub mod beans;
pub mod cache;
pub mod emit;
mod errors;
pub mod generator;
pub mod jvm;
pub mod naming;
pub mod proxy;
pub mod settings;
pub mod transform;

pub use errors::Error;
