//! Model of the parts of the JVM class file format that generated classes use
//!
//! This stays close to the binary format: building a `ClassFile` by hand is possible, but the
//! usual path is to emit symbolic `Code` through `crate::emit` and let the class writer resolve
//! everything into the constant pool.

mod access_flags;
mod bytecode;
mod class_file;
mod class_graph;
mod code;
mod constants;
mod descriptors;
mod errors;
mod names;
mod serialize;

pub use access_flags::*;
pub use bytecode::*;
pub use class_file::*;
pub use class_graph::*;
pub use code::*;
pub use constants::*;
pub use descriptors::*;
pub use errors::*;
pub use names::*;
pub use serialize::*;
