//! Bean property introspection and bean copiers
//!
//! Properties are found by looking for `getFoo`/`isFoo`/`setFoo` methods on classes registered in
//! a `ClassGraph`.

mod bean_copier;
mod introspect;

pub use bean_copier::*;
pub use introspect::*;
