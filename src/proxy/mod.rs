//! Proxies whose methods are implemented by callbacks
//!
//! A `CallbackGenerator` emits the bodies of the methods routed to one kind of callback, using a
//! `Context` to find out which callback slot serves a method and how to load that callback. The
//! `ProxyGenerator` and `MixinGenerator` put classes together around those generators.

mod callback;
mod context;
mod dispatcher;
mod invocation_handler;
mod mixin;
mod proxy_generator;

pub use callback::*;
pub use context::*;
pub use dispatcher::*;
pub use invocation_handler::*;
pub use mixin::*;
pub use proxy_generator::*;
