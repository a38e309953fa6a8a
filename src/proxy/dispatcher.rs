use super::{CallbackGenerator, Context, DispatchStrategy};
use crate::emit::{ClassSink, CodeEmitter, EmitterExts, MethodInfo};
use crate::jvm::{RefType, UnqualifiedName};
use crate::Error;

/// Forwards every call to a delegate that the callback supplies on each call
///
/// The plain variant asks for the delegate with `loadObject()`. The reference-aware variant uses
/// `loadObject(proxy)` so that the callback can hand back something tied to the proxy instance.
///
/// Protected methods are left alone: they are inherited rather than dispatched.
#[derive(Copy, Clone, Debug)]
pub struct DispatcherGenerator {
    pass_proxy: bool,
}

impl DispatcherGenerator {
    pub const fn new(pass_proxy: bool) -> DispatcherGenerator {
        DispatcherGenerator { pass_proxy }
    }
}

impl CallbackGenerator for DispatcherGenerator {
    fn strategy(&self) -> DispatchStrategy {
        if self.pass_proxy {
            DispatchStrategy::RefDispatch
        } else {
            DispatchStrategy::PlainDispatch
        }
    }

    fn generate(
        &self,
        sink: &mut dyn ClassSink,
        context: &dyn Context,
        methods: &[MethodInfo],
    ) -> Result<(), Error> {
        let settings = context.settings();
        let dispatcher = if self.pass_proxy {
            &settings.proxy_ref_dispatcher_interface
        } else {
            &settings.dispatcher_interface
        };

        for method in methods {
            if method.is_protected() {
                log::trace!("Not dispatching protected method {}", method.name);
                continue;
            }

            let index = context.get_index(method)?;
            let mut e = context.begin_method(sink, method)?;
            context.emit_callback(&mut e, index)?;
            if self.pass_proxy {
                e.load_this()?;
            }
            e.invoke_interface(
                dispatcher,
                UnqualifiedName::LOADOBJECT,
                settings.load_object_descriptor(self.pass_proxy),
            )?;
            e.checkcast(&RefType::Object(method.owner.clone()))?;
            e.load_args()?;
            e.invoke(method)?;
            e.return_value()?;
            e.end()?;
        }
        Ok(())
    }

    fn generate_static(
        &self,
        _e: &mut CodeEmitter<'_>,
        _context: &dyn Context,
        _methods: &[MethodInfo],
    ) -> Result<(), Error> {
        Ok(())
    }
}
