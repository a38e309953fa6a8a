use super::{DispatcherGenerator, InvocationHandlerGenerator};
use crate::emit::{ClassSink, CodeEmitter, MethodInfo, Signature};
use crate::jvm::BinaryName;
use crate::settings::Settings;
use crate::Error;

/// Strategy that emits the bodies of the methods routed to one kind of callback
///
/// Bodies emitted by a generator are self-contained: they only read the callback handle that the
/// context hands them and state the same generator set up in `generate_static`.
pub trait CallbackGenerator: Send + Sync {
    /// Which dispatch strategy this is
    fn strategy(&self) -> DispatchStrategy;

    /// Emit one method body per method into `sink`
    fn generate(
        &self,
        sink: &mut dyn ClassSink,
        context: &dyn Context,
        methods: &[MethodInfo],
    ) -> Result<(), Error>;

    /// Emit one-time initialization into the static initializer being built by `e`
    fn generate_static(
        &self,
        e: &mut CodeEmitter<'_>,
        context: &dyn Context,
        methods: &[MethodInfo],
    ) -> Result<(), Error>;
}

/// Per-request services that callback generators rely on
///
/// Which callback a method is routed to and where the callback handles live are decided by
/// whoever builds the context, not by the generators.
pub trait Context {
    /// Name of the class being generated
    fn class_name(&self) -> &BinaryName;

    fn settings(&self) -> &Settings;

    /// Open the body of the generated implementation of a contract method
    fn begin_method<'s>(
        &self,
        sink: &'s mut dyn ClassSink,
        method: &MethodInfo,
    ) -> Result<CodeEmitter<'s>, Error>;

    /// Callback slot that services a method
    fn get_index(&self, method: &MethodInfo) -> Result<usize, Error>;

    /// Push the callback handle bound to a slot
    fn emit_callback(&self, e: &mut CodeEmitter<'_>, index: usize) -> Result<(), Error>;

    /// Unique signature naming everything generated for a method (eg. reflective handle fields)
    fn get_impl_signature(&self, method: &MethodInfo) -> Signature;
}

/// Every way a generated method can get its behaviour
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DispatchStrategy {
    /// Property-by-property copy between two beans
    BeanCopy,

    /// Forward to the delegate returned by `Dispatcher.loadObject()`
    PlainDispatch,

    /// Forward to the delegate returned by `ProxyRefDispatcher.loadObject(proxy)`
    RefDispatch,

    /// Reflectively hand the call to `InvocationHandler.invoke`
    InvocationHandler,

    /// Forward to one of several delegates held by the generated class
    MixinAggregate,
}

/// Kind of callback held in a callback slot of a proxy
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CallbackType {
    Dispatcher,
    ProxyRefDispatcher,
    InvocationHandler,
}

static DISPATCHER: DispatcherGenerator = DispatcherGenerator::new(false);
static PROXY_REF_DISPATCHER: DispatcherGenerator = DispatcherGenerator::new(true);
static INVOCATION_HANDLER: InvocationHandlerGenerator = InvocationHandlerGenerator;

impl CallbackType {
    /// Type of the field holding callbacks of this kind
    pub fn interface<'a>(&self, settings: &'a Settings) -> &'a BinaryName {
        match self {
            CallbackType::Dispatcher => &settings.dispatcher_interface,
            CallbackType::ProxyRefDispatcher => &settings.proxy_ref_dispatcher_interface,
            CallbackType::InvocationHandler => &settings.invocation_handler_interface,
        }
    }

    /// Generator for the methods routed to callbacks of this kind
    pub fn generator(&self) -> &'static dyn CallbackGenerator {
        match self {
            CallbackType::Dispatcher => &DISPATCHER,
            CallbackType::ProxyRefDispatcher => &PROXY_REF_DISPATCHER,
            CallbackType::InvocationHandler => &INVOCATION_HANDLER,
        }
    }

    /// Does the generator need a static initializer?
    pub fn needs_static_init(&self) -> bool {
        matches!(self, CallbackType::InvocationHandler)
    }
}
