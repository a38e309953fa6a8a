use super::{CallbackContext, CallbackType};
use crate::emit::{ClassHeader, ClassSink, CodeEmitter, EmitterExts, FieldDecl, MethodInfo};
use crate::generator::ClassGenerator;
use crate::jvm::{
    BinaryName, ClassAccessFlags, ClassGraph, FieldAccessFlags, MethodAccessFlags,
    MethodDescriptor, UnqualifiedName,
};
use crate::settings::Settings;
use crate::Error;

/// Picks the callback slot that services a method
pub trait CallbackFilter: Send + Sync {
    fn accept(&self, method: &MethodInfo) -> usize;
}

impl<F: Fn(&MethodInfo) -> usize + Send + Sync> CallbackFilter for F {
    fn accept(&self, method: &MethodInfo) -> usize {
        self(method)
    }
}

/// Generates a subclass of `superclass` implementing `interfaces` where every overridable method
/// is routed to a callback
///
/// The generated class has one field per callback slot, and a constructor taking the callbacks
/// in slot order. By default every method goes to slot 0.
pub struct ProxyGenerator<'a> {
    graph: &'a ClassGraph,
    settings: &'a Settings,
    class_name: BinaryName,
    superclass: BinaryName,
    interfaces: Vec<BinaryName>,
    callback_types: Vec<CallbackType>,
    filter: Box<dyn CallbackFilter + 'a>,
}

impl<'a> ProxyGenerator<'a> {
    pub fn new(
        graph: &'a ClassGraph,
        settings: &'a Settings,
        class_name: BinaryName,
    ) -> ProxyGenerator<'a> {
        ProxyGenerator {
            graph,
            settings,
            class_name,
            superclass: BinaryName::OBJECT,
            interfaces: vec![],
            callback_types: vec![],
            filter: Box::new(|_: &MethodInfo| 0),
        }
    }

    pub fn superclass(mut self, superclass: BinaryName) -> Self {
        self.superclass = superclass;
        self
    }

    pub fn interfaces(mut self, interfaces: Vec<BinaryName>) -> Self {
        self.interfaces = interfaces;
        self
    }

    pub fn callback_types(mut self, callback_types: Vec<CallbackType>) -> Self {
        self.callback_types = callback_types;
        self
    }

    pub fn callback_filter(mut self, filter: impl CallbackFilter + 'a) -> Self {
        self.filter = Box::new(filter);
        self
    }

    /// Methods that the proxy overrides, superclass methods first
    pub fn contract(&self) -> Result<Vec<MethodInfo>, Error> {
        let not_overridable = MethodAccessFlags::STATIC
            | MethodAccessFlags::PRIVATE
            | MethodAccessFlags::FINAL;
        let mut contract: Vec<MethodInfo> = vec![];

        for owner in std::iter::once(&self.superclass).chain(&self.interfaces) {
            if !self.graph.contains(owner) {
                return Err(Error::MissingClass(owner.clone()));
            }
            for (class, method) in self.graph.methods_of(owner) {
                let method = MethodInfo::from_class_graph(class, method);
                if method.access_flags.intersects(not_overridable)
                    || method.is_constructor()
                    || method.is_static_initializer()
                    || contract.iter().any(|m| m.same_target(&method))
                {
                    continue;
                }
                contract.push(method);
            }
        }
        Ok(contract)
    }

    fn constructor(
        &self,
        sink: &mut dyn ClassSink,
        context: &CallbackContext,
    ) -> Result<(), Error> {
        let superclass = self
            .graph
            .get(&self.superclass)
            .ok_or_else(|| Error::MissingClass(self.superclass.clone()))?;
        if superclass
            .declared_method(&UnqualifiedName::INIT, &MethodDescriptor::VOID)
            .is_none()
        {
            return Err(Error::MissingMethod {
                owner: self.superclass.clone(),
                name: UnqualifiedName::INIT,
                descriptor: MethodDescriptor::VOID,
            });
        }

        let mut fields = vec![];
        for index in 0..self.callback_types.len() {
            fields.push(context.callback_field(index)?);
        }
        let descriptor = MethodDescriptor::new(
            fields.iter().map(|field| field.descriptor.clone()).collect(),
            None,
        );
        let constructor = MethodInfo::new(
            self.class_name.clone(),
            MethodAccessFlags::PUBLIC,
            UnqualifiedName::INIT,
            descriptor,
        );

        let mut e = CodeEmitter::begin(sink, constructor)?;
        e.load_this()?;
        e.invoke_constructor(&self.superclass, MethodDescriptor::VOID)?;
        for (index, field) in fields.into_iter().enumerate() {
            e.load_this()?;
            e.load_arg(index)?;
            e.put_field(field)?;
        }
        e.return_value()?;
        e.end()
    }

    fn static_initializer(
        &self,
        sink: &mut dyn ClassSink,
        context: &CallbackContext,
    ) -> Result<(), Error> {
        let clinit = MethodInfo::new(
            self.class_name.clone(),
            MethodAccessFlags::STATIC,
            UnqualifiedName::CLINIT,
            MethodDescriptor::VOID,
        );
        let mut e = CodeEmitter::begin(sink, clinit)?;
        for (slot, callback_type) in self.callback_types.iter().enumerate() {
            let methods = context.methods_for_slot(slot);
            callback_type
                .generator()
                .generate_static(&mut e, context, &methods)?;
        }
        e.return_value()?;
        e.end()
    }
}

impl<'a> ClassGenerator for ProxyGenerator<'a> {
    fn generate_class(&self, sink: &mut dyn ClassSink) -> Result<(), Error> {
        let routed: Vec<(MethodInfo, usize)> = self
            .contract()?
            .into_iter()
            .map(|method| {
                let slot = self.filter.accept(&method);
                (method, slot)
            })
            .collect();
        log::debug!(
            "Generating proxy {} of {} ({} methods, {} callbacks)",
            self.class_name,
            self.superclass,
            routed.len(),
            self.callback_types.len()
        );
        let context = CallbackContext::new(
            self.class_name.clone(),
            self.settings,
            self.callback_types.clone(),
            routed,
        )?;

        sink.begin_class(ClassHeader {
            version: self.settings.version,
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            name: self.class_name.clone(),
            superclass: self.superclass.clone(),
            interfaces: self.interfaces.clone(),
            source_file: self.settings.source_file.clone(),
        })?;

        for index in 0..self.callback_types.len() {
            let field = context.callback_field(index)?;
            sink.declare_field(FieldDecl::new(
                FieldAccessFlags::PRIVATE | FieldAccessFlags::FINAL,
                field.name,
                field.descriptor,
            ))?;
        }
        self.constructor(sink, &context)?;

        for (slot, callback_type) in self.callback_types.iter().enumerate() {
            let generator = callback_type.generator();
            let methods = context.methods_for_slot(slot);
            log::trace!(
                "Slot {} uses {:?} for {} methods",
                slot,
                generator.strategy(),
                methods.len()
            );
            generator.generate(sink, &context, &methods)?;
        }

        if self.callback_types.iter().any(CallbackType::needs_static_init) {
            self.static_initializer(sink, &context)?;
        }

        sink.end_class()
    }
}
