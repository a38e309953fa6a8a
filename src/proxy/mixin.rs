use super::{CallbackGenerator, Context, DispatchStrategy};
use crate::beans::{bean_properties, property_methods};
use crate::emit::{
    null_constructor, ClassHeader, ClassSink, CodeEmitter, EmitterExts, FieldDecl,
    InstructionEmitter, MethodInfo, Signature,
};
use crate::generator::ClassGenerator;
use crate::jvm::{
    BinaryName, ClassAccessFlags, ClassGraph, FieldAccessFlags, FieldRef, FieldType, Instruction,
    MethodAccessFlags, MethodDescriptor, RefType, UnqualifiedName,
};
use crate::settings::Settings;
use crate::Error;

/// Which methods of the source types a mixin exposes
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MixinStyle {
    /// Every method of each source interface; the mixin implements all of the interfaces
    Interfaces,

    /// Bean property accessors and mutators of each source class; the mixin implements nothing
    Beans,
}

/// Generates a class that forwards the methods of several source types to one delegate each
///
/// Delegates are passed to the `([Ljava/lang/Object;)V` constructor in the same order as the
/// source types. When two sources have a method with the same name and parameter types, the
/// first source gets it.
pub struct MixinGenerator<'a> {
    settings: &'a Settings,
    class_name: BinaryName,
    style: MixinStyle,
    sources: Vec<BinaryName>,

    /// Forwarded methods, with the index of the delegate they go to
    routes: Vec<(MethodInfo, usize)>,
}

impl<'a> MixinGenerator<'a> {
    pub fn new(
        graph: &ClassGraph,
        settings: &'a Settings,
        class_name: BinaryName,
        style: MixinStyle,
        sources: Vec<BinaryName>,
    ) -> Result<MixinGenerator<'a>, Error> {
        let mut routes: Vec<(MethodInfo, usize)> = vec![];
        for (index, source) in sources.iter().enumerate() {
            let methods = match style {
                MixinStyle::Beans => {
                    property_methods(&bean_properties(graph, source)?, true, true)
                }
                MixinStyle::Interfaces => Self::interface_methods(graph, source)?,
            };
            for method in methods {
                if routes.iter().any(|(m, _)| m.same_target(&method)) {
                    log::trace!("{} already forwarded to an earlier delegate", method.name);
                } else {
                    routes.push((method, index));
                }
            }
        }

        Ok(MixinGenerator {
            settings,
            class_name,
            style,
            sources,
            routes,
        })
    }

    fn interface_methods(
        graph: &ClassGraph,
        interface: &BinaryName,
    ) -> Result<Vec<MethodInfo>, Error> {
        if !graph.contains(interface) {
            return Err(Error::MissingClass(interface.clone()));
        }
        Ok(graph
            .methods_of(interface)
            .into_iter()
            .map(|(class, method)| MethodInfo::from_class_graph(class, method))
            .filter(|method| {
                !method.is_static() && !method.is_constructor() && !method.is_static_initializer()
            })
            .collect())
    }

    /// Forwarded methods, with the index of the delegate they go to
    pub fn routes(&self) -> &[(MethodInfo, usize)] {
        &self.routes
    }

    fn delegates_field(&self) -> FieldRef {
        FieldRef::new(
            self.class_name.clone(),
            self.settings.delegates_field_name.clone(),
            FieldType::array(FieldType::object(BinaryName::OBJECT)),
        )
    }

    /// Constructor storing the delegates array
    fn delegates_constructor(&self, sink: &mut dyn ClassSink) -> Result<(), Error> {
        let constructor = MethodInfo::new(
            self.class_name.clone(),
            MethodAccessFlags::PUBLIC,
            UnqualifiedName::INIT,
            MethodDescriptor::new(vec![self.delegates_field().descriptor], None),
        );
        let mut e = CodeEmitter::begin(sink, constructor)?;
        e.load_this()?;
        e.invoke_constructor(&self.settings.mixin_superclass, MethodDescriptor::VOID)?;
        e.load_this()?;
        e.load_arg(0)?;
        e.put_field(self.delegates_field())?;
        e.return_value()?;
        e.end()
    }
}

/// Context where callback slots are indices into the delegates array
struct MixinContext<'m> {
    class_name: &'m BinaryName,
    settings: &'m Settings,
    delegates_field: FieldRef,
    routes: &'m [(MethodInfo, usize)],
}

impl<'m> Context for MixinContext<'m> {
    fn class_name(&self) -> &BinaryName {
        self.class_name
    }

    fn settings(&self) -> &Settings {
        self.settings
    }

    fn begin_method<'s>(
        &self,
        sink: &'s mut dyn ClassSink,
        method: &MethodInfo,
    ) -> Result<CodeEmitter<'s>, Error> {
        let access_flags =
            MethodAccessFlags::PUBLIC | (method.access_flags & MethodAccessFlags::VARARGS);
        CodeEmitter::begin(sink, method.moved_to(self.class_name.clone(), access_flags))
    }

    fn get_index(&self, method: &MethodInfo) -> Result<usize, Error> {
        self.routes
            .iter()
            .find(|(m, _)| m.same_target(method))
            .map(|(_, index)| *index)
            .ok_or_else(|| {
                Error::MissingCallbackSlot(method.name.clone(), method.descriptor.clone())
            })
    }

    fn emit_callback(&self, e: &mut CodeEmitter<'_>, index: usize) -> Result<(), Error> {
        e.load_this()?;
        e.get_field(self.delegates_field.clone())?;
        e.push_int(index as i32)?;
        e.push_instruction(Instruction::AALoad)
    }

    fn get_impl_signature(&self, method: &MethodInfo) -> Signature {
        method.signature()
    }
}

impl<'a> CallbackGenerator for MixinGenerator<'a> {
    fn strategy(&self) -> DispatchStrategy {
        DispatchStrategy::MixinAggregate
    }

    fn generate(
        &self,
        sink: &mut dyn ClassSink,
        context: &dyn Context,
        methods: &[MethodInfo],
    ) -> Result<(), Error> {
        for method in methods {
            let index = context.get_index(method)?;
            let mut e = context.begin_method(sink, method)?;
            context.emit_callback(&mut e, index)?;
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

impl<'a> ClassGenerator for MixinGenerator<'a> {
    fn generate_class(&self, sink: &mut dyn ClassSink) -> Result<(), Error> {
        log::debug!(
            "Generating {:?} mixin {} over {} delegates ({} methods)",
            self.style,
            self.class_name,
            self.sources.len(),
            self.routes.len()
        );

        let interfaces = match self.style {
            MixinStyle::Interfaces => self.sources.clone(),
            MixinStyle::Beans => vec![],
        };
        sink.begin_class(ClassHeader {
            version: self.settings.version,
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            name: self.class_name.clone(),
            superclass: self.settings.mixin_superclass.clone(),
            interfaces,
            source_file: self.settings.source_file.clone(),
        })?;

        let delegates_field = self.delegates_field();
        sink.declare_field(FieldDecl::new(
            FieldAccessFlags::PRIVATE,
            delegates_field.name.clone(),
            delegates_field.descriptor.clone(),
        ))?;
        null_constructor(sink, &self.class_name, &self.settings.mixin_superclass)?;
        self.delegates_constructor(sink)?;

        let context = MixinContext {
            class_name: &self.class_name,
            settings: self.settings,
            delegates_field,
            routes: &self.routes,
        };
        let methods: Vec<MethodInfo> = self.routes.iter().map(|(m, _)| m.clone()).collect();
        self.generate(sink, &context, &methods)?;

        sink.end_class()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::generator::generate;
    use crate::jvm::{ClassData, Name};

    fn name(s: &str) -> UnqualifiedName {
        UnqualifiedName::from_string(s.to_owned()).unwrap()
    }

    fn class(s: &str) -> BinaryName {
        BinaryName::from_string(s.to_owned()).unwrap()
    }

    #[test]
    fn first_source_wins() {
        let settings = Settings::new(Settings::DEFAULT_RUNTIME_PACKAGE).unwrap();
        let mut graph = ClassGraph::with_java_library_types();
        let size = MethodDescriptor::new(vec![], Some(FieldType::int()));
        graph.insert(
            ClassData::new_interface(class("demo/Sized"))
                .with_method(name("size"), size.clone()),
        );
        graph.insert(
            ClassData::new_interface(class("demo/Named"))
                .with_method(name("size"), MethodDescriptor::new(vec![], Some(FieldType::long())))
                .with_method(
                    name("name"),
                    MethodDescriptor::new(vec![], Some(FieldType::object(BinaryName::STRING))),
                ),
        );

        let generator = MixinGenerator::new(
            &graph,
            &settings,
            class("demo/Mixin"),
            MixinStyle::Interfaces,
            vec![class("demo/Sized"), class("demo/Named")],
        )
        .unwrap();
        let routes: Vec<(&str, usize)> = generator
            .routes()
            .iter()
            .map(|(m, index)| (m.name.as_str(), *index))
            .collect();
        assert_eq!(routes, vec![("size", 0), ("name", 1)]);

        let generated = generate(&generator).unwrap();
        assert_eq!(
            generated.header.interfaces,
            vec![class("demo/Sized"), class("demo/Named")]
        );
        assert!(generated.method("size", "()I").is_some());
        assert!(generated.method("size", "()J").is_none());
        assert!(generated.method("<init>", "([Ljava/lang/Object;)V").is_some());
        assert!(generated.field("DELEGATES").is_some());
    }
}
