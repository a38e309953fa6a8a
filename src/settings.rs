use crate::jvm::{
    BinaryName, ClassData, ClassGraph, FieldType, MethodAccessFlags, MethodData, MethodDescriptor,
    Name, UnqualifiedName, Version,
};
use crate::Error;

/// Names and knobs shared by all of the generators
///
/// Generated classes refer to a handful of runtime types (the callback interfaces, the bean
/// copier base class, ...). None of those are part of this crate: they live in whatever runtime
/// library ends up on the classpath next to the generated classes, so their names are all
/// configurable here.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Class file version of generated classes
    ///
    /// Versions after Java 6 (50.0) require stack map frames, which aren't computed, so the class
    /// writer rejects them.
    pub version: Version,

    /// Contents of the `SourceFile` attribute of generated classes
    pub source_file: Option<String>,

    /// Abstract base class of bean copiers
    ///
    /// Must have a public no-argument constructor and declare
    /// `copy(Ljava/lang/Object;Ljava/lang/Object;L<converter>;)V`.
    pub bean_copier_class: BinaryName,

    /// Conversion callback used by bean copiers
    ///
    /// Must declare `convert(Ljava/lang/Object;Ljava/lang/Class;Ljava/lang/Object;)Ljava/lang/Object;`
    pub converter_interface: BinaryName,

    /// Callback that supplies the delegate through `loadObject()Ljava/lang/Object;`
    pub dispatcher_interface: BinaryName,

    /// Callback that supplies the delegate through `loadObject(Ljava/lang/Object;)Ljava/lang/Object;`,
    /// given the proxy itself
    pub proxy_ref_dispatcher_interface: BinaryName,

    /// Callback that receives every call reflectively
    pub invocation_handler_interface: BinaryName,

    /// Exception thrown by invocation handler dispatch when the handler throws a checked
    /// exception that the proxied method doesn't declare
    pub undeclared_throwable_wrapper: BinaryName,

    /// Superclass of generated mixins
    pub mixin_superclass: BinaryName,

    /// Prefix for fields holding callbacks (the slot index is appended)
    pub callback_field_prefix: UnqualifiedName,

    /// Name of the `[Ljava/lang/Object;` field holding mixin delegates
    pub delegates_field_name: UnqualifiedName,
}

impl Settings {
    /// Package of the default runtime types
    pub const DEFAULT_RUNTIME_PACKAGE: &'static str = "jvmproxy/runtime";

    /// Settings pointing at the runtime types in `runtime_package` (eg. `jvmproxy/runtime`)
    pub fn new(runtime_package: &str) -> Result<Settings, Error> {
        fn make_name<N: Name>(name: impl Into<String>) -> Result<N, Error> {
            N::from_string(name.into()).map_err(Error::MalformedName)
        }
        let runtime_name =
            |simple: &str| make_name::<BinaryName>(format!("{}/{}", runtime_package, simple));

        Ok(Settings {
            version: Version::JAVA5,
            source_file: Some(String::from("<generated>")),
            bean_copier_class: runtime_name("BeanCopier")?,
            converter_interface: runtime_name("Converter")?,
            dispatcher_interface: runtime_name("Dispatcher")?,
            proxy_ref_dispatcher_interface: runtime_name("ProxyRefDispatcher")?,
            invocation_handler_interface: BinaryName::INVOCATIONHANDLER,
            undeclared_throwable_wrapper: BinaryName::UNDECLAREDTHROWABLEEXCEPTION,
            mixin_superclass: BinaryName::OBJECT,
            callback_field_prefix: make_name("CALLBACK_")?,
            delegates_field_name: UnqualifiedName::DELEGATES,
        })
    }

    /// `Converter.convert` descriptor
    pub fn convert_descriptor(&self) -> MethodDescriptor {
        let object = FieldType::object(BinaryName::OBJECT);
        MethodDescriptor::new(
            vec![object.clone(), FieldType::object(BinaryName::CLASS), object.clone()],
            Some(object),
        )
    }

    /// `BeanCopier.copy` descriptor
    pub fn copy_descriptor(&self) -> MethodDescriptor {
        let object = FieldType::object(BinaryName::OBJECT);
        MethodDescriptor::new(
            vec![
                object.clone(),
                object,
                FieldType::object(self.converter_interface.clone()),
            ],
            None,
        )
    }

    /// `Dispatcher.loadObject` (or `ProxyRefDispatcher.loadObject`) descriptor
    pub fn load_object_descriptor(&self, pass_proxy: bool) -> MethodDescriptor {
        let object = FieldType::object(BinaryName::OBJECT);
        let parameters = if pass_proxy { vec![object.clone()] } else { vec![] };
        MethodDescriptor::new(parameters, Some(object))
    }

    /// `InvocationHandler.invoke` descriptor
    pub fn invoke_descriptor(&self) -> MethodDescriptor {
        let object = FieldType::object(BinaryName::OBJECT);
        MethodDescriptor::new(
            vec![
                object.clone(),
                FieldType::object(BinaryName::METHOD),
                FieldType::array(object.clone()),
            ],
            Some(object),
        )
    }

    /// Register the runtime types into a class graph
    ///
    /// Types already in the graph are left alone, so callers can register richer versions of
    /// them beforehand.
    pub fn insert_runtime_types(&self, graph: &mut ClassGraph) {
        let abstract_method = |name: UnqualifiedName, descriptor: MethodDescriptor| MethodData {
            access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT,
            name,
            descriptor,
            exceptions: vec![],
        };

        let runtime_types = [
            ClassData::new_class(self.bean_copier_class.clone(), BinaryName::OBJECT)
                .with_method(UnqualifiedName::INIT, MethodDescriptor::VOID)
                .with_method_data(abstract_method(UnqualifiedName::COPY, self.copy_descriptor())),
            ClassData::new_interface(self.converter_interface.clone())
                .with_method(UnqualifiedName::CONVERT, self.convert_descriptor()),
            ClassData::new_interface(self.dispatcher_interface.clone())
                .with_method(UnqualifiedName::LOADOBJECT, self.load_object_descriptor(false)),
            ClassData::new_interface(self.proxy_ref_dispatcher_interface.clone())
                .with_method(UnqualifiedName::LOADOBJECT, self.load_object_descriptor(true)),
            ClassData::new_interface(self.invocation_handler_interface.clone()).with_method_data(
                MethodData {
                    exceptions: vec![BinaryName::THROWABLE],
                    ..abstract_method(UnqualifiedName::INVOKE, self.invoke_descriptor())
                },
            ),
            ClassData::new_class(
                self.undeclared_throwable_wrapper.clone(),
                BinaryName::RUNTIMEEXCEPTION,
            )
            .with_method(
                UnqualifiedName::INIT,
                MethodDescriptor::new(vec![FieldType::object(BinaryName::THROWABLE)], None),
            ),
        ];

        for class in runtime_types {
            if !graph.contains(&class.name) {
                log::trace!("Registering runtime type {}", class.name);
                graph.insert(class);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::RenderDescriptor;

    #[test]
    fn runtime_names() {
        let settings = Settings::new("my/runtime").unwrap();
        assert_eq!(settings.dispatcher_interface.as_str(), "my/runtime/Dispatcher");
        assert_eq!(
            settings.copy_descriptor().render(),
            "(Ljava/lang/Object;Ljava/lang/Object;Lmy/runtime/Converter;)V"
        );
        assert!(Settings::new("my//runtime").is_err());
    }

    #[test]
    fn runtime_types_do_not_replace_existing_ones() {
        let settings = Settings::new(Settings::DEFAULT_RUNTIME_PACKAGE).unwrap();
        let mut graph = ClassGraph::with_java_library_types();
        graph.insert(ClassData::new_interface(settings.converter_interface.clone()));
        settings.insert_runtime_types(&mut graph);

        assert!(graph.get(&settings.converter_interface).unwrap().methods.is_empty());
        assert!(graph.is_interface(&settings.dispatcher_interface));
        assert!(graph
            .find_method(
                &settings.bean_copier_class,
                &UnqualifiedName::COPY,
                &settings.copy_descriptor()
            )
            .is_some());
    }
}
