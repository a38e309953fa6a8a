use super::{bean_getters, bean_setters, PropertyDescriptor};
use crate::cache::{CachedClass, ClassCache};
use crate::emit::{
    null_constructor, ClassHeader, ClassSink, CodeEmitter, EmitterExts, InstructionEmitter,
    MethodInfo,
};
use crate::generator::{generate_bytes, ClassGenerator};
use crate::jvm::{
    BinaryName, ClassAccessFlags, ClassGraph, FieldType, Instruction, MethodAccessFlags, Name,
    RefType, UnqualifiedName,
};
use crate::naming::NamingPolicy;
use crate::proxy::{CallbackContext, CallbackGenerator, Context, DispatchStrategy};
use crate::settings::Settings;
use crate::Error;
use std::sync::Arc;

/// Everything that distinguishes one generated bean copier from another
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BeanCopierKey {
    pub source: BinaryName,
    pub target: BinaryName,
    pub use_converter: bool,
}

/// Property read from the source and written to the target
#[derive(Clone, Debug)]
struct CopiedProperty {
    name: String,
    read: MethodInfo,
    write: MethodInfo,
}

/// Generates a `BeanCopier` subclass whose `copy(from, to, converter)` copies every property that
/// the source can read and the target can write
///
/// Without a converter, only pairs where the setter type is assignable from the getter type are
/// copied (no widening, so an `int` getter doesn't feed a `long` setter). With a converter every
/// matched pair goes through `Converter.convert(value, setterType, setterName)`, and results that
/// don't fit a primitive setter become zero.
pub struct BeanCopierGenerator<'a> {
    settings: &'a Settings,
    class_name: BinaryName,
    key: BeanCopierKey,
    properties: Vec<CopiedProperty>,
}

impl<'a> BeanCopierGenerator<'a> {
    pub fn new(
        graph: &ClassGraph,
        settings: &'a Settings,
        class_name: BinaryName,
        key: BeanCopierKey,
    ) -> Result<BeanCopierGenerator<'a>, Error> {
        let getters = bean_getters(graph, &key.source)?;
        let setters = bean_setters(graph, &key.target)?;

        let mut properties = vec![];
        for setter in &setters {
            let getter = match getters.iter().find(|g| g.name == setter.name) {
                Some(getter) => getter,
                None => continue,
            };
            if key.use_converter || Self::compatible(graph, getter, setter) {
                if let (Some(read), Some(write)) = (&getter.read_method, &setter.write_method) {
                    properties.push(CopiedProperty {
                        name: setter.name.clone(),
                        read: read.clone(),
                        write: write.clone(),
                    });
                }
            } else {
                log::debug!(
                    "Skipping property '{}': {} is not assignable to {}",
                    setter.name,
                    getter.property_type.source_name(),
                    setter.property_type.source_name()
                );
            }
        }

        Ok(BeanCopierGenerator {
            settings,
            class_name,
            key,
            properties,
        })
    }

    fn compatible(
        graph: &ClassGraph,
        getter: &PropertyDescriptor,
        setter: &PropertyDescriptor,
    ) -> bool {
        graph.is_assignable(&getter.property_type, &setter.property_type)
    }

    /// Names of the properties that `copy` will copy, in copy order
    pub fn copied_properties(&self) -> Vec<&str> {
        self.properties.iter().map(|p| p.name.as_str()).collect()
    }

    fn copy_method(&self) -> MethodInfo {
        MethodInfo::new(
            self.settings.bean_copier_class.clone(),
            MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT,
            UnqualifiedName::COPY,
            self.settings.copy_descriptor(),
        )
    }
}

impl<'a> CallbackGenerator for BeanCopierGenerator<'a> {
    fn strategy(&self) -> DispatchStrategy {
        DispatchStrategy::BeanCopy
    }

    fn generate(
        &self,
        sink: &mut dyn ClassSink,
        context: &dyn Context,
        methods: &[MethodInfo],
    ) -> Result<(), Error> {
        let source_type = RefType::Object(self.key.source.clone());
        let target_type = RefType::Object(self.key.target.clone());

        for method in methods {
            let mut e = context.begin_method(sink, method)?;

            if self.key.use_converter {
                let target = e.make_local(FieldType::Ref(target_type.clone()));
                let source = e.make_local(FieldType::Ref(source_type.clone()));
                e.load_arg(1)?;
                e.checkcast(&target_type)?;
                e.store_local(&target)?;
                e.load_arg(0)?;
                e.checkcast(&source_type)?;
                e.store_local(&source)?;

                for property in &self.properties {
                    let setter_type = &property.write.descriptor.parameters[0];
                    e.load_local(&target)?;
                    e.load_arg(2)?;
                    e.load_local(&source)?;
                    e.invoke(&property.read)?;
                    if let Some(getter_type) = &property.read.descriptor.return_type {
                        e.box_value(getter_type)?;
                    }
                    e.load_class(setter_type)?;
                    e.push_string(property.write.name.as_str())?;
                    e.invoke_interface(
                        &self.settings.converter_interface,
                        UnqualifiedName::CONVERT,
                        self.settings.convert_descriptor(),
                    )?;
                    e.unbox_or_zero(setter_type)?;
                    e.invoke(&property.write)?;
                }
            } else {
                e.load_arg(1)?;
                e.checkcast(&target_type)?;
                e.load_arg(0)?;
                e.checkcast(&source_type)?;

                for property in &self.properties {
                    e.push_instruction(Instruction::Dup2)?;
                    e.invoke(&property.read)?;
                    e.invoke(&property.write)?;
                }
            }

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

impl<'a> ClassGenerator for BeanCopierGenerator<'a> {
    fn generate_class(&self, sink: &mut dyn ClassSink) -> Result<(), Error> {
        log::debug!(
            "Generating bean copier {} ({} -> {}, {} properties)",
            self.class_name,
            self.key.source,
            self.key.target,
            self.properties.len()
        );

        sink.begin_class(ClassHeader {
            version: self.settings.version,
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            name: self.class_name.clone(),
            superclass: self.settings.bean_copier_class.clone(),
            interfaces: vec![],
            source_file: self.settings.source_file.clone(),
        })?;
        null_constructor(sink, &self.class_name, &self.settings.bean_copier_class)?;

        let copy = self.copy_method();
        let context =
            CallbackContext::new(self.class_name.clone(), self.settings, vec![], vec![])?;
        self.generate(sink, &context, &[copy])?;

        sink.end_class()
    }
}

/// Bean copier class for a key, generated on first use
///
/// Equal keys share one class, named by `naming` after the source class.
pub fn bean_copier_class(
    graph: &ClassGraph,
    settings: &Settings,
    naming: &NamingPolicy,
    cache: &ClassCache<BeanCopierKey>,
    key: &BeanCopierKey,
) -> Result<Arc<CachedClass>, Error> {
    cache.get_or_generate(key, || {
        let name = naming.class_name(
            Some(&key.source),
            settings.bean_copier_class.as_str(),
            key,
            |name| !cache.reserve_name(name),
        )?;
        let bytes = BeanCopierGenerator::new(graph, settings, name.clone(), key.clone())
            .and_then(|generator| generate_bytes(&generator));
        match bytes {
            Ok(bytes) => Ok(CachedClass { name, bytes }),
            Err(err) => {
                cache.release_name(&name);
                Err(err)
            }
        }
    })
}
