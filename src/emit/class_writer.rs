use super::{ClassHeader, ClassSink, FieldDecl, MethodInfo};
use crate::jvm::{
    ClassFile, Code, ConstantsPool, Exceptions, Field, Insn, Label, Method, MethodDescriptor, Name,
    ParseDescriptor, RenderDescriptor, SourceFile, TryCatch, UnqualifiedName,
};
use crate::Error;

/// Method recorded by a `ClassWriter`
#[derive(Clone, Debug)]
pub struct GeneratedMethod {
    pub info: MethodInfo,

    /// Body of the method (`None` for abstract and native methods)
    pub code: Option<Code>,
}

/// Class recorded by a `ClassWriter`
///
/// This is still symbolic, so it can be inspected (or interpreted) before being turned into a
/// class file.
#[derive(Clone, Debug)]
pub struct GeneratedClass {
    pub header: ClassHeader,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<GeneratedMethod>,
}

impl GeneratedClass {
    /// Look up a method by name and descriptor
    pub fn method(&self, name: &str, descriptor: &str) -> Option<&GeneratedMethod> {
        let descriptor = MethodDescriptor::parse(descriptor).ok()?;
        self.methods
            .iter()
            .find(|m| m.info.name.as_str() == name && m.info.descriptor == descriptor)
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name.as_str() == name)
    }

    /// Resolve everything into a class file
    pub fn to_class_file(&self) -> Result<ClassFile, Error> {
        let mut constants = ConstantsPool::new();

        let this_class = constants.get_class(self.header.name.as_str())?;
        let super_class = constants.get_class(self.header.superclass.as_str())?;
        let mut interfaces = vec![];
        for interface in &self.header.interfaces {
            interfaces.push(constants.get_class(interface.as_str())?);
        }

        let mut fields = vec![];
        for field in &self.fields {
            fields.push(Field {
                access_flags: field.access_flags,
                name_index: constants.get_utf8(field.name.as_str())?,
                descriptor_index: constants.get_utf8(field.descriptor.render())?,
                attributes: vec![],
            });
        }

        let mut methods = vec![];
        for method in &self.methods {
            let mut attributes = vec![];
            if let Some(code) = &method.code {
                let code_attribute = code.serialize_code(&mut constants)?;
                attributes.push(constants.get_attribute(code_attribute)?);
            }
            if !method.info.exceptions.is_empty() {
                let mut exceptions = vec![];
                for exception in &method.info.exceptions {
                    exceptions.push(constants.get_class(exception.as_str())?);
                }
                attributes.push(constants.get_attribute(Exceptions(exceptions))?);
            }
            methods.push(Method {
                access_flags: method.info.access_flags,
                name_index: constants.get_utf8(method.info.name.as_str())?,
                descriptor_index: constants.get_utf8(method.info.descriptor.render())?,
                attributes,
            });
        }

        let mut attributes = vec![];
        if let Some(source_file) = &self.header.source_file {
            let name_index = constants.get_utf8(source_file.as_str())?;
            attributes.push(constants.get_attribute(SourceFile(name_index))?);
        }

        Ok(ClassFile {
            version: self.header.version,
            constants,
            access_flags: self.header.access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    /// Serialize into class file bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(self.to_class_file()?.to_bytes()?)
    }
}

/// Terminal sink that records everything it receives into a `GeneratedClass`
#[derive(Default)]
pub struct ClassWriter {
    header: Option<ClassHeader>,
    fields: Vec<FieldDecl>,
    methods: Vec<GeneratedMethod>,

    /// Method currently being emitted
    current_method: Option<GeneratedMethod>,

    next_label: usize,
    finished: bool,
}

impl ClassWriter {
    pub fn new() -> ClassWriter {
        ClassWriter::default()
    }

    /// Retrieve the class, provided it was completely emitted
    pub fn finish(self) -> Result<GeneratedClass, Error> {
        match (self.header, self.finished) {
            (Some(header), true) => Ok(GeneratedClass {
                header,
                fields: self.fields,
                methods: self.methods,
            }),
            _ => Err(Error::UnexpectedEvent("class was not completely emitted")),
        }
    }

    fn current_code(&mut self) -> Result<&mut Code, Error> {
        self.current_method
            .as_mut()
            .and_then(|method| method.code.as_mut())
            .ok_or(Error::UnexpectedEvent("code outside of a method body"))
    }
}

impl ClassSink for ClassWriter {
    fn begin_class(&mut self, header: ClassHeader) -> Result<(), Error> {
        if self.header.is_some() {
            return Err(Error::UnexpectedEvent("class was already started"));
        }
        if header.version.requires_stack_maps() {
            return Err(Error::UnsupportedVersion(header.version));
        }
        log::debug!("Writing class {}", header.name);
        self.header = Some(header);
        Ok(())
    }

    fn declare_field(&mut self, field: FieldDecl) -> Result<(), Error> {
        if self.header.is_none() || self.finished {
            return Err(Error::UnexpectedEvent("field outside of a class"));
        }
        self.fields.push(field);
        Ok(())
    }

    fn begin_method(&mut self, method: &MethodInfo) -> Result<(), Error> {
        if self.header.is_none() || self.current_method.is_some() {
            return Err(Error::UnexpectedEvent("method started inside another method"));
        }
        let code = if method.is_abstract() {
            None
        } else {
            Some(Code::new(
                method.descriptor.parameter_length(!method.is_static()),
            ))
        };
        self.next_label = 0;
        self.current_method = Some(GeneratedMethod {
            info: method.clone(),
            code,
        });
        Ok(())
    }

    fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    fn visit_instruction(&mut self, insn: Insn) -> Result<(), Error> {
        self.current_code()?.instructions.push(insn);
        Ok(())
    }

    fn visit_try_catch(&mut self, try_catch: TryCatch) -> Result<(), Error> {
        self.current_code()?.try_catches.push(try_catch);
        Ok(())
    }

    fn end_method(&mut self) -> Result<(), Error> {
        let method = self
            .current_method
            .take()
            .ok_or(Error::UnexpectedEvent("method ended without being started"))?;
        log::trace!(
            "Wrote method {}{} ({} instructions)",
            method.info.name,
            method.info.descriptor.render(),
            method.code.as_ref().map_or(0, |c| c.instructions.len())
        );
        self.methods.push(method);
        Ok(())
    }

    fn end_class(&mut self) -> Result<(), Error> {
        if self.current_method.is_some() {
            return Err(Error::UnexpectedEvent("class ended inside a method"));
        }
        self.finished = true;
        Ok(())
    }
}

impl GeneratedMethod {
    pub fn name(&self) -> &UnqualifiedName {
        &self.info.name
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::emit::{null_constructor, CodeEmitter, EmitterExts};
    use crate::jvm::{BinaryName, ClassAccessFlags, MethodAccessFlags, Version};

    fn header() -> ClassHeader {
        ClassHeader {
            version: Version::JAVA5,
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            name: BinaryName::from_string(String::from("demo/Empty")).unwrap(),
            superclass: BinaryName::OBJECT,
            interfaces: vec![],
            source_file: Some(String::from("<generated>")),
        }
    }

    #[test]
    fn writes_empty_class() {
        let mut writer = ClassWriter::new();
        writer.begin_class(header()).unwrap();
        null_constructor(&mut writer, &header().name, &BinaryName::OBJECT).unwrap();
        writer.end_class().unwrap();

        let class = writer.finish().unwrap();
        let constructor = class.method("<init>", "()V").unwrap();
        assert_eq!(constructor.code.as_ref().unwrap().instructions.len(), 3);

        let bytes = class.to_bytes().unwrap();
        assert_eq!(&bytes[0..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 49]);
    }

    #[test]
    fn rejects_versions_needing_stack_maps() {
        let mut writer = ClassWriter::new();
        let java6 = ClassHeader {
            version: Version::JAVA6,
            ..header()
        };
        assert!(writer.begin_class(java6).is_ok());

        let mut writer = ClassWriter::new();
        let java8 = ClassHeader {
            version: Version {
                minor_version: 0,
                major_version: 52,
            },
            ..header()
        };
        assert!(matches!(
            writer.begin_class(java8),
            Err(Error::UnsupportedVersion(Version {
                major_version: 52,
                ..
            }))
        ));
        assert!(writer.finish().is_err());
    }

    #[test]
    fn rejects_out_of_order_events() {
        let mut writer = ClassWriter::new();
        assert!(writer
            .visit_instruction(Insn::Label(Label(0)))
            .is_err());

        writer.begin_class(header()).unwrap();
        let method = MethodInfo::new(
            header().name,
            MethodAccessFlags::PUBLIC,
            UnqualifiedName::from_string(String::from("run")).unwrap(),
            MethodDescriptor::VOID,
        );
        let mut emitter = CodeEmitter::begin(&mut writer, method).unwrap();
        emitter.return_value().unwrap();
        drop(emitter);
        assert!(writer.end_class().is_err());
        assert!(writer.end_method().is_ok());
        assert!(writer.end_class().is_ok());
    }
}
