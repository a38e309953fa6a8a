use crate::jvm::{
    BinaryName, ClassAccessFlags, ClassData, FieldAccessFlags, FieldType, Insn, Label,
    MethodAccessFlags, MethodData, MethodDescriptor, TryCatch, UnqualifiedName, Version,
};
use crate::Error;

/// Everything about a class that is known before its members are emitted
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassHeader {
    pub version: Version,
    pub access_flags: ClassAccessFlags,
    pub name: BinaryName,
    pub superclass: BinaryName,
    pub interfaces: Vec<BinaryName>,

    /// Contents of the `SourceFile` attribute
    pub source_file: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDecl {
    pub access_flags: FieldAccessFlags,
    pub name: UnqualifiedName,
    pub descriptor: FieldType,
}

impl FieldDecl {
    pub fn new(
        access_flags: FieldAccessFlags,
        name: UnqualifiedName,
        descriptor: FieldType,
    ) -> FieldDecl {
        FieldDecl {
            access_flags,
            name,
            descriptor,
        }
    }
}

/// Method being implemented, or being called
///
/// When a contract method is implemented in a generated class, `owner` remains the type that
/// declared it in the contract. Generators use that to cast delegates and to look up reflective
/// handles.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodInfo {
    /// Declaring type
    pub owner: BinaryName,

    /// Is the declaring type an interface?
    pub owner_is_interface: bool,

    pub access_flags: MethodAccessFlags,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor,

    /// Declared (`throws`) exception types
    pub exceptions: Vec<BinaryName>,
}

/// Name and descriptor of a method
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor,
}

impl MethodInfo {
    pub fn new(
        owner: BinaryName,
        access_flags: MethodAccessFlags,
        name: UnqualifiedName,
        descriptor: MethodDescriptor,
    ) -> MethodInfo {
        MethodInfo {
            owner,
            owner_is_interface: false,
            access_flags,
            name,
            descriptor,
            exceptions: vec![],
        }
    }

    /// Method as found in the class graph
    pub fn from_class_graph(class: &ClassData, method: &MethodData) -> MethodInfo {
        MethodInfo {
            owner: class.name.clone(),
            owner_is_interface: class.is_interface,
            access_flags: method.access_flags,
            name: method.name.clone(),
            descriptor: method.descriptor.clone(),
            exceptions: method.exceptions.clone(),
        }
    }

    pub fn with_exceptions(mut self, exceptions: Vec<BinaryName>) -> MethodInfo {
        self.exceptions = exceptions;
        self
    }

    pub fn on_interface(mut self) -> MethodInfo {
        self.owner_is_interface = true;
        self
    }

    /// Same method, but declared on a different type (eg. when implementing it)
    pub fn moved_to(&self, owner: BinaryName, access_flags: MethodAccessFlags) -> MethodInfo {
        MethodInfo {
            owner,
            owner_is_interface: false,
            access_flags,
            ..self.clone()
        }
    }

    pub fn signature(&self) -> Signature {
        Signature {
            name: self.name.clone(),
            descriptor: self.descriptor.clone(),
        }
    }

    /// Would an implementation of one method also implement the other?
    ///
    /// Dispatch targets are identified by name and parameter types only.
    pub fn same_target(&self, other: &MethodInfo) -> bool {
        self.name == other.name && self.descriptor.parameters == other.descriptor.parameters
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    pub fn is_protected(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::PROTECTED)
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags.has_no_body()
    }

    pub fn is_constructor(&self) -> bool {
        self.name == UnqualifiedName::INIT
    }

    pub fn is_static_initializer(&self) -> bool {
        self.name == UnqualifiedName::CLINIT
    }
}

/// Receiver of class emission events
///
/// Events arrive in a fixed order: `begin_class`, then any number of fields and methods, then
/// `end_class`. Each method is a `begin_method`, its code (absent for abstract methods), then
/// `end_method`. Sinks can be stacked: a transformer is a sink that rewrites the events it
/// receives before forwarding them to the next sink.
///
/// Labels are allocated by the sink so that every layer in a stack of sinks draws from the same
/// supply.
pub trait ClassSink {
    fn begin_class(&mut self, header: ClassHeader) -> Result<(), Error>;

    fn declare_field(&mut self, field: FieldDecl) -> Result<(), Error>;

    fn begin_method(&mut self, method: &MethodInfo) -> Result<(), Error>;

    /// Generate a fresh label for the current method
    fn new_label(&mut self) -> Label;

    fn visit_instruction(&mut self, insn: Insn) -> Result<(), Error>;

    /// Register an exception table entry (all labels must be placed by the end of the method)
    fn visit_try_catch(&mut self, try_catch: TryCatch) -> Result<(), Error>;

    /// Finish the current method
    fn end_method(&mut self) -> Result<(), Error>;

    fn end_class(&mut self) -> Result<(), Error>;
}

impl<S: ClassSink + ?Sized> ClassSink for &mut S {
    fn begin_class(&mut self, header: ClassHeader) -> Result<(), Error> {
        (**self).begin_class(header)
    }

    fn declare_field(&mut self, field: FieldDecl) -> Result<(), Error> {
        (**self).declare_field(field)
    }

    fn begin_method(&mut self, method: &MethodInfo) -> Result<(), Error> {
        (**self).begin_method(method)
    }

    fn new_label(&mut self) -> Label {
        (**self).new_label()
    }

    fn visit_instruction(&mut self, insn: Insn) -> Result<(), Error> {
        (**self).visit_instruction(insn)
    }

    fn visit_try_catch(&mut self, try_catch: TryCatch) -> Result<(), Error> {
        (**self).visit_try_catch(try_catch)
    }

    fn end_method(&mut self) -> Result<(), Error> {
        (**self).end_method()
    }

    fn end_class(&mut self) -> Result<(), Error> {
        (**self).end_class()
    }
}

impl<S: ClassSink + ?Sized> ClassSink for Box<S> {
    fn begin_class(&mut self, header: ClassHeader) -> Result<(), Error> {
        (**self).begin_class(header)
    }

    fn declare_field(&mut self, field: FieldDecl) -> Result<(), Error> {
        (**self).declare_field(field)
    }

    fn begin_method(&mut self, method: &MethodInfo) -> Result<(), Error> {
        (**self).begin_method(method)
    }

    fn new_label(&mut self) -> Label {
        (**self).new_label()
    }

    fn visit_instruction(&mut self, insn: Insn) -> Result<(), Error> {
        (**self).visit_instruction(insn)
    }

    fn visit_try_catch(&mut self, try_catch: TryCatch) -> Result<(), Error> {
        (**self).visit_try_catch(try_catch)
    }

    fn end_method(&mut self) -> Result<(), Error> {
        (**self).end_method()
    }

    fn end_class(&mut self) -> Result<(), Error> {
        (**self).end_class()
    }
}
