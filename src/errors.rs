use crate::jvm::{self, BinaryName, MethodDescriptor, RenderDescriptor, UnqualifiedName, Version};
use std::fmt;

#[derive(Debug)]
pub enum Error {
    BytecodeGen(jvm::Error),

    /// Exception wrapper class has no constructor taking exactly one `Throwable`
    InvalidWrapperType(BinaryName),

    /// Class is referenced but not present in the class graph
    MissingClass(BinaryName),

    /// Method is referenced but not present on the class (or its supertypes)
    MissingMethod {
        owner: BinaryName,
        name: UnqualifiedName,
        descriptor: MethodDescriptor,
    },

    /// Name or descriptor failed to validate
    MalformedName(String),

    /// Method was not assigned a callback slot
    MissingCallbackSlot(UnqualifiedName, MethodDescriptor),

    /// Callback slot index has no configured callback type
    UnsupportedCallback(usize),

    /// Class file version needs stack map frames, which aren't computed
    UnsupportedVersion(Version),

    /// Emission events arrived in an order the sink can't handle (eg. an instruction outside of
    /// any method)
    UnexpectedEvent(&'static str),

    Io(std::io::Error),
}

impl From<jvm::Error> for Error {
    fn from(err: jvm::Error) -> Error {
        Error::BytecodeGen(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BytecodeGen(err) => write!(f, "bytecode generation failed: {:?}", err),
            Error::InvalidWrapperType(name) => write!(
                f,
                "wrapper type {} has no constructor taking a java.lang.Throwable",
                name.to_source_name()
            ),
            Error::MissingClass(name) => write!(f, "unknown class {}", name.to_source_name()),
            Error::MissingMethod {
                owner,
                name,
                descriptor,
            } => write!(
                f,
                "unknown method {}.{}{}",
                owner.to_source_name(),
                name,
                descriptor.render()
            ),
            Error::MalformedName(msg) => write!(f, "malformed name: {}", msg),
            Error::MissingCallbackSlot(name, descriptor) => write!(
                f,
                "no callback slot assigned to {}{}",
                name,
                descriptor.render()
            ),
            Error::UnsupportedCallback(slot) => {
                write!(f, "no callback type configured for slot {}", slot)
            }
            Error::UnsupportedVersion(version) => write!(
                f,
                "class file version {}.{} requires stack map frames (at most 50.0 is supported)",
                version.major_version, version.minor_version
            ),
            Error::UnexpectedEvent(event) => write!(f, "unexpected emission event: {}", event),
            Error::Io(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {}
