use crate::emit::{ClassSink, ClassWriter, GeneratedClass};
use crate::Error;

/// Something that knows how to emit one whole class
///
/// Generators only ever talk to a `ClassSink`, so they can be pointed at a `ClassWriter` directly
/// or at a stack of transformers in front of one (see `transform::TransformingGenerator`).
pub trait ClassGenerator {
    fn generate_class(&self, sink: &mut dyn ClassSink) -> Result<(), Error>;
}

impl<G: ClassGenerator + ?Sized> ClassGenerator for &G {
    fn generate_class(&self, sink: &mut dyn ClassSink) -> Result<(), Error> {
        (**self).generate_class(sink)
    }
}

impl<G: ClassGenerator + ?Sized> ClassGenerator for Box<G> {
    fn generate_class(&self, sink: &mut dyn ClassSink) -> Result<(), Error> {
        (**self).generate_class(sink)
    }
}

/// Run a generator into a fresh `ClassWriter`
pub fn generate(generator: &dyn ClassGenerator) -> Result<GeneratedClass, Error> {
    let mut writer = ClassWriter::new();
    generator.generate_class(&mut writer)?;
    writer.finish()
}

/// Run a generator and serialize the result into class file bytes
pub fn generate_bytes(generator: &dyn ClassGenerator) -> Result<Vec<u8>, Error> {
    let class = generate(generator)?;
    log::debug!(
        "Generated {} ({} fields, {} methods)",
        class.header.name,
        class.fields.len(),
        class.methods.len()
    );
    class.to_bytes()
}
