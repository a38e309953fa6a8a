//! Rewriting of generated classes as they are emitted
//!
//! A transformer wraps the sink that a generator would otherwise write to, and gets to see (and
//! rewrite) every event before passing it on. Generators are oblivious to this.

mod undeclared_throwable;

pub use undeclared_throwable::*;

use crate::emit::ClassSink;
use crate::generator::ClassGenerator;
use crate::Error;

pub trait ClassTransformer: Send + Sync {
    /// Wrap a sink so that events sent to the result are rewritten before reaching `target`
    fn transform<'s>(&'s self, target: Box<dyn ClassSink + 's>) -> Box<dyn ClassSink + 's>;
}

/// Several transformers applied in order
///
/// The first transformer sees the events from the generator first. Its output goes through the
/// second transformer, and so on down to the real sink.
#[derive(Default)]
pub struct TransformerChain(Vec<Box<dyn ClassTransformer>>);

impl TransformerChain {
    pub fn new(transformers: Vec<Box<dyn ClassTransformer>>) -> TransformerChain {
        TransformerChain(transformers)
    }

    pub fn push(&mut self, transformer: impl ClassTransformer + 'static) {
        self.0.push(Box::new(transformer));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl ClassTransformer for TransformerChain {
    fn transform<'s>(&'s self, target: Box<dyn ClassSink + 's>) -> Box<dyn ClassSink + 's> {
        self.0
            .iter()
            .rev()
            .fold(target, |target, transformer| transformer.transform(target))
    }
}

/// Generator whose output goes through a transformer before reaching the sink
pub struct TransformingGenerator<G, T> {
    base: G,
    transformer: T,
}

impl<G: ClassGenerator, T: ClassTransformer> TransformingGenerator<G, T> {
    pub fn new(base: G, transformer: T) -> TransformingGenerator<G, T> {
        TransformingGenerator { base, transformer }
    }
}

impl<G: ClassGenerator, T: ClassTransformer> ClassGenerator for TransformingGenerator<G, T> {
    fn generate_class(&self, sink: &mut dyn ClassSink) -> Result<(), Error> {
        let mut transformed = self.transformer.transform(Box::new(sink));
        self.base.generate_class(&mut *transformed)
    }
}
