use super::ClassTransformer;
use crate::emit::{Block, ClassHeader, ClassSink, CodeEmitter, EmitterExts, FieldDecl, MethodInfo};
use crate::jvm::{
    BinaryName, ClassGraph, FieldType, Insn, Instruction, InvokeType, Label, MethodDescriptor,
    RenderDescriptor, TryCatch,
};
use crate::Error;

/// Wraps checked exceptions that methods don't declare into a runtime exception
///
/// Every method with a body (except static initializers) is covered: unchecked exceptions,
/// errors, and the exceptions the method declares propagate unchanged while anything else is
/// thrown as `new Wrapper(cause)`. In constructors only the code after the superclass (or
/// `this(...)`) constructor call is covered.
#[derive(Clone, Debug)]
pub struct UndeclaredThrowableTransformer {
    wrapper: BinaryName,
}

impl UndeclaredThrowableTransformer {
    /// Fails unless `wrapper` has a constructor taking just a `java/lang/Throwable`
    pub fn new(
        graph: &ClassGraph,
        wrapper: BinaryName,
    ) -> Result<UndeclaredThrowableTransformer, Error> {
        let class = graph
            .get(&wrapper)
            .ok_or_else(|| Error::MissingClass(wrapper.clone()))?;
        let takes_cause = |descriptor: &MethodDescriptor| {
            descriptor.parameters == [FieldType::object(BinaryName::THROWABLE)]
        };
        if !class.constructors().any(|c| takes_cause(&c.descriptor)) {
            return Err(Error::InvalidWrapperType(wrapper));
        }
        Ok(UndeclaredThrowableTransformer { wrapper })
    }

    pub fn wrapper(&self) -> &BinaryName {
        &self.wrapper
    }
}

impl ClassTransformer for UndeclaredThrowableTransformer {
    fn transform<'s>(&'s self, target: Box<dyn ClassSink + 's>) -> Box<dyn ClassSink + 's> {
        Box::new(UndeclaredThrowableSink {
            wrapper: &self.wrapper,
            target,
            class: None,
            method: None,
        })
    }
}

/// Protection of the method currently going through the sink
#[derive(Debug)]
enum Protection {
    /// Constructor whose superclass constructor call hasn't been seen yet
    NotStarted {
        /// `new` instructions for the superclass or this class not yet matched by their `<init>`
        pending_news: usize,
    },

    /// Inside the protected region
    Protected(Block),

    /// Handler has been emitted
    Closed,
}

struct MethodState {
    info: MethodInfo,
    protection: Protection,
}

struct UndeclaredThrowableSink<'s> {
    wrapper: &'s BinaryName,
    target: Box<dyn ClassSink + 's>,

    /// Name and superclass of the class going through the sink
    class: Option<(BinaryName, BinaryName)>,

    /// Method being rewritten (`None` when outside a method or when the method isn't covered)
    method: Option<MethodState>,
}

impl<'s> UndeclaredThrowableSink<'s> {
    /// Is the owner of a constructor the class itself or its superclass?
    fn is_own_constructor_owner(&self, owner: &BinaryName) -> bool {
        match &self.class {
            Some((name, superclass)) => owner == name || owner == superclass,
            None => false,
        }
    }

    /// Track `new` and `<init>` in a constructor, opening the protected region right after the
    /// superclass constructor call
    fn observe(&mut self, insn: &Insn) -> Result<(), Error> {
        let pending = match &self.method {
            Some(MethodState {
                protection: Protection::NotStarted { pending_news },
                ..
            }) => *pending_news,
            _ => return Ok(()),
        };

        let pending = match insn {
            Insn::Plain(Instruction::New(class)) if self.is_own_constructor_owner(class) => {
                pending + 1
            }
            Insn::Plain(Instruction::Invoke(InvokeType::Special, method))
                if method.name.is_constructor() && self.is_own_constructor_owner(&method.owner) =>
            {
                if pending == 0 {
                    return self.open_region();
                }
                pending - 1
            }
            _ => pending,
        };

        if let Some(state) = &mut self.method {
            state.protection = Protection::NotStarted {
                pending_news: pending,
            };
        }
        Ok(())
    }

    fn open_region(&mut self) -> Result<(), Error> {
        if let Some(state) = &mut self.method {
            let block = CodeEmitter::attach(&mut *self.target, state.info.clone()).begin_block()?;
            log::trace!("Protecting {} from {:?}", state.info.name, block.start());
            state.protection = Protection::Protected(block);
        }
        Ok(())
    }

    fn close_region(&mut self) -> Result<(), Error> {
        let state = match &mut self.method {
            Some(state) => state,
            None => return Ok(()),
        };
        match std::mem::replace(&mut state.protection, Protection::Closed) {
            Protection::Protected(mut block) => {
                let mut e = CodeEmitter::attach(&mut *self.target, state.info.clone());
                e.wrap_undeclared_throwable(&mut block, &state.info.exceptions, self.wrapper)?;
            }
            Protection::NotStarted { .. } => {
                log::debug!(
                    "Constructor {}{} never calls a superclass constructor, leaving it unprotected",
                    state.info.name,
                    state.info.descriptor.render()
                );
            }
            Protection::Closed => (),
        }
        Ok(())
    }
}

impl<'s> ClassSink for UndeclaredThrowableSink<'s> {
    fn begin_class(&mut self, header: ClassHeader) -> Result<(), Error> {
        self.class = Some((header.name.clone(), header.superclass.clone()));
        self.target.begin_class(header)
    }

    fn declare_field(&mut self, field: FieldDecl) -> Result<(), Error> {
        self.target.declare_field(field)
    }

    fn begin_method(&mut self, method: &MethodInfo) -> Result<(), Error> {
        self.target.begin_method(method)?;
        self.method = None;
        if method.is_abstract() || method.is_static_initializer() {
            return Ok(());
        }

        self.method = Some(MethodState {
            info: method.clone(),
            protection: Protection::NotStarted { pending_news: 0 },
        });
        if !method.is_constructor() {
            self.open_region()?;
        }
        Ok(())
    }

    fn new_label(&mut self) -> Label {
        self.target.new_label()
    }

    fn visit_instruction(&mut self, insn: Insn) -> Result<(), Error> {
        let observed = self.method.is_some().then(|| insn.clone());
        self.target.visit_instruction(insn)?;
        match observed {
            Some(insn) => self.observe(&insn),
            None => Ok(()),
        }
    }

    fn visit_try_catch(&mut self, try_catch: TryCatch) -> Result<(), Error> {
        self.target.visit_try_catch(try_catch)
    }

    fn end_method(&mut self) -> Result<(), Error> {
        self.close_region()?;
        self.method = None;
        self.target.end_method()
    }

    fn end_class(&mut self) -> Result<(), Error> {
        self.target.end_class()
    }
}
