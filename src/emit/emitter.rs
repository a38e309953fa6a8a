use super::{ClassSink, MethodInfo};
use crate::jvm::{BranchInstruction, FieldType, Insn, Instruction, Label, TryCatch, Width};
use crate::Error;

/// Abstract instruction emission
///
/// This is the minimal surface that `EmitterExts` builds its composite helpers on.
pub trait InstructionEmitter {
    /// Push a new non-branching instruction
    fn push_instruction(&mut self, insn: Instruction) -> Result<(), Error>;

    /// Push a new branch instruction
    fn push_branch_instruction(&mut self, insn: BranchInstruction) -> Result<(), Error>;

    /// Generate a fresh label
    fn fresh_label(&mut self) -> Label;

    /// Mark the current position with a label
    fn place_label(&mut self, label: Label) -> Result<(), Error>;

    /// Register an exception table entry
    fn push_try_catch(&mut self, try_catch: TryCatch) -> Result<(), Error>;

    /// Method whose body is being emitted
    fn method(&self) -> &MethodInfo;
}

/// Local variable allocated by `CodeEmitter::make_local`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Local {
    pub index: u16,
    pub field_type: FieldType,
}

/// Cursor for emitting the body of one method into a sink
///
/// Created by `begin` (which opens the method on the sink) and consumed by `end` (which closes
/// it). Arguments are addressed by their position in the descriptor (see `EmitterExts::load_arg`)
/// so callers never compute local variable slots by hand.
pub struct CodeEmitter<'s> {
    sink: &'s mut dyn ClassSink,
    method: MethodInfo,

    /// First slot not used by arguments or locals
    next_local: usize,
}

impl<'s> CodeEmitter<'s> {
    /// Start emitting a method
    pub fn begin(
        sink: &'s mut dyn ClassSink,
        method: MethodInfo,
    ) -> Result<CodeEmitter<'s>, Error> {
        sink.begin_method(&method)?;
        Ok(CodeEmitter::attach(sink, method))
    }

    /// Emit more code into a method that is already open on the sink
    ///
    /// This is how sinks that rewrite methods (eg. transformers) append their own code. No
    /// `begin_method` event is sent, and the emitter should be dropped rather than `end`ed unless
    /// the method is really meant to be closed.
    pub fn attach(sink: &'s mut dyn ClassSink, method: MethodInfo) -> CodeEmitter<'s> {
        let next_local = method.descriptor.parameter_length(!method.is_static());
        CodeEmitter {
            sink,
            method,
            next_local,
        }
    }

    /// Finish the method
    pub fn end(self) -> Result<(), Error> {
        self.sink.end_method()
    }

    /// Reserve a fresh local variable
    pub fn make_local(&mut self, field_type: FieldType) -> Local {
        let index = self.next_local as u16;
        self.next_local += field_type.width();
        Local { index, field_type }
    }

    pub fn load_local(&mut self, local: &Local) -> Result<(), Error> {
        self.push_instruction(Instruction::load(&local.field_type, local.index))
    }

    pub fn store_local(&mut self, local: &Local) -> Result<(), Error> {
        self.push_instruction(Instruction::store(&local.field_type, local.index))
    }
}

impl<'s> InstructionEmitter for CodeEmitter<'s> {
    fn push_instruction(&mut self, insn: Instruction) -> Result<(), Error> {
        self.sink.visit_instruction(Insn::Plain(insn))
    }

    fn push_branch_instruction(&mut self, insn: BranchInstruction) -> Result<(), Error> {
        self.sink.visit_instruction(Insn::Branch(insn))
    }

    fn fresh_label(&mut self) -> Label {
        self.sink.new_label()
    }

    fn place_label(&mut self, label: Label) -> Result<(), Error> {
        self.sink.visit_instruction(Insn::Label(label))
    }

    fn push_try_catch(&mut self, try_catch: TryCatch) -> Result<(), Error> {
        self.sink.visit_try_catch(try_catch)
    }

    fn method(&self) -> &MethodInfo {
        &self.method
    }
}
