use super::{ClassSink, CodeEmitter, InstructionEmitter, MethodInfo};
use crate::jvm::{
    BaseType, BinaryName, BranchInstruction, ConstantData, FieldRef, FieldType, Instruction,
    InvokeType, Label, MethodAccessFlags, MethodDescriptor, MethodRef, Name, OrdComparison,
    RefType, TryCatch, UnqualifiedName, Width,
};
use crate::Error;

/// Protected region of code, opened with `EmitterExts::begin_block`
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Block {
    start: Label,
    end: Option<Label>,
}

impl Block {
    pub fn start(&self) -> Label {
        self.start
    }

    pub fn end(&self) -> Option<Label> {
        self.end
    }
}

/// Composite emission helpers shared by all of the generators
pub trait EmitterExts: InstructionEmitter {
    /// Push `this`
    fn load_this(&mut self) -> Result<(), Error> {
        self.push_instruction(Instruction::ALoad(0))
    }

    /// Push one argument, addressed by its position in the method descriptor
    fn load_arg(&mut self, index: usize) -> Result<(), Error> {
        let method = self.method();
        let mut slot = if method.is_static() { 0 } else { 1 };
        for parameter in &method.descriptor.parameters[..index] {
            slot += parameter.width();
        }
        let insn = Instruction::load(&method.descriptor.parameters[index], slot as u16);
        self.push_instruction(insn)
    }

    /// Push all arguments, in order
    fn load_args(&mut self) -> Result<(), Error> {
        for index in 0..self.method().descriptor.parameters.len() {
            self.load_arg(index)?;
        }
        Ok(())
    }

    fn push_int(&mut self, integer: i32) -> Result<(), Error> {
        self.push_instruction(Instruction::push_int(integer))
    }

    fn push_string(&mut self, string: &str) -> Result<(), Error> {
        self.push_instruction(Instruction::Ldc(ConstantData::String(string.to_owned())))
    }

    fn aconst_null(&mut self) -> Result<(), Error> {
        self.push_instruction(Instruction::AConstNull)
    }

    fn pop(&mut self, field_type: &FieldType) -> Result<(), Error> {
        match field_type.width() {
            2 => self.push_instruction(Instruction::Pop2),
            _ => self.push_instruction(Instruction::Pop),
        }
    }

    /// Push the zero value of a primitive type, or `null` for a reference type
    fn zero_or_null(&mut self, field_type: &FieldType) -> Result<(), Error> {
        let insn = match field_type {
            FieldType::Base(BaseType::Long) => Instruction::LConst0,
            FieldType::Base(BaseType::Float) => Instruction::FConst0,
            FieldType::Base(BaseType::Double) => Instruction::DConst0,
            FieldType::Base(_) => Instruction::IConst0,
            FieldType::Ref(_) => Instruction::AConstNull,
        };
        self.push_instruction(insn)
    }

    fn new_instance(&mut self, class: &BinaryName) -> Result<(), Error> {
        self.push_instruction(Instruction::New(class.clone()))
    }

    /// Cast the top of the stack (casts to `java/lang/Object` are skipped)
    fn checkcast(&mut self, ref_type: &RefType) -> Result<(), Error> {
        if let RefType::Object(name) = ref_type {
            if name == &BinaryName::OBJECT {
                return Ok(());
            }
        }
        self.push_instruction(Instruction::CheckCast(ref_type.clone()))
    }

    fn get_field(&mut self, field: FieldRef) -> Result<(), Error> {
        self.push_instruction(Instruction::GetField(field))
    }

    fn put_field(&mut self, field: FieldRef) -> Result<(), Error> {
        self.push_instruction(Instruction::PutField(field))
    }

    fn get_static(&mut self, field: FieldRef) -> Result<(), Error> {
        self.push_instruction(Instruction::GetStatic(field))
    }

    fn put_static(&mut self, field: FieldRef) -> Result<(), Error> {
        self.push_instruction(Instruction::PutStatic(field))
    }

    /// Call a method, picking the invoke instruction from how the method is declared
    fn invoke(&mut self, method: &MethodInfo) -> Result<(), Error> {
        let typ = if method.is_static() {
            InvokeType::Static
        } else if method.is_constructor() {
            InvokeType::Special
        } else if method.owner_is_interface {
            InvokeType::Interface
        } else {
            InvokeType::Virtual
        };
        let method_ref = MethodRef::new(
            method.owner.clone(),
            method.name.clone(),
            method.descriptor.clone(),
            method.owner_is_interface,
        );
        self.push_instruction(Instruction::Invoke(typ, method_ref))
    }

    fn invoke_virtual(
        &mut self,
        owner: &BinaryName,
        name: UnqualifiedName,
        descriptor: MethodDescriptor,
    ) -> Result<(), Error> {
        let method_ref = MethodRef::new(owner.clone(), name, descriptor, false);
        self.push_instruction(Instruction::Invoke(InvokeType::Virtual, method_ref))
    }

    fn invoke_interface(
        &mut self,
        owner: &BinaryName,
        name: UnqualifiedName,
        descriptor: MethodDescriptor,
    ) -> Result<(), Error> {
        let method_ref = MethodRef::new(owner.clone(), name, descriptor, true);
        self.push_instruction(Instruction::Invoke(InvokeType::Interface, method_ref))
    }

    fn invoke_static(
        &mut self,
        owner: &BinaryName,
        name: UnqualifiedName,
        descriptor: MethodDescriptor,
    ) -> Result<(), Error> {
        let method_ref = MethodRef::new(owner.clone(), name, descriptor, false);
        self.push_instruction(Instruction::Invoke(InvokeType::Static, method_ref))
    }

    /// Call a constructor on the uninitialized object on the stack
    fn invoke_constructor(
        &mut self,
        owner: &BinaryName,
        descriptor: MethodDescriptor,
    ) -> Result<(), Error> {
        let method_ref = MethodRef::new(owner.clone(), UnqualifiedName::INIT, descriptor, false);
        self.push_instruction(Instruction::Invoke(InvokeType::Special, method_ref))
    }

    /// Push the `java/lang/Class` token for a type
    ///
    /// Primitive types don't have a class literal, so their token is read from the `TYPE` field
    /// of the matching box class.
    fn load_class(&mut self, field_type: &FieldType) -> Result<(), Error> {
        match field_type {
            FieldType::Base(base) => self.get_static(FieldRef::new(
                base.boxed_class(),
                UnqualifiedName::TYPE,
                FieldType::object(BinaryName::CLASS),
            )),
            FieldType::Ref(ref_type) => {
                self.push_instruction(Instruction::Ldc(ConstantData::Class(ref_type.clone())))
            }
        }
    }

    /// Push the reflective `java/lang/reflect/Method` for a method
    ///
    /// Looked up with `getDeclaredMethod` on the declaring type, so it works for non-public
    /// methods too.
    fn load_method(&mut self, method: &MethodInfo) -> Result<(), Error> {
        let class = FieldType::object(BinaryName::CLASS);
        let parameters = &method.descriptor.parameters;

        self.load_class(&FieldType::object(method.owner.clone()))?;
        self.push_string(method.name.as_str())?;
        self.push_int(parameters.len() as i32)?;
        self.push_instruction(Instruction::ANewArray(RefType::Object(BinaryName::CLASS)))?;
        for (index, parameter) in parameters.iter().enumerate() {
            self.push_instruction(Instruction::Dup)?;
            self.push_int(index as i32)?;
            self.load_class(parameter)?;
            self.push_instruction(Instruction::AAStore)?;
        }

        let descriptor = MethodDescriptor::new(
            vec![FieldType::object(BinaryName::STRING), FieldType::array(class)],
            Some(FieldType::object(BinaryName::METHOD)),
        );
        self.invoke_virtual(
            &BinaryName::CLASS,
            UnqualifiedName::GETDECLAREDMETHOD,
            descriptor,
        )
    }

    /// Box the primitive on top of the stack (references are left untouched)
    fn box_value(&mut self, field_type: &FieldType) -> Result<(), Error> {
        if let FieldType::Base(base) = field_type {
            let boxed = base.boxed_class();
            let descriptor = MethodDescriptor::new(
                vec![field_type.clone()],
                Some(FieldType::object(boxed.clone())),
            );
            self.invoke_static(&boxed, UnqualifiedName::VALUEOF, descriptor)?;
        }
        Ok(())
    }

    /// Convert the object on top of the stack into the given type
    ///
    /// Primitives are unboxed from their box class (numeric types via `java/lang/Number`), so a
    /// `null` or a value of the wrong type fails at runtime. References are just cast.
    fn unbox(&mut self, field_type: &FieldType) -> Result<(), Error> {
        match field_type {
            FieldType::Base(base) => {
                let unboxing_class = base.unboxing_class();
                self.checkcast(&RefType::Object(unboxing_class.clone()))?;
                let descriptor = MethodDescriptor::new(vec![], Some(field_type.clone()));
                self.invoke_virtual(&unboxing_class, base.unboxing_method(), descriptor)
            }
            FieldType::Ref(ref_type) => self.checkcast(ref_type),
        }
    }

    /// Like `unbox`, but a `null` or a value of the wrong box type becomes the zero value of the
    /// primitive type instead of an exception
    fn unbox_or_zero(&mut self, field_type: &FieldType) -> Result<(), Error> {
        match field_type {
            FieldType::Base(base) => {
                let not_unboxable = self.fresh_label();
                let end = self.fresh_label();
                let unboxing_class = RefType::Object(base.unboxing_class());

                self.push_instruction(Instruction::Dup)?;
                self.push_instruction(Instruction::InstanceOf(unboxing_class))?;
                self.push_branch_instruction(BranchInstruction::If(
                    OrdComparison::EQ,
                    not_unboxable,
                ))?;
                self.unbox(field_type)?;
                self.push_branch_instruction(BranchInstruction::Goto(end))?;
                self.place_label(not_unboxable)?;
                self.push_instruction(Instruction::Pop)?;
                self.zero_or_null(field_type)?;
                self.place_label(end)
            }
            FieldType::Ref(ref_type) => self.checkcast(ref_type),
        }
    }

    /// Allocate an `Object[]` holding every argument (primitives are boxed)
    fn create_arg_array(&mut self) -> Result<(), Error> {
        let parameters = self.method().descriptor.parameters.clone();
        self.push_int(parameters.len() as i32)?;
        self.push_instruction(Instruction::ANewArray(RefType::Object(BinaryName::OBJECT)))?;
        for (index, parameter) in parameters.iter().enumerate() {
            self.push_instruction(Instruction::Dup)?;
            self.push_int(index as i32)?;
            self.load_arg(index)?;
            self.box_value(parameter)?;
            self.push_instruction(Instruction::AAStore)?;
        }
        Ok(())
    }

    /// Return the value on top of the stack (or nothing, for `void` methods)
    fn return_value(&mut self) -> Result<(), Error> {
        let insn = BranchInstruction::return_for(self.method().descriptor.return_type.as_ref());
        self.push_branch_instruction(insn)
    }

    fn athrow(&mut self) -> Result<(), Error> {
        self.push_branch_instruction(BranchInstruction::AThrow)
    }

    /// Open a protected region at the current position
    fn begin_block(&mut self) -> Result<Block, Error> {
        let start = self.fresh_label();
        self.place_label(start)?;
        Ok(Block { start, end: None })
    }

    /// Close a protected region at the current position (no-op if it is already closed)
    fn end_block(&mut self, block: &mut Block) -> Result<(), Error> {
        if block.end.is_none() {
            let end = self.fresh_label();
            self.place_label(end)?;
            block.end = Some(end);
        }
        Ok(())
    }

    /// Route exceptions escaping `block` to an already allocated handler label
    fn add_try_catch(
        &mut self,
        block: &Block,
        handler: Label,
        exception: Option<BinaryName>,
    ) -> Result<(), Error> {
        let end = block
            .end
            .ok_or(Error::UnexpectedEvent("exception handler for an open block"))?;
        self.push_try_catch(TryCatch {
            start: block.start,
            end,
            handler,
            catch_type: exception,
        })
    }

    /// Start a handler at the current position for exceptions escaping `block`
    ///
    /// The block is closed first if it is still open. `None` catches everything.
    fn catch_exception(
        &mut self,
        block: &mut Block,
        exception: Option<BinaryName>,
    ) -> Result<(), Error> {
        self.end_block(block)?;
        let handler = self.fresh_label();
        self.place_label(handler)?;
        self.add_try_catch(block, handler, exception)
    }

    /// Close `block` and append handlers that wrap undeclared exceptions escaping it
    ///
    /// Unchecked exceptions, errors, and the `declared` exception types are rethrown unchanged.
    /// Anything else is passed to the single-`Throwable` constructor of `wrapper` and the wrapper
    /// is thrown instead. If `java/lang/Throwable` is itself declared, nothing can be undeclared
    /// so no handlers are added at all.
    ///
    /// This must be emitted at a point that isn't reachable by falling through.
    fn wrap_undeclared_throwable(
        &mut self,
        block: &mut Block,
        declared: &[BinaryName],
        wrapper: &BinaryName,
    ) -> Result<(), Error> {
        self.end_block(block)?;
        if declared.contains(&BinaryName::THROWABLE) {
            return Ok(());
        }

        let rethrow = self.fresh_label();
        self.place_label(rethrow)?;
        self.athrow()?;

        let propagated = [BinaryName::RUNTIMEEXCEPTION, BinaryName::ERROR];
        for exception in propagated.iter().chain(declared) {
            self.add_try_catch(block, rethrow, Some(exception.clone()))?;
        }

        self.catch_exception(block, Some(BinaryName::THROWABLE))?;
        self.new_instance(wrapper)?;
        self.push_instruction(Instruction::DupX1)?;
        self.push_instruction(Instruction::Swap)?;
        let descriptor =
            MethodDescriptor::new(vec![FieldType::object(BinaryName::THROWABLE)], None);
        self.invoke_constructor(wrapper, descriptor)?;
        self.athrow()
    }
}

impl<E: InstructionEmitter + ?Sized> EmitterExts for E {}

/// Emit a public no-argument constructor that only calls the superclass no-argument constructor
pub fn null_constructor(
    sink: &mut dyn ClassSink,
    class: &BinaryName,
    superclass: &BinaryName,
) -> Result<(), Error> {
    let constructor = MethodInfo::new(
        class.clone(),
        MethodAccessFlags::PUBLIC,
        UnqualifiedName::INIT,
        MethodDescriptor::VOID,
    );
    let mut emitter = CodeEmitter::begin(sink, constructor)?;
    emitter.load_this()?;
    emitter.invoke_constructor(superclass, MethodDescriptor::VOID)?;
    emitter.return_value()?;
    emitter.end()
}
