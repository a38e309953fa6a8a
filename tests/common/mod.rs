//! Tiny interpreter for generated classes
//!
//! Covers exactly the instructions generators emit, and stands in for the runtime library with
//! natives registered by the tests. Class files are never loaded: classes are run straight from
//! their symbolic `GeneratedClass` form.

#![allow(dead_code)]

use jvmproxy::emit::{GeneratedClass, GeneratedMethod};
use jvmproxy::jvm::{
    BaseType, BinaryName, BranchInstruction, ClassData, ClassGraph, ConstantData, EqComparison,
    FieldType, Insn, Instruction, InvokeType, Label, MethodDescriptor, MethodRef, Name,
    OrdComparison, ParseDescriptor, RefType, UnqualifiedName,
};
use std::collections::HashMap;
use std::rc::Rc;

pub fn class_name(name: &str) -> BinaryName {
    BinaryName::from_string(name.to_owned()).unwrap()
}

pub fn method_name(name: &str) -> UnqualifiedName {
    UnqualifiedName::from_string(name.to_owned()).unwrap()
}

pub fn descriptor(descriptor: &str) -> MethodDescriptor {
    MethodDescriptor::parse(descriptor).unwrap()
}

pub fn field_type(descriptor: &str) -> FieldType {
    FieldType::parse(descriptor).unwrap()
}

pub const CLASS_CAST_EXCEPTION: &str = "java/lang/ClassCastException";
pub const NULL_POINTER_EXCEPTION: &str = "java/lang/NullPointerException";

/// Operand stack or local variable slot
///
/// `long` and `double` values are followed by a `Top` filler, so that `dup2` and friends work on
/// slots the way the real machine does.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Value {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Null,
    Ref(usize),
    Top,
}

impl Value {
    fn is_wide(&self) -> bool {
        matches!(self, Value::Long(_) | Value::Double(_))
    }

    fn zero(typ: &FieldType) -> Value {
        match typ {
            FieldType::Base(BaseType::Long) => Value::Long(0),
            FieldType::Base(BaseType::Float) => Value::Float(0.0),
            FieldType::Base(BaseType::Double) => Value::Double(0.0),
            FieldType::Base(_) => Value::Int(0),
            FieldType::Ref(_) => Value::Null,
        }
    }

    fn as_f64(&self) -> f64 {
        match *self {
            Value::Int(i) => i as f64,
            Value::Long(l) => l as f64,
            Value::Float(f) => f as f64,
            Value::Double(d) => d,
            other => panic!("{:?} is not numeric", other),
        }
    }

    fn as_i64(&self) -> i64 {
        match *self {
            Value::Int(i) => i as i64,
            Value::Long(l) => l,
            Value::Float(f) => f as i64,
            Value::Double(d) => d as i64,
            other => panic!("{:?} is not numeric", other),
        }
    }
}

#[derive(Clone, Debug)]
pub enum Object {
    Instance {
        class: BinaryName,
        fields: HashMap<String, Value>,
    },
    Str(String),
    Boxed(BaseType, Value),
    Array {
        element: FieldType,
        items: Vec<Value>,
    },

    /// `java/lang/Class`
    ClassToken(FieldType),

    /// `java/lang/reflect/Method`
    Method {
        owner: FieldType,
        name: String,
        parameters: Vec<FieldType>,
    },
}

/// Native method: gets the receiver (if any) followed by the arguments
pub type Native = Rc<dyn Fn(&mut Vm, &[Value]) -> Result<Option<Value>, Value>>;

enum Flow {
    Next,
    Jump(Label),
    Return(Option<Value>),
}

pub struct Vm {
    graph: ClassGraph,
    classes: HashMap<BinaryName, GeneratedClass>,
    heap: Vec<Object>,
    statics: HashMap<(BinaryName, String), Value>,
    natives: HashMap<(BinaryName, String), Native>,
}

impl Vm {
    pub fn new(mut graph: ClassGraph) -> Vm {
        for exception in [CLASS_CAST_EXCEPTION, NULL_POINTER_EXCEPTION] {
            graph.insert(ClassData::new_class(
                class_name(exception),
                BinaryName::RUNTIMEEXCEPTION,
            ));
        }
        Vm {
            graph,
            classes: HashMap::new(),
            heap: vec![],
            statics: HashMap::new(),
            natives: HashMap::new(),
        }
    }

    /// Define a generated class, running its static initializer
    pub fn load(&mut self, class: GeneratedClass) -> Result<(), Value> {
        let name = class.header.name.clone();
        let mut data = ClassData::new_class(name.clone(), class.header.superclass.clone());
        data.interfaces = class.header.interfaces.clone();
        self.graph.insert(data);
        self.classes.insert(name.clone(), class);

        if let Some(clinit) = self.generated_method(&name, "<clinit>", &MethodDescriptor::VOID) {
            self.run(clinit, vec![])?;
        }
        Ok(())
    }

    pub fn native(
        &mut self,
        class: &str,
        method: &str,
        native: impl Fn(&mut Vm, &[Value]) -> Result<Option<Value>, Value> + 'static,
    ) {
        self.natives
            .insert((class_name(class), method.to_owned()), Rc::new(native));
    }

    /// Register a getter and/or setter backed by a field of the same name as the property
    pub fn property(
        &mut self,
        class: &str,
        property: &'static str,
        getter: Option<&str>,
        setter: Option<&str>,
    ) {
        if let Some(getter) = getter {
            self.native(class, getter, move |vm, args| {
                Ok(Some(vm.get_field(args[0], property)))
            });
        }
        if let Some(setter) = setter {
            self.native(class, setter, move |vm, args| {
                vm.set_field(args[0], property, args[1]);
                Ok(None)
            });
        }
    }

    fn alloc(&mut self, object: Object) -> Value {
        self.heap.push(object);
        Value::Ref(self.heap.len() - 1)
    }

    /// New instance, without running any constructor
    pub fn new_object(&mut self, class: &str) -> Value {
        self.alloc(Object::Instance {
            class: class_name(class),
            fields: HashMap::new(),
        })
    }

    /// New instance, initialized by the constructor with the given descriptor
    pub fn construct(
        &mut self,
        class: &str,
        constructor: &str,
        args: &[Value],
    ) -> Result<Value, Value> {
        let object = self.new_object(class);
        let method = MethodRef::new(
            class_name(class),
            UnqualifiedName::INIT,
            descriptor(constructor),
            false,
        );
        let mut all_args = vec![object];
        all_args.extend_from_slice(args);
        self.invoke(InvokeType::Special, &method, all_args)?;
        Ok(object)
    }

    pub fn string(&mut self, string: &str) -> Value {
        self.alloc(Object::Str(string.to_owned()))
    }

    pub fn boxed(&mut self, base: BaseType, value: Value) -> Value {
        self.alloc(Object::Boxed(base, value))
    }

    pub fn array(&mut self, element: FieldType, items: Vec<Value>) -> Value {
        self.alloc(Object::Array { element, items })
    }

    /// Throwable instance, without a cause
    pub fn exception(&mut self, class: &str) -> Value {
        self.new_object(class)
    }

    pub fn object(&self, value: Value) -> &Object {
        match value {
            Value::Ref(r) => &self.heap[r],
            other => panic!("{:?} is not a reference", other),
        }
    }

    pub fn class_of(&self, value: Value) -> String {
        match self.object(value) {
            Object::Instance { class, .. } => class.as_str().to_owned(),
            Object::Str(_) => String::from("java/lang/String"),
            Object::Boxed(base, _) => base.boxed_class().as_str().to_owned(),
            Object::Array { .. } => String::from("[array"),
            Object::ClassToken(_) => String::from("java/lang/Class"),
            Object::Method { .. } => String::from("java/lang/reflect/Method"),
        }
    }

    pub fn string_value(&self, value: Value) -> String {
        match self.object(value) {
            Object::Str(string) => string.clone(),
            other => panic!("{:?} is not a string", other),
        }
    }

    pub fn unboxed(&self, value: Value) -> Value {
        match self.object(value) {
            Object::Boxed(_, inner) => *inner,
            other => panic!("{:?} is not a box", other),
        }
    }

    pub fn array_items(&self, value: Value) -> Vec<Value> {
        match self.object(value) {
            Object::Array { items, .. } => items.clone(),
            other => panic!("{:?} is not an array", other),
        }
    }

    pub fn get_field(&self, object: Value, name: &str) -> Value {
        match self.object(object) {
            Object::Instance { fields, .. } => fields.get(name).copied().unwrap_or(Value::Null),
            other => panic!("{:?} has no fields", other),
        }
    }

    pub fn set_field(&mut self, object: Value, name: &str, value: Value) {
        match object {
            Value::Ref(r) => match &mut self.heap[r] {
                Object::Instance { fields, .. } => {
                    fields.insert(name.to_owned(), value);
                }
                other => panic!("{:?} has no fields", other),
            },
            other => panic!("{:?} is not a reference", other),
        }
    }

    pub fn get_static(&self, class: &str, name: &str) -> Value {
        self.statics
            .get(&(class_name(class), name.to_owned()))
            .copied()
            .unwrap_or(Value::Null)
    }

    /// Virtual call of a method on an object
    pub fn call(
        &mut self,
        receiver: Value,
        name: &str,
        method_descriptor: &str,
        args: &[Value],
    ) -> Result<Option<Value>, Value> {
        let owner = class_name(&self.class_of(receiver));
        let method = MethodRef::new(owner, method_name(name), descriptor(method_descriptor), false);
        let mut all_args = vec![receiver];
        all_args.extend_from_slice(args);
        self.invoke(InvokeType::Virtual, &method, all_args)
    }

    fn runtime_type(&self, value: Value) -> RefType {
        match self.object(value) {
            Object::Instance { class, .. } => RefType::Object(class.clone()),
            Object::Str(_) => RefType::Object(BinaryName::STRING),
            Object::Boxed(base, _) => RefType::Object(base.boxed_class()),
            Object::Array { element, .. } => RefType::array(element.clone()),
            Object::ClassToken(_) => RefType::Object(BinaryName::CLASS),
            Object::Method { .. } => RefType::Object(BinaryName::METHOD),
        }
    }

    pub fn is_instance(&self, value: Value, typ: &RefType) -> bool {
        match value {
            Value::Null => false,
            _ => self.graph.is_java_assignable(&self.runtime_type(value), typ),
        }
    }

    fn superclass_of(&self, class: &BinaryName) -> Option<BinaryName> {
        match self.classes.get(class) {
            Some(generated) => Some(generated.header.superclass.clone()),
            None => self.graph.get(class).and_then(|data| data.superclass.clone()),
        }
    }

    fn generated_method(
        &self,
        class: &BinaryName,
        name: &str,
        method_descriptor: &MethodDescriptor,
    ) -> Option<GeneratedMethod> {
        self.classes.get(class)?.methods.iter().find_map(|method| {
            let matches = method.info.name.as_str() == name
                && &method.info.descriptor == method_descriptor
                && method.code.is_some();
            matches.then(|| method.clone())
        })
    }

    fn invoke(
        &mut self,
        kind: InvokeType,
        method: &MethodRef,
        args: Vec<Value>,
    ) -> Result<Option<Value>, Value> {
        let name = method.name.as_str();
        match kind {
            InvokeType::Static => {
                if let Some(native) = self.natives.get(&(method.owner.clone(), name.to_owned())) {
                    let native = native.clone();
                    return native(self, &args);
                }
                if name == "valueOf" {
                    if let Some(FieldType::Base(base)) = method.descriptor.parameters.first() {
                        return Ok(Some(self.boxed(*base, args[0])));
                    }
                }
                let body = self
                    .generated_method(&method.owner, name, &method.descriptor)
                    .unwrap_or_else(|| panic!("no static method {}.{}", method.owner, name));
                self.run(body, args)
            }

            InvokeType::Special => {
                if args[0] == Value::Null {
                    return Err(self.exception(NULL_POINTER_EXCEPTION));
                }
                if let Some(body) = self.generated_method(&method.owner, name, &method.descriptor)
                {
                    return self.run(body, args);
                }
                if let Some(native) = self.natives.get(&(method.owner.clone(), name.to_owned())) {
                    let native = native.clone();
                    return native(self, &args);
                }
                if method.name.is_constructor() {
                    if method.descriptor.parameters == [FieldType::object(BinaryName::THROWABLE)] {
                        self.set_field(args[0], "cause", args[1]);
                    }
                    return Ok(None);
                }
                self.invoke_virtual(method.owner.clone(), method, args)
            }

            InvokeType::Virtual | InvokeType::Interface => {
                if args[0] == Value::Null {
                    return Err(self.exception(NULL_POINTER_EXCEPTION));
                }
                match self.object(args[0]).clone() {
                    Object::Instance { class, .. } => self.invoke_virtual(class, method, args),
                    other => Ok(self.builtin(method, other, &args)),
                }
            }
        }
    }

    fn invoke_virtual(
        &mut self,
        class: BinaryName,
        method: &MethodRef,
        args: Vec<Value>,
    ) -> Result<Option<Value>, Value> {
        let name = method.name.as_str();
        let mut current = Some(class.clone());
        while let Some(owner) = current {
            if let Some(body) = self.generated_method(&owner, name, &method.descriptor) {
                return self.run(body, args);
            }
            if let Some(native) = self.natives.get(&(owner.clone(), name.to_owned())) {
                let native = native.clone();
                return native(self, &args);
            }
            current = self.superclass_of(&owner);
        }
        if let Some(native) = self.natives.get(&(method.owner.clone(), name.to_owned())) {
            let native = native.clone();
            return native(self, &args);
        }
        panic!("{} has no implementation of {}.{}", class, method.owner, name)
    }

    /// Methods of the library types that aren't plain instances
    fn builtin(&mut self, method: &MethodRef, receiver: Object, args: &[Value]) -> Option<Value> {
        match (receiver, method.name.as_str()) {
            (Object::Boxed(_, value), name) if name.ends_with("Value") => {
                let converted = match &method.descriptor.return_type {
                    Some(FieldType::Base(BaseType::Long)) => Value::Long(value.as_i64()),
                    Some(FieldType::Base(BaseType::Float)) => Value::Float(value.as_f64() as f32),
                    Some(FieldType::Base(BaseType::Double)) => Value::Double(value.as_f64()),
                    Some(FieldType::Base(BaseType::Byte)) => {
                        Value::Int(value.as_i64() as i8 as i32)
                    }
                    Some(FieldType::Base(BaseType::Short)) => {
                        Value::Int(value.as_i64() as i16 as i32)
                    }
                    Some(FieldType::Base(_)) => Value::Int(value.as_i64() as i32),
                    other => panic!("unboxing into {:?}", other),
                };
                Some(converted)
            }
            (Object::ClassToken(owner), "getDeclaredMethod") => {
                let name = self.string_value(args[1]);
                let parameters: Vec<FieldType> = self
                    .array_items(args[2])
                    .into_iter()
                    .map(|token| match self.object(token) {
                        Object::ClassToken(typ) => typ.clone(),
                        other => panic!("{:?} is not a class", other),
                    })
                    .collect();
                Some(self.alloc(Object::Method {
                    owner,
                    name,
                    parameters,
                }))
            }
            (receiver, name) => panic!("no builtin {} on {:?}", name, receiver),
        }
    }

    fn handler_for(
        &self,
        method: &GeneratedMethod,
        labels: &HashMap<Label, usize>,
        position: usize,
        exception: Value,
    ) -> Option<usize> {
        let code = method.code.as_ref()?;
        code.try_catches.iter().find_map(|try_catch| {
            let covered = labels[&try_catch.start] <= position && position < labels[&try_catch.end];
            let caught = match &try_catch.catch_type {
                None => true,
                Some(class) => self.is_instance(exception, &RefType::Object(class.clone())),
            };
            (covered && caught).then(|| labels[&try_catch.handler])
        })
    }

    /// Interpret a method body
    ///
    /// `args` has one entry per argument (the receiver first, for instance methods).
    pub fn run(
        &mut self,
        method: GeneratedMethod,
        args: Vec<Value>,
    ) -> Result<Option<Value>, Value> {
        let code = method.code.as_ref().expect("method has no body");
        let labels = code.label_positions().expect("duplicate labels");

        let mut locals = vec![Value::Top; code.max_locals().max(code.argument_slots)];
        let mut slot = 0;
        for arg in args {
            locals[slot] = arg;
            slot += if arg.is_wide() { 2 } else { 1 };
        }

        let mut stack: Vec<Value> = vec![];
        let mut pc = 0;
        let mut steps = 0;
        loop {
            steps += 1;
            assert!(steps < 100_000, "runaway method {}", method.info.name);

            let position = pc;
            pc += 1;
            let flow = match &code.instructions[position] {
                Insn::Label(_) => Ok(Flow::Next),
                Insn::Plain(insn) => self
                    .step(insn, &mut stack, &mut locals)
                    .map(|()| Flow::Next),
                Insn::Branch(branch) => self.branch(branch, &mut stack),
            };
            match flow {
                Ok(Flow::Next) => (),
                Ok(Flow::Jump(label)) => pc = labels[&label],
                Ok(Flow::Return(value)) => return Ok(value),
                Err(exception) => match self.handler_for(&method, &labels, position, exception) {
                    Some(handler) => {
                        stack.clear();
                        stack.push(exception);
                        pc = handler;
                    }
                    None => return Err(exception),
                },
            }
        }
    }

    fn branch(
        &mut self,
        branch: &BranchInstruction,
        stack: &mut Vec<Value>,
    ) -> Result<Flow, Value> {
        let ord = |comparison: &OrdComparison, a: i32, b: i32| match comparison {
            OrdComparison::EQ => a == b,
            OrdComparison::NE => a != b,
            OrdComparison::LT => a < b,
            OrdComparison::GE => a >= b,
            OrdComparison::GT => a > b,
            OrdComparison::LE => a <= b,
        };
        let jump_if = |condition: bool, label: &Label| {
            if condition {
                Flow::Jump(*label)
            } else {
                Flow::Next
            }
        };

        Ok(match branch {
            BranchInstruction::If(comparison, label) => {
                let value = int(pop(stack));
                jump_if(ord(comparison, value, 0), label)
            }
            BranchInstruction::IfICmp(comparison, label) => {
                let b = int(pop(stack));
                let a = int(pop(stack));
                jump_if(ord(comparison, a, b), label)
            }
            BranchInstruction::IfACmp(comparison, label) => {
                let b = pop(stack);
                let a = pop(stack);
                jump_if((a == b) == (*comparison == EqComparison::EQ), label)
            }
            BranchInstruction::IfNull(comparison, label) => {
                let value = pop(stack);
                jump_if(
                    (value == Value::Null) == (*comparison == EqComparison::EQ),
                    label,
                )
            }
            BranchInstruction::Goto(label) => Flow::Jump(*label),
            BranchInstruction::Return => Flow::Return(None),
            BranchInstruction::IReturn
            | BranchInstruction::LReturn
            | BranchInstruction::FReturn
            | BranchInstruction::DReturn
            | BranchInstruction::AReturn => Flow::Return(Some(pop(stack))),
            BranchInstruction::AThrow => {
                let exception = pop(stack);
                if exception == Value::Null {
                    return Err(self.exception(NULL_POINTER_EXCEPTION));
                }
                return Err(exception);
            }
        })
    }

    fn step(
        &mut self,
        insn: &Instruction,
        stack: &mut Vec<Value>,
        locals: &mut Vec<Value>,
    ) -> Result<(), Value> {
        match insn {
            Instruction::Nop => (),
            Instruction::AConstNull => push(stack, Value::Null),
            Instruction::IConstM1 => push(stack, Value::Int(-1)),
            Instruction::IConst0 => push(stack, Value::Int(0)),
            Instruction::IConst1 => push(stack, Value::Int(1)),
            Instruction::IConst2 => push(stack, Value::Int(2)),
            Instruction::IConst3 => push(stack, Value::Int(3)),
            Instruction::IConst4 => push(stack, Value::Int(4)),
            Instruction::IConst5 => push(stack, Value::Int(5)),
            Instruction::LConst0 => push(stack, Value::Long(0)),
            Instruction::LConst1 => push(stack, Value::Long(1)),
            Instruction::FConst0 => push(stack, Value::Float(0.0)),
            Instruction::FConst1 => push(stack, Value::Float(1.0)),
            Instruction::FConst2 => push(stack, Value::Float(2.0)),
            Instruction::DConst0 => push(stack, Value::Double(0.0)),
            Instruction::DConst1 => push(stack, Value::Double(1.0)),
            Instruction::BiPush(b) => push(stack, Value::Int(*b as i32)),
            Instruction::SiPush(s) => push(stack, Value::Int(*s as i32)),
            Instruction::Ldc(constant) => {
                let value = match constant {
                    ConstantData::Integer(i) => Value::Int(*i),
                    ConstantData::Float(f) => Value::Float(*f),
                    ConstantData::Long(l) => Value::Long(*l),
                    ConstantData::Double(d) => Value::Double(*d),
                    ConstantData::String(s) => self.string(s),
                    ConstantData::Class(typ) => {
                        self.alloc(Object::ClassToken(FieldType::Ref(typ.clone())))
                    }
                };
                push(stack, value);
            }
            Instruction::ILoad(i)
            | Instruction::LLoad(i)
            | Instruction::FLoad(i)
            | Instruction::DLoad(i)
            | Instruction::ALoad(i) => push(stack, locals[*i as usize]),
            Instruction::IStore(i)
            | Instruction::LStore(i)
            | Instruction::FStore(i)
            | Instruction::DStore(i)
            | Instruction::AStore(i) => {
                let value = pop(stack);
                locals[*i as usize] = value;
                if value.is_wide() {
                    locals[*i as usize + 1] = Value::Top;
                }
            }
            Instruction::AALoad => {
                let index = int(pop(stack)) as usize;
                let array = pop(stack);
                let items = self.array_items(array);
                push(stack, items[index]);
            }
            Instruction::AAStore => {
                let value = pop(stack);
                let index = int(pop(stack)) as usize;
                match pop(stack) {
                    Value::Ref(r) => match &mut self.heap[r] {
                        Object::Array { items, .. } => items[index] = value,
                        other => panic!("{:?} is not an array", other),
                    },
                    other => panic!("{:?} is not an array", other),
                }
            }
            Instruction::ArrayLength => {
                let array = pop(stack);
                let length = self.array_items(array).len();
                push(stack, Value::Int(length as i32));
            }
            Instruction::Pop => {
                raw_pop(stack);
            }
            Instruction::Pop2 => {
                raw_pop(stack);
                raw_pop(stack);
            }
            Instruction::Dup => {
                let v1 = raw_pop(stack);
                stack.extend([v1, v1]);
            }
            Instruction::DupX1 => {
                let v1 = raw_pop(stack);
                let v2 = raw_pop(stack);
                stack.extend([v1, v2, v1]);
            }
            Instruction::DupX2 => {
                let v1 = raw_pop(stack);
                let v2 = raw_pop(stack);
                let v3 = raw_pop(stack);
                stack.extend([v1, v3, v2, v1]);
            }
            Instruction::Dup2 => {
                let v1 = raw_pop(stack);
                let v2 = raw_pop(stack);
                stack.extend([v2, v1, v2, v1]);
            }
            Instruction::Dup2X1 => {
                let v1 = raw_pop(stack);
                let v2 = raw_pop(stack);
                let v3 = raw_pop(stack);
                stack.extend([v2, v1, v3, v2, v1]);
            }
            Instruction::Dup2X2 => {
                let v1 = raw_pop(stack);
                let v2 = raw_pop(stack);
                let v3 = raw_pop(stack);
                let v4 = raw_pop(stack);
                stack.extend([v2, v1, v4, v3, v2, v1]);
            }
            Instruction::Swap => {
                let v1 = raw_pop(stack);
                let v2 = raw_pop(stack);
                stack.extend([v1, v2]);
            }
            Instruction::GetStatic(field) => {
                let primitive_type = ALL_BASE_TYPES
                    .iter()
                    .find(|base| base.boxed_class() == field.owner);
                let value = match primitive_type {
                    Some(base) if field.name.as_str() == "TYPE" => {
                        self.alloc(Object::ClassToken(FieldType::Base(*base)))
                    }
                    _ => self
                        .statics
                        .get(&(field.owner.clone(), field.name.as_str().to_owned()))
                        .copied()
                        .unwrap_or_else(|| Value::zero(&field.descriptor)),
                };
                push(stack, value);
            }
            Instruction::PutStatic(field) => {
                let value = pop(stack);
                self.statics
                    .insert((field.owner.clone(), field.name.as_str().to_owned()), value);
            }
            Instruction::GetField(field) => {
                let object = pop(stack);
                if object == Value::Null {
                    return Err(self.exception(NULL_POINTER_EXCEPTION));
                }
                let value = match self.object(object) {
                    Object::Instance { fields, .. } => fields.get(field.name.as_str()).copied(),
                    other => panic!("{:?} has no fields", other),
                };
                push(stack, value.unwrap_or_else(|| Value::zero(&field.descriptor)));
            }
            Instruction::PutField(field) => {
                let value = pop(stack);
                let object = pop(stack);
                if object == Value::Null {
                    return Err(self.exception(NULL_POINTER_EXCEPTION));
                }
                self.set_field(object, field.name.as_str(), value);
            }
            Instruction::Invoke(kind, method) => {
                let mut args: Vec<Value> = method
                    .descriptor
                    .parameters
                    .iter()
                    .map(|_| pop(stack))
                    .collect();
                if *kind != InvokeType::Static {
                    args.push(pop(stack));
                }
                args.reverse();
                if let Some(value) = self.invoke(*kind, method, args)? {
                    push(stack, value);
                }
            }
            Instruction::New(class) => {
                let object = self.new_object(class.as_str());
                push(stack, object);
            }
            Instruction::ANewArray(element) => {
                let length = int(pop(stack));
                let array = self.array(
                    FieldType::Ref(element.clone()),
                    vec![Value::Null; length as usize],
                );
                push(stack, array);
            }
            Instruction::CheckCast(typ) => {
                let value = *stack.last().expect("empty stack");
                if value != Value::Null && !self.is_instance(value, typ) {
                    return Err(self.exception(CLASS_CAST_EXCEPTION));
                }
            }
            Instruction::InstanceOf(typ) => {
                let value = pop(stack);
                push(stack, Value::Int(self.is_instance(value, typ) as i32));
            }
        }
        Ok(())
    }
}

const ALL_BASE_TYPES: [BaseType; 8] = [
    BaseType::Byte,
    BaseType::Char,
    BaseType::Double,
    BaseType::Float,
    BaseType::Int,
    BaseType::Long,
    BaseType::Short,
    BaseType::Boolean,
];

fn push(stack: &mut Vec<Value>, value: Value) {
    stack.push(value);
    if value.is_wide() {
        stack.push(Value::Top);
    }
}

fn pop(stack: &mut Vec<Value>) -> Value {
    match raw_pop(stack) {
        Value::Top => raw_pop(stack),
        value => value,
    }
}

fn raw_pop(stack: &mut Vec<Value>) -> Value {
    stack.pop().expect("operand stack underflow")
}

fn int(value: Value) -> i32 {
    match value {
        Value::Int(i) => i,
        other => panic!("{:?} is not an int", other),
    }
}
