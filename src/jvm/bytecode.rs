//! Symbolic JVM bytecode, as produced by the generators
//!
//! Unlike the bytes that end up in a `Code` attribute, instructions here refer to classes, fields,
//! methods, and constants by value instead of by constant pool index, and branches refer to
//! `Label`s instead of offsets. This keeps generated bodies inspectable (and rewritable by
//! transformers) right up until the class is serialized.
//!
//! Only the instructions that generated proxies actually need are represented:
//!
//!   - there is no arithmetic, since generated code only ever shuffles values around
//!
//!   - the `wide` forms of loads and stores are merged into the regular instructions
//!
//!   - `ldc`, `ldc_w`, and `ldc2_w` are all covered by `Ldc`
//!

use super::{
    BaseType, BinaryName, ConstantsPool, Error, FieldType, MethodDescriptor, Name, RefType,
    RenderDescriptor, UnqualifiedName, Width,
};
use std::convert::TryFrom;
use std::fmt;
use std::ops::Not;

/// Opaque label
#[derive(Copy, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct Label(pub(crate) usize);

impl fmt::Debug for Label {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("l{}", self.0))
    }
}

/// Reference to a method, along with enough information to pick the right constant kind
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub owner: BinaryName,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor,

    /// Is the owner an interface? (`InterfaceMethodref` vs. `Methodref`)
    pub is_interface: bool,
}

impl MethodRef {
    pub fn new(
        owner: BinaryName,
        name: UnqualifiedName,
        descriptor: MethodDescriptor,
        is_interface: bool,
    ) -> MethodRef {
        MethodRef {
            owner,
            name,
            descriptor,
            is_interface,
        }
    }
}

/// Reference to a field
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub owner: BinaryName,
    pub name: UnqualifiedName,
    pub descriptor: FieldType,
}

impl FieldRef {
    pub fn new(owner: BinaryName, name: UnqualifiedName, descriptor: FieldType) -> FieldRef {
        FieldRef {
            owner,
            name,
            descriptor,
        }
    }
}

/// Loadable constant for `ldc` and friends
#[derive(Clone, Debug, PartialEq)]
pub enum ConstantData {
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(String),

    /// Class literal (requires class file version 49 or later)
    Class(RefType),
}

impl Width for ConstantData {
    fn width(&self) -> usize {
        match self {
            ConstantData::Long(_) | ConstantData::Double(_) => 2,
            _ => 1,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum InvokeType {
    Virtual,
    Special,
    Static,
    Interface,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OrdComparison {
    EQ,
    GE,
    GT,
    LE,
    LT,
    NE,
}

impl Not for OrdComparison {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            OrdComparison::EQ => OrdComparison::NE,
            OrdComparison::NE => OrdComparison::EQ,
            OrdComparison::LT => OrdComparison::GE,
            OrdComparison::GE => OrdComparison::LT,
            OrdComparison::GT => OrdComparison::LE,
            OrdComparison::LE => OrdComparison::GT,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EqComparison {
    EQ,
    NE,
}

impl Not for EqComparison {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            EqComparison::EQ => EqComparison::NE,
            EqComparison::NE => EqComparison::EQ,
        }
    }
}

/// Non-branching JVM bytecode instruction
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    Nop,
    AConstNull,
    IConstM1,
    IConst0,
    IConst1,
    IConst2,
    IConst3,
    IConst4,
    IConst5,
    LConst0,
    LConst1,
    FConst0,
    FConst1,
    FConst2,
    DConst0,
    DConst1,
    BiPush(i8),
    SiPush(i16),
    Ldc(ConstantData),
    ILoad(u16), // covers `iload`, `iload{0,3}`, and `wide iload`
    LLoad(u16),
    FLoad(u16),
    DLoad(u16),
    ALoad(u16),
    AALoad,
    IStore(u16), // covers `istore`, `istore{0,3}`, and `wide istore`
    LStore(u16),
    FStore(u16),
    DStore(u16),
    AStore(u16),
    AAStore,
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    GetStatic(FieldRef),
    PutStatic(FieldRef),
    GetField(FieldRef),
    PutField(FieldRef),
    Invoke(InvokeType, MethodRef),
    New(BinaryName),
    ANewArray(RefType),
    ArrayLength,
    CheckCast(RefType),
    InstanceOf(RefType),
}

impl Instruction {
    /// Load a local variable of the given type
    pub fn load(typ: &FieldType, index: u16) -> Instruction {
        match typ {
            FieldType::Base(BaseType::Long) => Instruction::LLoad(index),
            FieldType::Base(BaseType::Float) => Instruction::FLoad(index),
            FieldType::Base(BaseType::Double) => Instruction::DLoad(index),
            FieldType::Base(_) => Instruction::ILoad(index),
            FieldType::Ref(_) => Instruction::ALoad(index),
        }
    }

    /// Store into a local variable of the given type
    pub fn store(typ: &FieldType, index: u16) -> Instruction {
        match typ {
            FieldType::Base(BaseType::Long) => Instruction::LStore(index),
            FieldType::Base(BaseType::Float) => Instruction::FStore(index),
            FieldType::Base(BaseType::Double) => Instruction::DStore(index),
            FieldType::Base(_) => Instruction::IStore(index),
            FieldType::Ref(_) => Instruction::AStore(index),
        }
    }

    /// Push an integer constant using the shortest encoding
    pub fn push_int(value: i32) -> Instruction {
        match value {
            -1 => Instruction::IConstM1,
            0 => Instruction::IConst0,
            1 => Instruction::IConst1,
            2 => Instruction::IConst2,
            3 => Instruction::IConst3,
            4 => Instruction::IConst4,
            5 => Instruction::IConst5,
            _ => {
                if let Ok(b) = i8::try_from(value) {
                    Instruction::BiPush(b)
                } else if let Ok(s) = i16::try_from(value) {
                    Instruction::SiPush(s)
                } else {
                    Instruction::Ldc(ConstantData::Integer(value))
                }
            }
        }
    }

    /// Number of stack slots popped and then pushed by the instruction
    pub fn stack_effect(&self) -> (usize, usize) {
        use Instruction::*;

        match self {
            Nop => (0, 0),
            AConstNull | IConstM1 | IConst0 | IConst1 | IConst2 | IConst3 | IConst4 | IConst5
            | FConst0 | FConst1 | FConst2 | BiPush(_) | SiPush(_) => (0, 1),
            LConst0 | LConst1 | DConst0 | DConst1 => (0, 2),
            Ldc(constant) => (0, constant.width()),
            ILoad(_) | FLoad(_) | ALoad(_) => (0, 1),
            LLoad(_) | DLoad(_) => (0, 2),
            AALoad => (2, 1),
            IStore(_) | FStore(_) | AStore(_) => (1, 0),
            LStore(_) | DStore(_) => (2, 0),
            AAStore => (3, 0),
            Pop => (1, 0),
            Pop2 => (2, 0),
            Dup => (1, 2),
            DupX1 => (2, 3),
            DupX2 => (3, 4),
            Dup2 => (2, 4),
            Dup2X1 => (3, 5),
            Dup2X2 => (4, 6),
            Swap => (2, 2),
            GetStatic(field) => (0, field.descriptor.width()),
            PutStatic(field) => (field.descriptor.width(), 0),
            GetField(field) => (1, field.descriptor.width()),
            PutField(field) => (1 + field.descriptor.width(), 0),
            Invoke(typ, method) => {
                let has_this = *typ != InvokeType::Static;
                (
                    method.descriptor.parameter_length(has_this),
                    method.descriptor.return_width(),
                )
            }
            New(_) => (0, 1),
            ANewArray(_) => (1, 1),
            ArrayLength => (1, 1),
            CheckCast(_) | InstanceOf(_) => (1, 1),
        }
    }

    /// Highest local variable slot (exclusive) touched by this instruction
    pub fn locals_extent(&self) -> usize {
        use Instruction::*;

        match self {
            ILoad(i) | FLoad(i) | ALoad(i) | IStore(i) | FStore(i) | AStore(i) => *i as usize + 1,
            LLoad(i) | DLoad(i) | LStore(i) | DStore(i) => *i as usize + 2,
            _ => 0,
        }
    }

    /// Encode the instruction, resolving symbolic references through the constant pool
    pub fn encode(&self, constants: &mut ConstantsPool, out: &mut Vec<u8>) -> Result<(), Error> {
        /* The load/store instructions follow the same pattern:
         *
         *   - short form (0-3) have special bytes
         *   - normal form (0-255) use `iload` plus a byte operand
         *   - wide form (255-65535) use `wide iload` plus two byte operands
         */
        fn load_or_store(idx: u16, short_form_start: u8, normal_form: u8, out: &mut Vec<u8>) {
            match u8::try_from(idx) {
                Ok(n @ 0..=3) => out.push(short_form_start + n),
                Ok(n) => out.extend_from_slice(&[normal_form, n]),
                Err(_) => {
                    out.extend_from_slice(&[0xC4, normal_form]);
                    out.extend_from_slice(&idx.to_be_bytes());
                }
            }
        }

        fn with_index(opcode: u8, index: u16, out: &mut Vec<u8>) {
            out.push(opcode);
            out.extend_from_slice(&index.to_be_bytes());
        }

        fn field(
            opcode: u8,
            field: &FieldRef,
            constants: &mut ConstantsPool,
            out: &mut Vec<u8>,
        ) -> Result<(), Error> {
            let idx = constants.get_field_ref(
                field.owner.as_str(),
                field.name.as_str(),
                &field.descriptor.render(),
            )?;
            with_index(opcode, idx.into_index(), out);
            Ok(())
        }

        fn class(
            opcode: u8,
            class: &str,
            constants: &mut ConstantsPool,
            out: &mut Vec<u8>,
        ) -> Result<(), Error> {
            let idx = constants.get_class(class)?;
            with_index(opcode, idx.into_index(), out);
            Ok(())
        }

        use Instruction::*;

        match self {
            Nop => out.push(0x00),
            AConstNull => out.push(0x01),
            IConstM1 => out.push(0x02),
            IConst0 => out.push(0x03),
            IConst1 => out.push(0x04),
            IConst2 => out.push(0x05),
            IConst3 => out.push(0x06),
            IConst4 => out.push(0x07),
            IConst5 => out.push(0x08),
            LConst0 => out.push(0x09),
            LConst1 => out.push(0x0a),
            FConst0 => out.push(0x0b),
            FConst1 => out.push(0x0c),
            FConst2 => out.push(0x0d),
            DConst0 => out.push(0x0e),
            DConst1 => out.push(0x0f),
            BiPush(b) => out.extend_from_slice(&[0x10, *b as u8]),
            SiPush(s) => {
                out.push(0x11);
                out.extend_from_slice(&s.to_be_bytes());
            }
            Ldc(constant) => {
                let idx = match constant {
                    ConstantData::Integer(i) => constants.get_integer(*i)?,
                    ConstantData::Float(f) => constants.get_float(*f)?,
                    ConstantData::Long(l) => constants.get_long(*l)?,
                    ConstantData::Double(d) => constants.get_double(*d)?,
                    ConstantData::String(s) => constants.get_string(s)?.into(),
                    ConstantData::Class(typ) => {
                        constants.get_class(&typ.class_constant_name())?.into()
                    }
                };
                if constant.width() == 2 {
                    with_index(0x14, idx.0, out);
                } else {
                    match u8::try_from(idx.0) {
                        Ok(b) => out.extend_from_slice(&[0x12, b]),
                        Err(_) => with_index(0x13, idx.0, out),
                    }
                }
            }
            ILoad(idx) => load_or_store(*idx, 0x1A, 0x15, out),
            LLoad(idx) => load_or_store(*idx, 0x1E, 0x16, out),
            FLoad(idx) => load_or_store(*idx, 0x22, 0x17, out),
            DLoad(idx) => load_or_store(*idx, 0x26, 0x18, out),
            ALoad(idx) => load_or_store(*idx, 0x2A, 0x19, out),
            AALoad => out.push(0x32),
            IStore(idx) => load_or_store(*idx, 0x3B, 0x36, out),
            LStore(idx) => load_or_store(*idx, 0x3F, 0x37, out),
            FStore(idx) => load_or_store(*idx, 0x43, 0x38, out),
            DStore(idx) => load_or_store(*idx, 0x47, 0x39, out),
            AStore(idx) => load_or_store(*idx, 0x4B, 0x3A, out),
            AAStore => out.push(0x53),
            Pop => out.push(0x57),
            Pop2 => out.push(0x58),
            Dup => out.push(0x59),
            DupX1 => out.push(0x5a),
            DupX2 => out.push(0x5b),
            Dup2 => out.push(0x5c),
            Dup2X1 => out.push(0x5d),
            Dup2X2 => out.push(0x5e),
            Swap => out.push(0x5f),
            GetStatic(f) => field(0xb2, f, constants, out)?,
            PutStatic(f) => field(0xb3, f, constants, out)?,
            GetField(f) => field(0xb4, f, constants, out)?,
            PutField(f) => field(0xb5, f, constants, out)?,
            Invoke(typ, method) => {
                let idx = constants.get_method_ref(
                    method.owner.as_str(),
                    method.name.as_str(),
                    &method.descriptor.render(),
                    method.is_interface,
                )?;
                match typ {
                    InvokeType::Virtual => with_index(0xb6, idx.into_index(), out),
                    InvokeType::Special => with_index(0xb7, idx.into_index(), out),
                    InvokeType::Static => with_index(0xb8, idx.into_index(), out),
                    InvokeType::Interface => {
                        with_index(0xb9, idx.into_index(), out);
                        let count = method.descriptor.parameter_length(true) as u8;
                        out.extend_from_slice(&[count, 0]);
                    }
                }
            }
            New(cls) => class(0xbb, cls.as_str(), constants, out)?,
            ANewArray(elem) => class(0xbd, &elem.class_constant_name(), constants, out)?,
            ArrayLength => out.push(0xbe),
            CheckCast(typ) => class(0xc0, &typ.class_constant_name(), constants, out)?,
            InstanceOf(typ) => class(0xc1, &typ.class_constant_name(), constants, out)?,
        };
        Ok(())
    }
}

/// Branching JVM bytecode instruction (anything that can do something other than fall through)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BranchInstruction {
    If(OrdComparison, Label), // covers `ifeq`, `ifne`, `iflt`, `ifge`, `ifgt`, `ifle`
    IfICmp(OrdComparison, Label), // covers `if_icmpeq`, `if_icmpne`, `if_icmplt`, ... `if_icmple`
    IfACmp(EqComparison, Label), // covers `if_acmpeq`, `if_acmpne`
    IfNull(EqComparison, Label), // covers `ifnull`, `ifnonnull`
    Goto(Label),
    IReturn,
    LReturn,
    FReturn,
    DReturn,
    AReturn,
    Return,
    AThrow,
}

impl BranchInstruction {
    /// Return from a method with the given return type
    pub fn return_for(typ: Option<&FieldType>) -> BranchInstruction {
        match typ {
            None => BranchInstruction::Return,
            Some(FieldType::Base(BaseType::Long)) => BranchInstruction::LReturn,
            Some(FieldType::Base(BaseType::Float)) => BranchInstruction::FReturn,
            Some(FieldType::Base(BaseType::Double)) => BranchInstruction::DReturn,
            Some(FieldType::Base(_)) => BranchInstruction::IReturn,
            Some(FieldType::Ref(_)) => BranchInstruction::AReturn,
        }
    }

    /// Label that the instruction might jump to
    pub fn jump_target(&self) -> Option<Label> {
        match self {
            BranchInstruction::If(_, lbl)
            | BranchInstruction::IfICmp(_, lbl)
            | BranchInstruction::IfACmp(_, lbl)
            | BranchInstruction::IfNull(_, lbl)
            | BranchInstruction::Goto(lbl) => Some(*lbl),
            _ => None,
        }
    }

    /// Can control continue on to the next instruction?
    pub fn falls_through(&self) -> bool {
        matches!(
            self,
            BranchInstruction::If(..)
                | BranchInstruction::IfICmp(..)
                | BranchInstruction::IfACmp(..)
                | BranchInstruction::IfNull(..)
        )
    }

    /// Number of stack slots popped (branches never push anything)
    pub fn stack_pops(&self) -> usize {
        match self {
            BranchInstruction::If(..) | BranchInstruction::IfNull(..) => 1,
            BranchInstruction::IfICmp(..) | BranchInstruction::IfACmp(..) => 2,
            BranchInstruction::Goto(_) | BranchInstruction::Return => 0,
            BranchInstruction::LReturn | BranchInstruction::DReturn => 2,
            BranchInstruction::IReturn
            | BranchInstruction::FReturn
            | BranchInstruction::AReturn
            | BranchInstruction::AThrow => 1,
        }
    }

    /// Size of the encoded instruction (all our jumps use 16-bit offsets)
    pub fn encoded_len(&self) -> usize {
        if self.jump_target().is_some() {
            3
        } else {
            1
        }
    }

    /// Encode the instruction, given the already computed relative jump offset
    pub fn encode(&self, jump_offset: i16, out: &mut Vec<u8>) {
        let opcode: u8 = match self {
            BranchInstruction::If(comp, _) => match comp {
                OrdComparison::EQ => 0x99,
                OrdComparison::NE => 0x9a,
                OrdComparison::LT => 0x9b,
                OrdComparison::GE => 0x9c,
                OrdComparison::GT => 0x9d,
                OrdComparison::LE => 0x9e,
            },
            BranchInstruction::IfICmp(comp, _) => match comp {
                OrdComparison::EQ => 0x9f,
                OrdComparison::NE => 0xa0,
                OrdComparison::LT => 0xa1,
                OrdComparison::GE => 0xa2,
                OrdComparison::GT => 0xa3,
                OrdComparison::LE => 0xa4,
            },
            BranchInstruction::IfACmp(EqComparison::EQ, _) => 0xa5,
            BranchInstruction::IfACmp(EqComparison::NE, _) => 0xa6,
            BranchInstruction::Goto(_) => 0xa7,
            BranchInstruction::IReturn => 0xac,
            BranchInstruction::LReturn => 0xad,
            BranchInstruction::FReturn => 0xae,
            BranchInstruction::DReturn => 0xaf,
            BranchInstruction::AReturn => 0xb0,
            BranchInstruction::Return => 0xb1,
            BranchInstruction::AThrow => 0xbf,
            BranchInstruction::IfNull(EqComparison::EQ, _) => 0xc6,
            BranchInstruction::IfNull(EqComparison::NE, _) => 0xc7,
        };
        out.push(opcode);
        if self.jump_target().is_some() {
            out.extend_from_slice(&jump_offset.to_be_bytes());
        }
    }
}

/// Element of a method body: an instruction, or the position of a label
#[derive(Clone, Debug, PartialEq)]
pub enum Insn {
    Plain(Instruction),
    Branch(BranchInstruction),
    Label(Label),
}

impl From<Instruction> for Insn {
    fn from(insn: Instruction) -> Insn {
        Insn::Plain(insn)
    }
}

impl From<BranchInstruction> for Insn {
    fn from(insn: BranchInstruction) -> Insn {
        Insn::Branch(insn)
    }
}

impl fmt::Display for Insn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Insn::Label(lbl) => write!(f, "{:?}:", lbl),
            Insn::Branch(branch) => write!(f, "  {:?}", branch),
            Insn::Plain(Instruction::Invoke(typ, method)) => write!(
                f,
                "  Invoke{:?} {}.{}{}",
                typ,
                method.owner,
                method.name,
                method.descriptor.render()
            ),
            Insn::Plain(insn) => write!(f, "  {:?}", insn),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn encoded(insn: Instruction) -> Vec<u8> {
        let mut constants = ConstantsPool::new();
        let mut out = vec![];
        insn.encode(&mut constants, &mut out).unwrap();
        out
    }

    #[test]
    fn short_and_wide_locals() {
        assert_eq!(encoded(Instruction::ALoad(0)), vec![0x2a]);
        assert_eq!(encoded(Instruction::ILoad(7)), vec![0x15, 7]);
        assert_eq!(encoded(Instruction::DStore(300)), vec![0xc4, 0x39, 0x01, 0x2c]);
    }

    #[test]
    fn interface_invoke_counts_arguments() {
        let method = MethodRef::new(
            BinaryName::INVOCATIONHANDLER,
            UnqualifiedName::INVOKE,
            MethodDescriptor::new(
                vec![
                    FieldType::object(BinaryName::OBJECT),
                    FieldType::object(BinaryName::METHOD),
                    FieldType::array(FieldType::object(BinaryName::OBJECT)),
                ],
                Some(FieldType::object(BinaryName::OBJECT)),
            ),
            true,
        );
        let bytes = encoded(Instruction::Invoke(InvokeType::Interface, method));
        assert_eq!(bytes[0], 0xb9);
        assert_eq!(&bytes[3..], &[4, 0]);
    }

    #[test]
    fn stack_effects() {
        let long_field = FieldRef::new(
            BinaryName::OBJECT,
            UnqualifiedName::TYPE,
            FieldType::long(),
        );
        assert_eq!(Instruction::GetField(long_field.clone()).stack_effect(), (1, 2));
        assert_eq!(Instruction::PutField(long_field).stack_effect(), (3, 0));
        assert_eq!(Instruction::Dup2.stack_effect(), (2, 4));
        assert_eq!(BranchInstruction::LReturn.stack_pops(), 2);
    }

    #[test]
    fn int_constants_use_shortest_form() {
        assert_eq!(Instruction::push_int(3), Instruction::IConst3);
        assert_eq!(Instruction::push_int(-100), Instruction::BiPush(-100));
        assert_eq!(Instruction::push_int(1000), Instruction::SiPush(1000));
        assert_eq!(
            Instruction::push_int(100_000),
            Instruction::Ldc(ConstantData::Integer(100_000))
        );
    }
}
