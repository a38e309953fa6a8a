use super::{
    Attribute, AttributeLike, BinaryName, ClassConstantIndex, ConstantsPool, Error, Insn, Label,
    Name, Serialize,
};
use byteorder::WriteBytesExt;
use std::collections::HashMap;
use std::convert::TryFrom;

/// Entry in the exception table of a method body
///
/// The JVM searches the exception table from top to bottom, so entries that are pushed earlier
/// take precedence over (are "inside of") entries pushed later.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TryCatch {
    /// Start of the protected range (inclusive)
    pub start: Label,

    /// End of the protected range (exclusive)
    pub end: Label,

    /// Start of the handler code
    pub handler: Label,

    /// Class of exceptions caught (`None` catches everything)
    pub catch_type: Option<BinaryName>,
}

/// Method body under construction
///
/// This is just the symbolic instructions and exception table. Derived information like the
/// maximum stack depth is only computed once the body is serialized.
#[derive(Clone, Debug, Default)]
pub struct Code {
    /// Width of the arguments, including the `this` argument for instance methods
    pub argument_slots: usize,

    pub instructions: Vec<Insn>,
    pub try_catches: Vec<TryCatch>,
}

impl Code {
    pub fn new(argument_slots: usize) -> Code {
        Code {
            argument_slots,
            instructions: vec![],
            try_catches: vec![],
        }
    }

    pub fn push(&mut self, insn: impl Into<Insn>) {
        self.instructions.push(insn.into());
    }

    /// Map from labels to their position in `instructions`
    pub fn label_positions(&self) -> Result<HashMap<Label, usize>, Error> {
        let mut positions = HashMap::new();
        for (idx, insn) in self.instructions.iter().enumerate() {
            if let Insn::Label(lbl) = insn {
                if positions.insert(*lbl, idx).is_some() {
                    return Err(Error::DuplicateLabel(*lbl));
                }
            }
        }
        Ok(positions)
    }

    /// Number of local variable slots used (arguments included)
    pub fn max_locals(&self) -> usize {
        self.instructions
            .iter()
            .filter_map(|insn| match insn {
                Insn::Plain(plain) => Some(plain.locals_extent()),
                _ => None,
            })
            .fold(self.argument_slots, usize::max)
    }

    /// Compute the maximum operand stack depth by walking every reachable path through the body
    ///
    /// Exception handlers are entered with exactly the caught exception on the stack. Since the
    /// only way to reach an instruction from more than one place is through a label, depths only
    /// ever need to be reconciled at labels.
    pub fn max_stack(&self) -> Result<usize, Error> {
        let positions = self.label_positions()?;
        let position = |lbl: &Label| positions.get(lbl).copied().ok_or(Error::UnplacedLabel(*lbl));

        let mut depths: Vec<Option<usize>> = vec![None; self.instructions.len()];
        let mut max_depth = 0;
        let mut work_list = vec![(0, 0)];

        for try_catch in &self.try_catches {
            position(&try_catch.start)?;
            position(&try_catch.end)?;
            work_list.push((position(&try_catch.handler)?, 1));
            max_depth = 1;
        }

        while let Some((mut idx, mut depth)) = work_list.pop() {
            loop {
                let insn = self.instructions.get(idx).ok_or(Error::FallsOffEnd)?;
                let seen = depths[idx];
                match seen {
                    Some(first) if first != depth => {
                        return Err(Error::InconsistentStackDepth {
                            index: idx,
                            first,
                            second: depth,
                        })
                    }
                    Some(_) => break,
                    None => depths[idx] = Some(depth),
                }

                match insn {
                    Insn::Label(_) => (),
                    Insn::Plain(plain) => {
                        let (pops, pushes) = plain.stack_effect();
                        depth = depth.checked_sub(pops).ok_or_else(|| Error::StackUnderflow {
                            instruction: format!("{:?}", plain),
                            depth,
                        })?;
                        depth += pushes;
                        max_depth = max_depth.max(depth);
                    }
                    Insn::Branch(branch) => {
                        depth = depth.checked_sub(branch.stack_pops()).ok_or_else(|| {
                            Error::StackUnderflow {
                                instruction: format!("{:?}", branch),
                                depth,
                            }
                        })?;
                        if let Some(target) = branch.jump_target() {
                            work_list.push((position(&target)?, depth));
                        }
                        if !branch.falls_through() {
                            break;
                        }
                    }
                }
                idx += 1;
            }
        }

        Ok(max_depth)
    }

    /// Encode the body into a `Code` attribute
    pub fn serialize_code(&self, constants: &mut ConstantsPool) -> Result<CodeAttribute, Error> {
        let max_stack = self.max_stack()?;
        let max_stack =
            u16::try_from(max_stack).map_err(|_| Error::MethodCodeMaxStackOverflow(max_stack))?;
        let max_locals = self.max_locals();
        let max_locals = u16::try_from(max_locals)
            .map_err(|_| Error::MethodCodeMaxLocalsOverflow(max_locals))?;

        let mut code_array: Vec<u8> = vec![];
        let mut label_offsets: HashMap<Label, usize> = HashMap::new();
        let mut jumps: Vec<(usize, Label)> = vec![];

        for insn in &self.instructions {
            match insn {
                Insn::Label(lbl) => {
                    if label_offsets.insert(*lbl, code_array.len()).is_some() {
                        return Err(Error::DuplicateLabel(*lbl));
                    }
                }
                Insn::Plain(plain) => plain.encode(constants, &mut code_array)?,
                Insn::Branch(branch) => {
                    if let Some(target) = branch.jump_target() {
                        jumps.push((code_array.len(), target));
                    }
                    branch.encode(0, &mut code_array);
                }
            }
        }

        // Patch in jump offsets now that every label has a position
        for (at, target) in jumps {
            let target_offset = *label_offsets
                .get(&target)
                .ok_or(Error::UnplacedLabel(target))?;
            let offset = target_offset as isize - at as isize;
            let offset = i16::try_from(offset).map_err(|_| Error::BranchOffsetOverflow {
                label: target,
                offset,
            })?;
            code_array[at + 1..at + 3].copy_from_slice(&offset.to_be_bytes());
        }

        if code_array.len() >= u16::MAX as usize {
            return Err(Error::MethodCodeOverflow(code_array.len()));
        }

        let offset_of = |lbl: &Label| -> Result<u16, Error> {
            label_offsets
                .get(lbl)
                .map(|off| *off as u16)
                .ok_or(Error::UnplacedLabel(*lbl))
        };
        let mut exception_table = vec![];
        for try_catch in &self.try_catches {
            let start_pc = offset_of(&try_catch.start)?;
            let end_pc = offset_of(&try_catch.end)?;

            // The JVM rejects empty protected ranges
            if start_pc >= end_pc {
                continue;
            }

            let catch_type = match &try_catch.catch_type {
                None => None,
                Some(cls) => Some(constants.get_class(cls.as_str())?),
            };
            exception_table.push(ExceptionHandler {
                start_pc,
                end_pc,
                handler_pc: offset_of(&try_catch.handler)?,
                catch_type,
            });
        }

        Ok(CodeAttribute {
            max_stack,
            max_locals,
            code_array,
            exception_table,
            attributes: vec![],
        })
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.3
#[derive(Debug)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code_array: Vec<u8>,
    pub exception_table: Vec<ExceptionHandler>,
    pub attributes: Vec<Attribute>,
}

impl Serialize for CodeAttribute {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.max_stack.serialize(writer)?;
        self.max_locals.serialize(writer)?;
        (self.code_array.len() as u32).serialize(writer)?;
        writer.write_all(&self.code_array)?;
        self.exception_table.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl AttributeLike for CodeAttribute {
    const NAME: &'static str = "Code";
}

#[derive(Debug)]
pub struct ExceptionHandler {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: Option<ClassConstantIndex>,
}

impl Serialize for ExceptionHandler {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.start_pc.serialize(writer)?;
        self.end_pc.serialize(writer)?;
        self.handler_pc.serialize(writer)?;
        match self.catch_type {
            None => 0u16.serialize(writer)?,
            Some(idx) => idx.serialize(writer)?,
        }
        Ok(())
    }
}
