use super::{Constant, Label};

#[derive(Debug)]
pub enum Error {
    ConstantPoolOverflow {
        constant: Constant,
        offset: usize,
    },
    IoError(std::io::Error),

    /// Encoded method body is longer than the 65535 bytes a `Code` attribute can hold
    MethodCodeOverflow(usize),
    MethodCodeMaxStackOverflow(usize),
    MethodCodeMaxLocalsOverflow(usize),

    /// Too many items were popped off the operand stack at some instruction
    StackUnderflow {
        instruction: String,
        depth: usize,
    },

    /// Two paths reach the same instruction with different stack depths
    InconsistentStackDepth {
        index: usize,
        first: usize,
        second: usize,
    },

    /// A label was jumped to (or used in a try/catch entry) but never placed
    UnplacedLabel(Label),

    /// The same label was placed twice (indicates a bug)
    DuplicateLabel(Label),

    /// Branch distance does not fit in the signed 16-bit offset of the branch instruction
    BranchOffsetOverflow {
        label: Label,
        offset: isize,
    },

    /// Execution can run off the end of the method body
    FallsOffEnd,

    /// Descriptor could not be parsed back from a member reference
    BadDescriptor(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}
