use super::{BinaryName, Name, UnqualifiedName};
use std::io::{Error, ErrorKind, Result};
use std::iter::Peekable;
use std::str::Chars;

/// Number of slots something occupies on the operand stack or in the locals
pub trait Width {
    fn width(&self) -> usize;
}

/// Utility trait for converting descriptors to string representations
pub trait RenderDescriptor {
    /// Turn the descriptor into a string
    fn render(&self) -> String {
        let mut string = String::new();
        self.render_to(&mut string);
        string
    }

    /// Write the descriptor to a string
    fn render_to(&self, write_to: &mut String);
}

pub trait ParseDescriptor: Sized {
    /// Parse a descriptor from a string
    fn parse(source: &str) -> Result<Self> {
        let mut chars = source.chars().peekable();
        let ret = Self::parse_from(&mut chars)?;
        match chars.next() {
            None => Ok(ret),
            Some(c) => {
                let msg = format!("Unexpected leftover input '{}'", c);
                Err(Error::new(ErrorKind::InvalidInput, msg))
            }
        }
    }

    /// Read the descriptor from a character buffer
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self>;
}

/// Primitive value types
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl BaseType {
    /// Class used to box values of this type
    pub const fn boxed_class(&self) -> BinaryName {
        match self {
            BaseType::Byte => BinaryName::BYTE,
            BaseType::Char => BinaryName::CHARACTER,
            BaseType::Double => BinaryName::DOUBLE,
            BaseType::Float => BinaryName::FLOAT,
            BaseType::Int => BinaryName::INTEGER,
            BaseType::Long => BinaryName::LONG,
            BaseType::Short => BinaryName::SHORT,
            BaseType::Boolean => BinaryName::BOOLEAN,
        }
    }

    /// Class whose `*Value` method extracts a primitive of this type from a boxed value
    ///
    /// All numeric types go through `java/lang/Number`, so an `Integer` can be unboxed into a
    /// `long` (this mirrors what reflection does for `Method.invoke` results).
    pub const fn unboxing_class(&self) -> BinaryName {
        match self {
            BaseType::Char => BinaryName::CHARACTER,
            BaseType::Boolean => BinaryName::BOOLEAN,
            _ => BinaryName::NUMBER,
        }
    }

    /// Method on `unboxing_class` which produces the primitive
    pub const fn unboxing_method(&self) -> UnqualifiedName {
        match self {
            BaseType::Byte => UnqualifiedName::BYTEVALUE,
            BaseType::Char => UnqualifiedName::CHARVALUE,
            BaseType::Double => UnqualifiedName::DOUBLEVALUE,
            BaseType::Float => UnqualifiedName::FLOATVALUE,
            BaseType::Int => UnqualifiedName::INTVALUE,
            BaseType::Long => UnqualifiedName::LONGVALUE,
            BaseType::Short => UnqualifiedName::SHORTVALUE,
            BaseType::Boolean => UnqualifiedName::BOOLEANVALUE,
        }
    }

    /// Source-level keyword for the type
    pub const fn keyword(&self) -> &'static str {
        match self {
            BaseType::Byte => "byte",
            BaseType::Char => "char",
            BaseType::Double => "double",
            BaseType::Float => "float",
            BaseType::Int => "int",
            BaseType::Long => "long",
            BaseType::Short => "short",
            BaseType::Boolean => "boolean",
        }
    }
}

impl Width for BaseType {
    fn width(&self) -> usize {
        match self {
            BaseType::Double | BaseType::Long => 2,
            _ => 1,
        }
    }
}

impl RenderDescriptor for BaseType {
    fn render_to(&self, write_to: &mut String) {
        let c = match self {
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Double => 'D',
            BaseType::Float => 'F',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Short => 'S',
            BaseType::Boolean => 'Z',
        };
        write_to.push(c);
    }
}

impl ParseDescriptor for BaseType {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self> {
        let typ = match source.next() {
            Some('B') => BaseType::Byte,
            Some('C') => BaseType::Char,
            Some('D') => BaseType::Double,
            Some('F') => BaseType::Float,
            Some('I') => BaseType::Int,
            Some('J') => BaseType::Long,
            Some('S') => BaseType::Short,
            Some('Z') => BaseType::Boolean,
            Some(c) => {
                let msg = format!("Invalid base type character '{}'", c);
                return Err(Error::new(ErrorKind::InvalidInput, msg));
            }
            None => {
                return Err(Error::new(
                    ErrorKind::UnexpectedEof,
                    "Missing base type character",
                ))
            }
        };
        Ok(typ)
    }
}

/// Reference type
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum RefType {
    Object(BinaryName),
    Array(Box<FieldType>),
}

impl RefType {
    /// Name used to refer to this type from a `CONSTANT_Class` entry
    ///
    /// Object types use their binary name (`pkg/Cls`) while arrays use their full descriptor
    /// (`[Lpkg/Cls;`).
    pub fn class_constant_name(&self) -> String {
        match self {
            RefType::Object(name) => name.as_str().to_owned(),
            RefType::Array(_) => self.render(),
        }
    }

    pub fn array(element: FieldType) -> RefType {
        RefType::Array(Box::new(element))
    }
}

impl RenderDescriptor for BinaryName {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('L');
        write_to.push_str(self.as_str());
        write_to.push(';');
    }
}

impl ParseDescriptor for BinaryName {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self> {
        if let Some('L') = source.next() {
            let mut class_name = String::new();
            loop {
                let c: char = source.next().ok_or_else(|| {
                    let msg = format!("Missing terminator for 'L{}'", class_name);
                    Error::new(ErrorKind::UnexpectedEof, msg)
                })?;
                if c == ';' {
                    return BinaryName::from_string(class_name)
                        .map_err(|msg| Error::new(ErrorKind::InvalidInput, msg));
                }
                class_name.push(c)
            }
        } else {
            Err(Error::new(
                ErrorKind::InvalidInput,
                "Expected object type to start with `L`",
            ))
        }
    }
}

impl RenderDescriptor for RefType {
    fn render_to(&self, write_to: &mut String) {
        match self {
            RefType::Object(cls) => cls.render_to(write_to),
            RefType::Array(elem) => {
                write_to.push('[');
                elem.render_to(write_to);
            }
        }
    }
}

impl ParseDescriptor for RefType {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self> {
        match source.peek().copied() {
            Some('L') => Ok(RefType::Object(BinaryName::parse_from(source)?)),
            Some('[') => {
                let _ = source.next();
                Ok(RefType::array(FieldType::parse_from(source)?))
            }
            Some(c) => {
                let msg = format!("Invalid reference type character '{}'", c);
                Err(Error::new(ErrorKind::InvalidInput, msg))
            }
            None => Err(Error::new(ErrorKind::UnexpectedEof, "Missing reference type")),
        }
    }
}

/// Type of a field, parameter, local variable, or return value
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum FieldType {
    Base(BaseType),
    Ref(RefType),
}

impl Width for FieldType {
    fn width(&self) -> usize {
        match self {
            FieldType::Base(base_type) => base_type.width(),
            FieldType::Ref(_) => 1,
        }
    }
}

impl FieldType {
    pub const fn object(class_name: BinaryName) -> FieldType {
        FieldType::Ref(RefType::Object(class_name))
    }

    pub fn array(element: FieldType) -> FieldType {
        FieldType::Ref(RefType::array(element))
    }

    pub const fn int() -> FieldType {
        FieldType::Base(BaseType::Int)
    }

    pub const fn long() -> FieldType {
        FieldType::Base(BaseType::Long)
    }

    pub const fn boolean() -> FieldType {
        FieldType::Base(BaseType::Boolean)
    }

    pub const fn double() -> FieldType {
        FieldType::Base(BaseType::Double)
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, FieldType::Base(_))
    }

    /// Human readable name (`int`, `java.lang.String`, `int[]`)
    pub fn source_name(&self) -> String {
        match self {
            FieldType::Base(base) => String::from(base.keyword()),
            FieldType::Ref(RefType::Object(name)) => name.to_source_name(),
            FieldType::Ref(RefType::Array(elem)) => format!("{}[]", elem.source_name()),
        }
    }
}

impl RenderDescriptor for FieldType {
    fn render_to(&self, write_to: &mut String) {
        match self {
            FieldType::Base(base_type) => base_type.render_to(write_to),
            FieldType::Ref(reference_type) => reference_type.render_to(write_to),
        }
    }
}

impl ParseDescriptor for FieldType {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self> {
        match source.peek().copied() {
            None => Err(Error::new(ErrorKind::UnexpectedEof, "Missing field type")),
            Some('B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z') => {
                BaseType::parse_from(source).map(FieldType::Base)
            }
            Some('L' | '[') => RefType::parse_from(source).map(FieldType::Ref),
            Some(c) => {
                let msg = format!("Invalid field type character '{}'", c);
                Err(Error::new(ErrorKind::InvalidInput, msg))
            }
        }
    }
}

/// Signature of a method
#[derive(PartialEq, Eq, Hash, Debug, Clone)]
pub struct MethodDescriptor {
    pub parameters: Vec<FieldType>,
    pub return_type: Option<FieldType>, // `None` is for `void` (ie. no return)
}

impl MethodDescriptor {
    /// Descriptor for `()V`
    pub const VOID: MethodDescriptor = MethodDescriptor {
        parameters: vec![],
        return_type: None,
    };

    pub fn new(parameters: Vec<FieldType>, return_type: Option<FieldType>) -> MethodDescriptor {
        MethodDescriptor {
            parameters,
            return_type,
        }
    }

    /// Total width of parameters (not the same as the length of the vector), which must be 255
    /// or less for it to be valid
    pub fn parameter_length(&self, has_this_param: bool) -> usize {
        let this_len = if has_this_param { 1 } else { 0 };
        this_len + self.parameters.iter().map(Width::width).sum::<usize>()
    }

    /// Width of the return value on the stack (0 for `void`)
    pub fn return_width(&self) -> usize {
        self.return_type.as_ref().map_or(0, Width::width)
    }
}

impl RenderDescriptor for MethodDescriptor {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('(');
        for parameter in &self.parameters {
            parameter.render_to(write_to);
        }
        write_to.push(')');
        match &self.return_type {
            None => write_to.push('V'),
            Some(typ) => typ.render_to(write_to),
        };
    }
}

impl ParseDescriptor for MethodDescriptor {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self> {
        if source.next() != Some('(') {
            return Err(Error::new(ErrorKind::InvalidInput, "Expected '(' for method"));
        }

        let mut parameters = vec![];
        while source.peek().copied() != Some(')') {
            parameters.push(FieldType::parse_from(source)?);
        }
        let _ = source.next();

        let return_type = if let Some('V') = source.peek().copied() {
            let _ = source.next();
            None
        } else {
            Some(FieldType::parse_from(source)?)
        };

        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fmt::Debug;

    fn round_trip<T: RenderDescriptor + ParseDescriptor + Debug + Eq>(rendered: &str, parsed: T) {
        assert_eq!(rendered, parsed.render());
        assert_eq!(T::parse(rendered).unwrap(), parsed);
    }

    #[test]
    fn field_types() {
        round_trip("J", FieldType::long());
        round_trip("Ljava/lang/Object;", FieldType::object(BinaryName::OBJECT));
        round_trip(
            "[[D",
            FieldType::array(FieldType::array(FieldType::double())),
        );
        round_trip(
            "[Ljava/lang/String;",
            FieldType::array(FieldType::object(BinaryName::STRING)),
        );
    }

    #[test]
    fn method_descriptors() {
        round_trip(
            "(IJLjava/lang/Integer;)Ljava/lang/Object;",
            MethodDescriptor::new(
                vec![
                    FieldType::int(),
                    FieldType::long(),
                    FieldType::object(BinaryName::INTEGER),
                ],
                Some(FieldType::object(BinaryName::OBJECT)),
            ),
        );
        round_trip("()V", MethodDescriptor::VOID);
    }

    #[test]
    fn rejects_malformed_descriptors() {
        assert!(FieldType::parse("Ljava/lang/String").is_err());
        assert!(FieldType::parse("Q").is_err());
        assert!(MethodDescriptor::parse("I)V").is_err());
        assert!(MethodDescriptor::parse("()VV").is_err());
    }

    #[test]
    fn parameter_widths() {
        let desc = MethodDescriptor::parse("(JIDLjava/lang/Object;)J").unwrap();
        assert_eq!(desc.parameter_length(false), 6);
        assert_eq!(desc.parameter_length(true), 7);
        assert_eq!(desc.return_width(), 2);
    }

    #[test]
    fn class_constant_names() {
        let string = RefType::Object(BinaryName::STRING);
        assert_eq!(string.class_constant_name(), "java/lang/String");
        let ints = RefType::array(FieldType::int());
        assert_eq!(ints.class_constant_name(), "[I");
    }
}
