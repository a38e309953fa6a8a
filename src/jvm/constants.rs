use super::{Attribute, AttributeLike, Error, Serialize};
use byteorder::WriteBytesExt;
use std::borrow::{Borrow, Cow};
use std::collections::HashMap;

/// Constant pool of a class under construction
///
/// Every insertion is deduplicated: asking for the same constant twice returns the same index.
/// Elements can be added to the pool, but never removed.
pub struct ConstantsPool {
    /// Constants, in pool order
    constants: Vec<Constant>,

    /// Index that the next pushed constant will get (pool indexing starts at 1 and some
    /// constants take two slots)
    next_index: usize,

    utf8s: HashMap<String, Utf8ConstantIndex>,
    entries: HashMap<ConstantKey, ConstantIndex>,
}

/// Deduplication key for every constant other than `Utf8`
#[derive(Hash, PartialEq, Eq)]
enum ConstantKey {
    Class(Utf8ConstantIndex),
    String(Utf8ConstantIndex),
    Integer(i32),
    Float([u8; 4]),
    Long(i64),
    Double([u8; 8]),
    NameAndType(Utf8ConstantIndex, Utf8ConstantIndex),
    FieldRef(ClassConstantIndex, NameAndTypeConstantIndex),
    MethodRef(ClassConstantIndex, NameAndTypeConstantIndex, bool),
}

impl Default for ConstantsPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantsPool {
    /// Make a fresh empty constants pool
    pub fn new() -> ConstantsPool {
        ConstantsPool {
            constants: vec![],
            next_index: 1,
            utf8s: HashMap::new(),
            entries: HashMap::new(),
        }
    }

    /// Number of slots used so far, which is what `constant_pool_count` expects
    pub fn slot_count(&self) -> usize {
        self.next_index
    }

    /// Iterate through constants in the order they were added
    pub fn iter(&self) -> impl Iterator<Item = &Constant> {
        self.constants.iter()
    }

    /// Push a constant into the constant pool, provided there is space for it
    ///
    /// Note: the largest valid index is 65535, indexing starts at 1, and some constants take two
    /// spaces.
    fn push_constant(&mut self, constant: Constant) -> Result<ConstantIndex, Error> {
        let offset = self.next_index;
        if offset + constant.width() <= u16::MAX as usize {
            self.next_index += constant.width();
            self.constants.push(constant);
            Ok(ConstantIndex(offset as u16))
        } else {
            Err(Error::ConstantPoolOverflow { constant, offset })
        }
    }

    fn get_keyed(&mut self, key: ConstantKey, constant: Constant) -> Result<ConstantIndex, Error> {
        if let Some(idx) = self.entries.get(&key) {
            return Ok(*idx);
        }
        let idx = self.push_constant(constant)?;
        self.entries.insert(key, idx);
        Ok(idx)
    }

    /// Get or insert a utf8 constant from the constant pool
    pub fn get_utf8<'a, S: Into<Cow<'a, str>>>(
        &mut self,
        utf8: S,
    ) -> Result<Utf8ConstantIndex, Error> {
        let cow = utf8.into();

        // Two lookups, but no `String` allocation unless the constant is actually new
        if let Some(idx) = self.utf8s.get::<str>(cow.borrow()) {
            Ok(*idx)
        } else {
            let owned = cow.into_owned();
            let idx = Utf8ConstantIndex(self.push_constant(Constant::Utf8(owned.clone()))?);
            self.utf8s.insert(owned, idx);
            Ok(idx)
        }
    }

    /// Get or insert a class constant, given the name in internal form (or an array descriptor)
    pub fn get_class(&mut self, name: &str) -> Result<ClassConstantIndex, Error> {
        let name = self.get_utf8(name)?;
        self.get_keyed(ConstantKey::Class(name), Constant::Class(name))
            .map(ClassConstantIndex)
    }

    /// Get or insert a `java/lang/String` literal
    pub fn get_string(&mut self, string: &str) -> Result<StringConstantIndex, Error> {
        let utf8 = self.get_utf8(string)?;
        self.get_keyed(ConstantKey::String(utf8), Constant::String(utf8))
            .map(StringConstantIndex)
    }

    pub fn get_integer(&mut self, integer: i32) -> Result<ConstantIndex, Error> {
        self.get_keyed(ConstantKey::Integer(integer), Constant::Integer(integer))
    }

    pub fn get_float(&mut self, float: f32) -> Result<ConstantIndex, Error> {
        self.get_keyed(ConstantKey::Float(float.to_be_bytes()), Constant::Float(float))
    }

    pub fn get_long(&mut self, long: i64) -> Result<ConstantIndex, Error> {
        self.get_keyed(ConstantKey::Long(long), Constant::Long(long))
    }

    pub fn get_double(&mut self, double: f64) -> Result<ConstantIndex, Error> {
        self.get_keyed(
            ConstantKey::Double(double.to_be_bytes()),
            Constant::Double(double),
        )
    }

    /// Get or insert a name & type constant from the constant pool
    pub fn get_name_and_type(
        &mut self,
        name: &str,
        descriptor: &str,
    ) -> Result<NameAndTypeConstantIndex, Error> {
        let name = self.get_utf8(name)?;
        let descriptor = self.get_utf8(descriptor)?;
        self.get_keyed(
            ConstantKey::NameAndType(name, descriptor),
            Constant::NameAndType { name, descriptor },
        )
        .map(NameAndTypeConstantIndex)
    }

    /// Get or insert a field reference constant from the constant pool
    pub fn get_field_ref(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<FieldRefConstantIndex, Error> {
        let class = self.get_class(class)?;
        let name_and_type = self.get_name_and_type(name, descriptor)?;
        self.get_keyed(
            ConstantKey::FieldRef(class, name_and_type),
            Constant::FieldRef(class, name_and_type),
        )
        .map(FieldRefConstantIndex)
    }

    /// Get or insert a method reference constant from the constant pool
    pub fn get_method_ref(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
        is_interface: bool,
    ) -> Result<MethodRefConstantIndex, Error> {
        let class = self.get_class(class)?;
        let name_and_type = self.get_name_and_type(name, descriptor)?;
        self.get_keyed(
            ConstantKey::MethodRef(class, name_and_type, is_interface),
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            },
        )
        .map(MethodRefConstantIndex)
    }

    /// Serialize an attribute, registering its name in the pool
    pub fn get_attribute<A: AttributeLike>(&mut self, attribute: A) -> Result<Attribute, Error> {
        let name_index = self.get_utf8(A::NAME)?;
        let mut info = vec![];
        attribute.serialize(&mut info).map_err(Error::IoError)?;
        Ok(Attribute { name_index, info })
    }
}

impl Serialize for ConstantsPool {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        (self.next_index as u16).serialize(writer)?;
        for constant in &self.constants {
            constant.serialize(writer)?;
        }
        Ok(())
    }
}

/// Constants as in the constant pool
///
/// Only the constant kinds that generated proxies need are represented (no method handles,
/// method types, or dynamic constants).
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.4
#[derive(Debug, Clone)]
pub enum Constant {
    /// Class or an interface
    Class(Utf8ConstantIndex),

    /// Field
    FieldRef(ClassConstantIndex, NameAndTypeConstantIndex),

    /// Method (this combines `Methodref` and `InterfaceMethodref`)
    MethodRef {
        class: ClassConstantIndex,
        name_and_type: NameAndTypeConstantIndex,
        is_interface: bool,
    },

    /// Constant object of type `java.lang.String`
    String(Utf8ConstantIndex),

    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),

    /// Name and a type (eg. for a field or a method)
    NameAndType {
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    },

    /// Constant "modified UTF-8" encoded string value
    Utf8(String),
}

impl Constant {
    /// All 8-byte constants take up two entries in the constant pool
    pub fn width(&self) -> usize {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

/// Encode a string in the JVM's modified UTF-8
///
/// This differs from UTF-8 in how `\u{0000}` is encoded (two bytes) and in how supplementary
/// characters are encoded (as surrogate pairs, each encoded in three bytes).
fn modified_utf8(string: &str) -> Vec<u8> {
    let mut buffer: Vec<u8> = Vec::with_capacity(string.len());
    for unit in string.encode_utf16() {
        let code = unit as u32;
        match code {
            0x0001..=0x007F => buffer.push(code as u8),
            0x0000 | 0x0080..=0x07FF => {
                buffer.push((code >> 6 & 0x1F) as u8 | 0b1100_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }
            _ => {
                buffer.push((code >> 12 & 0x0F) as u8 | 0b1110_0000);
                buffer.push((code >> 6 & 0x3F) as u8 | 0b1000_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }
        }
    }
    buffer
}

impl Serialize for Constant {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            Constant::Utf8(string) => {
                let buffer = modified_utf8(string);
                1u8.serialize(writer)?;
                (buffer.len() as u16).serialize(writer)?;
                writer.write_all(&buffer)?;
            }
            Constant::Integer(integer) => {
                3u8.serialize(writer)?;
                integer.serialize(writer)?;
            }
            Constant::Float(float) => {
                4u8.serialize(writer)?;
                float.serialize(writer)?;
            }
            Constant::Long(long) => {
                5u8.serialize(writer)?;
                long.serialize(writer)?;
            }
            Constant::Double(double) => {
                6u8.serialize(writer)?;
                double.serialize(writer)?;
            }
            Constant::Class(name) => {
                7u8.serialize(writer)?;
                name.serialize(writer)?;
            }
            Constant::String(utf8) => {
                8u8.serialize(writer)?;
                utf8.serialize(writer)?;
            }
            Constant::FieldRef(class, name_and_type) => {
                9u8.serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            } => {
                (if *is_interface { 11u8 } else { 10u8 }).serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::NameAndType { name, descriptor } => {
                12u8.serialize(writer)?;
                name.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
        };
        Ok(())
    }
}

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct ConstantIndex(pub u16);

impl Serialize for ConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

macro_rules! typed_constant_index {
    ($($(#[$attr:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$attr])*
            #[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
            pub struct $name(ConstantIndex);

            impl $name {
                /// Raw index into the constant pool
                pub fn into_index(self) -> u16 {
                    (self.0).0
                }
            }

            impl From<$name> for ConstantIndex {
                fn from(index: $name) -> ConstantIndex {
                    index.0
                }
            }

            impl Serialize for $name {
                fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
                    self.0.serialize(writer)
                }
            }
        )*
    };
}

typed_constant_index! {
    /// Index of a `CONSTANT_Utf8` entry
    Utf8ConstantIndex,
    /// Index of a `CONSTANT_String` entry
    StringConstantIndex,
    NameAndTypeConstantIndex,
    /// Index of a `CONSTANT_Class` entry
    ClassConstantIndex,
    FieldRefConstantIndex,
    /// Index of a `CONSTANT_Methodref` or `CONSTANT_InterfaceMethodref` entry
    MethodRefConstantIndex,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn deduplicates_entries() {
        let mut pool = ConstantsPool::new();
        let a = pool
            .get_method_ref("java/lang/Object", "<init>", "()V", false)
            .unwrap();
        let b = pool
            .get_method_ref("java/lang/Object", "<init>", "()V", false)
            .unwrap();
        assert_eq!(a, b);

        // Utf8 x3, Class, NameAndType, MethodRef
        assert_eq!(pool.iter().count(), 6);
        assert_eq!(pool.slot_count(), 7);
    }

    #[test]
    fn wide_constants_take_two_slots() {
        let mut pool = ConstantsPool::new();
        let long = pool.get_long(5).unwrap();
        let int = pool.get_integer(5).unwrap();
        assert_eq!(long, ConstantIndex(1));
        assert_eq!(int, ConstantIndex(3));
        assert_eq!(pool.slot_count(), 4);
    }

    #[test]
    fn modified_utf8_encoding() {
        assert_eq!(modified_utf8("ab"), b"ab".to_vec());
        assert_eq!(modified_utf8("\u{0}"), vec![0xC0, 0x80]);
        assert_eq!(modified_utf8("\u{10400}").len(), 6);
    }
}
