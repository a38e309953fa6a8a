use byteorder::{BigEndian, WriteBytesExt};
use std::io::Result;

/// Utility trait for serializing data inside class files
///
/// Class files are big-endian throughout, tags are always `u8`, and sequences are almost always
/// prefixed with a `u16` length.
pub trait Serialize: Sized {
    /// Serialize construct into a binary output stream
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()>;
}

macro_rules! serialize_big_endian {
    ($($ty:ty => $write:ident),* $(,)?) => {
        $(
            impl Serialize for $ty {
                fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
                    writer.$write::<BigEndian>(*self)
                }
            }
        )*
    };
}

serialize_big_endian! {
    u16 => write_u16,
    u32 => write_u32,
    i16 => write_i16,
    i32 => write_i32,
    i64 => write_i64,
    f32 => write_f32,
    f64 => write_f64,
}

impl Serialize for u8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(*self)
    }
}

impl Serialize for i8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i8(*self)
    }
}

/// Size in `u16` is the first thing serialized
impl<A: Serialize> Serialize for Vec<A> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        (self.len() as u16).serialize(writer)?;
        for elem in self {
            elem.serialize(writer)?;
        }
        Ok(())
    }
}
