//! The XDR (External Data Representation) module defines the serialization contract
//! used across every wire protocol this crate speaks, per RFC 1832.
//!
//! All integers are big endian; variable-length byte strings carry a 4-byte length
//! prefix and are padded to a 4-byte boundary. Struct and enum types implement the
//! split `Serialize` / `Deserialize` traits below, usually via the accompanying
//! derive-style macros rather than by hand.

use std::io::{Read, Write};

use byteorder::BigEndian;
use byteorder::{ReadBytesExt, WriteBytesExt};
use num_traits::cast::{FromPrimitive, ToPrimitive};

pub mod mount;
pub mod nfs2;
pub mod nfs3;
pub mod nfs4;
pub mod portmap;
pub mod rpc;
mod utils;

pub use utils::{invalid_data, read_padding, write_padding};

/// Type alias for the endianness used on the wire (always big endian).
pub type XDREndian = BigEndian;

/// Writes a value of `Self` to a byte stream in XDR form.
pub trait Serialize {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()>;
}

/// Reads a value of `Self` from a byte stream in XDR form, overwriting `self`.
///
/// Mutate-in-place rather than construct-and-return so that struct fields can be
/// deserialized directly into an existing `Default::default()` instance field by
/// field, matching the order fields are declared in the XDR struct.
pub trait Deserialize {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()>;
}

/// Deserializes a fresh `T` from `src`, starting from `T::default()`.
pub fn deserialize<T: Default + Deserialize, R: Read>(src: &mut R) -> std::io::Result<T> {
    let mut val = T::default();
    val.deserialize(src)?;
    Ok(val)
}

impl Serialize for bool {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_u32::<XDREndian>(*self as u32)
    }
}
impl Deserialize for bool {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_u32::<XDREndian>()? != 0;
        Ok(())
    }
}

impl Serialize for i32 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_i32::<XDREndian>(*self)
    }
}
impl Deserialize for i32 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_i32::<XDREndian>()?;
        Ok(())
    }
}

impl Serialize for i64 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_i64::<XDREndian>(*self)
    }
}
impl Deserialize for i64 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_i64::<XDREndian>()?;
        Ok(())
    }
}

impl Serialize for u32 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_u32::<XDREndian>(*self)
    }
}
impl Deserialize for u32 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_u32::<XDREndian>()?;
        Ok(())
    }
}

impl Serialize for u64 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_u64::<XDREndian>(*self)
    }
}
impl Deserialize for u64 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_u64::<XDREndian>()?;
        Ok(())
    }
}

impl<const N: usize> Serialize for [u8; N] {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_all(self)
    }
}
impl<const N: usize> Deserialize for [u8; N] {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        src.read_exact(self)
    }
}

/// Variable-length opaque data: 4-byte length, raw bytes, zero padding to a 4-byte boundary.
impl Serialize for Vec<u8> {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        assert!(self.len() < u32::MAX as usize);
        (self.len() as u32).serialize(dest)?;
        dest.write_all(self)?;
        write_padding(self.len(), dest)
    }
}
impl Deserialize for Vec<u8> {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let length: u32 = deserialize(src)?;
        self.resize(length as usize, 0);
        src.read_exact(self)?;
        read_padding(length as usize, src)
    }
}

/// Variable-length array of 4-byte-aligned elements: 4-byte count, then each element in turn.
impl Serialize for Vec<u32> {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        assert!(self.len() < u32::MAX as usize);
        (self.len() as u32).serialize(dest)?;
        for v in self {
            v.serialize(dest)?;
        }
        Ok(())
    }
}
impl Deserialize for Vec<u32> {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let length: u32 = deserialize(src)?;
        self.clear();
        self.reserve(length as usize);
        for _ in 0..length {
            self.push(deserialize(src)?);
        }
        Ok(())
    }
}

/// Marker trait: types whose wire form is a 4-byte `ToPrimitive` discriminant.
///
/// Implemented either via `impl SerializeEnum for MyEnum {}` directly, or via the
/// [`SerializeEnum`] (macro) shorthand for the same thing.
pub trait SerializeEnum: Copy + ToPrimitive {}

impl<T: SerializeEnum> Serialize for T {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        let v = self.to_u32().expect("enum discriminant must fit in u32");
        v.serialize(dest)
    }
}

/// Marker trait: types decoded from a 4-byte discriminant via `FromPrimitive`.
///
/// Deliberately does not require `Default`: `Deserialize::deserialize` mutates an
/// existing `self` in place, so no fresh value needs to be conjured here. Only the
/// free `deserialize::<T>()` helper (used where no existing instance is at hand)
/// requires `T: Default`.
pub trait DeserializeEnum: FromPrimitive {}

impl<T: DeserializeEnum> Deserialize for T {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let raw: u32 = deserialize(src)?;
        match T::from_u32(raw) {
            Some(v) => {
                *self = v;
                Ok(())
            }
            None => Err(invalid_data(&format!(
                "invalid discriminant {raw} for {}",
                std::any::type_name::<T>()
            ))),
        }
    }
}

/// Declares `$t` as an XDR struct: each field is (de)serialized in declaration order.
#[macro_export]
macro_rules! SerializeStruct {
    ($t:ident, $($field:ident),* $(,)?) => {
        impl $crate::xdr::Serialize for $t {
            fn serialize<W: ::std::io::Write>(&self, dest: &mut W) -> ::std::io::Result<()> {
                $(self.$field.serialize(dest)?;)*
                Ok(())
            }
        }
    };
}

#[macro_export]
macro_rules! DeserializeStruct {
    ($t:ident, $($field:ident),* $(,)?) => {
        impl $crate::xdr::Deserialize for $t {
            fn deserialize<R: ::std::io::Read>(&mut self, src: &mut R) -> ::std::io::Result<()> {
                $(self.$field.deserialize(src)?;)*
                Ok(())
            }
        }
    };
}

/// Declares `$t` as an XDR enum whose wire form is its 4-byte discriminant.
#[macro_export]
macro_rules! SerializeEnum {
    ($t:ident) => {
        impl $crate::xdr::SerializeEnum for $t {}
    };
}

#[macro_export]
macro_rules! DeserializeEnum {
    ($t:ident) => {
        impl $crate::xdr::DeserializeEnum for $t {}
    };
}

/// Declares `$t` as an XDR "optional" union: a 4-byte bool discriminant, followed by
/// a value of `$inner` only when true. `$t::Void` is the false arm, `$t::$case(v)` the true arm.
#[macro_export]
macro_rules! SerializeBoolUnion {
    ($t:ident, $case:ident, $inner:ty) => {
        impl $crate::xdr::Serialize for $t {
            fn serialize<W: ::std::io::Write>(&self, dest: &mut W) -> ::std::io::Result<()> {
                match self {
                    $t::Void => false.serialize(dest),
                    $t::$case(v) => {
                        true.serialize(dest)?;
                        v.serialize(dest)
                    }
                }
            }
        }
    };
}

#[macro_export]
macro_rules! DeserializeBoolUnion {
    ($t:ident, $case:ident, $inner:ty) => {
        impl $crate::xdr::Deserialize for $t {
            fn deserialize<R: ::std::io::Read>(&mut self, src: &mut R) -> ::std::io::Result<()> {
                let present: bool = $crate::xdr::deserialize(src)?;
                if present {
                    let v: $inner = $crate::xdr::deserialize(src)?;
                    *self = $t::$case(v);
                } else {
                    *self = $t::Void;
                }
                Ok(())
            }
        }
    };
}

pub use crate::DeserializeBoolUnion;
pub use crate::DeserializeEnum;
pub use crate::DeserializeStruct;
pub use crate::SerializeBoolUnion;
pub use crate::SerializeEnum;
pub use crate::SerializeStruct;
