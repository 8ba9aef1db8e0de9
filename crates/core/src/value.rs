//! Tagged field values
//!
//! This module defines:
//! - ValueType: the type discriminator carried by every value
//! - TaggedValue: the self-describing union a log source hands back for
//!   record fields and metadata properties
//! - Variant: the typed accessor trait behind `get`, `get_maybe` and `set`
//!
//! ## Access Rules
//!
//! - `get::<T>()` succeeds only when the stored tag is `T`'s tag
//! - `get_maybe::<T>()` additionally maps `Null` to `None`
//! - `set::<T>()` only writes into a `Null` slot; a typed slot is never
//!   overwritten
//!
//! Any other combination fails with `InvalidDataType` (reads) or
//! `InvalidArgument` (writes).

use crate::error::{Error, Result};
use crate::types::{FileTime, Guid, Sid, SysTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Array flag OR-ed into a scalar type code.
pub const ARRAY_FLAG: u32 = 0x80;

/// Keyword bits reserved by the log source for internal use.
///
/// Sample code treats the top byte as reserved, the reference documentation
/// the top 16 bits, and at least one wrapper library none at all. Metadata
/// keyword values follow the sample code.
pub const KEYWORD_RESERVED_MASK: u64 = 0x00FF_FFFF_FFFF_FFFF;

/// Clear the reserved top byte of a keyword mask.
#[inline]
pub const fn mask_keyword(bits: u64) -> u64 {
    bits & KEYWORD_RESERVED_MASK
}

/// Type discriminator of a [`TaggedValue`].
///
/// Discriminants match the native variant type codes so a native backend can
/// map them one to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ValueType {
    Null = 0,
    String = 1,
    AnsiString = 2,
    SByte = 3,
    Byte = 4,
    Int16 = 5,
    UInt16 = 6,
    Int32 = 7,
    UInt32 = 8,
    Int64 = 9,
    UInt64 = 10,
    Single = 11,
    Double = 12,
    Boolean = 13,
    Guid = 15,
    SizeT = 16,
    FileTime = 17,
    SysTime = 18,
    Sid = 19,
    HexInt32 = 20,
    HexInt64 = 21,
    Handle = 32,
    /// String type with the array flag set
    StringArray = 1 | ARRAY_FLAG,
}

impl ValueType {
    /// Numeric type code
    #[inline]
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Map a numeric type code back to a `ValueType`.
    pub fn from_code(code: u32) -> Option<Self> {
        let t = match code {
            0 => ValueType::Null,
            1 => ValueType::String,
            2 => ValueType::AnsiString,
            3 => ValueType::SByte,
            4 => ValueType::Byte,
            5 => ValueType::Int16,
            6 => ValueType::UInt16,
            7 => ValueType::Int32,
            8 => ValueType::UInt32,
            9 => ValueType::Int64,
            10 => ValueType::UInt64,
            11 => ValueType::Single,
            12 => ValueType::Double,
            13 => ValueType::Boolean,
            15 => ValueType::Guid,
            16 => ValueType::SizeT,
            17 => ValueType::FileTime,
            18 => ValueType::SysTime,
            19 => ValueType::Sid,
            20 => ValueType::HexInt32,
            21 => ValueType::HexInt64,
            32 => ValueType::Handle,
            c if c == (1 | ARRAY_FLAG) => ValueType::StringArray,
            _ => return None,
        };
        Some(t)
    }

    /// True when the array flag is set
    pub fn is_array(self) -> bool {
        self.code() & ARRAY_FLAG != 0
    }

    /// Type name as a string
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Null => "Null",
            ValueType::String => "String",
            ValueType::AnsiString => "AnsiString",
            ValueType::SByte => "SByte",
            ValueType::Byte => "Byte",
            ValueType::Int16 => "Int16",
            ValueType::UInt16 => "UInt16",
            ValueType::Int32 => "Int32",
            ValueType::UInt32 => "UInt32",
            ValueType::Int64 => "Int64",
            ValueType::UInt64 => "UInt64",
            ValueType::Single => "Single",
            ValueType::Double => "Double",
            ValueType::Boolean => "Boolean",
            ValueType::Guid => "Guid",
            ValueType::SizeT => "SizeT",
            ValueType::FileTime => "FileTime",
            ValueType::SysTime => "SysTime",
            ValueType::Sid => "Sid",
            ValueType::HexInt32 => "HexInt32",
            ValueType::HexInt64 => "HexInt64",
            ValueType::Handle => "Handle",
            ValueType::StringArray => "Array of String",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Self-describing field value.
///
/// A value is created `Null` and assigned at most once through [`TaggedValue::set`],
/// or built directly from a payload with [`TaggedValue::new`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum TaggedValue {
    /// No value
    #[default]
    Null,
    String(String),
    AnsiString(String),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Single(f32),
    Double(f64),
    Boolean(bool),
    Guid(Guid),
    SizeT(u64),
    FileTime(FileTime),
    SysTime(SysTime),
    Sid(Sid),
    HexInt32(u32),
    HexInt64(u64),
    /// Opaque native handle
    Handle(u64),
    StringArray(Vec<String>),
}

impl TaggedValue {
    /// Build a value of `T`'s type.
    pub fn new<T: Variant>(value: T) -> Self {
        value.wrap()
    }

    /// The active type tag
    pub fn value_type(&self) -> ValueType {
        match self {
            TaggedValue::Null => ValueType::Null,
            TaggedValue::String(_) => ValueType::String,
            TaggedValue::AnsiString(_) => ValueType::AnsiString,
            TaggedValue::SByte(_) => ValueType::SByte,
            TaggedValue::Byte(_) => ValueType::Byte,
            TaggedValue::Int16(_) => ValueType::Int16,
            TaggedValue::UInt16(_) => ValueType::UInt16,
            TaggedValue::Int32(_) => ValueType::Int32,
            TaggedValue::UInt32(_) => ValueType::UInt32,
            TaggedValue::Int64(_) => ValueType::Int64,
            TaggedValue::UInt64(_) => ValueType::UInt64,
            TaggedValue::Single(_) => ValueType::Single,
            TaggedValue::Double(_) => ValueType::Double,
            TaggedValue::Boolean(_) => ValueType::Boolean,
            TaggedValue::Guid(_) => ValueType::Guid,
            TaggedValue::SizeT(_) => ValueType::SizeT,
            TaggedValue::FileTime(_) => ValueType::FileTime,
            TaggedValue::SysTime(_) => ValueType::SysTime,
            TaggedValue::Sid(_) => ValueType::Sid,
            TaggedValue::HexInt32(_) => ValueType::HexInt32,
            TaggedValue::HexInt64(_) => ValueType::HexInt64,
            TaggedValue::Handle(_) => ValueType::Handle,
            TaggedValue::StringArray(_) => ValueType::StringArray,
        }
    }

    /// Check if this is a null value
    pub fn is_null(&self) -> bool {
        matches!(self, TaggedValue::Null)
    }

    /// Decode as `T`; the tag must be exactly `T`'s tag.
    pub fn get<T: Variant>(&self) -> Result<T> {
        T::extract(self).ok_or_else(|| self.type_mismatch(T::TYPE))
    }

    /// Decode as `T`, mapping `Null` to `None`.
    pub fn get_maybe<T: Variant>(&self) -> Result<Option<T>> {
        if self.is_null() {
            return Ok(None);
        }
        self.get().map(Some)
    }

    /// Assign `value` into a `Null` slot.
    ///
    /// An already-typed slot is left untouched and the call fails with
    /// `InvalidArgument`.
    pub fn set<T: Variant>(&mut self, value: T) -> Result<()> {
        if !self.is_null() {
            return Err(Error::invalid_argument(format!(
                "cannot assign {} to a slot already holding {}",
                T::TYPE,
                self.value_type()
            )));
        }
        *self = value.wrap();
        Ok(())
    }

    /// Keyword bits of a numeric keyword value with the reserved top byte cleared.
    ///
    /// Accepts the `UInt64`, `Int64` and `HexInt64` tags, `Null` gives `None`,
    /// anything else is a type mismatch.
    pub fn get_keyword(&self) -> Result<Option<u64>> {
        match self {
            TaggedValue::Null => Ok(None),
            TaggedValue::UInt64(v) | TaggedValue::HexInt64(v) => Ok(Some(mask_keyword(*v))),
            TaggedValue::Int64(v) => Ok(Some(mask_keyword(*v as u64))),
            other => Err(other.type_mismatch(ValueType::UInt64)),
        }
    }

    fn type_mismatch(&self, expected: ValueType) -> Error {
        Error::InvalidDataType {
            expected,
            actual: self.value_type(),
        }
    }
}

impl fmt::Display for TaggedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaggedValue::Null => f.write_str("Null"),
            TaggedValue::String(s) | TaggedValue::AnsiString(s) => f.write_str(s),
            TaggedValue::SByte(v) => write!(f, "{}", v),
            TaggedValue::Byte(v) => write!(f, "{}", v),
            TaggedValue::Int16(v) => write!(f, "{}", v),
            TaggedValue::UInt16(v) => write!(f, "{}", v),
            TaggedValue::Int32(v) => write!(f, "{}", v),
            TaggedValue::UInt32(v) => write!(f, "{}", v),
            TaggedValue::Int64(v) => write!(f, "{}", v),
            TaggedValue::UInt64(v) | TaggedValue::SizeT(v) => write!(f, "{}", v),
            TaggedValue::Single(v) => write!(f, "{}", v),
            TaggedValue::Double(v) => write!(f, "{}", v),
            TaggedValue::Boolean(v) => write!(f, "{}", v),
            TaggedValue::Guid(g) => write!(f, "{{{}}}", g.hyphenated()),
            TaggedValue::FileTime(t) => match t.to_datetime() {
                Some(dt) => write!(f, "{}", dt.to_rfc3339()),
                None => write!(f, "{}", t.ticks()),
            },
            TaggedValue::SysTime(t) => write!(f, "{}", t),
            TaggedValue::Sid(s) => write!(f, "{}", s),
            TaggedValue::HexInt32(v) => write!(f, "{:#010x}", v),
            TaggedValue::HexInt64(v) => write!(f, "{:#018x}", v),
            TaggedValue::Handle(h) => write!(f, "Handle({:#x})", h),
            TaggedValue::StringArray(a) => write!(f, "[{}]", a.join(", ")),
        }
    }
}

/// A Rust type that corresponds to exactly one [`ValueType`].
///
/// Types that share a Rust representation with another tag (ANSI strings,
/// hex integers, `size_t`, handles) use the newtypes in this module.
pub trait Variant: Sized {
    /// Tag this type decodes from and encodes to
    const TYPE: ValueType;

    /// Payload if `value` carries `Self::TYPE`
    fn extract(value: &TaggedValue) -> Option<Self>;

    /// Wrap into a tagged value
    fn wrap(self) -> TaggedValue;
}

/// Narrow (ANSI) string payload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnsiString(pub String);

/// Integer rendered in hexadecimal, 32-bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HexInt32(pub u32);

/// Integer rendered in hexadecimal, 64-bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HexInt64(pub u64);

/// Pointer-sized unsigned integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SizeT(pub u64);

/// Opaque native handle payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(pub u64);

macro_rules! impl_variant {
    ($ty:ty, $tag:ident, |$v:ident| $extract:expr, |$s:ident| $wrap:expr) => {
        impl Variant for $ty {
            const TYPE: ValueType = ValueType::$tag;

            fn extract(value: &TaggedValue) -> Option<Self> {
                match value {
                    TaggedValue::$tag($v) => Some($extract),
                    _ => None,
                }
            }

            fn wrap(self) -> TaggedValue {
                let $s = self;
                TaggedValue::$tag($wrap)
            }
        }
    };
    ($ty:ty, $tag:ident) => {
        impl_variant!($ty, $tag, |v| v.clone(), |s| s);
    };
}

impl_variant!(String, String);
impl_variant!(i8, SByte);
impl_variant!(u8, Byte);
impl_variant!(i16, Int16);
impl_variant!(u16, UInt16);
impl_variant!(i32, Int32);
impl_variant!(u32, UInt32);
impl_variant!(i64, Int64);
impl_variant!(u64, UInt64);
impl_variant!(f32, Single);
impl_variant!(f64, Double);
impl_variant!(bool, Boolean);
impl_variant!(Guid, Guid);
impl_variant!(FileTime, FileTime);
impl_variant!(SysTime, SysTime);
impl_variant!(Sid, Sid);
impl_variant!(Vec<String>, StringArray);
impl_variant!(AnsiString, AnsiString, |v| AnsiString(v.clone()), |s| s.0);
impl_variant!(HexInt32, HexInt32, |v| HexInt32(*v), |s| s.0);
impl_variant!(HexInt64, HexInt64, |v| HexInt64(*v), |s| s.0);
impl_variant!(SizeT, SizeT, |v| SizeT(*v), |s| s.0);
impl_variant!(RawHandle, Handle, |v| RawHandle(*v), |s| s.0);
