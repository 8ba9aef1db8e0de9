//! Binary wire format for tagged values
//!
//! ## Layout
//!
//! ```text
//! [Type code: u32 LE]
//! [Payload]
//!   Null                      -> nothing
//!   SByte/Byte/Boolean        -> 1 byte
//!   Int16/UInt16              -> 2 bytes LE
//!   Int32/UInt32/HexInt32     -> 4 bytes LE
//!   Int64/UInt64/HexInt64/
//!   SizeT/FileTime/Handle     -> 8 bytes LE
//!   Single/Double             -> IEEE 754 LE
//!   Guid                      -> 16 bytes (RFC 4122 byte order)
//!   SysTime                   -> 8 x u16 LE
//!   String/AnsiString/Sid     -> [Length: u32 LE][Bytes]
//!   StringArray               -> [Count: u32 LE] then Count strings
//! ```

use crate::error::{Error, Result};
use crate::types::{FileTime, Guid, Sid, SysTime};
use crate::value::{TaggedValue, ValueType};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

fn io_err(e: std::io::Error) -> Error {
    Error::invalid_argument(format!("tagged value codec: {}", e))
}

/// Encode one value into `writer`.
pub fn encode<W: Write>(value: &TaggedValue, writer: &mut W) -> Result<()> {
    writer
        .write_u32::<LittleEndian>(value.value_type().code())
        .map_err(io_err)?;

    match value {
        TaggedValue::Null => Ok(()),
        TaggedValue::String(s) | TaggedValue::AnsiString(s) => write_bytes(writer, s.as_bytes()),
        TaggedValue::SByte(v) => writer.write_i8(*v).map_err(io_err),
        TaggedValue::Byte(v) => writer.write_u8(*v).map_err(io_err),
        TaggedValue::Boolean(v) => writer.write_u8(u8::from(*v)).map_err(io_err),
        TaggedValue::Int16(v) => writer.write_i16::<LittleEndian>(*v).map_err(io_err),
        TaggedValue::UInt16(v) => writer.write_u16::<LittleEndian>(*v).map_err(io_err),
        TaggedValue::Int32(v) => writer.write_i32::<LittleEndian>(*v).map_err(io_err),
        TaggedValue::UInt32(v) | TaggedValue::HexInt32(v) => {
            writer.write_u32::<LittleEndian>(*v).map_err(io_err)
        }
        TaggedValue::Int64(v) => writer.write_i64::<LittleEndian>(*v).map_err(io_err),
        TaggedValue::UInt64(v)
        | TaggedValue::HexInt64(v)
        | TaggedValue::SizeT(v)
        | TaggedValue::Handle(v) => writer.write_u64::<LittleEndian>(*v).map_err(io_err),
        TaggedValue::FileTime(t) => writer.write_u64::<LittleEndian>(t.ticks()).map_err(io_err),
        TaggedValue::Single(v) => writer.write_f32::<LittleEndian>(*v).map_err(io_err),
        TaggedValue::Double(v) => writer.write_f64::<LittleEndian>(*v).map_err(io_err),
        TaggedValue::Guid(g) => writer.write_all(g.as_bytes()).map_err(io_err),
        TaggedValue::SysTime(t) => {
            for part in [
                t.year,
                t.month,
                t.day_of_week,
                t.day,
                t.hour,
                t.minute,
                t.second,
                t.milliseconds,
            ] {
                writer.write_u16::<LittleEndian>(part).map_err(io_err)?;
            }
            Ok(())
        }
        TaggedValue::Sid(sid) => write_bytes(writer, sid.as_bytes()),
        TaggedValue::StringArray(items) => {
            writer
                .write_u32::<LittleEndian>(length_prefix(items.len())?)
                .map_err(io_err)?;
            for item in items {
                write_bytes(writer, item.as_bytes())?;
            }
            Ok(())
        }
    }
}

/// Encode one value into a fresh buffer.
pub fn encode_to_vec(value: &TaggedValue) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode(value, &mut buf)?;
    Ok(buf)
}

/// Decode one value from `reader`.
pub fn decode<R: Read>(reader: &mut R) -> Result<TaggedValue> {
    let code = reader.read_u32::<LittleEndian>().map_err(io_err)?;
    let ty = ValueType::from_code(code)
        .ok_or_else(|| Error::invalid_argument(format!("unknown type code {:#x}", code)))?;

    let value = match ty {
        ValueType::Null => TaggedValue::Null,
        ValueType::String => TaggedValue::String(read_string(reader)?),
        ValueType::AnsiString => TaggedValue::AnsiString(read_string(reader)?),
        ValueType::SByte => TaggedValue::SByte(reader.read_i8().map_err(io_err)?),
        ValueType::Byte => TaggedValue::Byte(reader.read_u8().map_err(io_err)?),
        ValueType::Boolean => TaggedValue::Boolean(reader.read_u8().map_err(io_err)? != 0),
        ValueType::Int16 => TaggedValue::Int16(reader.read_i16::<LittleEndian>().map_err(io_err)?),
        ValueType::UInt16 => {
            TaggedValue::UInt16(reader.read_u16::<LittleEndian>().map_err(io_err)?)
        }
        ValueType::Int32 => TaggedValue::Int32(reader.read_i32::<LittleEndian>().map_err(io_err)?),
        ValueType::UInt32 => {
            TaggedValue::UInt32(reader.read_u32::<LittleEndian>().map_err(io_err)?)
        }
        ValueType::HexInt32 => {
            TaggedValue::HexInt32(reader.read_u32::<LittleEndian>().map_err(io_err)?)
        }
        ValueType::Int64 => TaggedValue::Int64(reader.read_i64::<LittleEndian>().map_err(io_err)?),
        ValueType::UInt64 => {
            TaggedValue::UInt64(reader.read_u64::<LittleEndian>().map_err(io_err)?)
        }
        ValueType::HexInt64 => {
            TaggedValue::HexInt64(reader.read_u64::<LittleEndian>().map_err(io_err)?)
        }
        ValueType::SizeT => TaggedValue::SizeT(reader.read_u64::<LittleEndian>().map_err(io_err)?),
        ValueType::Handle => {
            TaggedValue::Handle(reader.read_u64::<LittleEndian>().map_err(io_err)?)
        }
        ValueType::FileTime => TaggedValue::FileTime(FileTime(
            reader.read_u64::<LittleEndian>().map_err(io_err)?,
        )),
        ValueType::Single => {
            TaggedValue::Single(reader.read_f32::<LittleEndian>().map_err(io_err)?)
        }
        ValueType::Double => {
            TaggedValue::Double(reader.read_f64::<LittleEndian>().map_err(io_err)?)
        }
        ValueType::Guid => {
            let mut bytes = [0u8; 16];
            reader.read_exact(&mut bytes).map_err(io_err)?;
            TaggedValue::Guid(Guid::from_bytes(bytes))
        }
        ValueType::SysTime => {
            let mut parts = [0u16; 8];
            for part in parts.iter_mut() {
                *part = reader.read_u16::<LittleEndian>().map_err(io_err)?;
            }
            TaggedValue::SysTime(SysTime {
                year: parts[0],
                month: parts[1],
                day_of_week: parts[2],
                day: parts[3],
                hour: parts[4],
                minute: parts[5],
                second: parts[6],
                milliseconds: parts[7],
            })
        }
        ValueType::Sid => TaggedValue::Sid(Sid::from_bytes(read_bytes(reader)?)),
        ValueType::StringArray => {
            let count = reader.read_u32::<LittleEndian>().map_err(io_err)?;
            let mut items = Vec::new();
            for _ in 0..count {
                items.push(read_string(reader)?);
            }
            TaggedValue::StringArray(items)
        }
    };
    Ok(value)
}

/// Decode one value from a byte slice.
pub fn decode_from_slice(mut bytes: &[u8]) -> Result<TaggedValue> {
    decode(&mut bytes)
}

/// Length prefixes are 32-bit; longer payloads cannot be encoded.
fn length_prefix(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        Error::invalid_argument(format!(
            "tagged value codec: length {} exceeds the 32-bit length prefix",
            len
        ))
    })
}

fn write_bytes<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    writer
        .write_u32::<LittleEndian>(length_prefix(bytes.len())?)
        .map_err(io_err)?;
    writer.write_all(bytes).map_err(io_err)
}

fn read_bytes<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let len = reader.read_u32::<LittleEndian>().map_err(io_err)? as usize;
    let mut buf = Vec::new();
    reader
        .take(len as u64)
        .read_to_end(&mut buf)
        .map_err(io_err)?;
    if buf.len() != len {
        return Err(Error::invalid_argument(format!(
            "tagged value codec: truncated payload, expected {} bytes, got {}",
            len,
            buf.len()
        )));
    }
    Ok(buf)
}

fn read_string<R: Read>(reader: &mut R) -> Result<String> {
    String::from_utf8(read_bytes(reader)?)
        .map_err(|e| Error::invalid_argument(format!("tagged value codec: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_guid() -> impl Strategy<Value = Guid> {
        any::<[u8; 16]>().prop_map(Guid::from_bytes)
    }

    fn arb_tagged_value() -> impl Strategy<Value = TaggedValue> {
        prop_oneof![
            Just(TaggedValue::Null),
            ".*".prop_map(TaggedValue::String),
            "[ -~]*".prop_map(TaggedValue::AnsiString),
            any::<i8>().prop_map(TaggedValue::SByte),
            any::<u8>().prop_map(TaggedValue::Byte),
            any::<i16>().prop_map(TaggedValue::Int16),
            any::<u16>().prop_map(TaggedValue::UInt16),
            any::<i32>().prop_map(TaggedValue::Int32),
            any::<u32>().prop_map(TaggedValue::UInt32),
            any::<i64>().prop_map(TaggedValue::Int64),
            any::<u64>().prop_map(TaggedValue::UInt64),
            (-1.0e30f32..1.0e30f32).prop_map(TaggedValue::Single),
            (-1.0e300f64..1.0e300f64).prop_map(TaggedValue::Double),
            any::<bool>().prop_map(TaggedValue::Boolean),
            arb_guid().prop_map(TaggedValue::Guid),
            any::<u64>().prop_map(TaggedValue::SizeT),
            any::<u64>().prop_map(|t| TaggedValue::FileTime(FileTime(t))),
            any::<[u16; 8]>().prop_map(|p| TaggedValue::SysTime(SysTime {
                year: p[0],
                month: p[1],
                day_of_week: p[2],
                day: p[3],
                hour: p[4],
                minute: p[5],
                second: p[6],
                milliseconds: p[7],
            })),
            prop::collection::vec(any::<u8>(), 0..68)
                .prop_map(|b| TaggedValue::Sid(Sid::from_bytes(b))),
            any::<u32>().prop_map(TaggedValue::HexInt32),
            any::<u64>().prop_map(TaggedValue::HexInt64),
            any::<u64>().prop_map(TaggedValue::Handle),
            prop::collection::vec(".*", 0..6).prop_map(TaggedValue::StringArray),
        ]
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(value in arb_tagged_value()) {
            let bytes = encode_to_vec(&value).unwrap();
            let decoded = decode_from_slice(&bytes).unwrap();
            prop_assert_eq!(decoded, value);
        }
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_length_prefix_limit() {
        assert_eq!(length_prefix(u32::MAX as usize), Ok(u32::MAX));
        assert!(matches!(
            length_prefix(usize::MAX),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_unknown_type_code_rejected() {
        let bytes = 14u32.to_le_bytes();
        assert!(matches!(
            decode_from_slice(&bytes),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_truncated_string_rejected() {
        let mut bytes = encode_to_vec(&TaggedValue::String("hello".into())).unwrap();
        bytes.truncate(bytes.len() - 2);
        assert!(decode_from_slice(&bytes).is_err());
    }

    #[test]
    fn test_null_is_type_code_only() {
        assert_eq!(encode_to_vec(&TaggedValue::Null).unwrap(), vec![0, 0, 0, 0]);
    }
}
