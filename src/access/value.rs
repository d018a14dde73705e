use crate::error::{DbError, DbResult};
use byteorder::{BigEndian, ReadBytesExt};
use bytes::BufMut;
use std::fmt;
use std::io::Read;
use std::str::FromStr;

/// Max bytes of string payload stored per string field.
pub const STRING_LEN: usize = 128;

/// Fixed-width field types supported by the storage layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    String,
}

impl Type {
    /// Number of bytes a field of this type occupies on a page.
    pub fn byte_len(&self) -> usize {
        match self {
            Type::Int => 4,
            // Length prefix plus the padded payload.
            Type::String => STRING_LEN + 4,
        }
    }

    /// Parse a textual literal into a field of this type.
    pub fn parse_field(&self, text: &str) -> DbResult<Field> {
        match self {
            Type::Int => text.trim().parse::<i32>().map(Field::Int).map_err(|e| {
                DbError::InvalidArgument(format!("'{}' is not an int: {}", text.trim(), e))
            }),
            Type::String => Ok(Field::String(text.to_string())),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::String => write!(f, "string"),
        }
    }
}

impl FromStr for Type {
    type Err = DbError;

    fn from_str(s: &str) -> DbResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int" => Ok(Type::Int),
            "string" => Ok(Type::String),
            other => Err(DbError::InvalidArgument(format!("Unknown type: {}", other))),
        }
    }
}

/// A single typed value inside a tuple
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Int(i32),
    String(String),
}

impl Field {
    pub fn field_type(&self) -> Type {
        match self {
            Field::Int(_) => Type::Int,
            Field::String(_) => Type::String,
        }
    }

    /// Write exactly `self.field_type().byte_len()` bytes.
    pub fn serialize<B: BufMut>(&self, out: &mut B) {
        match self {
            Field::Int(v) => out.put_i32(*v),
            Field::String(s) => {
                let payload = truncate_to_boundary(s, STRING_LEN).as_bytes();
                out.put_i32(payload.len() as i32);
                out.put_slice(payload);
                out.put_bytes(0, STRING_LEN - payload.len());
            }
        }
    }

    /// Read one field of type `field_type`, consuming exactly `field_type.byte_len()` bytes.
    pub fn parse<R: Read>(field_type: Type, input: &mut R) -> DbResult<Field> {
        match field_type {
            Type::Int => {
                let v = input
                    .read_i32::<BigEndian>()
                    .map_err(|e| DbError::CorruptField(format!("int: {}", e)))?;
                Ok(Field::Int(v))
            }
            Type::String => {
                let len = input
                    .read_i32::<BigEndian>()
                    .map_err(|e| DbError::CorruptField(format!("string length: {}", e)))?;
                if len < 0 || len as usize > STRING_LEN {
                    return Err(DbError::CorruptField(format!(
                        "string length {} outside 0..={}",
                        len, STRING_LEN
                    )));
                }

                let mut payload = [0u8; STRING_LEN];
                input
                    .read_exact(&mut payload)
                    .map_err(|e| DbError::CorruptField(format!("string payload: {}", e)))?;
                let s = std::str::from_utf8(&payload[..len as usize])
                    .map_err(|e| DbError::CorruptField(format!("string payload: {}", e)))?;
                Ok(Field::String(s.to_string()))
            }
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::String(s) => write!(f, "{}", s),
        }
    }
}

fn truncate_to_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::io::Cursor;

    #[test]
    fn test_type_len() {
        assert_eq!(Type::Int.byte_len(), 4);
        assert_eq!(Type::String.byte_len(), 132);
    }

    #[test]
    fn test_type_from_str() -> Result<()> {
        assert_eq!("int".parse::<Type>()?, Type::Int);
        assert_eq!(" STRING ".parse::<Type>()?, Type::String);
        assert!("float".parse::<Type>().is_err());
        Ok(())
    }

    #[test]
    fn test_int_encoding_is_big_endian() -> Result<()> {
        let mut buf: Vec<u8> = Vec::new();
        Field::Int(0x01020304).serialize(&mut buf);
        assert_eq!(buf, vec![1, 2, 3, 4]);

        let parsed = Field::parse(Type::Int, &mut Cursor::new(&buf))?;
        assert_eq!(parsed, Field::Int(0x01020304));
        Ok(())
    }

    #[test]
    fn test_string_occupies_fixed_width() -> Result<()> {
        let mut buf: Vec<u8> = Vec::new();
        Field::String("alice".to_string()).serialize(&mut buf);
        assert_eq!(buf.len(), Type::String.byte_len());
        assert_eq!(&buf[..4], &[0, 0, 0, 5]);
        assert!(buf[9..].iter().all(|&b| b == 0));

        let parsed = Field::parse(Type::String, &mut Cursor::new(&buf))?;
        assert_eq!(parsed, Field::String("alice".to_string()));
        Ok(())
    }

    #[test]
    fn test_long_string_is_truncated() -> Result<()> {
        let long = "é".repeat(100); // 200 bytes
        let mut buf: Vec<u8> = Vec::new();
        Field::String(long).serialize(&mut buf);
        assert_eq!(buf.len(), Type::String.byte_len());

        match Field::parse(Type::String, &mut Cursor::new(&buf))? {
            Field::String(s) => {
                assert_eq!(s.len(), STRING_LEN);
                assert!(s.chars().all(|c| c == 'é'));
            }
            other => panic!("unexpected field {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_corrupt_string_length() {
        let mut buf = vec![0u8; Type::String.byte_len()];
        buf[..4].copy_from_slice(&500i32.to_be_bytes());
        let result = Field::parse(Type::String, &mut Cursor::new(&buf));
        assert!(matches!(result, Err(DbError::CorruptField(_))));
    }

    #[test]
    fn test_short_input() {
        let result = Field::parse(Type::Int, &mut Cursor::new(&[1u8, 2]));
        assert!(matches!(result, Err(DbError::CorruptField(_))));
    }

    #[test]
    fn test_parse_field_literal() -> Result<()> {
        assert_eq!(Type::Int.parse_field(" 42 ")?, Field::Int(42));
        assert_eq!(
            Type::String.parse_field("bob")?,
            Field::String("bob".to_string())
        );
        assert!(Type::Int.parse_field("forty").is_err());
        Ok(())
    }
}
