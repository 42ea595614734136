//! Typed attribute values carried by descriptors and metadata records.

use std::fmt;
use std::str::FromStr;

use mt_common::strings::{trim_nul, utf16_decode, utf16_encode};
use mt_common::{TagError, TagResult};

use crate::guid::Guid;

/// Where a value is stored. Booleans are a DWORD in extended content
/// descriptors and a WORD in metadata records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueContext {
    Descriptor,
    Record,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum ValueType {
    Unicode = 0,
    Bytes = 1,
    Bool = 2,
    DWord = 3,
    QWord = 4,
    Word = 5,
    Guid = 6,
}

impl ValueType {
    pub fn from_u16(code: u16) -> Option<Self> {
        Some(match code {
            0 => Self::Unicode,
            1 => Self::Bytes,
            2 => Self::Bool,
            3 => Self::DWord,
            4 => Self::QWord,
            5 => Self::Word,
            6 => Self::Guid,
            _ => return None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributeValue {
    Unicode(String),
    Bytes(Vec<u8>),
    Bool(bool),
    DWord(u32),
    QWord(u64),
    Word(u16),
    Guid(Guid),
}

impl AttributeValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Unicode(_) => ValueType::Unicode,
            Self::Bytes(_) => ValueType::Bytes,
            Self::Bool(_) => ValueType::Bool,
            Self::DWord(_) => ValueType::DWord,
            Self::QWord(_) => ValueType::QWord,
            Self::Word(_) => ValueType::Word,
            Self::Guid(_) => ValueType::Guid,
        }
    }

    /// Decode `data` as a value of type `code`. `offset` locates the value
    /// for error messages.
    pub fn decode(code: u16, data: &[u8], context: ValueContext, offset: u64) -> TagResult<Self> {
        let value_type = ValueType::from_u16(code).ok_or_else(|| {
            TagError::corrupt(offset, format!("unknown attribute value type {code}"))
        })?;
        let fixed = |n: usize| fixed_width(data, n, value_type, offset);
        Ok(match value_type {
            ValueType::Unicode => {
                Self::Unicode(trim_nul(&utf16_decode(data, false)).to_string())
            }
            ValueType::Bytes => Self::Bytes(data.to_vec()),
            ValueType::Bool => {
                let width = match context {
                    ValueContext::Descriptor => 4,
                    ValueContext::Record => 2,
                };
                Self::Bool(fixed(width)?.iter().any(|&b| b != 0))
            }
            ValueType::DWord => {
                let b = fixed(4)?;
                Self::DWord(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            }
            ValueType::QWord => {
                let mut b = [0u8; 8];
                b.copy_from_slice(fixed(8)?);
                Self::QWord(u64::from_le_bytes(b))
            }
            ValueType::Word => {
                let b = fixed(2)?;
                Self::Word(u16::from_le_bytes([b[0], b[1]]))
            }
            ValueType::Guid => {
                let mut b = [0u8; 16];
                b.copy_from_slice(fixed(16)?);
                Self::Guid(Guid(b))
            }
        })
    }

    /// Encoded value bytes. Unicode strings get a NUL terminator.
    pub fn encode(&self, context: ValueContext) -> Vec<u8> {
        match self {
            Self::Unicode(s) => {
                let mut out = utf16_encode(s, false);
                out.extend_from_slice(&[0, 0]);
                out
            }
            Self::Bytes(b) => b.clone(),
            Self::Bool(v) => match context {
                ValueContext::Descriptor => (*v as u32).to_le_bytes().to_vec(),
                ValueContext::Record => (*v as u16).to_le_bytes().to_vec(),
            },
            Self::DWord(v) => v.to_le_bytes().to_vec(),
            Self::QWord(v) => v.to_le_bytes().to_vec(),
            Self::Word(v) => v.to_le_bytes().to_vec(),
            Self::Guid(g) => g.0.to_vec(),
        }
    }

    // ─── Coercive accessors ─────────────────────────────────────────

    pub fn to_string_value(&self) -> String {
        match self {
            Self::Unicode(s) => s.clone(),
            Self::Bytes(_) => String::new(),
            Self::Bool(v) => (if *v { "1" } else { "0" }).to_string(),
            Self::DWord(v) => v.to_string(),
            Self::QWord(v) => v.to_string(),
            Self::Word(v) => v.to_string(),
            Self::Guid(g) => g.to_string(),
        }
    }

    pub fn to_bool(&self) -> bool {
        match self {
            Self::Unicode(s) => matches!(s.trim(), "1" | "true" | "True" | "TRUE"),
            Self::Bytes(b) => b.iter().any(|&x| x != 0),
            Self::Guid(g) => *g != Guid::default(),
            _ => self.to_qword() != 0,
        }
    }

    pub fn to_qword(&self) -> u64 {
        match self {
            Self::Unicode(s) => parse_leading(s).unwrap_or(0),
            Self::Bytes(b) => {
                let mut buf = [0u8; 8];
                let n = b.len().min(8);
                buf[..n].copy_from_slice(&b[..n]);
                u64::from_le_bytes(buf)
            }
            Self::Bool(v) => *v as u64,
            Self::DWord(v) => *v as u64,
            Self::QWord(v) => *v,
            Self::Word(v) => *v as u64,
            Self::Guid(_) => 0,
        }
    }

    /// Unicode text must fit in 32 bits; wider numeric types are truncated.
    pub fn to_dword(&self) -> u32 {
        match self {
            Self::Unicode(s) => parse_leading(s).unwrap_or(0),
            _ => self.to_qword() as u32,
        }
    }

    pub fn to_word(&self) -> u16 {
        match self {
            Self::Unicode(s) => parse_leading(s).unwrap_or(0),
            _ => self.to_qword() as u16,
        }
    }

    pub fn to_guid(&self) -> Option<Guid> {
        match self {
            Self::Guid(g) => Some(*g),
            Self::Unicode(s) => s.parse().ok(),
            Self::Bytes(b) => <[u8; 16]>::try_from(b.as_slice()).ok().map(Guid),
            _ => None,
        }
    }

    /// Record-context encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode(ValueContext::Record)
    }
}

/// Leading decimal digits of `text` as `T`, so `"7/12"` reads as 7.
/// `None` when there are no digits or they overflow `T`.
fn parse_leading<T: FromStr>(text: &str) -> Option<T> {
    let text = text.trim_start();
    let end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    text[..end].parse().ok()
}

fn fixed_width(data: &[u8], n: usize, value_type: ValueType, offset: u64) -> TagResult<&[u8]> {
    data.get(..n).ok_or_else(|| {
        TagError::corrupt(
            offset,
            format!("{value_type:?} value needs {n} bytes, has {}", data.len()),
        )
    })
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_value())
    }
}

/// A named value with its stream and language scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub value: AttributeValue,
    pub stream: u16,
    pub language: u16,
}

impl Attribute {
    pub fn new(value: AttributeValue) -> Self {
        Self {
            value,
            stream: 0,
            language: 0,
        }
    }

    pub fn with_stream(mut self, stream: u16) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_language(mut self, language: u16) -> Self {
        self.language = language;
        self
    }

    /// Size of the record-context encoding.
    pub fn data_size(&self) -> usize {
        self.value.encode(ValueContext::Record).len()
    }
}

impl From<&str> for Attribute {
    fn from(text: &str) -> Self {
        Self::new(AttributeValue::Unicode(text.to_string()))
    }
}
