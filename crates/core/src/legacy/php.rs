//! Decoder for PHP `serialize()` output.
//!
//! Horde stores array-valued preferences in this format. Only the scalar and
//! array types are accepted:
//!
//! ```text
//! N;                  null
//! b:1;                bool
//! i:-42;              int
//! d:0.5;              float
//! s:5:"hello";        string, length in bytes
//! a:1:{i:0;s:1:"x";}  array of key/value pairs
//! ```
//!
//! Objects, references and custom-serialized values are rejected.

use crate::errors::DecodeError;

/// Arrays nested deeper than this are rejected.
const MAX_DEPTH: usize = 32;

/// Key of a PHP array entry.
#[derive(Debug, Clone, PartialEq)]
pub enum PhpKey {
    Int(i64),
    Str(String),
}

/// A decoded PHP value.
#[derive(Debug, Clone, PartialEq)]
pub enum PhpValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Entries in serialized order.
    Array(Vec<(PhpKey, PhpValue)>),
}

impl PhpValue {
    /// Look up an entry of an array by string key.
    pub fn get(&self, key: &str) -> Option<&PhpValue> {
        match self {
            Self::Array(entries) => entries
                .iter()
                .find(|(k, _)| matches!(k, PhpKey::Str(s) if s == key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// PHP truthiness: `false`, `0`, `0.0`, `""`, `"0"`, `null` and the empty
    /// array are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !(s.is_empty() || s == "0"),
            Self::Array(entries) => !entries.is_empty(),
        }
    }

    /// Short type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Array(_) => "array",
        }
    }
}

/// Decode a complete serialized value. Surrounding whitespace is ignored;
/// anything else after the value is an error.
pub fn unserialize(input: &[u8]) -> Result<PhpValue, DecodeError> {
    let end = input
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    let start = input[..end]
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(end);

    let mut parser = Parser {
        input: &input[..end],
        pos: start,
    };
    let value = parser.value(0)?;
    if parser.pos != parser.input.len() {
        return Err(DecodeError::TrailingData(parser.pos));
    }
    Ok(value)
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn value(&mut self, depth: usize) -> Result<PhpValue, DecodeError> {
        let offset = self.pos;
        let tag = self.next()?;
        match tag {
            b'N' => {
                self.expect(b';', "';'")?;
                Ok(PhpValue::Null)
            }
            b'b' => {
                self.expect(b':', "':'")?;
                let offset = self.pos;
                match self.until(b';')? {
                    "0" => Ok(PhpValue::Bool(false)),
                    "1" => Ok(PhpValue::Bool(true)),
                    other => Err(DecodeError::InvalidNumber {
                        offset,
                        detail: format!("bool must be 0 or 1, got '{}'", other),
                    }),
                }
            }
            b'i' => {
                self.expect(b':', "':'")?;
                Ok(PhpValue::Int(self.int(b';')?))
            }
            b'd' => {
                self.expect(b':', "':'")?;
                let offset = self.pos;
                let raw = self.until(b';')?;
                let value = match raw {
                    "INF" => f64::INFINITY,
                    "-INF" => f64::NEG_INFINITY,
                    "NAN" => f64::NAN,
                    _ => raw.parse().map_err(|_| DecodeError::InvalidNumber {
                        offset,
                        detail: format!("'{}' is not a float", raw),
                    })?,
                };
                Ok(PhpValue::Float(value))
            }
            b's' => {
                self.expect(b':', "':'")?;
                Ok(PhpValue::Str(self.string_body()?))
            }
            b'a' => {
                if depth >= MAX_DEPTH {
                    return Err(DecodeError::Shape(format!(
                        "arrays nested deeper than {} levels",
                        MAX_DEPTH
                    )));
                }
                self.expect(b':', "':'")?;
                let count = self.length(b':')?;
                self.expect(b'{', "'{'")?;
                // Cap the preallocation; the count is untrusted.
                let mut entries = Vec::with_capacity(count.min(64));
                for _ in 0..count {
                    let key = self.key()?;
                    let value = self.value(depth + 1)?;
                    entries.push((key, value));
                }
                self.expect(b'}', "'}'")?;
                Ok(PhpValue::Array(entries))
            }
            b'O' | b'C' | b'r' | b'R' | b'E' | b'S' => Err(DecodeError::UnsupportedType {
                offset,
                tag: tag as char,
            }),
            other => Err(DecodeError::UnexpectedByte {
                offset,
                found: other as char,
                expected: "a type tag",
            }),
        }
    }

    fn key(&mut self) -> Result<PhpKey, DecodeError> {
        let offset = self.pos;
        match self.next()? {
            b'i' => {
                self.expect(b':', "':'")?;
                Ok(PhpKey::Int(self.int(b';')?))
            }
            b's' => {
                self.expect(b':', "':'")?;
                Ok(PhpKey::Str(self.string_body()?))
            }
            other => Err(DecodeError::UnexpectedByte {
                offset,
                found: other as char,
                expected: "an int or string array key",
            }),
        }
    }

    /// Parse `<len>:"<bytes>";` after the `s:` prefix.
    fn string_body(&mut self) -> Result<String, DecodeError> {
        let len = self.length(b':')?;
        self.expect(b'"', "'\"'")?;
        let start = self.pos;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= self.input.len())
            .ok_or(DecodeError::UnexpectedEof(self.input.len()))?;
        let text = std::str::from_utf8(&self.input[start..end])
            .map_err(|_| DecodeError::InvalidUtf8(start))?
            .to_string();
        self.pos = end;
        self.expect(b'"', "'\"' closing a string")?;
        self.expect(b';', "';'")?;
        Ok(text)
    }

    fn length(&mut self, delim: u8) -> Result<usize, DecodeError> {
        let offset = self.pos;
        let raw = self.until(delim)?;
        raw.parse().map_err(|_| DecodeError::InvalidNumber {
            offset,
            detail: format!("'{}' is not a length", raw),
        })
    }

    fn int(&mut self, delim: u8) -> Result<i64, DecodeError> {
        let offset = self.pos;
        let raw = self.until(delim)?;
        raw.parse().map_err(|_| DecodeError::InvalidNumber {
            offset,
            detail: format!("'{}' is not an integer", raw),
        })
    }

    /// Consume up to and including `delim`, returning the text before it.
    fn until(&mut self, delim: u8) -> Result<&'a str, DecodeError> {
        let input = self.input;
        let start = self.pos;
        let rel = input[start..]
            .iter()
            .position(|b| *b == delim)
            .ok_or(DecodeError::UnexpectedEof(input.len()))?;
        let raw = std::str::from_utf8(&input[start..start + rel])
            .map_err(|_| DecodeError::InvalidUtf8(start))?;
        self.pos = start + rel + 1;
        Ok(raw)
    }

    fn expect(&mut self, byte: u8, expected: &'static str) -> Result<(), DecodeError> {
        let offset = self.pos;
        let found = self.next()?;
        if found != byte {
            return Err(DecodeError::UnexpectedByte {
                offset,
                found: found as char,
                expected,
            });
        }
        Ok(())
    }

    fn next(&mut self) -> Result<u8, DecodeError> {
        let byte = *self
            .input
            .get(self.pos)
            .ok_or(DecodeError::UnexpectedEof(self.pos))?;
        self.pos += 1;
        Ok(byte)
    }
}
