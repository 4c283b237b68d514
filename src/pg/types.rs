//! PostgreSQL type encoding and decoding.
//!
//! Binary format codecs for the handful of types this client consumes:
//! booleans, integers, floats, text and bytea. NUMERIC columns decode from
//! the text format only; in binary they are carried as raw bytes.

use super::error::{PgError, PgResult};

// ============================================================================
// Type OIDs
// ============================================================================

/// PostgreSQL type object identifiers (OIDs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Oid(pub i32);

impl Oid {
    pub const BOOL: Oid = Oid(16);
    pub const BYTEA: Oid = Oid(17);
    pub const CHAR: Oid = Oid(18);
    pub const NAME: Oid = Oid(19);
    pub const INT8: Oid = Oid(20);
    pub const INT2: Oid = Oid(21);
    pub const INT4: Oid = Oid(23);
    pub const TEXT: Oid = Oid(25);
    pub const FLOAT4: Oid = Oid(700);
    pub const FLOAT8: Oid = Oid(701);
    pub const VARCHAR: Oid = Oid(1043);
    pub const BPCHAR: Oid = Oid(1042);
    pub const NUMERIC: Oid = Oid(1700);

    /// Create from raw i32 value
    #[inline]
    pub fn from_i32(oid: i32) -> Self {
        Oid(oid)
    }

    /// Get the raw i32 value
    #[inline]
    pub fn as_i32(self) -> i32 {
        self.0
    }

    /// Check if this is a text-like type
    pub fn is_text_like(self) -> bool {
        matches!(
            self,
            Oid::TEXT | Oid::VARCHAR | Oid::BPCHAR | Oid::CHAR | Oid::NAME
        )
    }

    /// Check if this is an integer type
    pub fn is_integer(self) -> bool {
        matches!(self, Oid::INT2 | Oid::INT4 | Oid::INT8)
    }
}

// ============================================================================
// PostgreSQL Values
// ============================================================================

/// A PostgreSQL value with type information.
#[derive(Debug, Clone, PartialEq)]
pub enum PgValue {
    Null,
    Bool(bool),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float4(f32),
    Float8(f64),
    Text(String),
    Bytea(Vec<u8>),
    // For types we don't handle specially - store raw bytes
    Raw { oid: Oid, data: Vec<u8> },
}

impl PgValue {
    /// Check if this value is NULL
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, PgValue::Null)
    }

    /// Encode this value to binary format.
    pub fn encode_binary(&self) -> Vec<u8> {
        match self {
            PgValue::Null => vec![],
            PgValue::Bool(v) => vec![if *v { 1 } else { 0 }],
            PgValue::Int2(v) => v.to_be_bytes().to_vec(),
            PgValue::Int4(v) => v.to_be_bytes().to_vec(),
            PgValue::Int8(v) => v.to_be_bytes().to_vec(),
            PgValue::Float4(v) => v.to_be_bytes().to_vec(),
            PgValue::Float8(v) => v.to_be_bytes().to_vec(),
            PgValue::Text(v) => v.as_bytes().to_vec(),
            PgValue::Bytea(v) => v.clone(),
            PgValue::Raw { data, .. } => data.clone(),
        }
    }

    /// Get the OID for this value's type
    pub fn type_oid(&self) -> Oid {
        match self {
            PgValue::Null => Oid::TEXT, // NULL doesn't have a specific type
            PgValue::Bool(_) => Oid::BOOL,
            PgValue::Int2(_) => Oid::INT2,
            PgValue::Int4(_) => Oid::INT4,
            PgValue::Int8(_) => Oid::INT8,
            PgValue::Float4(_) => Oid::FLOAT4,
            PgValue::Float8(_) => Oid::FLOAT8,
            PgValue::Text(_) => Oid::TEXT,
            PgValue::Bytea(_) => Oid::BYTEA,
            PgValue::Raw { oid, .. } => *oid,
        }
    }

    /// Decode a value from binary format.
    pub fn decode_binary(oid: Oid, data: &[u8]) -> PgResult<Self> {
        match oid {
            Oid::BOOL => {
                if data.is_empty() {
                    return Err(PgError::Type("Empty data for BOOL".to_string()));
                }
                Ok(PgValue::Bool(data[0] != 0))
            }

            Oid::INT2 => {
                if data.len() != 2 {
                    return Err(PgError::Type(format!(
                        "Invalid INT2 length: {}",
                        data.len()
                    )));
                }
                Ok(PgValue::Int2(i16::from_be_bytes(data.try_into().unwrap())))
            }

            Oid::INT4 => {
                if data.len() != 4 {
                    return Err(PgError::Type(format!(
                        "Invalid INT4 length: {}",
                        data.len()
                    )));
                }
                Ok(PgValue::Int4(i32::from_be_bytes(data.try_into().unwrap())))
            }

            Oid::INT8 => {
                if data.len() != 8 {
                    return Err(PgError::Type(format!(
                        "Invalid INT8 length: {}",
                        data.len()
                    )));
                }
                Ok(PgValue::Int8(i64::from_be_bytes(data.try_into().unwrap())))
            }

            Oid::FLOAT4 => {
                if data.len() != 4 {
                    return Err(PgError::Type(format!(
                        "Invalid FLOAT4 length: {}",
                        data.len()
                    )));
                }
                Ok(PgValue::Float4(f32::from_be_bytes(
                    data.try_into().unwrap(),
                )))
            }

            Oid::FLOAT8 => {
                if data.len() != 8 {
                    return Err(PgError::Type(format!(
                        "Invalid FLOAT8 length: {}",
                        data.len()
                    )));
                }
                Ok(PgValue::Float8(f64::from_be_bytes(
                    data.try_into().unwrap(),
                )))
            }

            Oid::TEXT | Oid::VARCHAR | Oid::BPCHAR | Oid::CHAR | Oid::NAME => {
                match std::str::from_utf8(data) {
                    Ok(s) => Ok(PgValue::Text(s.to_owned())),
                    Err(e) => Err(PgError::Type(format!("Invalid UTF-8 in TEXT: {}", e))),
                }
            }

            Oid::BYTEA => Ok(PgValue::Bytea(data.to_vec())),

            // NUMERIC binary format is a base-10000 digit array; this client
            // requests text results when it needs the value, so keep the bytes.
            _ => Ok(PgValue::Raw {
                oid,
                data: data.to_vec(),
            }),
        }
    }

    /// Decode from text format (simple query protocol, NUMERIC results).
    pub fn decode_text(oid: Oid, data: &[u8]) -> PgResult<Self> {
        let text = String::from_utf8_lossy(data).to_string();

        match oid {
            Oid::BOOL => {
                let v = text == "t" || text == "true" || text == "1";
                Ok(PgValue::Bool(v))
            }

            Oid::INT2 => text
                .parse::<i16>()
                .map(PgValue::Int2)
                .map_err(|e| PgError::Type(format!("Invalid INT2: {}", e))),

            Oid::INT4 => text
                .parse::<i32>()
                .map(PgValue::Int4)
                .map_err(|e| PgError::Type(format!("Invalid INT4: {}", e))),

            Oid::INT8 => text
                .parse::<i64>()
                .map(PgValue::Int8)
                .map_err(|e| PgError::Type(format!("Invalid INT8: {}", e))),

            Oid::FLOAT4 => text
                .parse::<f32>()
                .map(PgValue::Float4)
                .map_err(|e| PgError::Type(format!("Invalid FLOAT4: {}", e))),

            Oid::FLOAT8 | Oid::NUMERIC => text
                .parse::<f64>()
                .map(PgValue::Float8)
                .map_err(|e| PgError::Type(format!("Invalid FLOAT8: {}", e))),

            // Default: treat as text
            _ => Ok(PgValue::Text(text)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oid_classification() {
        assert!(Oid::TEXT.is_text_like());
        assert!(Oid::VARCHAR.is_text_like());
        assert!(!Oid::INT4.is_text_like());

        assert!(Oid::INT4.is_integer());
        assert!(Oid::INT8.is_integer());
        assert!(!Oid::FLOAT8.is_integer());
    }

    #[test]
    fn test_int8_roundtrip() {
        let original = PgValue::Int8(9_007_199_254_740_991);
        let encoded = original.encode_binary();
        let decoded = PgValue::decode_binary(Oid::INT8, &encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_text_roundtrip() {
        let original = PgValue::Text("Chai".to_string());
        let encoded = original.encode_binary();
        let decoded = PgValue::decode_binary(Oid::TEXT, &encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_numeric_text_decode() {
        let decoded = PgValue::decode_text(Oid::NUMERIC, b"150.50").unwrap();
        assert_eq!(decoded, PgValue::Float8(150.5));
    }

    #[test]
    fn test_invalid_int4_length() {
        assert!(PgValue::decode_binary(Oid::INT4, &[0, 1]).is_err());
    }
}
