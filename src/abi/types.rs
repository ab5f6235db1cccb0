//! ABI type descriptors and runtime values

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, I256, U256};

use crate::error::{Error, Result};

/// A Solidity parameter type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    /// `uintN`, N a multiple of 8 in 8..=256.
    Uint(usize),
    /// `intN`, N a multiple of 8 in 8..=256.
    Int(usize),
    /// `bytesN`, 1 <= N <= 32.
    FixedBytes(usize),
    /// Dynamic `bytes`.
    Bytes,
    /// Dynamic `string`.
    String,
    /// `address`, encoded as `uint160`.
    Address,
    /// `bool`, encoded as `uint8`.
    Bool,
    /// `ufixedNxM`: value scaled by `2^M`, encoded as `uintN`.
    Ufixed(usize, usize),
    /// `fixedNxM`: value scaled by `2^M`, encoded as `intN`.
    Fixed(usize, usize),
    /// Dynamic array `T[]`.
    Array(Box<ParamType>),
    /// Fixed-size array `T[K]`.
    FixedArray(Box<ParamType>, usize),
}

impl ParamType {
    /// Whether the encoding of this type lives in the tail region behind an
    /// offset word.
    pub fn is_dynamic(&self) -> bool {
        match self {
            ParamType::Bytes | ParamType::String | ParamType::Array(_) => true,
            ParamType::FixedArray(inner, _) => inner.is_dynamic(),
            _ => false,
        }
    }

    /// Bytes this type contributes to the head of a tuple encoding: 32 for
    /// leaves and dynamic pointers, `32 * K` (recursively) for static
    /// fixed-size arrays.
    pub fn head_size(&self) -> usize {
        match self {
            ParamType::FixedArray(inner, count) if !self.is_dynamic() => {
                inner.head_size() * count
            }
            _ => 32,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Uint(bits) => write!(f, "uint{bits}"),
            ParamType::Int(bits) => write!(f, "int{bits}"),
            ParamType::FixedBytes(len) => write!(f, "bytes{len}"),
            ParamType::Bytes => f.write_str("bytes"),
            ParamType::String => f.write_str("string"),
            ParamType::Address => f.write_str("address"),
            ParamType::Bool => f.write_str("bool"),
            ParamType::Ufixed(bits, exp) => write!(f, "ufixed{bits}x{exp}"),
            ParamType::Fixed(bits, exp) => write!(f, "fixed{bits}x{exp}"),
            ParamType::Array(inner) => write!(f, "{inner}[]"),
            ParamType::FixedArray(inner, count) => write!(f, "{inner}[{count}]"),
        }
    }
}

impl FromStr for ParamType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || Error::abi(format!("unsupported abi type {s:?}"));

        if let Some(body) = s.strip_suffix(']') {
            let open = body.rfind('[').ok_or_else(bad)?;
            let inner: ParamType = body[..open].parse()?;
            let count = &body[open + 1..];
            return if count.is_empty() {
                Ok(ParamType::Array(Box::new(inner)))
            } else {
                let count: usize = count.parse().map_err(|_| bad())?;
                Ok(ParamType::FixedArray(Box::new(inner), count))
            };
        }

        match s {
            "address" => return Ok(ParamType::Address),
            "bool" => return Ok(ParamType::Bool),
            "string" => return Ok(ParamType::String),
            "bytes" => return Ok(ParamType::Bytes),
            _ => {}
        }

        if let Some(rest) = s.strip_prefix("ufixed") {
            let (bits, exp) = parse_fixed_suffix(rest).ok_or_else(bad)?;
            return Ok(ParamType::Ufixed(bits, exp));
        }
        if let Some(rest) = s.strip_prefix("fixed") {
            let (bits, exp) = parse_fixed_suffix(rest).ok_or_else(bad)?;
            return Ok(ParamType::Fixed(bits, exp));
        }
        if let Some(rest) = s.strip_prefix("uint") {
            return Ok(ParamType::Uint(parse_int_bits(rest).ok_or_else(bad)?));
        }
        if let Some(rest) = s.strip_prefix("int") {
            return Ok(ParamType::Int(parse_int_bits(rest).ok_or_else(bad)?));
        }
        if let Some(rest) = s.strip_prefix("bytes") {
            let len: usize = rest.parse().map_err(|_| bad())?;
            if (1..=32).contains(&len) {
                return Ok(ParamType::FixedBytes(len));
            }
        }
        Err(bad())
    }
}

fn parse_int_bits(suffix: &str) -> Option<usize> {
    if suffix.is_empty() {
        return Some(256);
    }
    let bits: usize = suffix.parse().ok()?;
    (bits % 8 == 0 && (8..=256).contains(&bits)).then_some(bits)
}

fn parse_fixed_suffix(suffix: &str) -> Option<(usize, usize)> {
    if suffix.is_empty() {
        return Some((128, 18));
    }
    let (bits, exp) = suffix.split_once('x')?;
    let bits: usize = bits.parse().ok()?;
    let exp: usize = exp.parse().ok()?;
    (bits % 8 == 0 && (8..=256).contains(&bits) && exp <= 80).then_some((bits, exp))
}

/// Parses a comma-free list of type strings.
pub fn parse_types(types: &[&str]) -> Result<Vec<ParamType>> {
    types.iter().map(|t| t.parse()).collect()
}

/// A runtime value paired with a [`ParamType`] for encoding, or produced by
/// decoding.
///
/// Fixed-point types carry their value as the unscaled integer; the codec
/// applies the `2^M` scaling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Unsigned integer (also `ufixed` and the raw form of `address`).
    Uint(U256),
    /// Signed integer (also `fixed`).
    Int(I256),
    /// `bytesN` payload.
    FixedBytes(Vec<u8>),
    /// Dynamic byte string.
    Bytes(Vec<u8>),
    /// UTF-8 string.
    String(String),
    /// 20-byte address.
    Address(Address),
    /// Boolean.
    Bool(bool),
    /// Homogeneous array.
    Array(Vec<Value>),
}

impl Value {
    /// The contained `U256`, if this is an unsigned integer.
    pub fn as_uint(&self) -> Option<U256> {
        match self {
            Value::Uint(v) => Some(*v),
            _ => None,
        }
    }

    /// The contained address, if any.
    pub fn as_address(&self) -> Option<Address> {
        match self {
            Value::Address(a) => Some(*a),
            _ => None,
        }
    }

    /// The contained bytes, for both fixed and dynamic byte strings.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::FixedBytes(b) | Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// The contained bool, if any.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The contained string, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<U256> for Value {
    fn from(v: U256) -> Self {
        Value::Uint(v)
    }
}

impl From<Address> for Value {
    fn from(a: Address) -> Self {
        Value::Address(a)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
