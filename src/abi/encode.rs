//! ABI encoding: standard head/tail layout and the non-standard packed form

use alloy_primitives::{I256, U256};

use super::types::{ParamType, Value};
use crate::error::{Error, Result};

/// Encodes a tuple of values under the given types.
///
/// Dynamic values contribute a 32-byte offset to the head and their payload
/// to the tail; static values are encoded inline.
pub fn encode(types: &[ParamType], values: &[Value]) -> Result<Vec<u8>> {
    if types.len() != values.len() {
        return Err(Error::abi(format!(
            "{} types but {} values",
            types.len(),
            values.len()
        )));
    }
    let head_total: usize = types.iter().map(ParamType::head_size).sum();
    let mut head = Vec::with_capacity(head_total);
    let mut tail = Vec::new();

    for (ty, value) in types.iter().zip(values) {
        if ty.is_dynamic() {
            head.extend_from_slice(&U256::from(head_total + tail.len()).to_be_bytes::<32>());
            encode_tail(ty, value, &mut tail)?;
        } else {
            encode_static(ty, value, &mut head)?;
        }
    }

    head.extend_from_slice(&tail);
    Ok(head)
}

fn encode_static(ty: &ParamType, value: &Value, out: &mut Vec<u8>) -> Result<()> {
    match (ty, value) {
        (ParamType::Uint(bits), Value::Uint(v)) => out.extend_from_slice(&uint_word(*v, *bits, ty)?),
        (ParamType::Int(bits), Value::Int(v)) => out.extend_from_slice(&int_word(*v, *bits, ty)?),
        (ParamType::Ufixed(bits, exp), Value::Uint(v)) => {
            out.extend_from_slice(&uint_word(scale_uint(*v, *exp, ty)?, *bits, ty)?)
        }
        (ParamType::Fixed(bits, exp), Value::Int(v)) => {
            out.extend_from_slice(&int_word(scale_int(*v, *exp, ty)?, *bits, ty)?)
        }
        (ParamType::Address, Value::Address(a)) => {
            out.extend_from_slice(&[0u8; 12]);
            out.extend_from_slice(a.as_slice());
        }
        (ParamType::Bool, Value::Bool(b)) => {
            out.extend_from_slice(&[0u8; 31]);
            out.push(*b as u8);
        }
        (ParamType::FixedBytes(len), Value::FixedBytes(data)) => {
            if data.len() > *len {
                return Err(Error::AbiWidthExceeded { param: ty.to_string() });
            }
            let mut word = [0u8; 32];
            word[..data.len()].copy_from_slice(data);
            out.extend_from_slice(&word);
        }
        (ParamType::FixedArray(inner, count), Value::Array(items)) => {
            if items.len() != *count {
                return Err(Error::abi(format!(
                    "expected {count} elements for {ty}, got {}",
                    items.len()
                )));
            }
            for item in items {
                encode_static(inner, item, out)?;
            }
        }
        _ => return Err(type_mismatch(ty, value)),
    }
    Ok(())
}

fn encode_tail(ty: &ParamType, value: &Value, out: &mut Vec<u8>) -> Result<()> {
    match (ty, value) {
        (ParamType::Bytes, Value::Bytes(data)) => encode_byte_string(data, out),
        (ParamType::String, Value::String(s)) => encode_byte_string(s.as_bytes(), out),
        (ParamType::Array(inner), Value::Array(items)) => {
            out.extend_from_slice(&U256::from(items.len()).to_be_bytes::<32>());
            let element_types = vec![(**inner).clone(); items.len()];
            let encoded = encode(&element_types, items)?;
            out.extend_from_slice(&encoded);
            Ok(())
        }
        (ParamType::FixedArray(inner, count), Value::Array(items)) => {
            if items.len() != *count {
                return Err(Error::abi(format!(
                    "expected {count} elements for {ty}, got {}",
                    items.len()
                )));
            }
            let element_types = vec![(**inner).clone(); items.len()];
            let encoded = encode(&element_types, items)?;
            out.extend_from_slice(&encoded);
            Ok(())
        }
        _ => Err(type_mismatch(ty, value)),
    }
}

fn encode_byte_string(data: &[u8], out: &mut Vec<u8>) -> Result<()> {
    out.extend_from_slice(&U256::from(data.len()).to_be_bytes::<32>());
    out.extend_from_slice(data);
    let rem = data.len() % 32;
    if rem != 0 {
        out.extend_from_slice(&vec![0u8; 32 - rem]);
    }
    Ok(())
}

/// Non-standard packed encoding: each value at its natural width, no length
/// prefixes, no padding between values. Array elements are padded to 32
/// bytes. Not invertible.
pub fn encode_packed(types: &[ParamType], values: &[Value]) -> Result<Vec<u8>> {
    if types.len() != values.len() {
        return Err(Error::abi(format!(
            "{} types but {} values",
            types.len(),
            values.len()
        )));
    }
    let mut out = Vec::new();
    for (ty, value) in types.iter().zip(values) {
        encode_packed_value(ty, value, &mut out)?;
    }
    Ok(out)
}

fn encode_packed_value(ty: &ParamType, value: &Value, out: &mut Vec<u8>) -> Result<()> {
    match (ty, value) {
        (ParamType::Uint(bits), Value::Uint(v)) => {
            let word = uint_word(*v, *bits, ty)?;
            out.extend_from_slice(&word[32 - bits / 8..]);
        }
        (ParamType::Int(bits), Value::Int(v)) => {
            let word = int_word(*v, *bits, ty)?;
            out.extend_from_slice(&word[32 - bits / 8..]);
        }
        (ParamType::Ufixed(bits, exp), Value::Uint(v)) => {
            let word = uint_word(scale_uint(*v, *exp, ty)?, *bits, ty)?;
            out.extend_from_slice(&word[32 - bits / 8..]);
        }
        (ParamType::Fixed(bits, exp), Value::Int(v)) => {
            let word = int_word(scale_int(*v, *exp, ty)?, *bits, ty)?;
            out.extend_from_slice(&word[32 - bits / 8..]);
        }
        (ParamType::Address, Value::Address(a)) => out.extend_from_slice(a.as_slice()),
        (ParamType::Bool, Value::Bool(b)) => out.push(*b as u8),
        (ParamType::FixedBytes(len), Value::FixedBytes(data)) => {
            if data.len() > *len {
                return Err(Error::AbiWidthExceeded { param: ty.to_string() });
            }
            out.extend_from_slice(data);
            out.extend_from_slice(&vec![0u8; len - data.len()]);
        }
        (ParamType::Bytes, Value::Bytes(data)) => out.extend_from_slice(data),
        (ParamType::String, Value::String(s)) => out.extend_from_slice(s.as_bytes()),
        (ParamType::Array(inner), Value::Array(items))
        | (ParamType::FixedArray(inner, _), Value::Array(items)) => {
            // Elements of a packed array keep their full 32-byte form.
            for item in items {
                encode_static(inner, item, out)?;
            }
        }
        _ => return Err(type_mismatch(ty, value)),
    }
    Ok(())
}

fn uint_word(v: U256, bits: usize, ty: &ParamType) -> Result<[u8; 32]> {
    if v.bit_len() > bits {
        return Err(Error::AbiWidthExceeded { param: ty.to_string() });
    }
    Ok(v.to_be_bytes::<32>())
}

fn int_word(v: I256, bits: usize, ty: &ParamType) -> Result<[u8; 32]> {
    if !int_fits(v, bits) {
        return Err(Error::AbiWidthExceeded { param: ty.to_string() });
    }
    Ok(v.to_be_bytes::<32>())
}

pub(super) fn int_fits(v: I256, bits: usize) -> bool {
    if bits == 256 {
        return true;
    }
    let max = (I256::ONE << (bits - 1)) - I256::ONE;
    let min = -(I256::ONE << (bits - 1));
    v >= min && v <= max
}

fn scale_uint(v: U256, exp: usize, ty: &ParamType) -> Result<U256> {
    v.checked_shl(exp)
        .filter(|scaled| *scaled >> exp == v)
        .ok_or_else(|| Error::AbiWidthExceeded { param: ty.to_string() })
}

fn scale_int(v: I256, exp: usize, ty: &ParamType) -> Result<I256> {
    v.checked_shl(exp)
        .filter(|scaled| scaled.asr(exp) == v)
        .ok_or_else(|| Error::AbiWidthExceeded { param: ty.to_string() })
}

fn type_mismatch(ty: &ParamType, value: &Value) -> Error {
    Error::abi(format!("value {value:?} does not match type {ty}"))
}
