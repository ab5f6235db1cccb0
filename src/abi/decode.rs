//! ABI decoding, mirroring the head/tail encoder

use alloy_primitives::{Address, I256, U256};

use super::encode::int_fits;
use super::types::{ParamType, Value};
use crate::error::{Error, Result};

/// Decodes a tuple of values under the given types.
pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Value>> {
    let mut values = Vec::with_capacity(types.len());
    let mut offset = 0usize;
    for ty in types {
        if ty.is_dynamic() {
            let pointer = read_usize(data, offset)?;
            let region = data
                .get(pointer..)
                .ok_or_else(|| Error::abi(format!("offset {pointer} beyond data")))?;
            values.push(decode_tail(ty, region)?);
            offset += 32;
        } else {
            values.push(decode_static(ty, data, offset)?);
            offset += ty.head_size();
        }
    }
    Ok(values)
}

/// Decodes a single return value.
pub fn decode_one(ty: &ParamType, data: &[u8]) -> Result<Value> {
    let mut values = decode(std::slice::from_ref(ty), data)?;
    Ok(values.remove(0))
}

fn decode_static(ty: &ParamType, data: &[u8], offset: usize) -> Result<Value> {
    match ty {
        ParamType::Uint(bits) => Ok(Value::Uint(read_uint(data, offset, *bits, ty)?)),
        ParamType::Int(bits) => Ok(Value::Int(read_int(data, offset, *bits, ty)?)),
        ParamType::Ufixed(bits, exp) => {
            Ok(Value::Uint(read_uint(data, offset, *bits, ty)? >> *exp))
        }
        ParamType::Fixed(bits, exp) => {
            Ok(Value::Int(read_int(data, offset, *bits, ty)?.asr(*exp)))
        }
        ParamType::Address => {
            let word = read_word(data, offset)?;
            Ok(Value::Address(Address::from_slice(&word[12..])))
        }
        ParamType::Bool => {
            let word = read_word(data, offset)?;
            Ok(Value::Bool(word.iter().any(|b| *b != 0)))
        }
        ParamType::FixedBytes(len) => {
            let word = read_word(data, offset)?;
            Ok(Value::FixedBytes(word[..*len].to_vec()))
        }
        ParamType::FixedArray(inner, count) => {
            let mut items = Vec::with_capacity(*count);
            let mut cursor = offset;
            for _ in 0..*count {
                items.push(decode_static(inner, data, cursor)?);
                cursor += inner.head_size();
            }
            Ok(Value::Array(items))
        }
        _ => Err(Error::abi(format!("{ty} is not a static type"))),
    }
}

fn decode_tail(ty: &ParamType, region: &[u8]) -> Result<Value> {
    match ty {
        ParamType::Bytes => Ok(Value::Bytes(read_byte_string(region)?)),
        ParamType::String => {
            let bytes = read_byte_string(region)?;
            let s = String::from_utf8(bytes)
                .map_err(|_| Error::abi("string payload is not valid utf-8"))?;
            Ok(Value::String(s))
        }
        ParamType::Array(inner) => {
            let count = read_usize(region, 0)?;
            let element_types = vec![(**inner).clone(); count];
            let elements = region
                .get(32..)
                .ok_or_else(|| Error::abi("array payload truncated"))?;
            Ok(Value::Array(decode(&element_types, elements)?))
        }
        ParamType::FixedArray(inner, count) => {
            let element_types = vec![(**inner).clone(); *count];
            Ok(Value::Array(decode(&element_types, region)?))
        }
        _ => Err(Error::abi(format!("{ty} is not a dynamic type"))),
    }
}

fn read_byte_string(region: &[u8]) -> Result<Vec<u8>> {
    let len = read_usize(region, 0)?;
    region
        .get(32..32 + len)
        .map(<[u8]>::to_vec)
        .ok_or_else(|| Error::abi("byte string truncated"))
}

fn read_word(data: &[u8], offset: usize) -> Result<[u8; 32]> {
    data.get(offset..offset + 32)
        .map(|slice| {
            let mut word = [0u8; 32];
            word.copy_from_slice(slice);
            word
        })
        .ok_or_else(|| Error::abi(format!("word at offset {offset} beyond data")))
}

fn read_usize(data: &[u8], offset: usize) -> Result<usize> {
    let value = U256::from_be_bytes(read_word(data, offset)?);
    usize::try_from(value).map_err(|_| Error::abi("offset does not fit in usize"))
}

fn read_uint(data: &[u8], offset: usize, bits: usize, ty: &ParamType) -> Result<U256> {
    let value = U256::from_be_bytes(read_word(data, offset)?);
    if value.bit_len() > bits {
        return Err(Error::AbiWidthExceeded { param: ty.to_string() });
    }
    Ok(value)
}

fn read_int(data: &[u8], offset: usize, bits: usize, ty: &ParamType) -> Result<I256> {
    let value = I256::from_raw(U256::from_be_bytes(read_word(data, offset)?));
    if !int_fits(value, bits) {
        return Err(Error::AbiWidthExceeded { param: ty.to_string() });
    }
    Ok(value)
}
