//! Register block ↔ numeric conversions
//!
//! Multi-register values are built from their big-endian word layout. The
//! swap flag reverses the two bytes of every word and the word-order flag
//! reverses the words; both are involutions and commute, so the same
//! reordering step serves encoding and decoding. Floats travel through the
//! unsigned paths as raw bits, so no endianness handling ever touches the
//! numeric value itself.

use super::{DataType, Endian, TypedValue};
use crate::error::{ModbusError, Result};
use tracing::trace;

// ============================================================================
// Layout helpers
// ============================================================================

fn reorder<const N: usize>(mut words: [u16; N], endian: Endian) -> [u16; N] {
    if endian.is_byte_swapped() {
        for word in &mut words {
            *word = word.swap_bytes();
        }
    }
    if endian.is_word_reversed() {
        words.reverse();
    }
    words
}

fn take_words<const N: usize>(regs: &[u16], type_name: &str) -> Result<[u16; N]> {
    <[u16; N]>::try_from(regs).map_err(|_| {
        ModbusError::conversion(format!(
            "{} requires {} registers, got {}",
            type_name,
            N,
            regs.len()
        ))
    })
}

// ============================================================================
// 16-bit
// ============================================================================

/// Reinterpret a register as a two's-complement INT16
pub fn reg_to_i16(reg: u16) -> i16 {
    reg as i16
}

/// Two's-complement register image of an INT16
pub fn i16_to_reg(value: i16) -> u16 {
    value as u16
}

// ============================================================================
// 32-bit
// ============================================================================

/// Convert a UINT32 into 2 registers
pub fn u32_to_regs(value: u32, endian: Endian) -> [u16; 2] {
    reorder([(value >> 16) as u16, value as u16], endian)
}

/// Convert 2 registers into a UINT32
pub fn regs_to_u32(regs: &[u16], endian: Endian) -> Result<u32> {
    let [hi, lo] = reorder(take_words::<2>(regs, "UINT32")?, endian);
    Ok((u32::from(hi) << 16) | u32::from(lo))
}

pub fn i32_to_regs(value: i32, endian: Endian) -> [u16; 2] {
    u32_to_regs(value as u32, endian)
}

pub fn regs_to_i32(regs: &[u16], endian: Endian) -> Result<i32> {
    let regs = take_words::<2>(regs, "INT32")?;
    Ok(regs_to_u32(&regs, endian)? as i32)
}

/// Convert a FLOAT32 into 2 registers; non-finite values are rejected
pub fn f32_to_regs(value: f32, endian: Endian) -> Result<[u16; 2]> {
    if !value.is_finite() {
        return Err(ModbusError::conversion(format!(
            "invalid value for FLOAT32: {}",
            value
        )));
    }
    Ok(u32_to_regs(value.to_bits(), endian))
}

pub fn regs_to_f32(regs: &[u16], endian: Endian) -> Result<f32> {
    let regs = take_words::<2>(regs, "FLOAT32")?;
    Ok(f32::from_bits(regs_to_u32(&regs, endian)?))
}

// ============================================================================
// 64-bit
// ============================================================================

/// Convert a UINT64 into 4 registers
pub fn u64_to_regs(value: u64, endian: Endian) -> [u16; 4] {
    reorder(
        [
            (value >> 48) as u16,
            (value >> 32) as u16,
            (value >> 16) as u16,
            value as u16,
        ],
        endian,
    )
}

/// Convert 4 registers into a UINT64
pub fn regs_to_u64(regs: &[u16], endian: Endian) -> Result<u64> {
    let words = reorder(take_words::<4>(regs, "UINT64")?, endian);
    Ok(words
        .iter()
        .fold(0u64, |acc, &word| (acc << 16) | u64::from(word)))
}

pub fn i64_to_regs(value: i64, endian: Endian) -> [u16; 4] {
    u64_to_regs(value as u64, endian)
}

pub fn regs_to_i64(regs: &[u16], endian: Endian) -> Result<i64> {
    let regs = take_words::<4>(regs, "INT64")?;
    Ok(regs_to_u64(&regs, endian)? as i64)
}

/// Convert a FLOAT64 into 4 registers; non-finite values are rejected
pub fn f64_to_regs(value: f64, endian: Endian) -> Result<[u16; 4]> {
    if !value.is_finite() {
        return Err(ModbusError::conversion(format!(
            "invalid value for FLOAT64: {}",
            value
        )));
    }
    Ok(u64_to_regs(value.to_bits(), endian))
}

pub fn regs_to_f64(regs: &[u16], endian: Endian) -> Result<f64> {
    let regs = take_words::<4>(regs, "FLOAT64")?;
    Ok(f64::from_bits(regs_to_u64(&regs, endian)?))
}

// ============================================================================
// Tagged dispatch
// ============================================================================

/// Number of registers occupied by `data_type`
pub fn register_count(data_type: DataType) -> usize {
    data_type.register_count()
}

/// Encode a typed value into its register block
///
/// 16-bit values map to a single register regardless of `endian`.
pub fn encode(value: &TypedValue, endian: Endian) -> Result<Vec<u16>> {
    let regs = match *value {
        TypedValue::I16(v) => vec![i16_to_reg(v)],
        TypedValue::U16(v) => vec![v],
        TypedValue::I32(v) => i32_to_regs(v, endian).to_vec(),
        TypedValue::U32(v) => u32_to_regs(v, endian).to_vec(),
        TypedValue::I64(v) => i64_to_regs(v, endian).to_vec(),
        TypedValue::U64(v) => u64_to_regs(v, endian).to_vec(),
        TypedValue::F32(v) => f32_to_regs(v, endian)?.to_vec(),
        TypedValue::F64(v) => f64_to_regs(v, endian)?.to_vec(),
    };
    trace!("Encoded {:?} ({}): {:04X?}", value, endian, regs);
    Ok(regs)
}

/// Decode a register block into a value of `data_type`
///
/// The block length must equal `data_type.register_count()` exactly.
pub fn decode(regs: &[u16], data_type: DataType, endian: Endian) -> Result<TypedValue> {
    let value = match data_type {
        DataType::Int16 => TypedValue::I16(reg_to_i16(take_words::<1>(regs, "INT16")?[0])),
        DataType::Uint16 => TypedValue::U16(take_words::<1>(regs, "UINT16")?[0]),
        DataType::Int32 => TypedValue::I32(regs_to_i32(regs, endian)?),
        DataType::Uint32 => TypedValue::U32(regs_to_u32(regs, endian)?),
        DataType::Int64 => TypedValue::I64(regs_to_i64(regs, endian)?),
        DataType::Uint64 => TypedValue::U64(regs_to_u64(regs, endian)?),
        DataType::Float32 => TypedValue::F32(regs_to_f32(regs, endian)?),
        DataType::Float64 => TypedValue::F64(regs_to_f64(regs, endian)?),
    };
    trace!("Decoded {:04X?} ({}, {}): {:?}", regs, data_type, endian, value);
    Ok(value)
}
