// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Raw chunk codec.
//!
//! A `raw` precomputed chunk is a little-endian array laid out as
//! `[channel][z][y][x]`, x varying fastest.

use byteorder::{ByteOrder, LittleEndian};
use ndarray::Array4;
use voxatlas_structures::DataType;

use crate::error::{VolumeError, VolumeResult};

/// Decode a raw chunk of shape `[c, z, y, x]` into `f32` values
pub fn decode_raw(bytes: &[u8], dtype: DataType, shape_czyx: [usize; 4]) -> VolumeResult<Array4<f32>> {
    let count: usize = shape_czyx.iter().product();
    let item = dtype.item_size();
    if bytes.len() != count * item {
        return Err(VolumeError::Decode(format!(
            "expected {} bytes for {:?} chunk of {:?}, got {}",
            count * item,
            dtype,
            shape_czyx,
            bytes.len()
        )));
    }

    let values: Vec<f32> = bytes
        .chunks_exact(item)
        .map(|b| match dtype {
            DataType::Uint8 => b[0] as f32,
            DataType::Int8 => b[0] as i8 as f32,
            DataType::Uint16 => LittleEndian::read_u16(b) as f32,
            DataType::Int16 => LittleEndian::read_i16(b) as f32,
            DataType::Uint32 => LittleEndian::read_u32(b) as f32,
            DataType::Int32 => LittleEndian::read_i32(b) as f32,
            DataType::Uint64 => LittleEndian::read_u64(b) as f32,
            DataType::Int64 => LittleEndian::read_i64(b) as f32,
            DataType::Float32 => LittleEndian::read_f32(b),
            DataType::Float64 => LittleEndian::read_f64(b) as f32,
        })
        .collect();

    Array4::from_shape_vec(shape_czyx, values).map_err(|e| VolumeError::Decode(e.to_string()))
}

/// Encode values (in `[c][z][y][x]` order) as a raw chunk of the given type.
///
/// Values are cast with `as`, so out-of-range values saturate.
pub fn encode_raw(values: &[f32], dtype: DataType) -> Vec<u8> {
    let item = dtype.item_size();
    let mut out = vec![0u8; values.len() * item];
    for (v, b) in values.iter().zip(out.chunks_exact_mut(item)) {
        match dtype {
            DataType::Uint8 => b[0] = *v as u8,
            DataType::Int8 => b[0] = (*v as i8) as u8,
            DataType::Uint16 => LittleEndian::write_u16(b, *v as u16),
            DataType::Int16 => LittleEndian::write_i16(b, *v as i16),
            DataType::Uint32 => LittleEndian::write_u32(b, *v as u32),
            DataType::Int32 => LittleEndian::write_i32(b, *v as i32),
            DataType::Uint64 => LittleEndian::write_u64(b, *v as u64),
            DataType::Int64 => LittleEndian::write_i64(b, *v as i64),
            DataType::Float32 => LittleEndian::write_f32(b, *v),
            DataType::Float64 => LittleEndian::write_f64(b, *v as f64),
        }
    }
    out
}
