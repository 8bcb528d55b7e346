// In: src/kernels/leb128.rs

//! Pure, stateless kernels for LEB128 (Little-Endian Base 128) variable-length
//! integer encoding and decoding.
//!
//! Used for the `v1` frequency-table wire format, where symbol gaps and
//! normalized frequencies are mostly small. Fully panic-free.

use num_traits::{PrimInt, Unsigned};
use std::io::Cursor;

use crate::error::CctfError;

/// Encodes a single unsigned integer into a LEB128 byte sequence, appending to a
/// buffer.
pub fn encode_one<T>(value: T, buffer: &mut Vec<u8>) -> Result<(), CctfError>
where
    T: PrimInt + Unsigned,
{
    let zero = T::zero();
    let seven_bit_mask = T::from(0x7F)
        .ok_or_else(|| CctfError::Internal("failed to create 7-bit mask for type".to_string()))?;
    let continuation_bit = T::from(0x80)
        .ok_or_else(|| CctfError::Internal("failed to create continuation bit for type".to_string()))?;

    let mut current = value;
    loop {
        let mut byte = current & seven_bit_mask;
        current = current >> 7;
        if current != zero {
            byte = byte | continuation_bit;
        }

        let byte_u8 = byte
            .to_u8()
            .ok_or_else(|| CctfError::Internal("failed to convert generic integer to u8".to_string()))?;
        buffer.push(byte_u8);

        if current == zero {
            break;
        }
    }
    Ok(())
}

/// Decodes a single unsigned integer from a LEB128 byte stream cursor.
pub fn decode_one<T>(cursor: &mut Cursor<&[u8]>) -> Result<T, CctfError>
where
    T: PrimInt + Unsigned,
{
    let mut result = T::zero();
    let mut shift = 0;
    let total_bits = std::mem::size_of::<T>() * 8;

    loop {
        let pos = cursor.position() as usize;
        let byte = *cursor
            .get_ref()
            .get(pos)
            .ok_or_else(|| CctfError::CorruptStream("leb128: unexpected end of buffer".to_string()))?;
        cursor.set_position((pos + 1) as u64);

        let seven_bit_payload = T::from(byte & 0x7F)
            .ok_or_else(|| CctfError::Internal("failed to create 7-bit payload from byte".to_string()))?;

        // Check if adding these 7 bits would overflow the type's capacity.
        if shift >= total_bits {
            return Err(CctfError::CorruptStream(
                "leb128: integer overflow during decoding".to_string(),
            ));
        }

        result = result | (seven_bit_payload << shift);

        if byte & 0x80 == 0 {
            // Final check: a last byte setting bits beyond the type's capacity is
            // an overflow too (bit count is not a multiple of 7).
            if shift + 7 > total_bits && (byte >> (total_bits - shift)) > 0 {
                return Err(CctfError::CorruptStream(
                    "leb128: integer overflow during decoding".to_string(),
                ));
            }
            return Ok(result);
        }

        shift += 7;
    }
}
