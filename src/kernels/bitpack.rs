// In: src/kernels/bitpack.rs

//! Pure, stateless kernels for fixed-width bit-packing and unpacking.
//!
//! This is the fallback storage for coded streams whose alphabet is too wide for
//! a frequency table, and the winner whenever a packed stream is smaller than the
//! entropy-coded candidate (small streams with near-uniform values). Values are
//! packed Lsb0, `bit_width` bits each, with no padding between values.

use bitvec::prelude::*;

use crate::error::CctfError;

/// The smallest bit width able to represent `max`. At least 1 so that an
/// all-zero stream still has a well-formed packed representation.
pub fn bits_for(max: u32) -> u8 {
    let bits = 32 - max.leading_zeros() as u8;
    bits.max(1)
}

/// Packs a slice of values into a compact byte buffer.
pub fn encode(data: &[u32], bit_width: u8) -> Result<Vec<u8>, CctfError> {
    if bit_width == 0 || bit_width > 32 {
        return Err(CctfError::BitpackEncode(0, bit_width));
    }

    let max_val = if bit_width >= 32 {
        u32::MAX
    } else {
        (1u32 << bit_width) - 1
    };
    let mut bit_vec = BitVec::<u8, Lsb0>::with_capacity(data.len() * bit_width as usize);

    for &val in data {
        if val > max_val {
            return Err(CctfError::BitpackEncode(val as u64, bit_width));
        }
        bit_vec.extend_from_bitslice(&val.view_bits::<Lsb0>()[..bit_width as usize]);
    }

    Ok(bit_vec.into_vec())
}

/// Unpacks exactly `num_values` values of `bit_width` bits each.
pub fn decode(bytes: &[u8], bit_width: u8, num_values: usize) -> Result<Vec<u32>, CctfError> {
    if bit_width == 0 || bit_width > 32 {
        return Err(CctfError::CorruptStream(format!(
            "bitpack: invalid bit width {bit_width}"
        )));
    }
    let bits = BitSlice::<u8, Lsb0>::from_slice(bytes);
    let needed = num_values
        .checked_mul(bit_width as usize)
        .ok_or_else(|| CctfError::CorruptStream("bitpack: length overflow".to_string()))?;
    if bits.len() < needed {
        return Err(CctfError::CorruptStream(
            "bitpack: truncated buffer".to_string(),
        ));
    }

    let mut decoded = Vec::with_capacity(num_values);
    for chunk in bits.chunks(bit_width as usize).take(num_values) {
        let mut container = 0u32;
        container.view_bits_mut::<Lsb0>()[..chunk.len()].clone_from_bitslice(chunk);
        decoded.push(container);
    }

    Ok(decoded)
}

//==================================================================================
// Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_for() {
        assert_eq!(bits_for(0), 1);
        assert_eq!(bits_for(1), 1);
        assert_eq!(bits_for(2), 2);
        assert_eq!(bits_for(255), 8);
        assert_eq!(bits_for(256), 9);
        assert_eq!(bits_for(u32::MAX), 32);
    }

    #[test]
    fn test_bitpack_roundtrip_simple() {
        // Values 5, 6, 7 need 3 bits each.
        let original: Vec<u32> = vec![5, 6, 7, 1];
        let encoded = encode(&original, 3).unwrap();
        assert_eq!(encoded.len(), 2); // 12 bits -> 2 bytes
        let decoded = decode(&encoded, 3, original.len()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_bitpack_full_width() {
        let original: Vec<u32> = vec![u32::MAX, 0, 0xDEADBEEF];
        let encoded = encode(&original, 32).unwrap();
        let decoded = decode(&encoded, 32, original.len()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_bitpack_value_too_large() {
        let original: Vec<u32> = vec![5, 6, 8, 1]; // 8 requires 4 bits
        let err = encode(&original, 3).unwrap_err();
        assert!(matches!(err, CctfError::BitpackEncode(8, 3)));
    }

    #[test]
    fn test_bitpack_truncated_buffer() {
        let original: Vec<u32> = vec![10, 20, 30];
        let encoded = encode(&original, 5).unwrap();
        let truncated = &encoded[..encoded.len() - 1];
        let err = decode(truncated, 5, original.len()).unwrap_err();
        assert!(err.to_string().contains("truncated buffer"));
    }
}
