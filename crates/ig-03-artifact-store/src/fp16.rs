//! FP16 vector admission.
//!
//! Artifact vectors are `VECTOR_DIM` IEEE-754 half-precision values in
//! little-endian byte order. Admission rejects any non-finite halfword:
//! exponent bits all-ones with a zero fraction is an infinity, any other
//! all-ones-exponent pattern (quiet, signaling, signed) is a NaN. Zeros
//! and subnormals are valid compute outputs and pass.

use shared_types::{VECTOR_BYTES, VECTOR_DIM};
use thiserror::Error;

/// Exponent mask of a half-precision value.
const EXP_MASK: u16 = 0x7C00;
/// Fraction mask of a half-precision value.
const FRAC_MASK: u16 = 0x03FF;

/// FP16 admission failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Fp16Error {
    /// Wrong byte length.
    #[error("invalid vector length: got {got} bytes, expected {expected}")]
    InvalidLength {
        /// Observed length.
        got: usize,
        /// Required length.
        expected: usize,
    },

    /// An infinity halfword.
    #[error("Infinity detected at byte offset {offset}")]
    Infinity {
        /// Byte offset of the offending halfword.
        offset: usize,
    },

    /// A NaN halfword (quiet, signaling, or signed).
    #[error("NaN detected at byte offset {offset}: 0x{bits:04X}")]
    NaN {
        /// Byte offset of the offending halfword.
        offset: usize,
        /// Raw halfword bits.
        bits: u16,
    },
}

/// Validate one artifact vector.
///
/// Checks length first, then every halfword in order; the first violation
/// wins so error offsets are deterministic.
pub fn validate_fp16_vector(vector: &[u8]) -> Result<(), Fp16Error> {
    if vector.len() != VECTOR_BYTES {
        return Err(Fp16Error::InvalidLength {
            got: vector.len(),
            expected: VECTOR_BYTES,
        });
    }

    for i in 0..VECTOR_DIM {
        let offset = i * 2;
        let bits = u16::from_le_bytes([vector[offset], vector[offset + 1]]);
        if bits & EXP_MASK == EXP_MASK {
            if bits & FRAC_MASK == 0 {
                return Err(Fp16Error::Infinity { offset });
            }
            return Err(Fp16Error::NaN { offset, bits });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::artifacts::base64_bytes;

    fn vector_of(halfwords: [u16; VECTOR_DIM]) -> Vec<u8> {
        halfwords.iter().flat_map(|h| h.to_le_bytes()).collect()
    }

    #[test]
    fn test_length_check() {
        let err = validate_fp16_vector(&[0u8; 23]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid vector length: got 23 bytes, expected 24"
        );
    }

    #[test]
    fn test_zeros_and_subnormals_pass() {
        assert!(validate_fp16_vector(&[0u8; VECTOR_BYTES]).is_ok());

        // Subnormals (exp = 0, frac != 0), negative zero, and the largest
        // finite value all pass.
        let mut halfwords = [0u16; VECTOR_DIM];
        halfwords[0] = 0x0001; // smallest subnormal
        halfwords[1] = 0x03FF; // largest subnormal
        halfwords[2] = 0x8000; // negative zero
        halfwords[3] = 0x7BFF; // 65504, largest finite
        halfwords[4] = 0xFBFF; // -65504
        assert!(validate_fp16_vector(&vector_of(halfwords)).is_ok());
    }

    #[test]
    fn test_infinities_rejected() {
        let mut halfwords = [0u16; VECTOR_DIM];
        halfwords[3] = 0x7C00; // +inf
        let err = validate_fp16_vector(&vector_of(halfwords)).unwrap_err();
        assert_eq!(err, Fp16Error::Infinity { offset: 6 });

        let mut halfwords = [0u16; VECTOR_DIM];
        halfwords[0] = 0xFC00; // -inf
        let err = validate_fp16_vector(&vector_of(halfwords)).unwrap_err();
        assert_eq!(err.to_string(), "Infinity detected at byte offset 0");
    }

    #[test]
    fn test_nan_patterns_rejected() {
        for bits in [0x7C01u16, 0x7E00, 0x7FFF, 0xFC01, 0xFFFF] {
            let mut halfwords = [0u16; VECTOR_DIM];
            halfwords[5] = bits;
            let err = validate_fp16_vector(&vector_of(halfwords)).unwrap_err();
            assert_eq!(err, Fp16Error::NaN { offset: 10, bits });
        }
    }

    #[test]
    fn test_known_nan_fixture() {
        let vector = base64_bytes::decode("JjsAfn85Zjp/NUgzrzNgOdYliTiIO7g4").unwrap();
        assert_eq!(vector.len(), VECTOR_BYTES);

        let err = validate_fp16_vector(&vector).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("NaN"));
        assert!(message.contains("byte offset 2"));
    }

    #[test]
    fn test_first_violation_wins() {
        let mut halfwords = [0u16; VECTOR_DIM];
        halfwords[1] = 0x7C00;
        halfwords[2] = 0x7C01;
        let err = validate_fp16_vector(&vector_of(halfwords)).unwrap_err();
        assert_eq!(err, Fp16Error::Infinity { offset: 2 });
    }
}
