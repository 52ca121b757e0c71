//! Error types for the cipher engines.

use thiserror::Error;

/// Result type for cryptographic primitives.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors raised by the cipher engines and the secret sealer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// The key handed to a block cipher has a length the cipher rejects.
    #[error("invalid {cipher} key length: {len} bytes")]
    InvalidKeyLength {
        /// Name of the cipher that rejected the key.
        cipher: &'static str,
        /// Length of the rejected key.
        len: usize,
    },

    /// A buffer is not a whole number of cipher blocks.
    #[error("buffer of {len} bytes is not a whole number of {block_size}-byte blocks")]
    UnalignedBuffer {
        /// Block size of the cipher in use.
        block_size: usize,
        /// Length of the offending buffer.
        len: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CryptoError::InvalidKeyLength {
            cipher: "twofish",
            len: 7,
        };
        assert_eq!(err.to_string(), "invalid twofish key length: 7 bytes");

        let err = CryptoError::UnalignedBuffer {
            block_size: 8,
            len: 12,
        };
        assert!(err.to_string().contains("12 bytes"));
    }
}
