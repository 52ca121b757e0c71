//! Cipher engines for Password Safe containers.
//!
//! This crate holds every cryptographic primitive the container engine needs
//! and nothing that knows about records or headers:
//!
//! * [`block`]: Blowfish (PWS word order) and Twofish single-block engines.
//! * [`mod@cbc`]: stateful CBC chaining over either engine (the `cbc` crate).
//! * [`digest`]: SHA-1, SHA-256 and V3 passphrase stretching.
//! * [`mac`]: HMAC-SHA-256 over field payloads.
//! * [`seal`]: process-local sealing of secrets held in memory.
//! * [`bytes`]: little-endian packing and word swapping.
//!
//! Key material is held in zeroizing types throughout and never appears in
//! `Debug` output.

pub mod block;
pub mod bytes;
pub mod cbc;
pub mod digest;
pub mod error;
pub mod mac;
pub mod seal;

pub use block::{BlockPrimitive, PwsBlowfish, PwsTwofish};
pub use crate::cbc::{CbcDecryptor, CbcEncryptor};
pub use error::{CryptoError, CryptoResult};
pub use mac::FieldMac;
pub use seal::{SealKey, Secret};
