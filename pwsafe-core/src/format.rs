//! On-disk constants shared by every format generation.
//!
//! # V1 / V2 Layout
//!
//! ```text
//! ┌──────────────┬───────────────┬──────────┬──────────────┬─────────────────┐
//! │ rand_stuff 8 │ rand_hash 20  │ salt 20  │ ip_thing 8   │ Blowfish-CBC …  │
//! └──────────────┴───────────────┴──────────┴──────────────┴─────────────────┘
//! ```
//!
//! # V3 Layout
//!
//! ```text
//! ┌──────┬─────────┬────────┬──────────┬────────────────┬───────┬──────────────┬─────────┬──────────┐
//! │ PWS3 │ salt 32 │ iter 4 │ hash 32  │ b1..b4 (4×16)  │ iv 16 │ Twofish-CBC  │ EOF 16  │ HMAC 32  │
//! └──────┴─────────┴────────┴──────────┴────────────────┴───────┴──────────────┴─────────┴──────────┘
//! ```

/// Leading tag of a V3 file.
pub const V3_TAG: &[u8; 4] = b"PWS3";

/// Plaintext marker that terminates the V3 record stream.
pub const V3_EOF_MARKER: &[u8; 16] = b"PWS3-EOFPWS3-EOF";

/// Title of the V1-shaped record that marks a V2 file.
pub const V2_ID_STRING: &str =
    " !!!Version 2 File Format!!! Please upgrade to PasswordSafe 2.0 or later";

/// Password of the V2 marker record.
pub const V2_ID_PASSWORD: &str = "2.0";

/// Blowfish block size.
pub const LEGACY_BLOCK_SIZE: usize = 8;

/// Twofish block size.
pub const V3_BLOCK_SIZE: usize = 16;

// ===== V1 / V2 header =====

/// Length of the random stuff that seeds the passphrase check.
pub const RAND_STUFF_LEN: usize = 8;

/// Length of the passphrase check hash.
pub const RAND_HASH_LEN: usize = 20;

/// Length of the file-key salt.
pub const LEGACY_SALT_LEN: usize = 20;

/// Length of the CBC initial vector.
pub const IP_THING_LEN: usize = 8;

/// Total V1/V2 header size.
pub const LEGACY_HEADER_SIZE: usize = RAND_STUFF_LEN + RAND_HASH_LEN + LEGACY_SALT_LEN + IP_THING_LEN;

/// Rounds of Blowfish applied when computing the passphrase check hash.
pub const RAND_HASH_ROUNDS: usize = 1000;

// ===== V3 header =====

/// Length of the stretching salt.
pub const V3_SALT_LEN: usize = 32;

/// Length of the stretched-passphrase verification hash.
pub const V3_HASH_LEN: usize = 32;

/// Length of the record-key and HMAC-key halves (`b1`..`b4`).
pub const V3_KEY_BLOCK_LEN: usize = 16;

/// Length of the CBC initial vector.
pub const V3_IV_LEN: usize = 16;

/// Total V3 header size: tag, salt, iterations, hash, four key blocks, IV.
pub const V3_HEADER_SIZE: usize =
    V3_TAG.len() + V3_SALT_LEN + 4 + V3_HASH_LEN + 4 * V3_KEY_BLOCK_LEN + V3_IV_LEN;

/// Length of the trailing HMAC tag.
pub const V3_HMAC_LEN: usize = 32;

/// Minimum and default number of stretching iterations.
pub const V3_DEFAULT_ITERATIONS: u32 = 2048;

/// Data bytes carried in the first block of a V3 field.
pub const V3_FIRST_BLOCK_DATA: usize = V3_BLOCK_SIZE - 5;

/// Database format written in the V3 header record: `[minor, major]`.
pub const V3_DB_FORMAT: [u8; 2] = [0x0D, 0x03];

// ===== Record markers =====

/// Field type that terminates a V2 or V3 record.
pub const END_OF_RECORD: u8 = 0xFF;

/// Separator between title and username in a V1 title field.
pub const V1_SPLIT_CHAR: char = '\u{AD}';

/// String inserted between title and username when saving V1 records.
pub const V1_SPLIT_STRING: &str = "  \u{AD}  ";

/// Marker meaning "use the default username" in a V1 title field.
pub const V1_DEFAULT_USER_CHAR: char = '\u{A0}';

/// Conventional V2 file extension.
pub const V2_EXTENSION: &str = "dat";

/// Conventional V3 file extension.
pub const V3_EXTENSION: &str = "psafe3";
