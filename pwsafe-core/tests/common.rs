//! Common test utilities shared across integration tests.
#![allow(missing_docs, reason = "test helpers")]

use pwsafe_core::format::{V3_DB_FORMAT, V3_EOF_MARKER};
use pwsafe_core::header::LegacyHeader;
use pwsafe_core::keys::{legacy_encryptor, new_legacy_header, V3Keys};
use pwsafe_core::{tags, Container, FormatVersion, MemoryStorage, SecretString};
use pwsafe_crypto::{CbcEncryptor, FieldMac, PwsBlowfish, PwsTwofish};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[allow(dead_code, reason = "used in tests")]
pub fn passphrase(text: &str) -> SecretString {
    SecretString::from(text.to_owned())
}

#[allow(dead_code, reason = "used in tests")]
pub fn seeded(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// An empty container attached to fresh memory storage and a seeded RNG.
#[allow(dead_code, reason = "used in tests")]
pub fn new_container(version: FormatVersion, pass: &str) -> (Container, MemoryStorage) {
    let storage = MemoryStorage::new(&format!("memory:{version}"));
    let mut container = Container::new(version, &passphrase(pass)).expect("container");
    container.set_storage(storage.clone());
    container.set_rng(seeded(7));
    (container, storage)
}

/// Adds a record with the given title, username and password.
#[allow(dead_code, reason = "used in tests")]
pub fn add_entry(container: &mut Container, title: &str, username: &str, password: &str) {
    let mut record = container.new_record().expect("new record");
    record.set_title(title).expect("title");
    record.set_username(username).expect("username");
    record.set_password(password).expect("password");
    container.add_record(record).expect("add record");
}

/// Reads the password of the record at `index`.
#[allow(dead_code, reason = "used in tests")]
pub fn password_of(container: &Container, index: usize) -> String {
    container
        .record(index)
        .expect("record")
        .with_password(str::to_owned)
        .expect("unseal")
        .expect("password present")
}

/// Hand-assembles a legacy (V1/V2) image from raw items, bypassing the
/// record codec.
#[allow(dead_code, reason = "used in tests")]
pub struct LegacyImage {
    cbc: CbcEncryptor<PwsBlowfish>,
    out: Vec<u8>,
}

#[allow(dead_code, reason = "used in tests")]
impl LegacyImage {
    pub fn new(passphrase: &[u8]) -> Self {
        let header: LegacyHeader = new_legacy_header(passphrase, &mut seeded(3)).expect("header");
        let cbc = legacy_encryptor(passphrase, &header).expect("cipher");
        Self {
            cbc,
            out: header.encode(),
        }
    }

    pub fn item(mut self, tag: u8, payload: &[u8]) -> Self {
        let len = u32::try_from(payload.len()).expect("short payload");
        let mut head = [0u8; 8];
        head[..4].copy_from_slice(&len.to_le_bytes());
        head[4] = tag;
        self.cbc.encrypt(&mut head).expect("encrypt head");
        self.out.extend_from_slice(&head);

        let mut body = payload.to_vec();
        body.resize(payload.len().div_ceil(8).max(1) * 8, 0);
        self.cbc.encrypt(&mut body).expect("encrypt body");
        self.out.extend_from_slice(&body);
        self
    }

    /// Three type-0 items, the way V1 stores a record.
    pub fn v1_record(self, title: &[u8], password: &[u8], notes: &[u8]) -> Self {
        self.item(0, title).item(0, password).item(0, notes)
    }

    pub fn finish(self) -> Vec<u8> {
        self.out
    }
}

/// Hand-assembles a V3 image item by item. Every payload, the end-of-record
/// items included, goes into the HMAC.
#[allow(dead_code, reason = "used in tests")]
pub struct V3Image {
    cbc: CbcEncryptor<PwsTwofish>,
    mac: FieldMac,
    out: Vec<u8>,
}

#[allow(dead_code, reason = "used in tests")]
impl V3Image {
    pub fn new(passphrase: &[u8]) -> Self {
        let (header, keys) = V3Keys::generate(passphrase, 2048, &mut seeded(5)).expect("keys");
        Self {
            cbc: keys.record_encryptor(&header.iv).expect("cipher"),
            mac: keys.field_mac().expect("mac"),
            out: header.encode(),
        }
    }

    /// A minimal header record: format version and an end item.
    pub fn with_header_record(self) -> Self {
        self.item(tags::HEADER_VERSION, &V3_DB_FORMAT).end_of_record(&[])
    }

    pub fn item(mut self, tag: u8, payload: &[u8]) -> Self {
        self.mac.update(payload);
        let len = u32::try_from(payload.len()).expect("short payload");
        let mut block = len.to_le_bytes().to_vec();
        block.push(tag);
        block.extend_from_slice(payload);
        block.resize(block.len().div_ceil(16) * 16, 0);
        self.cbc.encrypt(&mut block).expect("encrypt");
        self.out.extend_from_slice(&block);
        self
    }

    pub fn end_of_record(self, payload: &[u8]) -> Self {
        self.item(0xFF, payload)
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.out.extend_from_slice(V3_EOF_MARKER);
        self.out.extend_from_slice(&self.mac.finalize());
        self.out
    }
}
