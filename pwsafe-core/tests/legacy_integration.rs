//! End-to-end tests for V1 and V2 containers.

mod common;

use common::LegacyImage;
use pwsafe_core::encoding::latin1_encode;
use pwsafe_core::format::{V2_ID_PASSWORD, V2_ID_STRING};
use pwsafe_core::{open, open_with, tags, FormatVersion, MemoryStorage, OpenOptions};
use pwsafe_core::{PassphraseEncoding, PwsError};
use test_case::test_case;

fn open_image(image: Vec<u8>, pass: &str) -> pwsafe_core::PwsResult<pwsafe_core::Container> {
    open(MemoryStorage::with_bytes("legacy", image), &common::passphrase(pass))
}

#[test]
fn test_v1_title_split_on_read() {
    let image = LegacyImage::new(b"pw")
        .v1_record(&latin1_encode("Bank  \u{AD}  alice"), b"s3cr3t!", b"branch 7")
        .v1_record(&latin1_encode("Mail\u{A0}"), b"m41l", b"")
        .v1_record(b"Plain", b"", b"")
        .finish();

    let container = open_image(image, "pw").expect("open");
    assert_eq!(container.version(), FormatVersion::V1);
    assert_eq!(container.len(), 3);

    let bank = container.record(0).expect("bank");
    assert_eq!(bank.title(), Some("Bank"));
    assert_eq!(bank.username(), Some("alice"));
    assert_eq!(bank.notes(), Some("branch 7"));
    assert_eq!(common::password_of(&container, 0), "s3cr3t!");
    assert_eq!(bank.uuid(), None);

    let mail = container.record(1).expect("mail");
    assert_eq!(mail.title(), Some("Mail"));
    assert_eq!(mail.username(), Some(""));

    let plain = container.record(2).expect("plain");
    assert_eq!(plain.title(), Some("Plain"));
    assert_eq!(plain.username(), Some(""));
}

#[test]
fn test_v1_round_trip_rejoins_username() {
    let (mut container, storage) = common::new_container(FormatVersion::V1, "pw");
    common::add_entry(&mut container, "Bank", "alice", "s3cr3t!");
    common::add_entry(&mut container, "Solo", "", "x");
    container.save().expect("save");

    let reopened = open(storage.clone(), &common::passphrase("pw")).expect("open");
    assert_eq!(reopened.version(), FormatVersion::V1);
    let bank = reopened.record(0).expect("bank");
    assert_eq!((bank.title(), bank.username()), (Some("Bank"), Some("alice")));
    let solo = reopened.record(1).expect("solo");
    assert_eq!((solo.title(), solo.username()), (Some("Solo"), Some("")));
    assert_eq!(common::password_of(&reopened, 1), "x");
}

#[test]
fn test_v1_record_without_notes_is_truncated() {
    let image = LegacyImage::new(b"pw").item(0, b"title").item(0, b"pw").finish();
    assert!(matches!(
        open_image(image, "pw"),
        Err(PwsError::EndOfFile { .. })
    ));
}

#[test]
fn test_v2_magic_detection() {
    let image = LegacyImage::new(b"pw")
        .v1_record(V2_ID_STRING.as_bytes(), V2_ID_PASSWORD.as_bytes(), b"")
        .item(tags::UUID, &[7u8; 16])
        .item(tags::TITLE, b"Router")
        .item(tags::PASSWORD, b"admin")
        .item(tags::PASSWORD_LIFETIME, &90u32.to_le_bytes())
        .item(255, b"")
        .finish();

    let container = open_image(image, "pw").expect("open");
    assert_eq!(container.version(), FormatVersion::V2);
    assert_eq!(container.len(), 1);
    let router = container.record(0).expect("router");
    assert_eq!(router.title(), Some("Router"));
    assert_eq!(router.uuid(), Some(uuid::Uuid::from_bytes([7u8; 16])));
    assert_eq!(common::password_of(&container, 0), "admin");
}

#[test]
fn test_v2_unknown_tag_is_rejected() {
    let image = LegacyImage::new(b"pw")
        .v1_record(V2_ID_STRING.as_bytes(), V2_ID_PASSWORD.as_bytes(), b"")
        .item(tags::TITLE, b"Router")
        .item(42, b"??")
        .item(255, b"")
        .finish();
    assert!(matches!(
        open_image(image, "pw"),
        Err(PwsError::UnknownFieldType {
            version: FormatVersion::V2,
            tag: 42
        })
    ));
}

#[test]
fn test_v2_round_trip() {
    let (mut container, storage) = common::new_container(FormatVersion::V2, "pw");
    let mut record = container.new_record().expect("new record");
    record.set_title("Router").expect("title");
    record.set_username("admin").expect("username");
    record.set_text(tags::GROUP, "Home.Network").expect("group");
    record.set_password("hunter2").expect("password");
    container.add_record(record.clone()).expect("add");
    container.save().expect("save");

    let reopened = open(storage, &common::passphrase("pw")).expect("open");
    assert_eq!(reopened.version(), FormatVersion::V2);
    assert_eq!(reopened.record(0), Some(&record));
    assert_eq!(reopened.record(0).and_then(|r| r.group()), Some("Home.Network"));
}

#[test]
fn test_v2_rejects_marker_records() {
    let (mut container, _) = common::new_container(FormatVersion::V2, "pw");
    let mut record = container.new_record().expect("new record");
    record.set_title(V2_ID_STRING).expect("title");
    assert!(matches!(
        container.add_record(record),
        Err(PwsError::InvalidField { .. })
    ));
}

#[test_case(FormatVersion::V1 ; "v1")]
#[test_case(FormatVersion::V2 ; "v2")]
fn test_legacy_save_is_deterministic(version: FormatVersion) {
    let (mut container, storage) = common::new_container(version, "pw");
    common::add_entry(&mut container, "Bank", "alice", "s3cr3t!");
    container.save().expect("save");
    let first = storage.bytes().expect("image");

    let mut reopened = open(storage.clone(), &common::passphrase("pw")).expect("open");
    reopened.set_rng(common::seeded(7));
    reopened.save().expect("save again");
    assert_eq!(storage.bytes().expect("image"), first);
}

#[test]
fn test_windows_1252_passphrase_is_discovered() {
    let (mut container, storage) = common::new_container(FormatVersion::V2, "p\u{e4}ssw\u{f6}rd");
    assert_eq!(container.encoding(), PassphraseEncoding::Windows1252);
    container.save().expect("save");

    let reopened = open(storage.clone(), &common::passphrase("p\u{e4}ssw\u{f6}rd")).expect("open");
    assert_eq!(reopened.encoding(), PassphraseEncoding::Windows1252);

    let options = OpenOptions::default().encodings(vec![
        PassphraseEncoding::Utf8,
        PassphraseEncoding::UsAscii,
    ]);
    assert!(matches!(
        open_with(storage, &common::passphrase("p\u{e4}ssw\u{f6}rd"), &options),
        Err(PwsError::InvalidPassphrase)
    ));
}

#[test_case(0 ; "empty")]
#[test_case(3 ; "shorter than a tag")]
#[test_case(55 ; "one byte short of a header")]
fn test_short_images(len: usize) {
    let image = LegacyImage::new(b"pw").finish();
    assert!(matches!(
        open_image(image[..len].to_vec(), "pw"),
        Err(PwsError::EndOfFile { .. })
    ));
}
