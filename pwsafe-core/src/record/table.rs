//! Per-version field tables.
//!
//! Each format generation declares which tags a record may carry and what
//! kind of value each tag holds. V1 and V2 are closed: anything outside the
//! table is rejected. V3 is open: unlisted tags are preserved as raw bytes.

use crate::field::{Charset, FieldKind};

/// Field type tags.
pub mod tags {
    /// V2 marker string (V2) / database version (V3 header).
    pub const ID_STRING: u8 = 0;
    /// Record UUID.
    pub const UUID: u8 = 1;
    /// Group path.
    pub const GROUP: u8 = 2;
    /// Title.
    pub const TITLE: u8 = 3;
    /// Username.
    pub const USERNAME: u8 = 4;
    /// Notes.
    pub const NOTES: u8 = 5;
    /// Password.
    pub const PASSWORD: u8 = 6;
    /// Creation time.
    pub const CREATION_TIME: u8 = 7;
    /// Password modification time.
    pub const PASSWORD_MOD_TIME: u8 = 8;
    /// Last access time.
    pub const LAST_ACCESS_TIME: u8 = 9;
    /// Password lifetime: an integer in V2, an expiry time in V3.
    pub const PASSWORD_LIFETIME: u8 = 10;
    /// Password policy (V2), deprecated policy string (V3).
    pub const PASSWORD_POLICY_DEPRECATED: u8 = 11;
    /// Last modification time.
    pub const LAST_MOD_TIME: u8 = 12;
    /// URL.
    pub const URL: u8 = 13;
    /// Autotype sequence.
    pub const AUTOTYPE: u8 = 14;
    /// Encoded password history.
    pub const PASSWORD_HISTORY: u8 = 15;
    /// Password policy.
    pub const PASSWORD_POLICY: u8 = 16;
    /// Password expiry interval in days.
    pub const PASSWORD_EXPIRY_INTERVAL: u8 = 17;
    /// Run command.
    pub const RUN_COMMAND: u8 = 18;
    /// Double-click action.
    pub const DOUBLE_CLICK_ACTION: u8 = 19;
    /// Email address.
    pub const EMAIL: u8 = 20;
    /// Protected-entry flag.
    pub const PROTECTED_ENTRY: u8 = 21;
    /// Symbols allowed in generated passwords.
    pub const OWN_PASSWORD_SYMBOLS: u8 = 22;
    /// Shift+double-click action.
    pub const SHIFT_DOUBLE_CLICK_ACTION: u8 = 23;
    /// Named password policy.
    pub const PASSWORD_POLICY_NAME: u8 = 24;
    /// Keyboard shortcut.
    pub const ENTRY_KEYBOARD_SHORTCUT: u8 = 25;
    /// Icon.
    pub const ICON: u8 = 191;
    /// One-time-password seed.
    pub const OTP: u8 = 192;
    /// Autotype delimiter.
    pub const AUTOTYPE_DELIMITER: u8 = 193;
    /// Autotype return suffix.
    pub const AUTOTYPE_RETURN_SUFFIX: u8 = 194;
    /// End of record.
    pub const END_OF_RECORD: u8 = crate::format::END_OF_RECORD;

    /// Database version in the V3 header record.
    pub const HEADER_VERSION: u8 = 0;
    /// Database UUID in the V3 header record.
    pub const HEADER_UUID: u8 = 1;
}

/// One entry of a field table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Type tag.
    pub tag: u8,
    /// Human-readable name.
    pub name: &'static str,
    /// Declared kind.
    pub kind: FieldKind,
}

/// The set of tags a record of one version may carry.
#[derive(Debug)]
pub struct FieldTable {
    specs: &'static [FieldSpec],
    accepts_unknown: bool,
}

impl FieldTable {
    /// Finds the declaration for `tag`.
    #[must_use]
    pub fn lookup(&self, tag: u8) -> Option<&'static FieldSpec> {
        self.specs.iter().find(|s| s.tag == tag)
    }

    /// Whether tags outside the table are kept as raw fields.
    #[must_use]
    pub const fn accepts_unknown(&self) -> bool {
        self.accepts_unknown
    }

    /// Every declared field, in tag order.
    #[must_use]
    pub const fn specs(&self) -> &'static [FieldSpec] {
        self.specs
    }

    /// Display name for `tag`.
    #[must_use]
    pub fn name(&self, tag: u8) -> &'static str {
        self.lookup(tag).map_or("unknown", |s| s.name)
    }
}

const fn spec(tag: u8, name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { tag, name, kind }
}

const LATIN1_PASSWORD: FieldKind = FieldKind::Password(Charset::Latin1);
const UTF8_PASSWORD: FieldKind = FieldKind::Password(Charset::Utf8);

/// V1 records always hold exactly these four logical fields; the username
/// shares the title item on disk.
pub static V1_FIELDS: FieldTable = FieldTable {
    specs: &[
        spec(tags::TITLE, "title", FieldKind::Text),
        spec(tags::USERNAME, "username", FieldKind::Text),
        spec(tags::NOTES, "notes", FieldKind::Text),
        spec(tags::PASSWORD, "password", LATIN1_PASSWORD),
    ],
    accepts_unknown: false,
};

/// V2 field table.
pub static V2_FIELDS: FieldTable = FieldTable {
    specs: &[
        spec(tags::ID_STRING, "id", FieldKind::Text),
        spec(tags::UUID, "uuid", FieldKind::Uuid),
        spec(tags::GROUP, "group", FieldKind::Text),
        spec(tags::TITLE, "title", FieldKind::Text),
        spec(tags::USERNAME, "username", FieldKind::Text),
        spec(tags::NOTES, "notes", FieldKind::Text),
        spec(tags::PASSWORD, "password", LATIN1_PASSWORD),
        spec(tags::CREATION_TIME, "creation time", FieldKind::Time),
        spec(tags::PASSWORD_MOD_TIME, "password modification time", FieldKind::Time),
        spec(tags::LAST_ACCESS_TIME, "last access time", FieldKind::Time),
        spec(tags::PASSWORD_LIFETIME, "password lifetime", FieldKind::Integer),
        spec(tags::PASSWORD_POLICY_DEPRECATED, "password policy", FieldKind::Text),
    ],
    accepts_unknown: false,
};

/// V3 user-record field table.
pub static V3_FIELDS: FieldTable = FieldTable {
    specs: &[
        spec(tags::ID_STRING, "version", FieldKind::Version),
        spec(tags::UUID, "uuid", FieldKind::Uuid),
        spec(tags::GROUP, "group", FieldKind::Unicode),
        spec(tags::TITLE, "title", FieldKind::Unicode),
        spec(tags::USERNAME, "username", FieldKind::Unicode),
        spec(tags::NOTES, "notes", FieldKind::Unicode),
        spec(tags::PASSWORD, "password", UTF8_PASSWORD),
        spec(tags::CREATION_TIME, "creation time", FieldKind::Time),
        spec(tags::PASSWORD_MOD_TIME, "password modification time", FieldKind::Time),
        spec(tags::LAST_ACCESS_TIME, "last access time", FieldKind::Time),
        spec(tags::PASSWORD_LIFETIME, "password expiry time", FieldKind::Time),
        spec(tags::PASSWORD_POLICY_DEPRECATED, "password policy (deprecated)", FieldKind::Unicode),
        spec(tags::LAST_MOD_TIME, "last modification time", FieldKind::Time),
        spec(tags::URL, "url", FieldKind::Unicode),
        spec(tags::AUTOTYPE, "autotype", FieldKind::Unicode),
        spec(tags::PASSWORD_HISTORY, "password history", FieldKind::Unicode),
        spec(tags::PASSWORD_POLICY, "password policy", FieldKind::Unicode),
        spec(tags::PASSWORD_EXPIRY_INTERVAL, "password expiry interval", FieldKind::Integer),
        spec(tags::RUN_COMMAND, "run command", FieldKind::Unicode),
        spec(tags::DOUBLE_CLICK_ACTION, "double-click action", FieldKind::Short),
        spec(tags::EMAIL, "email", FieldKind::Unicode),
        spec(tags::PROTECTED_ENTRY, "protected entry", FieldKind::Byte),
        spec(tags::OWN_PASSWORD_SYMBOLS, "password symbols", FieldKind::Unicode),
        spec(tags::SHIFT_DOUBLE_CLICK_ACTION, "shift double-click action", FieldKind::Short),
        spec(tags::PASSWORD_POLICY_NAME, "password policy name", FieldKind::Unicode),
        spec(tags::ENTRY_KEYBOARD_SHORTCUT, "keyboard shortcut", FieldKind::Integer),
        spec(tags::ICON, "icon", FieldKind::Unicode),
        spec(tags::OTP, "otp", FieldKind::Unicode),
        spec(tags::AUTOTYPE_DELIMITER, "autotype delimiter", FieldKind::Integer),
        spec(tags::AUTOTYPE_RETURN_SUFFIX, "autotype return suffix", FieldKind::Integer),
    ],
    accepts_unknown: true,
};

/// V3 header-record table. Only the version and database UUID are typed;
/// every other header field is carried through as raw bytes.
pub static V3_HEADER_FIELDS: FieldTable = FieldTable {
    specs: &[
        spec(tags::HEADER_VERSION, "version", FieldKind::Version),
        spec(tags::HEADER_UUID, "uuid", FieldKind::Uuid),
    ],
    accepts_unknown: true,
};
