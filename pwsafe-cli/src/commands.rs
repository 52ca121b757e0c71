//! Subcommand implementations. Each one opens the vault, does its work and
//! writes human-readable output to `out`.

use std::io::Write;
use std::path::Path;

use eyre::{bail, eyre, Result, WrapErr};
use pwsafe_core::{
    open_with, tags, Container, Field, FileStorage, FormatVersion, OpenOptions, Record,
    SecretString,
};
use secrecy::ExposeSecret;

/// Fields for a new entry.
#[derive(Debug, Default)]
pub struct NewEntry {
    pub title: String,
    pub username: Option<String>,
    pub notes: Option<String>,
    pub group: Option<String>,
    pub url: Option<String>,
}

fn open_vault(path: &Path, passphrase: &SecretString, read_only: bool) -> Result<Container> {
    let options = OpenOptions::default().read_only(read_only);
    open_with(FileStorage::new(path), passphrase, &options)
        .wrap_err_with(|| format!("failed to open {}", path.display()))
}

fn entry<'a>(container: &'a Container, index: usize) -> Result<&'a Record> {
    container.record(index).ok_or_else(|| {
        eyre!(
            "no entry {index}; the vault has {} entries",
            container.len()
        )
    })
}

/// Creates an empty vault at `path`.
pub fn create(
    path: &Path,
    version: FormatVersion,
    iterations: Option<u32>,
    passphrase: &SecretString,
    out: &mut impl Write,
) -> Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    let mut container = Container::new(version, passphrase)?;
    if let Some(iterations) = iterations {
        container
            .set_iterations(iterations)
            .wrap_err("--iterations only applies to V3 vaults")?;
    }
    container.set_storage(FileStorage::new(path));
    container.save()?;
    tracing::info!(path = %path.display(), %version, "created vault");
    writeln!(out, "created {version} vault {}", path.display())?;
    Ok(())
}

/// Prints format details.
pub fn info(path: &Path, passphrase: &SecretString, out: &mut impl Write) -> Result<()> {
    let container = open_vault(path, passphrase, true)?;
    writeln!(out, "version:    {}", container.version())?;
    writeln!(out, "entries:    {}", container.len())?;
    writeln!(out, "encoding:   {}", container.encoding())?;
    if let Some((major, minor)) = container.db_format() {
        writeln!(out, "db format:  {major}.{minor:02X}")?;
    }
    if let Some(uuid) = container.database_uuid() {
        writeln!(out, "db uuid:    {uuid}")?;
    }
    if let Some(iterations) = container.iterations() {
        writeln!(out, "iterations: {iterations}")?;
    }
    Ok(())
}

/// Prints one line per entry.
pub fn list(path: &Path, passphrase: &SecretString, out: &mut impl Write) -> Result<()> {
    let container = open_vault(path, passphrase, true)?;
    for (index, record) in container.records().enumerate() {
        let title = record.title().unwrap_or_default();
        match (record.group(), record.username()) {
            (Some(group), Some(user)) if !group.is_empty() && !user.is_empty() => {
                writeln!(out, "{index:>4}  {group}/{title}  ({user})")?;
            }
            (Some(group), _) if !group.is_empty() => writeln!(out, "{index:>4}  {group}/{title}")?,
            (_, Some(user)) if !user.is_empty() => writeln!(out, "{index:>4}  {title}  ({user})")?,
            _ => writeln!(out, "{index:>4}  {title}")?,
        }
    }
    Ok(())
}

/// Prints every field of one entry. Passwords are masked unless `reveal`.
pub fn show(
    path: &Path,
    passphrase: &SecretString,
    index: usize,
    reveal: bool,
    out: &mut impl Write,
) -> Result<()> {
    let container = open_vault(path, passphrase, true)?;
    let record = entry(&container, index)?;
    let table = record.field_table();
    for field in record.fields() {
        let name = table.name(field.tag());
        match field {
            Field::Password { .. } if !reveal => writeln!(out, "{name}: ********")?,
            Field::Password { .. } => {
                let shown = field.with_password(str::to_owned)?.unwrap_or_default();
                writeln!(out, "{name}: {shown}")?;
            }
            Field::Text { value, .. } | Field::Unicode { value, .. } => {
                writeln!(out, "{name}: {value}")?;
            }
            Field::Uuid { value, .. } => writeln!(out, "{name}: {value}")?,
            Field::Time { seconds, .. } => writeln!(out, "{name}: {seconds}")?,
            other => writeln!(out, "{name}: {other:?}")?,
        }
    }
    Ok(())
}

/// Appends an entry and saves.
pub fn add(
    path: &Path,
    passphrase: &SecretString,
    new: &NewEntry,
    password: &SecretString,
    out: &mut impl Write,
) -> Result<()> {
    let mut container = open_vault(path, passphrase, false)?;
    let mut record = container.new_record()?;
    record.set_title(&new.title)?;
    record.set_password(password.expose_secret())?;
    let optional = [
        (tags::USERNAME, &new.username),
        (tags::NOTES, &new.notes),
        (tags::GROUP, &new.group),
        (tags::URL, &new.url),
    ];
    for (tag, value) in optional {
        if let Some(value) = value {
            record
                .set_text(tag, value)
                .wrap_err_with(|| format!("cannot set {}", record.field_table().name(tag)))?;
        }
    }
    container.add_record(record)?;
    container.save()?;
    writeln!(out, "added entry {}", container.len() - 1)?;
    Ok(())
}

/// Removes one entry and saves.
pub fn remove(
    path: &Path,
    passphrase: &SecretString,
    index: usize,
    out: &mut impl Write,
) -> Result<()> {
    let mut container = open_vault(path, passphrase, false)?;
    entry(&container, index)?;
    let removed = container.remove_record(index)?;
    container.save()?;
    writeln!(
        out,
        "removed entry {index} ({})",
        removed.title().unwrap_or_default()
    )?;
    Ok(())
}

/// Re-encrypts the vault under a new passphrase.
pub fn passwd(
    path: &Path,
    passphrase: &SecretString,
    new_passphrase: &SecretString,
    out: &mut impl Write,
) -> Result<()> {
    let mut container = open_vault(path, passphrase, false)?;
    container.set_passphrase(new_passphrase)?;
    container.save()?;
    tracing::info!(path = %path.display(), "passphrase changed");
    writeln!(out, "passphrase changed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pwsafe_core::PwsError;

    fn secret(text: &str) -> SecretString {
        SecretString::from(text.to_owned())
    }

    fn output(run: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut out = Vec::new();
        run(&mut out).expect("command");
        String::from_utf8(out).expect("utf-8")
    }

    #[test]
    fn test_create_add_list_show() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("vault.psafe3");
        let pw = secret("pw");

        let created = output(|out| create(&path, FormatVersion::V3, Some(4096), &pw, out));
        assert!(created.contains("created V3 vault"));
        assert!(create(&path, FormatVersion::V3, None, &pw, &mut Vec::new()).is_err());

        let entry = NewEntry {
            title: "Bank".to_owned(),
            username: Some("alice".to_owned()),
            group: Some("Finance".to_owned()),
            ..NewEntry::default()
        };
        output(|out| add(&path, &pw, &entry, &secret("s3cr3t!"), out));

        let listed = output(|out| list(&path, &pw, out));
        assert_eq!(listed, "   0  Finance/Bank  (alice)\n");

        let masked = output(|out| show(&path, &pw, 0, false, out));
        assert!(masked.contains("password: ********"));
        assert!(!masked.contains("s3cr3t!"));
        let revealed = output(|out| show(&path, &pw, 0, true, out));
        assert!(revealed.contains("password: s3cr3t!"));

        let details = output(|out| info(&path, &pw, out));
        assert!(details.contains("entries:    1"));
        assert!(details.contains("iterations: 4096"));
        assert!(details.contains("db format:  3.0D"));
    }

    #[test]
    fn test_remove_and_passwd() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("vault.dat");
        let pw = secret("pw");
        output(|out| create(&path, FormatVersion::V2, None, &pw, out));
        let entry = NewEntry {
            title: "Router".to_owned(),
            ..NewEntry::default()
        };
        output(|out| add(&path, &pw, &entry, &secret("admin"), out));

        assert!(remove(&path, &pw, 5, &mut Vec::new()).is_err());
        let removed = output(|out| remove(&path, &pw, 0, out));
        assert_eq!(removed, "removed entry 0 (Router)\n");

        output(|out| passwd(&path, &pw, &secret("new"), out));
        let err = list(&path, &pw, &mut Vec::new()).expect_err("old passphrase");
        assert!(matches!(
            err.downcast_ref::<PwsError>(),
            Some(PwsError::InvalidPassphrase)
        ));
        assert_eq!(output(|out| list(&path, &secret("new"), out)), "");
    }

    #[test]
    fn test_v1_rejects_iterations_and_groups() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("old.pws");
        let pw = secret("pw");
        assert!(create(&path, FormatVersion::V1, Some(5000), &pw, &mut Vec::new()).is_err());
        assert!(!path.exists());

        output(|out| create(&path, FormatVersion::V1, None, &pw, out));
        let entry = NewEntry {
            title: "Mail".to_owned(),
            group: Some("Inbox".to_owned()),
            ..NewEntry::default()
        };
        assert!(add(&path, &pw, &entry, &secret("x"), &mut Vec::new()).is_err());
    }
}
