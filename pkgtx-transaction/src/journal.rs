use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use quick_xml::events::{BytesEnd, BytesStart, Event as XmlEvent};
use quick_xml::{Reader, Writer};

use pkgtx_types::{Name, Version};

use crate::error::TransactionError;

/// What happened to one package during a transaction (§6.1 `modstatus`, §6.2).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JournalOperation {
    /// The package was newly installed.
    Installed,
    /// The package replaced an already-installed version.
    Upgraded,
    /// The package was removed.
    Removed,
}

impl JournalOperation {
    fn as_modstatus(self) -> &'static str {
        match self {
            Self::Installed => "INSTALL",
            Self::Upgraded => "UPGRADE",
            Self::Removed => "REMOVE",
        }
    }

    fn from_modstatus(value: &str) -> Result<Self, TransactionError> {
        match value {
            "INSTALL" => Ok(Self::Installed),
            "UPGRADE" => Ok(Self::Upgraded),
            "REMOVE" => Ok(Self::Removed),
            other => Err(TransactionError::MalformedJournal(format!("unknown modstatus '{other}'"))),
        }
    }
}

/// One applied operation, recorded with enough pre-state to invert it (§4.7
/// point 5).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JournalEntry {
    /// The package this entry is about.
    pub name: Name,
    /// What was done to it.
    pub operation: JournalOperation,
    /// The version installed after the operation, if any (absent for a
    /// `Removed` entry).
    pub new_version: Option<Version>,
    /// The version installed before the operation, if any (absent for a
    /// fresh `Installed` entry). Carried as the `prevversion` attribute, an
    /// addition to the wire format needed to make reverts possible without
    /// consulting the LPS again; see `DESIGN.md`.
    pub previous_version: Option<Version>,
}

/// A persisted record of one transaction, reversible by inverting every
/// entry (§6.2).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Journal {
    /// The operations this transaction applied, in application order.
    pub entries: Vec<JournalEntry>,
}

impl Journal {
    /// Builds the entries that, applied in order, undo `self`.
    ///
    /// An `Installed` entry inverts to a `Removed` one; a `Removed` entry
    /// inverts to re-`Installed` at its `previous_version` (or, for a package
    /// that did not exist before, is simply dropped: there is nothing to
    /// restore); an `Upgraded` entry inverts to a downgrade back to
    /// `previous_version`. Order is reversed so the inversion undoes later
    /// operations first.
    pub fn inverse(&self) -> Journal {
        let entries = self
            .entries
            .iter()
            .rev()
            .filter_map(|entry| match entry.operation {
                JournalOperation::Installed => Some(JournalEntry {
                    name: entry.name.clone(),
                    operation: JournalOperation::Removed,
                    new_version: None,
                    previous_version: entry.new_version.clone(),
                }),
                JournalOperation::Upgraded => entry.previous_version.clone().map(|previous| JournalEntry {
                    name: entry.name.clone(),
                    operation: JournalOperation::Upgraded,
                    new_version: Some(previous),
                    previous_version: entry.new_version.clone(),
                }),
                JournalOperation::Removed => entry.previous_version.clone().map(|previous| JournalEntry {
                    name: entry.name.clone(),
                    operation: JournalOperation::Installed,
                    new_version: Some(previous),
                    previous_version: None,
                }),
            })
            .collect();
        Journal { entries }
    }
}

/// Serializes `journal` as a `Transaction` document (§6.1, §6.2).
pub fn write_journal_xml(journal: &Journal) -> Result<String, TransactionError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer
        .write_event(XmlEvent::Start(BytesStart::new("Transaction")))
        .map_err(|e| TransactionError::MalformedJournal(e.to_string()))?;
    writer
        .write_event(XmlEvent::Start(BytesStart::new("Packages")))
        .map_err(|e| TransactionError::MalformedJournal(e.to_string()))?;
    for entry in &journal.entries {
        let mut start = BytesStart::new("Package");
        start.push_attribute(("name", entry.name.as_str()));
        let version = entry.new_version.as_ref().or(entry.previous_version.as_ref());
        let version_text = version.map(|v| v.as_str().to_string()).unwrap_or_default();
        start.push_attribute(("version", version_text.as_str()));
        start.push_attribute(("modstatus", entry.operation.as_modstatus()));
        if let Some(previous) = &entry.previous_version {
            start.push_attribute(("prevversion", previous.as_str()));
        }
        writer
            .write_event(XmlEvent::Empty(start))
            .map_err(|e| TransactionError::MalformedJournal(e.to_string()))?;
    }
    writer
        .write_event(XmlEvent::End(BytesEnd::new("Packages")))
        .map_err(|e| TransactionError::MalformedJournal(e.to_string()))?;
    writer
        .write_event(XmlEvent::End(BytesEnd::new("Transaction")))
        .map_err(|e| TransactionError::MalformedJournal(e.to_string()))?;
    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| TransactionError::MalformedJournal(e.to_string()))
}

/// Parses a `Transaction` document back into a [`Journal`].
pub fn read_journal_xml(xml: &str) -> Result<Journal, TransactionError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text = true;
    let mut buf = Vec::new();
    let mut entries = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| TransactionError::MalformedJournal(e.to_string()))?;
        match event {
            XmlEvent::Start(tag) | XmlEvent::Empty(tag) if tag.name().as_ref() == b"Package" => {
                entries.push(parse_package_entry(&tag)?);
            }
            XmlEvent::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(Journal { entries })
}

fn parse_package_entry(start: &BytesStart<'_>) -> Result<JournalEntry, TransactionError> {
    let mut name = None;
    let mut version = None;
    let mut modstatus = None;
    let mut prevversion = None;

    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| TransactionError::MalformedJournal(e.to_string()))?;
        let value = attribute
            .unescape_value()
            .map_err(|e| TransactionError::MalformedJournal(e.to_string()))?
            .into_owned();
        match attribute.key.as_ref() {
            b"name" => name = Some(value),
            b"version" => version = Some(value),
            b"modstatus" => modstatus = Some(value),
            b"prevversion" => prevversion = Some(value),
            _ => {}
        }
    }

    let name = name.ok_or_else(|| TransactionError::MalformedJournal("Package missing name".to_string()))?;
    let name = Name::new(name).map_err(|e| TransactionError::MalformedJournal(e.to_string()))?;
    let operation = modstatus.ok_or_else(|| TransactionError::MalformedJournal("Package missing modstatus".to_string()))?;
    let operation = JournalOperation::from_modstatus(&operation)?;

    let previous_version = prevversion
        .map(Version::new)
        .transpose()
        .map_err(|e| TransactionError::MalformedJournal(e.to_string()))?;

    let new_version = match operation {
        JournalOperation::Removed => None,
        _ => version
            .filter(|v| !v.is_empty())
            .map(Version::new)
            .transpose()
            .map_err(|e| TransactionError::MalformedJournal(e.to_string()))?,
    };

    Ok(JournalEntry {
        name,
        operation,
        new_version,
        previous_version,
    })
}

/// Picks the first free path in `dir` for a journal named after `timestamp`,
/// appending numeric suffixes `.1`, `.2`, … on collision (§6.2).
fn free_journal_path(dir: &Path, timestamp: u64) -> PathBuf {
    let base = dir.join(format!("transaction-{timestamp}.xml"));
    if !base.exists() {
        return base;
    }
    let mut suffix = 1u64;
    loop {
        let candidate = dir.join(format!("transaction-{timestamp}.xml.{suffix}"));
        if !candidate.exists() {
            return candidate;
        }
        suffix += 1;
    }
}

/// Writes `journal` atomically into `transaction_dir`, creating the directory
/// if needed, and returns the path it was written to.
pub fn write_journal(transaction_dir: &Path, journal: &Journal) -> Result<PathBuf, TransactionError> {
    fs::create_dir_all(transaction_dir)?;
    let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    let path = free_journal_path(transaction_dir, timestamp);
    let xml = write_journal_xml(journal)?;
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, xml)?;
    fs::rename(&tmp_path, &path)?;
    Ok(path)
}

/// Reads the journal at `path`.
pub fn read_journal(path: &Path) -> Result<Journal, TransactionError> {
    let xml = fs::read_to_string(path)?;
    read_journal_xml(&xml)
}
