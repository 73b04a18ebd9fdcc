//! Versioned flat-file format of the registry.
//!
//! The first line holds the format version. Every further line describes one
//! file:
//!
//! ```text
//! <filename> <checksum> <aggregate state> <millis>[ , <replica> <state> <millis>]*
//! ```
//!
//! Version 0.3 lines carry no aggregate or timestamps:
//! `<filename> <checksum>[ <replica> <state>]*`. Later lines for the same file
//! update the entry built by earlier ones, which is what the append path relies on.

use crate::entry::RegistryEntry;
use crate::error::{RegistryError, RegistryResult};
use bitpres_core::ReplicaStoreState;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use time::OffsetDateTime;

/// Version written by this crate.
pub const VERSION: &str = "0.4";

/// Older version accepted on read and upgraded on the next rewrite.
pub const OLD_VERSION: &str = "0.3";

/// Separates the file part of a line from each replica part.
pub const COMPONENT_SEPARATOR: &str = " , ";

const DELIMITER: char = ' ';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatVersion {
    Current,
    Old,
}

impl FormatVersion {
    pub fn parse(header: &str) -> RegistryResult<Self> {
        match header.trim() {
            VERSION => Ok(Self::Current),
            OLD_VERSION => Ok(Self::Old),
            other => Err(RegistryError::UnsupportedVersion(other.to_string())),
        }
    }
}

/// One decoded line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedLine {
    pub filename: String,
    pub checksum: String,
    pub states: Vec<(String, ReplicaStoreState, OffsetDateTime)>,
}

/// What loading a registry file found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadReport {
    pub version: FormatVersion,
    /// Non-empty data lines read.
    pub lines: usize,
    /// Filenames whose entry was dropped because of a corrupt line.
    pub dropped: BTreeSet<String>,
}

/// Milliseconds since the Unix epoch.
pub fn to_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

pub fn from_millis(millis: i64) -> RegistryResult<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .map_err(|e| RegistryError::Corrupt(format!("timestamp {millis} out of range: {e}")))
}

/// `at` truncated to what the format can hold.
pub fn truncate_to_millis(at: OffsetDateTime) -> OffsetDateTime {
    from_millis(to_millis(at)).unwrap_or(at)
}

fn parse_state(value: &str) -> RegistryResult<ReplicaStoreState> {
    value
        .parse()
        .map_err(|_| RegistryError::Corrupt(format!("unknown store state '{value}'")))
}

fn parse_millis(value: &str) -> RegistryResult<OffsetDateTime> {
    let millis = value
        .parse::<i64>()
        .map_err(|_| RegistryError::Corrupt(format!("bad timestamp '{value}'")))?;
    from_millis(millis)
}

/// Decode a version 0.4 line.
pub fn parse_current_line(line: &str) -> RegistryResult<ParsedLine> {
    let mut components = line.split(COMPONENT_SEPARATOR);
    let head: Vec<&str> = components
        .next()
        .unwrap_or_default()
        .split(DELIMITER)
        .collect();
    let [filename, checksum, aggregate, millis] = head.as_slice() else {
        return Err(RegistryError::Corrupt(format!(
            "expected '<filename> <checksum> <state> <millis>', got {} fields",
            head.len()
        )));
    };
    if filename.is_empty() || checksum.is_empty() {
        return Err(RegistryError::Corrupt("empty filename or checksum".to_string()));
    }
    // The aggregate is derived on read; it only has to be well formed.
    parse_state(aggregate)?;
    parse_millis(millis)?;

    let mut states = Vec::new();
    for component in components {
        let parts: Vec<&str> = component.split(DELIMITER).collect();
        let [replica, state, millis] = parts.as_slice() else {
            return Err(RegistryError::Corrupt(format!(
                "expected '<replica> <state> <millis>', got {} fields",
                parts.len()
            )));
        };
        if replica.is_empty() {
            return Err(RegistryError::Corrupt("empty replica id".to_string()));
        }
        states.push((replica.to_string(), parse_state(state)?, parse_millis(millis)?));
    }

    Ok(ParsedLine {
        filename: filename.to_string(),
        checksum: checksum.to_string(),
        states,
    })
}

/// Decode a version 0.3 line. States are stamped with `now`.
pub fn parse_old_line(line: &str, now: OffsetDateTime) -> RegistryResult<ParsedLine> {
    let parts: Vec<&str> = line.split(DELIMITER).collect();
    if parts.len() < 2 || parts.len() % 2 != 0 {
        return Err(RegistryError::Corrupt(format!(
            "expected an even number of fields, at least two, got {}",
            parts.len()
        )));
    }
    if parts[0].is_empty() || parts[1].is_empty() {
        return Err(RegistryError::Corrupt("empty filename or checksum".to_string()));
    }
    let states = parts[2..]
        .chunks_exact(2)
        .map(|pair| Ok((pair[0].to_string(), parse_state(pair[1])?, now)))
        .collect::<RegistryResult<Vec<_>>>()?;

    Ok(ParsedLine {
        filename: parts[0].to_string(),
        checksum: parts[1].to_string(),
        states,
    })
}

/// Encode one entry as a version 0.4 line, without the newline.
pub fn format_entry(
    entry: &RegistryEntry,
    checksum_only: &BTreeSet<String>,
    now: OffsetDateTime,
) -> String {
    let aggregate = entry.aggregate(now, checksum_only);
    let mut line = format!(
        "{} {} {} {}",
        entry.filename,
        entry.checksum,
        aggregate.state.as_str(),
        to_millis(aggregate.changed_at)
    );
    for (replica, report) in &entry.states {
        let _ = write!(
            line,
            "{COMPONENT_SEPARATOR}{replica} {} {}",
            report.state.as_str(),
            to_millis(report.changed_at)
        );
    }
    line
}

/// Encode a whole registry, header included.
pub fn format_registry<'a>(
    entries: impl IntoIterator<Item = &'a RegistryEntry>,
    checksum_only: &BTreeSet<String>,
    now: OffsetDateTime,
) -> String {
    let mut out = String::new();
    out.push_str(VERSION);
    out.push('\n');
    for entry in entries {
        out.push_str(&format_entry(entry, checksum_only, now));
        out.push('\n');
    }
    out
}

/// Decode a whole registry file.
///
/// A corrupt line drops every entry of its filename for the rest of the load,
/// as does a line whose checksum contradicts an earlier line for the file.
/// An unknown version header is an error.
pub fn parse_registry(
    content: &str,
    now: OffsetDateTime,
) -> RegistryResult<(BTreeMap<String, RegistryEntry>, LoadReport)> {
    let mut lines = content.lines();
    let version = match lines.next() {
        Some(header) => FormatVersion::parse(header)?,
        None => FormatVersion::Current,
    };

    let mut entries: BTreeMap<String, RegistryEntry> = BTreeMap::new();
    let mut report = LoadReport {
        version,
        lines: 0,
        dropped: BTreeSet::new(),
    };

    for (number, line) in lines.enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        report.lines += 1;
        let filename = line.split(DELIMITER).next().unwrap_or_default();
        if report.dropped.contains(filename) {
            tracing::debug!(filename, line = number + 2, "Skipping line of dropped entry");
            continue;
        }

        let parsed = match version {
            FormatVersion::Current => parse_current_line(line),
            FormatVersion::Old => parse_old_line(line, now),
        };
        let parsed = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(
                    filename,
                    line = number + 2,
                    error = %e,
                    "Corrupt registry line, dropping entry"
                );
                if !filename.is_empty() {
                    entries.remove(filename);
                    report.dropped.insert(filename.to_string());
                }
                continue;
            }
        };

        let entry = entries
            .entry(parsed.filename.clone())
            .or_insert_with(|| RegistryEntry::new(&parsed.filename, &parsed.checksum, None));
        if entry.checksum != parsed.checksum {
            tracing::warn!(
                filename = %parsed.filename,
                old = %entry.checksum,
                new = %parsed.checksum,
                line = number + 2,
                "Conflicting checksum in registry, dropping entry"
            );
            entries.remove(&parsed.filename);
            report.dropped.insert(parsed.filename);
            continue;
        }
        for (replica, state, at) in parsed.states {
            entry.set_state(&replica, state, at);
        }
    }

    Ok((entries, report))
}
