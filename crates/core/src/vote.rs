//! Checksum voting across replicas.
//!
//! Voting is pure: it takes every [`ReplicaFileInfo`] of one file and returns
//! the checksum status each voting record must get. Persisting the result and
//! notifying operators is left to the caller.

use crate::state::ReplicaFileInfo;
use crate::status::{ChecksumStatus, FileListStatus};
use std::collections::BTreeMap;

/// How a vote over one file ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VoteOutcome {
    /// No replica currently lists the file.
    MissingEverywhere,
    /// The file is listed somewhere but no listing replica reported a checksum.
    NoChecksums,
    /// All listing replicas agree.
    Unanimous { checksum: String },
    /// One checksum has strictly more votes than any other.
    Majority {
        checksum: String,
        votes: usize,
        dissenting: usize,
    },
    /// Two or more checksums share the highest count.
    Tie { counts: BTreeMap<String, usize> },
}

impl VoteOutcome {
    /// The winning checksum, if the vote produced one.
    pub fn checksum(&self) -> Option<&str> {
        match self {
            Self::Unanimous { checksum } | Self::Majority { checksum, .. } => Some(checksum),
            _ => None,
        }
    }

    /// Whether the outcome needs operator attention.
    pub fn needs_attention(&self) -> bool {
        matches!(self, Self::MissingEverywhere | Self::Tie { .. })
    }
}

/// Result of voting over one file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vote {
    pub outcome: VoteOutcome,
    /// New checksum status per voting record, keyed by record guid.
    pub assignments: Vec<(i64, ChecksumStatus)>,
}

/// Vote over all records of one file.
///
/// Only records with filelist status OK and a reported checksum take part.
/// A tie never picks a winner: every voting record becomes UNKNOWN.
pub fn vote(rows: &[ReplicaFileInfo]) -> Vote {
    if !rows.iter().any(|r| r.filelist_status == FileListStatus::Ok) {
        return Vote {
            outcome: VoteOutcome::MissingEverywhere,
            assignments: Vec::new(),
        };
    }

    let voters: Vec<(&ReplicaFileInfo, &str)> = rows
        .iter()
        .filter(|r| r.is_vote_candidate())
        .filter_map(|r| r.checksum.as_deref().map(|cs| (r, cs)))
        .collect();

    if voters.is_empty() {
        return Vote {
            outcome: VoteOutcome::NoChecksums,
            assignments: Vec::new(),
        };
    }

    let counts = tally(voters.iter().map(|(_, cs)| *cs));

    if counts.len() == 1 {
        let checksum = voters[0].1.to_string();
        return Vote {
            outcome: VoteOutcome::Unanimous { checksum },
            assignments: voters
                .iter()
                .map(|(r, _)| (r.guid, ChecksumStatus::Ok))
                .collect(),
        };
    }

    match winner(&counts) {
        Some((checksum, votes)) => {
            let assignments = voters
                .iter()
                .map(|(r, cs)| {
                    let status = if *cs == checksum {
                        ChecksumStatus::Ok
                    } else {
                        ChecksumStatus::Corrupt
                    };
                    (r.guid, status)
                })
                .collect();
            Vote {
                outcome: VoteOutcome::Majority {
                    checksum: checksum.to_string(),
                    votes,
                    dissenting: voters.len() - votes,
                },
                assignments,
            }
        }
        None => Vote {
            outcome: VoteOutcome::Tie {
                counts: counts
                    .into_iter()
                    .map(|(cs, n)| (cs.to_string(), n))
                    .collect(),
            },
            assignments: voters
                .iter()
                .map(|(r, _)| (r.guid, ChecksumStatus::Unknown))
                .collect(),
        },
    }
}

/// Canonical checksum of a file for read APIs.
///
/// Any listed record already voted OK wins. Otherwise a live re-vote runs over the
/// checksums of every record that is not CORRUPT. Returns `None` when nothing
/// is known or the re-vote ties.
pub fn canonical_checksum(rows: &[ReplicaFileInfo]) -> Option<String> {
    if let Some(ok) = rows
        .iter()
        .find(|r| r.checksum_status == ChecksumStatus::Ok && r.is_vote_candidate())
    {
        return ok.checksum.clone();
    }

    let candidates: Vec<&str> = rows
        .iter()
        .filter(|r| r.checksum_status != ChecksumStatus::Corrupt)
        .filter_map(|r| r.checksum.as_deref())
        .collect();

    let counts = tally(candidates.iter().copied());
    match counts.len() {
        0 => None,
        1 => candidates.first().map(|cs| cs.to_string()),
        _ => match winner(&counts) {
            Some((checksum, _)) => Some(checksum.to_string()),
            None => {
                tracing::error!(counts = ?counts, "No checksum has the most occurrences");
                None
            }
        },
    }
}

fn tally<'a>(checksums: impl Iterator<Item = &'a str>) -> BTreeMap<&'a str, usize> {
    let mut counts = BTreeMap::new();
    for cs in checksums {
        *counts.entry(cs).or_insert(0) += 1;
    }
    counts
}

/// The checksum with a strictly highest count, or `None` on a tie.
fn winner<'a>(counts: &BTreeMap<&'a str, usize>) -> Option<(&'a str, usize)> {
    let max = counts.values().copied().max()?;
    let mut top = counts.iter().filter(|(_, n)| **n == max);
    let (checksum, votes) = top.next()?;
    if top.next().is_some() {
        return None;
    }
    Some((*checksum, *votes))
}
