//! Student records and the ordered roster printed on the sheets.

use serde::Deserialize;
use std::cmp::Reverse;
use std::fmt;

/// One row of the students table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StudentRecord {
    pub index_no: i64,
    pub name: String,
    pub stream_id: i64,
    pub nic: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamLabel {
    Ict,
    Maths,
    Other,
    Bio,
    Unknown,
}

impl StreamLabel {
    /// Resolve a stream identifier. Unrecognised ids are not an error.
    pub const fn from_id(id: i64) -> Self {
        match id {
            1 => StreamLabel::Ict,
            2 => StreamLabel::Maths,
            3 => StreamLabel::Other,
            4 => StreamLabel::Bio,
            _ => StreamLabel::Unknown,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            StreamLabel::Ict => "ICT",
            StreamLabel::Maths => "MATHS",
            StreamLabel::Other => "OTHER",
            StreamLabel::Bio => "BIO",
            StreamLabel::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for StreamLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub index_no: i64,
    pub name: String,
    pub stream: StreamLabel,
    pub nic: String,
}

impl From<StudentRecord> for RosterEntry {
    fn from(record: StudentRecord) -> Self {
        Self {
            index_no: record.index_no,
            stream: StreamLabel::from_id(record.stream_id),
            name: record.name,
            nic: record.nic,
        }
    }
}

/// Build the printable roster: longest names first, equal lengths by
/// ascending index number.
pub fn build_roster(records: Vec<StudentRecord>) -> Vec<RosterEntry> {
    let mut roster: Vec<RosterEntry> = records.into_iter().map(RosterEntry::from).collect();
    roster.sort_by_key(|entry| (Reverse(entry.name.chars().count()), entry.index_no));
    roster
}
