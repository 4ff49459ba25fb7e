//! Naming of quarantined resources
//!
//! A trashed account is named `<owner>__<millis>`; a trashed file is named
//! `<owner>/<file>__<millis>`. The millisecond timestamp is the move time and
//! the only input of the retention decision, so every backend can rebuild the
//! entry from the name alone.

use chrono::{DateTime, Duration, Utc};

use crate::metadata::{validate_owner_id, TRASH_SEPARATOR};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrashEntry {
    pub owner_id: String,
    /// `None` when the whole account was trashed
    pub file_name: Option<String>,
    pub moved_at: DateTime<Utc>,
}

impl TrashEntry {
    pub fn for_file(owner_id: &str, file_name: &str, moved_at: DateTime<Utc>) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            file_name: Some(file_name.to_string()),
            moved_at: truncate_to_millis(moved_at),
        }
    }

    pub fn for_account(owner_id: &str, moved_at: DateTime<Utc>) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            file_name: None,
            moved_at: truncate_to_millis(moved_at),
        }
    }

    pub fn is_account(&self) -> bool {
        self.file_name.is_none()
    }

    /// Last path component: `<file>__<millis>` or `<owner>__<millis>`
    pub fn leaf_name(&self) -> String {
        let base = self.file_name.as_deref().unwrap_or(&self.owner_id);
        format!("{}{}{}", base, TRASH_SEPARATOR, self.moved_at.timestamp_millis())
    }

    /// Full entry name, unique across the quarantine area
    pub fn name(&self) -> String {
        match self.file_name {
            Some(_) => format!("{}/{}", self.owner_id, self.leaf_name()),
            None => self.leaf_name(),
        }
    }

    /// Same resource, moved one millisecond later; used to step around a
    /// name collision
    pub fn bumped(&self) -> Self {
        Self {
            moved_at: self.moved_at + Duration::milliseconds(1),
            ..self.clone()
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.moved_at
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.split_once('/') {
            Some((owner_id, leaf)) => {
                validate_owner_id(owner_id).ok()?;
                let (file_name, moved_at) = split_stamp(leaf)?;
                if file_name.is_empty() || file_name.contains('/') {
                    return None;
                }
                Some(Self {
                    owner_id: owner_id.to_string(),
                    file_name: Some(file_name.to_string()),
                    moved_at,
                })
            }
            None => {
                let (owner_id, moved_at) = split_stamp(name)?;
                validate_owner_id(owner_id).ok()?;
                Some(Self {
                    owner_id: owner_id.to_string(),
                    file_name: None,
                    moved_at,
                })
            }
        }
    }
}

/// True when a bare top-level name is an account entry rather than an
/// owner's folder of trashed files
pub fn is_account_entry_name(name: &str) -> bool {
    !name.contains('/') && TrashEntry::parse(name).is_some()
}

fn split_stamp(name: &str) -> Option<(&str, DateTime<Utc>)> {
    let (base, stamp) = name.rsplit_once(TRASH_SEPARATOR)?;
    if stamp.is_empty() || !stamp.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let millis: i64 = stamp.parse().ok()?;
    Some((base, DateTime::from_timestamp_millis(millis)?))
}

fn truncate_to_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(at.timestamp_millis()).unwrap_or(at)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    #[test]
    fn test_file_entry_name_and_parse() {
        let entry = TrashEntry::for_file("alice", "report.pdf", at(1_700_000_000_123));
        assert_eq!(entry.name(), "alice/report.pdf__1700000000123");
        assert_eq!(entry.leaf_name(), "report.pdf__1700000000123");
        assert_eq!(TrashEntry::parse(&entry.name()), Some(entry));
    }

    #[test]
    fn test_account_entry_name_and_parse() {
        let entry = TrashEntry::for_account("bob", at(42));
        assert_eq!(entry.name(), "bob__42");
        assert!(entry.is_account());
        assert_eq!(TrashEntry::parse("bob__42"), Some(entry));
        assert!(is_account_entry_name("bob__42"));
        assert!(!is_account_entry_name("bob"));
    }

    #[test]
    fn test_file_names_may_contain_separator() {
        let entry = TrashEntry::for_file("carol", "a__b.txt", at(7));
        let parsed = TrashEntry::parse(&entry.name()).unwrap();
        assert_eq!(parsed.file_name.as_deref(), Some("a__b.txt"));
        assert_eq!(parsed.moved_at, at(7));
    }

    #[test]
    fn test_unparseable_names() {
        assert!(TrashEntry::parse("alice").is_none());
        assert!(TrashEntry::parse("alice__").is_none());
        assert!(TrashEntry::parse("alice__12x").is_none());
        assert!(TrashEntry::parse("alice/file.txt").is_none());
        assert!(TrashEntry::parse(".trash/x__1").is_none());
        assert!(TrashEntry::parse("alice/__5").is_none());
    }

    #[test]
    fn test_age_and_bump() {
        let entry = TrashEntry::for_account("dan", at(1_000));
        assert_eq!(entry.age(at(4_000)), Duration::milliseconds(3_000));
        assert_eq!(entry.bumped().name(), "dan__1001");
    }

    #[test]
    fn test_moved_at_is_truncated_to_millis() {
        let precise = at(5_000) + Duration::microseconds(750);
        let entry = TrashEntry::for_file("eve", "x", precise);
        assert_eq!(TrashEntry::parse(&entry.name()).unwrap(), entry);
    }
}
