//! Who may see whose listing

use crate::metadata::Account;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Allow,
    Deny(String),
}

impl Access {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Access::Allow)
    }
}

/// Owners always see their own files; anybody else needs a known,
/// non-anonymous account. The owner's own approval state plays no part.
pub fn can_view(viewer_id: Option<&str>, owner_id: &str, viewer: Option<&Account>) -> Access {
    let Some(viewer_id) = viewer_id.filter(|v| !v.is_empty()) else {
        return Access::Deny("Access denied".to_string());
    };
    if viewer_id == owner_id {
        return Access::Allow;
    }
    match viewer {
        None => Access::Deny("Access denied".to_string()),
        Some(account) if account.is_anonymous() => {
            Access::Deny("Anonymous accounts cannot browse other users' files".to_string())
        }
        Some(_) => Access::Allow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::AccountType;

    #[test]
    fn test_owner_sees_own_files() {
        assert_eq!(can_view(Some("alice"), "alice", None), Access::Allow);
        let anon = Account::new("alice", AccountType::Anonymous, None, None);
        assert_eq!(can_view(Some("alice"), "alice", Some(&anon)), Access::Allow);
    }

    #[test]
    fn test_missing_or_unknown_viewer_is_denied() {
        assert!(!can_view(None, "alice", None).is_allowed());
        assert!(!can_view(Some(""), "alice", None).is_allowed());
        assert!(!can_view(Some("mallory"), "alice", None).is_allowed());
    }

    #[test]
    fn test_anonymous_viewer_is_denied() {
        let anon = Account::new("ghost", AccountType::Anonymous, None, None);
        assert!(matches!(can_view(Some("ghost"), "alice", Some(&anon)), Access::Deny(_)));
    }

    #[test]
    fn test_registered_viewer_is_allowed() {
        let bob = Account::new("bob", AccountType::Standard, Some("pw".into()), None);
        assert_eq!(can_view(Some("bob"), "alice", Some(&bob)), Access::Allow);
        let pending = Account::new("carol", AccountType::ApprovalRequired, Some("pw".into()), Some("1234".into()));
        assert_eq!(can_view(Some("carol"), "alice", Some(&pending)), Access::Allow);
    }
}
