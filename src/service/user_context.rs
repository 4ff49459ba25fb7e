//! Request context for operations on one owner's namespace

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Who a request is about and who is asking.
/// Keeps handler signatures stable as request attributes grow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserContext {
    /// Owner whose files are addressed
    pub owner_id: String,
    /// Account making the request; absent for unauthenticated calls
    pub viewer_id: Option<String>,
    /// Extra request attributes, logged but not interpreted
    pub metadata: HashMap<String, String>,
}

impl UserContext {
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            viewer_id: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_viewer(owner_id: impl Into<String>, viewer_id: Option<String>) -> Self {
        Self {
            viewer_id: viewer_id.filter(|v| !v.is_empty()),
            ..Self::new(owner_id)
        }
    }

    pub fn set_metadata(&mut self, key: String, value: String) {
        self.metadata.insert(key, value);
    }

    pub fn get_metadata(&self, key: &str) -> Option<&String> {
        self.metadata.get(key)
    }

    pub fn is_owner_viewing(&self) -> bool {
        self.viewer_id.as_deref() == Some(self.owner_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_viewer_counts_as_absent() {
        let context = UserContext::with_viewer("alice", Some(String::new()));
        assert_eq!(context.viewer_id, None);
        assert!(!context.is_owner_viewing());
    }

    #[test]
    fn test_owner_viewing_own_files() {
        let mut context = UserContext::with_viewer("alice", Some("alice".to_string()));
        assert!(context.is_owner_viewing());
        context.set_metadata("user-agent".to_string(), "curl".to_string());
        assert_eq!(context.get_metadata("user-agent").map(String::as_str), Some("curl"));
    }
}
