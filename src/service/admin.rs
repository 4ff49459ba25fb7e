//! Admin capability handed to privileged operations

use crate::error::{VaultError, VaultResult};

/// Opaque proof that the caller passed the admin check. The core never sees
/// the password itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCapability {
    Granted,
    Denied,
}

impl AdminCapability {
    /// Compare a presented password with the configured one. Without a
    /// configured password nobody is admin.
    pub fn from_password(configured: Option<&str>, presented: Option<&str>) -> Self {
        match (configured, presented) {
            (Some(expected), Some(given)) if !expected.is_empty() && expected == given => {
                AdminCapability::Granted
            }
            _ => AdminCapability::Denied,
        }
    }

    pub fn require(&self) -> VaultResult<()> {
        match self {
            AdminCapability::Granted => Ok(()),
            AdminCapability::Denied => Err(VaultError::forbidden("Access denied")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_check() {
        assert_eq!(AdminCapability::from_password(Some("s3cret"), Some("s3cret")), AdminCapability::Granted);
        assert_eq!(AdminCapability::from_password(Some("s3cret"), Some("guess")), AdminCapability::Denied);
        assert_eq!(AdminCapability::from_password(Some("s3cret"), None), AdminCapability::Denied);
        assert_eq!(AdminCapability::from_password(None, Some("")), AdminCapability::Denied);
        assert_eq!(AdminCapability::from_password(Some(""), Some("")), AdminCapability::Denied);
    }

    #[test]
    fn test_require() {
        assert!(AdminCapability::Granted.require().is_ok());
        assert!(matches!(AdminCapability::Denied.require(), Err(VaultError::Forbidden(_))));
    }
}
