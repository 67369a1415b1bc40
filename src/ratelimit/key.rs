//! Storage key derivation and parsing.

/// Identifier used when the caller does not distinguish quota pools.
pub const DEFAULT_IDENTIFIER: &str = "default";

/// Storage key prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "rl_";

/// The `(action, identifier)` pair a request log belongs to.
///
/// A log lives under `"<prefix><action>_<identifier>"`. Parsing is
/// anchored on the prefix and splits at the first `_` after it, so action
/// names must not contain `_` (rule validation enforces this) while
/// identifiers may contain anything, underscores included.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogKey {
    /// The action being limited (e.g. "forms", "search")
    pub action: String,
    /// Who is consuming the quota
    pub identifier: String,
}

impl LogKey {
    /// Create a new log key.
    pub fn new(action: &str, identifier: &str) -> Self {
        Self {
            action: action.to_string(),
            identifier: identifier.to_string(),
        }
    }

    /// Derive the storage key for this pair.
    pub fn to_storage_key(&self, prefix: &str) -> String {
        format!("{}{}_{}", prefix, self.action, self.identifier)
    }

    /// Recover the pair from a storage key.
    ///
    /// Returns `None` for keys outside the prefix or without a delimiter
    /// after it; cleanup uses this to skip keys that are not ours.
    pub fn from_storage_key(prefix: &str, key: &str) -> Option<Self> {
        let rest = key.strip_prefix(prefix)?;
        let sep = rest.find('_')?;
        Some(Self {
            action: rest[..sep].to_string(),
            identifier: rest[sep + 1..].to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_roundtrip() {
        let key = LogKey::new("forms", "default");
        let storage_key = key.to_storage_key(DEFAULT_PREFIX);
        assert_eq!(storage_key, "rl_forms_default");

        let parsed = LogKey::from_storage_key(DEFAULT_PREFIX, &storage_key).unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_identifier_may_contain_underscores() {
        let key = LogKey::new("search", "user_42_session_b");
        let storage_key = key.to_storage_key(DEFAULT_PREFIX);
        assert_eq!(storage_key, "rl_search_user_42_session_b");

        // The split happens at the first underscore after the action, so
        // the full identifier comes back intact.
        let parsed = LogKey::from_storage_key(DEFAULT_PREFIX, &storage_key).unwrap();
        assert_eq!(parsed.action, "search");
        assert_eq!(parsed.identifier, "user_42_session_b");
    }

    #[test]
    fn test_from_storage_key_rejects_foreign_keys() {
        assert_eq!(LogKey::from_storage_key(DEFAULT_PREFIX, "theme"), None);
        assert_eq!(LogKey::from_storage_key(DEFAULT_PREFIX, "session_token"), None);
        // Prefix but no delimiter after it
        assert_eq!(LogKey::from_storage_key(DEFAULT_PREFIX, "rl_forms"), None);
    }

    #[test]
    fn test_custom_prefix() {
        let key = LogKey::new("uploads", "default");
        let storage_key = key.to_storage_key("quota:");
        assert_eq!(storage_key, "quota:uploads_default");

        assert!(LogKey::from_storage_key("quota:", &storage_key).is_some());
        assert_eq!(LogKey::from_storage_key(DEFAULT_PREFIX, &storage_key), None);
    }
}
