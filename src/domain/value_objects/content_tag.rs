use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Length of a tag in hex characters (SHA-256 = 32 bytes).
pub const TAG_HEX_LEN: usize = 64;

/// Content-derived identifier of a blob entry.
///
/// A tag is the lowercase hex SHA-256 of the entry's bytes. It is the primary
/// key of the blob table and is also surfaced verbatim as the HTTP `ETag` of
/// any representation served from that entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentTag(String);

impl ContentTag {
    /// Parse a tag supplied from outside (URL path, database row, header).
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();

        if value.len() != TAG_HEX_LEN {
            return Err(DomainError::InvalidTag {
                expected: format!("{} hex characters", TAG_HEX_LEN),
                actual: format!("{} characters", value.len()),
            });
        }

        if !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DomainError::InvalidTag {
                expected: "hex characters only".to_string(),
                actual: value,
            });
        }

        Ok(Self(value.to_ascii_lowercase()))
    }

    /// Wrap a freshly computed digest. Callers must pass lowercase hex.
    pub(crate) fn from_digest_hex(hex: String) -> Self {
        debug_assert_eq!(hex.len(), TAG_HEX_LEN);
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl std::fmt::Display for ContentTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ContentTag {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ContentTag {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ContentTag> for String {
    fn from(tag: ContentTag) -> Self {
        tag.0
    }
}

impl AsRef<str> for ContentTag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_parse_valid() {
        let hex = "a".repeat(64);
        let tag = ContentTag::parse(hex.clone()).unwrap();
        assert_eq!(tag.as_str(), hex);
    }

    #[test]
    fn test_parse_normalizes_case() {
        let tag = ContentTag::parse("AB".repeat(32)).unwrap();
        assert_eq!(tag.as_str(), "ab".repeat(32));
    }

    #[test]
    fn test_parse_invalid_length() {
        let err = ContentTag::parse("a".repeat(63)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTag { .. }));
    }

    #[test]
    fn test_parse_invalid_chars() {
        let err = ContentTag::from_str(&"g".repeat(64)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTag { .. }));
    }

    #[test]
    fn test_serde_rejects_malformed() {
        let result: Result<ContentTag, _> = serde_json::from_str("\"nothex\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_display_and_short() {
        let hex = "0123456789ab".to_string() + &"c".repeat(52);
        let tag = ContentTag::parse(hex.clone()).unwrap();
        assert_eq!(tag.to_string(), hex);
        assert_eq!(tag.short(), "0123456789ab");
    }
}
