use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::errors::DomainError;

/// Maximum number of data slots a single post may hold.
pub const MAX_POST_SLOTS: i32 = 100;

/// Kind of entity that embeds a content tag.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    /// A user's avatar image (single slot)
    UserAvatar,
    /// One entry of a post's data list
    PostData,
}

impl OwnerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerKind::UserAvatar => "user_avatar",
            OwnerKind::PostData => "post_data",
        }
    }
}

impl std::fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OwnerKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user_avatar" => Ok(OwnerKind::UserAvatar),
            "post_data" => Ok(OwnerKind::PostData),
            _ => Err(DomainError::InvalidOwnerKind(s.to_string())),
        }
    }
}

/// Identifies one content field on one owning entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerKey {
    pub kind: OwnerKind,
    pub owner_id: i64,
    pub slot: i32,
}

impl OwnerKey {
    pub fn avatar(user_id: i64) -> Self {
        Self {
            kind: OwnerKind::UserAvatar,
            owner_id: user_id,
            slot: 0,
        }
    }

    pub fn post_data(post_id: i64, index: i32) -> Result<Self, DomainError> {
        if !(0..MAX_POST_SLOTS).contains(&index) {
            return Err(DomainError::InvalidOwner(format!(
                "post data index {} out of range 0..{}",
                index, MAX_POST_SLOTS
            )));
        }

        Ok(Self {
            kind: OwnerKind::PostData,
            owner_id: post_id,
            slot: index,
        })
    }
}

impl std::fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.owner_id, self.slot)
    }
}
