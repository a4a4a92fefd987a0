mod content_tag;
mod media_type;
mod owner;

pub use content_tag::{ContentTag, TAG_HEX_LEN};
pub use media_type::{
    MediaType, IMAGE_GIF, IMAGE_JPEG, IMAGE_PNG, IMAGE_WEBP, TEXT_MARKDOWN, TEXT_PLAIN,
};
pub use owner::{OwnerKey, OwnerKind, MAX_POST_SLOTS};
