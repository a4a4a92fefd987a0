use crate::application::ports::{ContentRejected, ContentValidator};
use crate::domain::value_objects::{
    MediaType, IMAGE_GIF, IMAGE_JPEG, IMAGE_PNG, IMAGE_WEBP, TEXT_MARKDOWN, TEXT_PLAIN,
};

const DEFAULT_ALLOWED: [&str; 6] = [
    IMAGE_PNG,
    IMAGE_JPEG,
    IMAGE_GIF,
    IMAGE_WEBP,
    TEXT_PLAIN,
    TEXT_MARKDOWN,
];

/// Accepts a fixed set of media types.
///
/// Text types must be valid UTF-8. Image bytes are not sniffed; the declared
/// type is trusted once it is on the list.
#[derive(Debug, Clone)]
pub struct AllowListValidator {
    allowed: Vec<MediaType>,
}

impl AllowListValidator {
    pub fn new(allowed: Vec<MediaType>) -> Self {
        Self { allowed }
    }

    pub fn allowed(&self) -> &[MediaType] {
        &self.allowed
    }
}

impl Default for AllowListValidator {
    fn default() -> Self {
        let allowed = DEFAULT_ALLOWED
            .iter()
            .filter_map(|value| MediaType::parse(value).ok())
            .collect();
        Self { allowed }
    }
}

impl ContentValidator for AllowListValidator {
    fn validate(&self, data: &[u8], declared: &MediaType) -> Result<MediaType, ContentRejected> {
        if !self.allowed.contains(declared) {
            return Err(ContentRejected::UnsupportedType(declared.to_string()));
        }

        if declared.is_text() {
            if let Err(e) = std::str::from_utf8(data) {
                return Err(ContentRejected::Malformed {
                    media_type: declared.to_string(),
                    reason: format!("invalid UTF-8 at byte {}", e.valid_up_to()),
                });
            }
        }

        Ok(declared.clone())
    }
}
