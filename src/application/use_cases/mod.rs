mod avatar;
mod fetch_content;
mod post_content;

pub use avatar::AvatarUseCase;
pub use fetch_content::{ContentBody, ContentDigest, DefaultContent, FetchContentUseCase};
pub use post_content::{PostContentUseCase, PostDataItem};
