mod blob_entry;
mod owned_content;

pub use blob_entry::BlobEntry;
pub use owned_content::OwnedContent;
