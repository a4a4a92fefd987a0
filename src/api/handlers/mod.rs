pub mod avatar;
pub mod blobs;
mod content;
pub mod health;
pub mod posts;

pub use avatar::{delete_avatar_handler, get_avatar_handler, put_avatar_handler};
pub use blobs::blob_stat_handler;
pub use health::{health_handler, readiness_handler};
pub use posts::{
    delete_all_posts_handler, delete_post_handler, get_post_data_handler, put_post_data_handler,
};
