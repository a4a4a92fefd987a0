mod content_validator;
mod store_session;

pub use content_validator::{ContentRejected, ContentValidator};
pub use store_session::{
    ContentScope, RefTally, ReleaseOutcome, RepositoryError, RetainOutcome, SessionFactory,
    StoreSession,
};

#[cfg(test)]
pub use content_validator::MockContentValidator;
#[cfg(test)]
pub use store_session::MockSessionFactory;
