mod memory_store;
mod postgres_store;

pub use memory_store::MemoryStore;
pub use postgres_store::PostgresStore;
