pub mod memory_kv;
pub mod sqlite_repo;

pub use memory_kv::MemoryKvStore;
pub use sqlite_repo::SqliteKvStore;
