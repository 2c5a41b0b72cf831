pub mod config;
pub mod memory_repo;
mod pg_helpers;
pub mod pg_repo;
pub mod repository;

pub use memory_repo::MemoryRepository;
pub use pg_repo::PostgresSyncRepository;
pub use repository::{EntityFilter, RepoResult, RepositoryError, StoredPlacement, SyncRepository};
