//! Aegis Memory - Memory Repository
//!
//! CRUD, content-hash dedup, TTL, ACL-filtered semantic search, and batch
//! insert over the `memories` table (spec §4.4).

pub mod error;
pub mod repository;
pub mod types;

pub use error::{MemoryError, MemoryResult};
pub use repository::{memory_from_row, MemoryRepository, SELECT_MEMORY_COLUMNS};
pub use types::{
    AddOutcome, BatchAddResult, ExportFilters, ExportFormat, NewMemory, SearchFilters, SearchHit,
    SemanticSearchQuery,
};
