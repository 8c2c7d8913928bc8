use aegis_database::models::{MemoryType, Scope};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Input to `MemoryRepository::add` / one item of `add_batch` (spec §4.4).
#[derive(Debug, Clone, Deserialize)]
pub struct NewMemory {
    pub content: String,
    pub agent_id: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default = "default_scope")]
    pub scope: Scope,
    #[serde(default)]
    pub shared_with: Vec<String>,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default = "default_memory_type")]
    pub memory_type: MemoryType,
    #[serde(default)]
    pub ttl_seconds: Option<i64>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub sequence_number: Option<i64>,
}

fn default_scope() -> Scope {
    Scope::AgentPrivate
}

fn default_memory_type() -> MemoryType {
    MemoryType::Standard
}

/// Result of a single `add`: whether the row returned is brand new or the
/// pre-existing live row for the same content hash (spec §4.9 dedup row).
#[derive(Debug, Clone, Serialize)]
pub struct AddOutcome {
    pub memory: aegis_database::models::Memory,
    pub deduplicated: bool,
}

/// Result of `add_batch` (spec §4.4): one embedding batch call, one
/// transaction, memories returned in input order alongside which of them
/// were deduplicated against an existing row.
#[derive(Debug, Clone, Serialize)]
pub struct BatchAddResult {
    pub memories: Vec<aegis_database::models::Memory>,
    pub added: usize,
    pub deduplicated: usize,
}

/// Optional metadata-equality filters applied as a JSONB containment check
/// (spec §4.1's GIN index on `metadata`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub metadata: Option<Value>,
    /// Restricts results to one of these memory types, used by the typed
    /// query endpoint (spec §6 `POST /memories/typed/query`). Empty means
    /// no restriction.
    #[serde(default)]
    pub memory_types: Vec<MemoryType>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SemanticSearchQuery {
    pub query: String,
    pub agent_id: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default = "default_top_k")]
    pub top_k: i64,
    #[serde(default)]
    pub min_score: Option<f64>,
    #[serde(default)]
    pub include_deprecated: bool,
}

fn default_top_k() -> i64 {
    10
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub memory: aegis_database::models::Memory,
    pub distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Json,
    Jsonl,
}

impl Default for ExportFormat {
    fn default() -> Self {
        ExportFormat::Jsonl
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportFilters {
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub include_embeddings: bool,
}
