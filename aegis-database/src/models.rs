//! Core domain types shared by every repository crate.
//!
//! Stored as `TEXT` columns and converted at the repository boundary via
//! `Display`/`FromStr`, the same manual row-mapping discipline the teacher
//! uses for its `memory_type as i32` / `TryFrom<i32>` pattern in
//! `agent-memory/src/types.rs` — text here instead of an integer code
//! because these are read directly by ad-hoc SQL and dashboards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid value {0:?} for {1}")]
pub struct ParseEnumError(String, &'static str);

macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let s = match self {
                    $(Self::$variant => $text),+
                };
                write!(f, "{s}")
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ParseEnumError(other.to_string(), stringify!($name))),
                }
            }
        }
    };
}

text_enum!(Scope {
    AgentPrivate => "agent-private",
    AgentShared => "agent-shared",
    Global => "global",
});

text_enum!(MemoryType {
    Standard => "standard",
    Reflection => "reflection",
    Progress => "progress",
    Feature => "feature",
    Strategy => "strategy",
    Episodic => "episodic",
    Semantic => "semantic",
    Procedural => "procedural",
    Control => "control",
});

text_enum!(Vote {
    Helpful => "helpful",
    Harmful => "harmful",
});

text_enum!(SessionStatus {
    Active => "active",
    Paused => "paused",
    Completed => "completed",
    Failed => "failed",
});

text_enum!(FeatureStatus {
    NotStarted => "not_started",
    InProgress => "in_progress",
    Testing => "testing",
    Complete => "complete",
    Failed => "failed",
    Blocked => "blocked",
});

text_enum!(RunOutcome {
    Success => "success",
    Failure => "failure",
    Partial => "partial",
});

/// The atomic memory row (spec §3 "Memory").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    pub project_id: uuid::Uuid,
    pub namespace: String,
    pub agent_id: String,
    pub content: String,
    pub content_hash: String,
    pub embedding: Vec<f32>,
    pub scope: Scope,
    pub shared_with: Vec<String>,
    pub memory_type: MemoryType,
    pub is_deprecated: bool,
    pub superseded_by: Option<String>,
    pub deprecation_reason: Option<String>,
    pub helpful_votes: i64,
    pub harmful_votes: i64,
    pub ttl_seconds: Option<i64>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub session_id: Option<String>,
    pub entity_id: Option<String>,
    pub sequence_number: Option<i64>,
    pub metadata: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Memory {
    /// Derived effectiveness score, range `(-1, 1)` (spec §4.5).
    pub fn effectiveness(&self) -> f64 {
        let helpful = self.helpful_votes as f64;
        let harmful = self.harmful_votes as f64;
        (helpful - harmful) / (helpful + harmful + 1.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteHistoryRow {
    pub id: uuid::Uuid,
    pub memory_id: String,
    pub voter_agent_id: String,
    pub vote: Vote,
    pub context: Option<String>,
    pub task_id: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedItem {
    pub item: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionProgress {
    pub session_id: String,
    pub project_id: uuid::Uuid,
    pub completed: Vec<String>,
    pub in_progress: Vec<String>,
    pub next: Vec<String>,
    pub blocked: Vec<BlockedItem>,
    pub summary: Option<String>,
    pub last_action: Option<String>,
    pub status: Option<SessionStatus>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureTracker {
    pub feature_id: String,
    pub project_id: uuid::Uuid,
    pub description: String,
    pub test_steps: Vec<String>,
    pub passed_steps: Vec<String>,
    pub status: FeatureStatus,
    pub passes: bool,
    pub failure_reason: Option<String>,
    pub verified_by: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AceRun {
    pub run_id: uuid::Uuid,
    pub project_id: uuid::Uuid,
    pub agent_id: String,
    pub task: String,
    pub memories_used: Vec<String>,
    pub outcome: Option<RunOutcome>,
    pub error_pattern: Option<String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEvent {
    pub event_id: uuid::Uuid,
    pub memory_id: String,
    pub project_id: uuid::Uuid,
    pub namespace: String,
    pub agent_id: Option<String>,
    pub event_type: String,
    pub event_payload: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub event_id: uuid::Uuid,
    pub project_id: uuid::Uuid,
    pub session_id: String,
    pub agent_id: String,
    pub parent_event_id: Option<uuid::Uuid>,
    pub kind: String,
    pub content: String,
    pub embedding: Option<Vec<f32>>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: uuid::Uuid,
    pub name: String,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: uuid::Uuid,
    pub project_id: uuid::Uuid,
    pub key_hash: String,
    pub name: String,
    pub is_active: bool,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_type_round_trips_through_text() {
        for mt in [
            MemoryType::Standard,
            MemoryType::Reflection,
            MemoryType::Progress,
            MemoryType::Feature,
            MemoryType::Strategy,
            MemoryType::Episodic,
            MemoryType::Semantic,
            MemoryType::Procedural,
            MemoryType::Control,
        ] {
            let text = mt.to_string();
            assert_eq!(MemoryType::from_str(&text).unwrap(), mt);
        }
    }

    #[test]
    fn unknown_scope_text_is_rejected() {
        assert!(Scope::from_str("not-a-scope").is_err());
    }

    #[test]
    fn effectiveness_is_bounded_and_monotone() {
        let mut m = sample_memory();
        m.helpful_votes = 10;
        m.harmful_votes = 0;
        let high = m.effectiveness();
        m.helpful_votes = 0;
        m.harmful_votes = 10;
        let low = m.effectiveness();
        assert!(high > low);
        assert!(high < 1.0 && high > -1.0);
        assert!(low < 1.0 && low > -1.0);
    }

    fn sample_memory() -> Memory {
        Memory {
            id: "m1".into(),
            project_id: uuid::Uuid::nil(),
            namespace: "default".into(),
            agent_id: "a1".into(),
            content: "hello".into(),
            content_hash: "hash".into(),
            embedding: vec![0.0; 4],
            scope: Scope::Global,
            shared_with: vec![],
            memory_type: MemoryType::Standard,
            is_deprecated: false,
            superseded_by: None,
            deprecation_reason: None,
            helpful_votes: 0,
            harmful_votes: 0,
            ttl_seconds: None,
            expires_at: None,
            session_id: None,
            entity_id: None,
            sequence_number: None,
            metadata: serde_json::json!({}),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }
}
