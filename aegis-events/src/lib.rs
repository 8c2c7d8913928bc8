//! Aegis Events - typed memory variants, the memory-event timeline, and
//! interaction-event causal chains (spec §4.6).

pub mod error;
pub mod interaction;
pub mod timeline;
pub mod typed;

pub use error::{EventsError, EventsResult};
pub use interaction::{InteractionEventRepository, NewInteractionEvent};
pub use timeline::MemoryEventRepository;
pub use typed::TypedMemoryRepository;
