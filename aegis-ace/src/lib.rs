//! Aegis ACE - vote tallies, delta operations, reflections, session and
//! feature state machines, runs/auto-curation, and playbook retrieval
//! (spec §4.5).

pub mod curate;
pub mod delta;
pub mod error;
pub mod feature;
pub mod playbook;
pub mod reflection;
pub mod run;
pub mod session;
pub mod vote;

pub use curate::{CurationReport, CurationRepository};
pub use delta::{DeltaOp, DeltaOutcome, DeltaRepository};
pub use error::{AceError, AceResult};
pub use feature::{CreateFeatureInput, FeatureRepository};
pub use playbook::{PlaybookHit, PlaybookQuery, PlaybookRepository};
pub use reflection::{ReflectionInput, ReflectionRepository};
pub use run::{RunRepository, StartRunInput};
pub use session::{CreateSessionInput, SessionPatch, SessionRepository};
pub use vote::VoteRepository;
