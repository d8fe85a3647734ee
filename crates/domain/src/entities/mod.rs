//! Domain entities - game objects mirrored from the backend

mod log_entry;
mod npc;
mod rule;
mod snapshot;

pub use log_entry::{DialogueLine, GameEvent};
pub use npc::{Npc, NpcPatch};
pub use rule::{Loophole, Rule, RuleDraft};
pub use snapshot::GameSnapshot;
