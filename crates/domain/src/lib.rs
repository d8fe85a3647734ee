//! # Rulehaunt Domain
//!
//! Identifiers, validated value objects and the game entities the player
//! client mirrors from the backend. No I/O lives here.

pub mod entities;
pub mod error;
pub mod ids;
pub mod types;
pub mod value_objects;

pub use entities::{DialogueLine, GameEvent, GameSnapshot, Loophole, Npc, NpcPatch, Rule, RuleDraft};
pub use error::DomainError;
pub use ids::{GameId, LoopholeId, NpcId, RuleId};
pub use types::{Difficulty, GameMode, GamePhase, RuleChange, TimeOfDay};
pub use value_objects::{NpcCount, RuleCost, RuleDescription, RuleName};
