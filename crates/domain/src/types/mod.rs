//! # Rulehaunt Domain Types
//!
//! Shared vocabulary types used by both the domain layer and the wire
//! contract in `rulehaunt-shared`.
//!
//! ## Design Principles
//!
//! 1. **Pure data types** - No I/O, no async, no side effects
//! 2. **Stable API** - Changes here affect both domain and protocol
//! 3. **Serializable** - All types derive Serialize/Deserialize

mod difficulty;
pub use difficulty::Difficulty;

mod rule_change;
pub use rule_change::RuleChange;

mod session;
pub use session::{GameMode, GamePhase, TimeOfDay};
