//! Value objects validated on construction

mod names;
mod quantity;

pub use names::{RuleDescription, RuleName};
pub use quantity::{NpcCount, RuleCost};
