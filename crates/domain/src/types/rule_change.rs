use serde::{Deserialize, Serialize};

/// What happened to a rule in a `rule` push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleChange {
    Created,
    Updated,
    /// Any other action string; ignored by the store
    #[serde(other)]
    Unknown,
}
