//! REST request bodies sent to the backend

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use rulehaunt_domain::{Difficulty, NpcCount, RuleDraft};

/// Body of `POST /api/games`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CreateGameRequest {
    pub difficulty: Difficulty,
    pub npc_count: NpcCount,
}

impl CreateGameRequest {
    pub fn new(difficulty: Difficulty, npc_count: NpcCount) -> Self {
        Self {
            difficulty,
            npc_count,
        }
    }
}

/// Body of `POST /api/games/{id}/rules`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRuleRequest {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub requirements: Map<String, Value>,
    pub trigger: Map<String, Value>,
    pub effect: Map<String, Value>,
    pub cost: u32,
}

impl From<RuleDraft> for CreateRuleRequest {
    fn from(draft: RuleDraft) -> Self {
        Self {
            name: draft.name.into(),
            description: draft.description.into(),
            requirements: draft.requirements,
            trigger: draft.trigger,
            effect: draft.effect,
            cost: draft.cost.get(),
        }
    }
}
