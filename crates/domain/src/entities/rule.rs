//! Rules the director creates and the loopholes NPCs may find in them

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::value_objects::{RuleCost, RuleDescription, RuleName};
use crate::{LoopholeId, RuleId};

fn default_level() -> u32 {
    1
}

fn default_active() -> bool {
    true
}

/// A flaw in a rule that NPCs can exploit until it is patched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loophole {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<LoopholeId>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub patched: bool,
}

/// A rule as reported by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub cost: u32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub times_triggered: u32,
    #[serde(default)]
    pub loopholes: Vec<Loophole>,
}

impl Rule {
    pub fn new(id: impl Into<RuleId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            level: default_level(),
            cost: 0,
            is_active: true,
            times_triggered: 0,
            loopholes: Vec::new(),
        }
    }

    pub fn open_loopholes(&self) -> impl Iterator<Item = &Loophole> {
        self.loopholes.iter().filter(|l| !l.patched)
    }
}

/// A validated rule the director wants to create.
///
/// `requirements`, `trigger` and `effect` are free-form configuration
/// objects interpreted only by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDraft {
    pub name: RuleName,
    pub description: RuleDescription,
    #[serde(default)]
    pub requirements: Map<String, Value>,
    pub trigger: Map<String, Value>,
    pub effect: Map<String, Value>,
    pub cost: RuleCost,
}

impl RuleDraft {
    pub fn new(name: RuleName, description: RuleDescription, cost: RuleCost) -> Self {
        Self {
            name,
            description,
            requirements: Map::new(),
            trigger: Map::new(),
            effect: Map::new(),
            cost,
        }
    }

    pub fn with_trigger(mut self, trigger: Map<String, Value>) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn with_effect(mut self, effect: Map<String, Value>) -> Self {
        self.effect = effect;
        self
    }

    pub fn with_requirements(mut self, requirements: Map<String, Value>) -> Self {
        self.requirements = requirements;
        self
    }
}
