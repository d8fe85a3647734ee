use serde::{Deserialize, Serialize};

use crate::types::{GameMode, GamePhase, TimeOfDay};
use crate::{GameId, Npc, Rule};

/// Full game state as delivered by a REST response or a `state` push.
///
/// `rules` is `None` when the source does not carry a rule list; the store
/// keeps its current rules in that case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub game_id: GameId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    pub current_turn: u32,
    pub fear_points: i64,
    #[serde(default)]
    pub phase: GamePhase,
    #[serde(default)]
    pub mode: GameMode,
    #[serde(default)]
    pub time_of_day: TimeOfDay,
    #[serde(default)]
    pub npcs: Vec<Npc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,
    #[serde(default)]
    pub active_rules: u32,
    #[serde(default)]
    pub total_fear_gained: i64,
    #[serde(default)]
    pub npcs_died: u32,
}

impl GameSnapshot {
    pub fn new(game_id: impl Into<GameId>) -> Self {
        Self {
            game_id: game_id.into(),
            started_at: None,
            current_turn: 0,
            fear_points: 0,
            phase: GamePhase::default(),
            mode: GameMode::default(),
            time_of_day: TimeOfDay::default(),
            npcs: Vec::new(),
            rules: None,
            active_rules: 0,
            total_fear_gained: 0,
            npcs_died: 0,
        }
    }
}
