//! REST response bodies returned by the backend
//!
//! DTOs mirror the backend's JSON field-for-field; conversions into domain
//! entities live next to them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use rulehaunt_domain::{
    GameEvent, GameMode, GamePhase, GameSnapshot, Loophole, Npc, Rule, TimeOfDay,
};

// =============================================================================
// Game state
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcStatus {
    pub id: String,
    pub name: String,
    pub hp: i32,
    pub sanity: i32,
    pub fear: i32,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub status_effects: Vec<String>,
    pub is_alive: bool,
}

impl From<NpcStatus> for Npc {
    fn from(dto: NpcStatus) -> Self {
        Npc {
            id: dto.id.into(),
            name: dto.name,
            hp: dto.hp,
            sanity: dto.sanity,
            fear: dto.fear,
            location: dto.location,
            status_effects: dto.status_effects,
            is_alive: dto.is_alive,
        }
    }
}

/// Response of `POST /api/games`, `GET /api/games/{id}`, `POST /api/games/load`
/// and the payload of `state` pushes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStateResponse {
    pub game_id: String,
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
    pub npcs: Vec<NpcStatus>,
    #[serde(default)]
    pub active_rules: u32,
    #[serde(default)]
    pub total_fear_gained: i64,
    #[serde(default)]
    pub npcs_died: u32,
}

impl From<GameStateResponse> for GameSnapshot {
    fn from(dto: GameStateResponse) -> Self {
        GameSnapshot {
            game_id: dto.game_id.into(),
            started_at: dto.started_at,
            current_turn: dto.current_turn,
            fear_points: dto.fear_points,
            phase: dto.phase,
            mode: dto.mode,
            time_of_day: dto.time_of_day,
            npcs: dto.npcs.into_iter().map(Npc::from).collect(),
            // State responses never carry the rule list
            rules: None,
            active_rules: dto.active_rules,
            total_fear_gained: dto.total_fear_gained,
            npcs_died: dto.npcs_died,
        }
    }
}

// =============================================================================
// Rules
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub level: u32,
    pub cost: u32,
    pub is_active: bool,
    #[serde(default)]
    pub times_triggered: u32,
    /// Free-form loophole records; only `id`, `description` and `patched` are read
    #[serde(default)]
    pub loopholes: Vec<Value>,
}

impl From<RuleInfo> for Rule {
    fn from(dto: RuleInfo) -> Self {
        let loopholes = dto
            .loopholes
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<Loophole>(raw) {
                Ok(loophole) => Some(loophole),
                Err(e) => {
                    tracing::debug!(rule_id = %dto.id, error = %e, "Skipping unreadable loophole");
                    None
                }
            })
            .collect();

        Rule {
            id: dto.id.into(),
            name: dto.name,
            description: dto.description,
            level: dto.level,
            cost: dto.cost,
            is_active: dto.is_active,
            times_triggered: dto.times_triggered,
            loopholes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRuleResponse {
    pub rule_id: String,
    pub cost: u32,
}

// =============================================================================
// Turns
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnResult {
    pub turn: u32,
    #[serde(default)]
    pub events: Vec<GameEvent>,
    #[serde(default)]
    pub fear_gained: i64,
    #[serde(default)]
    pub npcs_affected: Vec<String>,
    #[serde(default)]
    pub rules_triggered: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}

// =============================================================================
// Saves, health, misc
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveGameResponse {
    pub filename: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    #[serde(default)]
    pub active_games: u32,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy" || self.status == "ok"
    }
}

/// Plain `{message}` acknowledgement (e.g. game deletion)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Error body of a non-2xx response.
///
/// The backend uses `detail` (a string, or a list of validation errors);
/// other servers use `message`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ErrorBody {
    /// Best human-readable message: `message`, else `detail`, else `error`.
    pub fn best_message(&self) -> Option<String> {
        if let Some(message) = self.message.as_ref().filter(|m| !m.is_empty()) {
            return Some(message.clone());
        }
        if let Some(detail) = &self.detail {
            if let Some(text) = detail_text(detail) {
                return Some(text);
            }
        }
        self.error.clone().filter(|e| !e.is_empty())
    }
}

fn detail_text(detail: &Value) -> Option<String> {
    match detail {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        // Validation errors: [{"loc": [...], "msg": "...", "type": "..."}]
        Value::Array(items) => {
            let messages: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(obj) => obj
                        .get("msg")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    _ => None,
                })
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        Value::Object(obj) => obj
            .get("msg")
            .or_else(|| obj.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}
