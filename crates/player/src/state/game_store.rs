//! Game State Store
//!
//! Canonical client view of one game, mutated by REST responses and by
//! WebSocket pushes. Every mutation is a plain method on `&mut self`; sharing
//! across tasks goes through [`SharedGameStore`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use rulehaunt_domain::{
    DialogueLine, DomainError, GameEvent, GameId, GameMode, GamePhase, GameSnapshot, Npc, NpcId,
    NpcPatch, Rule, RuleChange, RuleId, TimeOfDay,
};
use rulehaunt_shared::{StreamChunkData, TurnResult};

use super::event_log::{EventLog, LogPolicy};

/// Fear points a fresh game starts with
pub const INITIAL_FEAR_POINTS: i64 = 1000;

/// Most chunks held for one unfinished stream
pub const MAX_STREAM_CHUNKS: usize = 256;

/// What to do with a patch or update for an id the store does not hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownEntityPolicy {
    #[default]
    Drop,
    Append,
}

impl UnknownEntityPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnknownEntityPolicy::Drop => "drop",
            UnknownEntityPolicy::Append => "append",
        }
    }
}

impl fmt::Display for UnknownEntityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnknownEntityPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(UnknownEntityPolicy::Drop),
            "append" => Ok(UnknownEntityPolicy::Append),
            other => Err(DomainError::parse(format!(
                "unknown entity policy: {other} (expected drop or append)"
            ))),
        }
    }
}

/// Store behaviour knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorePolicy {
    pub unknown_entity: UnknownEntityPolicy,
    pub log: LogPolicy,
}

/// Result of a single-entity mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// An existing entry was overwritten in place
    Updated,
    /// A new entry was added at the end of the list
    Appended,
    /// The id was unknown and the policy said to drop it
    Dropped,
    /// Nothing to do (unknown rule action)
    Ignored,
}

/// The client-side view of one game
#[derive(Debug, Clone)]
pub struct GameStore {
    policy: StorePolicy,
    pub game_id: Option<GameId>,
    pub started_at: Option<String>,
    pub current_turn: u32,
    pub phase: GamePhase,
    pub mode: GameMode,
    pub time_of_day: TimeOfDay,
    pub fear_points: i64,
    pub total_fear_gained: i64,
    pub npcs_died: u32,
    pub active_rules: u32,
    npcs: Vec<Npc>,
    rules: Vec<Rule>,
    events: EventLog<GameEvent>,
    dialogues: EventLog<DialogueLine>,
    stream_buffer: Vec<StreamChunkData>,
    /// Message of the most recent failed operation
    pub last_error: Option<String>,
}

impl GameStore {
    pub fn new(policy: StorePolicy) -> Self {
        Self {
            policy,
            game_id: None,
            started_at: None,
            current_turn: 0,
            phase: GamePhase::Setup,
            mode: GameMode::default(),
            time_of_day: TimeOfDay::default(),
            fear_points: INITIAL_FEAR_POINTS,
            total_fear_gained: 0,
            npcs_died: 0,
            active_rules: 0,
            npcs: Vec::new(),
            rules: Vec::new(),
            events: EventLog::new(policy.log),
            dialogues: EventLog::new(policy.log),
            stream_buffer: Vec::new(),
            last_error: None,
        }
    }

    pub fn policy(&self) -> StorePolicy {
        self.policy
    }

    pub fn set_unknown_entity_policy(&mut self, policy: UnknownEntityPolicy) {
        self.policy.unknown_entity = policy;
    }

    // =========================================================================
    // Full state
    // =========================================================================

    /// Replace the snapshot fields and the NPC list in one step.
    ///
    /// The rule list is replaced only when the snapshot carries one.
    pub fn apply_full_state(&mut self, snapshot: GameSnapshot) {
        self.game_id = Some(snapshot.game_id);
        if snapshot.started_at.is_some() {
            self.started_at = snapshot.started_at;
        }
        self.current_turn = snapshot.current_turn;
        self.phase = snapshot.phase;
        self.mode = snapshot.mode;
        self.time_of_day = snapshot.time_of_day;
        self.fear_points = snapshot.fear_points;
        self.total_fear_gained = snapshot.total_fear_gained;
        self.npcs_died = snapshot.npcs_died;
        self.active_rules = snapshot.active_rules;
        self.npcs = dedupe_by_id(snapshot.npcs, |npc| npc.id.clone());
        if let Some(rules) = snapshot.rules {
            self.rules = dedupe_by_id(rules, |rule| rule.id.clone());
        }
    }

    pub fn replace_npcs(&mut self, npcs: Vec<Npc>) {
        self.npcs = dedupe_by_id(npcs, |npc| npc.id.clone());
    }

    pub fn replace_rules(&mut self, rules: Vec<Rule>) {
        self.rules = dedupe_by_id(rules, |rule| rule.id.clone());
    }

    // =========================================================================
    // Entity patches
    // =========================================================================

    /// Merge a partial NPC record into the entry with the same id.
    pub fn apply_npc_patch(&mut self, patch: NpcPatch) -> ApplyOutcome {
        if let Some(npc) = self.npcs.iter_mut().find(|npc| npc.id == patch.id) {
            patch.apply_to(npc);
            return ApplyOutcome::Updated;
        }

        match self.policy.unknown_entity {
            UnknownEntityPolicy::Drop => {
                tracing::debug!(npc_id = %patch.id, "Dropping patch for unknown NPC");
                ApplyOutcome::Dropped
            }
            UnknownEntityPolicy::Append => {
                self.npcs.push(patch.into_npc());
                ApplyOutcome::Appended
            }
        }
    }

    pub fn apply_rule_event(&mut self, action: RuleChange, rule: Rule) -> ApplyOutcome {
        let existing = self.rules.iter().position(|r| r.id == rule.id);
        match (action, existing) {
            (RuleChange::Created | RuleChange::Updated, Some(index)) => {
                self.rules[index] = rule;
                ApplyOutcome::Updated
            }
            (RuleChange::Created, None) => {
                self.rules.push(rule);
                ApplyOutcome::Appended
            }
            (RuleChange::Updated, None) => match self.policy.unknown_entity {
                UnknownEntityPolicy::Drop => {
                    tracing::debug!(rule_id = %rule.id, "Dropping update for unknown rule");
                    ApplyOutcome::Dropped
                }
                UnknownEntityPolicy::Append => {
                    self.rules.push(rule);
                    ApplyOutcome::Appended
                }
            },
            (RuleChange::Unknown, _) => {
                tracing::debug!(rule_id = %rule.id, "Ignoring rule event with unknown action");
                ApplyOutcome::Ignored
            }
        }
    }

    // =========================================================================
    // Logs
    // =========================================================================

    /// Append to the event log. Returns `false` if skipped as a duplicate.
    pub fn append_event(&mut self, event: GameEvent, key: Option<String>) -> bool {
        self.events.push(event, key)
    }

    pub fn append_events(&mut self, events: impl IntoIterator<Item = GameEvent>) {
        for event in events {
            self.events.push(event, None);
        }
    }

    pub fn append_dialogue(&mut self, line: DialogueLine, key: Option<String>) -> bool {
        self.dialogues.push(line, key)
    }

    /// Buffer one streamed chunk; flush parsed events on the final chunk.
    ///
    /// Chunk ids restart at 1 for every stream, so an id that does not move
    /// past the last buffered one starts a new stream and the unfinished one
    /// is discarded. An exact repeat of a buffered chunk is ignored.
    ///
    /// Returns the number of events appended by the flush.
    pub fn apply_stream_chunk(&mut self, chunk: StreamChunkData) -> usize {
        if let Some(last_id) = self.stream_buffer.last().map(|c| c.chunk_id) {
            if chunk.chunk_id <= last_id {
                let repeated = self
                    .stream_buffer
                    .iter()
                    .any(|c| c.chunk_id == chunk.chunk_id && c.content == chunk.content);
                if repeated {
                    tracing::debug!(chunk_id = chunk.chunk_id, "Ignoring repeated stream chunk");
                    return 0;
                }
                self.discard_stream();
            }
        }

        if self.stream_buffer.len() >= MAX_STREAM_CHUNKS {
            tracing::warn!(limit = MAX_STREAM_CHUNKS, "Stream buffer full, dropping oldest chunk");
            self.stream_buffer.remove(0);
        }

        let is_final = chunk.is_final;
        self.stream_buffer.push(chunk);
        if !is_final {
            return 0;
        }

        let chunks = std::mem::take(&mut self.stream_buffer);
        let mut appended = 0;
        for chunk in chunks {
            if chunk.content.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<GameEvent>(&chunk.content) {
                Ok(event) => {
                    if self.events.push(event, None) {
                        appended += 1;
                    }
                }
                Err(e) => {
                    tracing::debug!(chunk_id = chunk.chunk_id, error = %e, "Stream chunk is not an event");
                }
            }
        }
        appended
    }

    /// Drop an unfinished stream. Returns how many chunks were buffered.
    pub fn discard_stream(&mut self) -> usize {
        let dropped = self.stream_buffer.len();
        if dropped > 0 {
            tracing::debug!(dropped, "Discarding unfinished stream");
            self.stream_buffer.clear();
        }
        dropped
    }

    pub fn pending_chunks(&self) -> usize {
        self.stream_buffer.len()
    }

    /// Apply the result of advancing a turn.
    ///
    /// Fear points are not touched: the backend pushes the new totals as a
    /// `state` frame before answering.
    pub fn apply_turn_result(&mut self, result: TurnResult) {
        self.current_turn = self.current_turn.max(result.turn);
        self.append_events(result.events);
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Back to initial defaults, keeping the policy.
    pub fn reset(&mut self) {
        *self = Self::new(self.policy);
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn npcs(&self) -> &[Npc] {
        &self.npcs
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn npc(&self, id: &NpcId) -> Option<&Npc> {
        self.npcs.iter().find(|npc| &npc.id == id)
    }

    pub fn rule(&self, id: &RuleId) -> Option<&Rule> {
        self.rules.iter().find(|rule| &rule.id == id)
    }

    pub fn alive_npcs(&self) -> impl Iterator<Item = &Npc> {
        self.npcs.iter().filter(|npc| npc.is_alive)
    }

    pub fn active_rule_list(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|rule| rule.is_active)
    }

    pub fn events(&self) -> &EventLog<GameEvent> {
        &self.events
    }

    pub fn dialogues(&self) -> &EventLog<DialogueLine> {
        &self.dialogues
    }

    pub fn recent_events(&self, n: usize) -> Vec<&GameEvent> {
        self.events.recent(n)
    }
}

impl Default for GameStore {
    fn default() -> Self {
        Self::new(StorePolicy::default())
    }
}

/// Store shared between the service and WebSocket handlers
pub type SharedGameStore = Arc<RwLock<GameStore>>;

pub fn shared_store(policy: StorePolicy) -> SharedGameStore {
    Arc::new(RwLock::new(GameStore::new(policy)))
}

/// Collapse duplicate ids: the later entry wins, the first position is kept.
fn dedupe_by_id<T, K, F>(items: Vec<T>, key: F) -> Vec<T>
where
    K: std::hash::Hash + Eq,
    F: Fn(&T) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::with_capacity(items.len());
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        match index.get(&key(&item)) {
            Some(&position) => out[position] = item,
            None => {
                index.insert(key(&item), out.len());
                out.push(item);
            }
        }
    }
    out
}
