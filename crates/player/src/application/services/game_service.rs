//! Game service: orchestrates player actions against the backend
//!
//! This service handles:
//! - REST calls for game lifecycle, turns and rules
//! - Keeping the game store in sync with REST responses
//! - Connecting the WebSocket and binding the store's push handlers
//!
//! REST errors are returned to the caller and also recorded in the store's
//! `last_error`. A WebSocket that fails to open after a successful REST call
//! is logged and recorded but does not fail the operation.

use std::sync::{Arc, Mutex, PoisonError, RwLockReadGuard, RwLockWriteGuard};

use rulehaunt_domain::{Difficulty, GameId, GameSnapshot, Npc, NpcCount, Rule, RuleDraft};
use rulehaunt_shared::{
    ActionRequest, CreateGameRequest, CreateRuleRequest, CreateRuleResponse, GameStateResponse,
    HealthResponse, InboundFrame, InboundMessage, MessageKind, MessageResponse, OutboundMessage,
    SaveGameResponse, TurnResult,
};

use crate::application::api::GameApi;
use crate::application::error::ServiceError;
use crate::infrastructure::messaging::SubscriptionId;
use crate::infrastructure::websocket::ConnectionManager;
use crate::state::{GameStore, SharedGameStore};

/// Kinds the store listens to while a game is open
pub const STORE_BOUND_KINDS: [MessageKind; 8] = [
    MessageKind::Connection,
    MessageKind::State,
    MessageKind::Event,
    MessageKind::Npc,
    MessageKind::Rule,
    MessageKind::Dialogue,
    MessageKind::StreamChunk,
    MessageKind::Error,
];

pub struct GameService {
    api: GameApi,
    store: SharedGameStore,
    connection: Option<Arc<ConnectionManager>>,
    subscriptions: Mutex<Vec<(MessageKind, SubscriptionId)>>,
}

impl GameService {
    pub fn new(api: GameApi, store: SharedGameStore) -> Self {
        Self {
            api,
            store,
            connection: None,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Also open the game's WebSocket whenever a game is entered.
    pub fn with_connection(mut self, connection: Arc<ConnectionManager>) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn store(&self) -> &SharedGameStore {
        &self.store
    }

    pub fn connection(&self) -> Option<&Arc<ConnectionManager>> {
        self.connection.as_ref()
    }

    fn read_store(&self) -> RwLockReadGuard<'_, GameStore> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_store(&self) -> RwLockWriteGuard<'_, GameStore> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current_game_id(&self) -> Result<GameId, ServiceError> {
        self.read_store()
            .game_id
            .clone()
            .ok_or(ServiceError::NoActiveGame)
    }

    fn record<T>(&self, operation: &str, result: Result<T, ServiceError>) -> Result<T, ServiceError> {
        if let Err(ref e) = result {
            tracing::warn!(operation, error = %e, "Game operation failed");
            self.write_store().set_error(e.envelope().error);
        }
        result
    }

    // =========================================================================
    // Game lifecycle
    // =========================================================================

    /// Create a game and enter it.
    pub async fn create_game(
        &self,
        difficulty: Difficulty,
        npc_count: u8,
    ) -> Result<GameSnapshot, ServiceError> {
        self.write_store().clear_error();
        let result: Result<GameSnapshot, ServiceError> = async {
            let request = CreateGameRequest::new(difficulty, NpcCount::new(npc_count)?);
            let state = self.api.create_game(&request).await?;
            tracing::info!(game_id = %state.game_id, %difficulty, npc_count, "Game created");
            Ok(self.enter_game(state, Some(Vec::new())).await)
        }
        .await;
        self.record("create_game", result)
    }

    /// Enter an existing game by id.
    pub async fn load_game(&self, game_id: impl Into<GameId>) -> Result<GameSnapshot, ServiceError> {
        let game_id = game_id.into();
        self.write_store().clear_error();
        let result: Result<GameSnapshot, ServiceError> = async {
            let state = self.api.get_game(&game_id).await?;
            let rules = self.fetch_rules(&game_id).await?;
            Ok(self.enter_game(state, Some(rules)).await)
        }
        .await;
        self.record("load_game", result)
    }

    /// Restore a saved game and enter it.
    pub async fn load_save(&self, filename: &str) -> Result<GameSnapshot, ServiceError> {
        self.write_store().clear_error();
        let result: Result<GameSnapshot, ServiceError> = async {
            let state = self.api.load_game(filename).await?;
            let game_id = GameId::new(state.game_id.clone());
            tracing::info!(game_id = %game_id, filename, "Save loaded");
            let rules = self.fetch_rules(&game_id).await?;
            Ok(self.enter_game(state, Some(rules)).await)
        }
        .await;
        self.record("load_save", result)
    }

    async fn enter_game(&self, state: GameStateResponse, rules: Option<Vec<Rule>>) -> GameSnapshot {
        let mut snapshot = GameSnapshot::from(state);
        snapshot.rules = rules;
        let game_id = snapshot.game_id.clone();

        {
            let mut store = self.write_store();
            if store.game_id.as_ref() != Some(&game_id) {
                store.reset();
            }
            store.apply_full_state(snapshot.clone());
        }

        self.attach(&game_id).await;
        snapshot
    }

    async fn attach(&self, game_id: &GameId) {
        let Some(connection) = self.connection.as_ref() else {
            return;
        };

        match connection.connect(game_id.clone()).await {
            Ok(()) => self.bind_handlers(connection),
            Err(e) => {
                tracing::warn!(game_id = %game_id, error = %e, "Realtime updates unavailable");
                self.write_store()
                    .set_error(format!("Realtime connection failed: {e}"));
            }
        }
    }

    /// Register the store's handlers, replacing any earlier ones.
    fn bind_handlers(&self, connection: &ConnectionManager) {
        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        for (kind, id) in subscriptions.drain(..) {
            connection.off(kind, id);
        }

        for kind in STORE_BOUND_KINDS {
            let store = Arc::clone(&self.store);
            let id = connection.on(kind, move |frame| {
                let mut store = store.write().unwrap_or_else(PoisonError::into_inner);
                apply_frame(&mut store, frame);
                Ok(())
            });
            subscriptions.push((kind, id));
        }
        tracing::debug!(handlers = subscriptions.len(), "Store handlers bound");
    }

    /// Close the WebSocket and reset the store.
    pub async fn leave_game(&self) {
        if let Some(connection) = self.connection.as_ref() {
            connection.disconnect().await;
        }
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.write_store().reset();
    }

    /// Delete the current game on the backend, then leave it.
    pub async fn delete_game(&self) -> Result<MessageResponse, ServiceError> {
        self.write_store().clear_error();
        let result: Result<MessageResponse, ServiceError> = async {
            let game_id = self.current_game_id()?;
            let response = self.api.delete_game(&game_id).await?;
            tracing::info!(game_id = %game_id, "Game deleted");
            Ok(response)
        }
        .await;
        let response = self.record("delete_game", result)?;
        self.leave_game().await;
        Ok(response)
    }

    // =========================================================================
    // Turns and rules
    // =========================================================================

    /// Advance one turn; returned events are appended to the event log.
    pub async fn advance_turn(&self) -> Result<TurnResult, ServiceError> {
        self.write_store().clear_error();
        let result: Result<TurnResult, ServiceError> = async {
            let game_id = self.current_game_id()?;
            let turn = self.api.advance_turn(&game_id).await?;
            tracing::info!(
                game_id = %game_id,
                turn = turn.turn,
                events = turn.events.len(),
                fear_gained = turn.fear_gained,
                "Turn advanced"
            );
            self.write_store().apply_turn_result(turn.clone());
            Ok(turn)
        }
        .await;
        self.record("advance_turn", result)
    }

    /// Create a rule, then refresh the rule list.
    pub async fn create_rule(&self, draft: RuleDraft) -> Result<CreateRuleResponse, ServiceError> {
        self.write_store().clear_error();
        let result: Result<CreateRuleResponse, ServiceError> = async {
            let game_id = self.current_game_id()?;
            let available = self.read_store().fear_points;
            if !draft.cost.affordable_with(available) {
                return Err(ServiceError::InsufficientFear {
                    required: draft.cost.get(),
                    available,
                });
            }

            let request = CreateRuleRequest::from(draft);
            let created = self.api.create_rule(&game_id, &request).await?;
            tracing::info!(game_id = %game_id, rule_id = %created.rule_id, cost = created.cost, "Rule created");

            let rules = self.fetch_rules(&game_id).await?;
            self.write_store().replace_rules(rules);
            Ok(created)
        }
        .await;
        self.record("create_rule", result)
    }

    pub async fn refresh_rules(&self) -> Result<usize, ServiceError> {
        self.write_store().clear_error();
        let result: Result<usize, ServiceError> = async {
            let game_id = self.current_game_id()?;
            let rules = self.fetch_rules(&game_id).await?;
            let count = rules.len();
            self.write_store().replace_rules(rules);
            Ok(count)
        }
        .await;
        self.record("refresh_rules", result)
    }

    pub async fn refresh_npcs(&self) -> Result<usize, ServiceError> {
        self.write_store().clear_error();
        let result: Result<usize, ServiceError> = async {
            let game_id = self.current_game_id()?;
            let npcs: Vec<Npc> = self
                .api
                .list_npcs(&game_id)
                .await?
                .into_iter()
                .map(Npc::from)
                .collect();
            let count = npcs.len();
            self.write_store().replace_npcs(npcs);
            Ok(count)
        }
        .await;
        self.record("refresh_npcs", result)
    }

    async fn fetch_rules(&self, game_id: &GameId) -> Result<Vec<Rule>, ServiceError> {
        Ok(self
            .api
            .list_rules(game_id)
            .await?
            .into_iter()
            .map(Rule::from)
            .collect())
    }

    // =========================================================================
    // Misc
    // =========================================================================

    pub async fn save_game(&self) -> Result<SaveGameResponse, ServiceError> {
        self.write_store().clear_error();
        let result: Result<SaveGameResponse, ServiceError> = async {
            let game_id = self.current_game_id()?;
            let saved = self.api.save_game(&game_id).await?;
            tracing::info!(game_id = %game_id, filename = %saved.filename, "Game saved");
            Ok(saved)
        }
        .await;
        self.record("save_game", result)
    }

    pub async fn health(&self) -> Result<HealthResponse, ServiceError> {
        Ok(self.api.health().await?)
    }

    /// Send a player action over the WebSocket. `false` when not connected.
    pub fn send_action(&self, action: ActionRequest) -> bool {
        match self.connection.as_ref() {
            Some(connection) => connection.send(OutboundMessage::Action(action)),
            None => {
                tracing::warn!(action = %action.action_type, "No realtime connection configured");
                false
            }
        }
    }
}

/// Apply one pushed frame to the store.
pub fn apply_frame(store: &mut GameStore, frame: &InboundFrame) {
    match &frame.message {
        InboundMessage::State(state) => {
            store.apply_full_state(GameSnapshot::from(state.as_ref().clone()));
        }
        InboundMessage::Event(event) => {
            store.append_event(event.clone(), frame.delivery_key());
        }
        InboundMessage::Npc(patch) => {
            store.apply_npc_patch(patch.clone());
        }
        InboundMessage::Rule(change) => {
            store.apply_rule_event(change.action, change.rule.clone());
        }
        InboundMessage::Dialogue(payload) => {
            let key = frame.delivery_key();
            for (i, line) in payload.clone().into_lines().into_iter().enumerate() {
                let line_key = key.as_ref().map(|k| format!("{k}#{i}"));
                store.append_dialogue(line, line_key);
            }
        }
        InboundMessage::StreamChunk(chunk) => {
            store.apply_stream_chunk(chunk.clone());
        }
        InboundMessage::Error(error) => {
            tracing::warn!(message = %error.message, code = ?error.code, "Server reported an error");
            store.set_error(error.message.clone());
        }
        // Sent on every (re)connect; a stream cut off by the old socket never finishes
        InboundMessage::Connection(_) => {
            store.discard_stream();
        }
        InboundMessage::Ping | InboundMessage::Pong => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::outbound::{ApiError, MockRawApiPort};
    use crate::state::{shared_store, StorePolicy};
    use mockall::predicate::eq;
    use rulehaunt_domain::{GamePhase, NpcId, RuleCost, RuleDescription, RuleName};
    use rulehaunt_shared::parse_frame;
    use serde_json::{json, Value};

    fn game_state(npcs: usize, turn: u32, fear: i64) -> Value {
        let npcs: Vec<Value> = (1..=npcs)
            .map(|i| {
                json!({
                    "id": format!("npc_{i}"),
                    "name": format!("NPC {i}"),
                    "hp": 100,
                    "sanity": 100,
                    "fear": 0,
                    "location": "living_room",
                    "status_effects": [],
                    "is_alive": true
                })
            })
            .collect();
        json!({
            "game_id": "game_1",
            "started_at": "2026-01-01T00:00:00",
            "current_turn": turn,
            "fear_points": fear,
            "phase": "setup",
            "mode": "backstage",
            "time_of_day": "morning",
            "npcs": npcs,
            "active_rules": 0,
            "total_fear_gained": 0,
            "npcs_died": 0
        })
    }

    fn service(raw: MockRawApiPort) -> GameService {
        GameService::new(
            GameApi::new(Arc::new(raw)),
            shared_store(StorePolicy::default()),
        )
    }

    fn draft(cost: u32) -> RuleDraft {
        RuleDraft::new(
            RuleName::new("No looking in mirrors").expect("name"),
            RuleDescription::new("Whoever looks into a mirror after midnight loses sanity")
                .expect("description"),
            RuleCost::new(cost).expect("cost"),
        )
    }

    #[tokio::test]
    async fn create_game_then_advance_turn() {
        let mut raw = MockRawApiPort::new();
        raw.expect_post_json()
            .withf(|path, body| {
                path == "/api/games" && body == &json!({"difficulty": "normal", "npc_count": 4})
            })
            .times(1)
            .returning(|_, _| Ok(game_state(4, 1, 1000)));
        raw.expect_post_empty_with_response_json()
            .with(eq("/api/games/game_1/turn"))
            .times(1)
            .returning(|_| {
                Ok(json!({
                    "turn": 2,
                    "events": [
                        {"type": "npc_action", "description": "Alice checks the door"},
                        {"type": "rule_triggered", "rule_id": "rule_1"}
                    ],
                    "fear_gained": 50,
                    "npcs_affected": ["npc_1"],
                    "rules_triggered": ["rule_1"]
                }))
            });

        let service = service(raw);
        let snapshot = service
            .create_game(Difficulty::Normal, 4)
            .await
            .expect("create");
        assert_eq!(snapshot.npcs.len(), 4);

        {
            let store = service.store().read().expect("store");
            assert_eq!(store.npcs().len(), 4);
            assert_eq!(store.fear_points, 1000);
            assert_eq!(store.current_turn, 1);
            assert_eq!(store.phase, GamePhase::Setup);
        }

        service
            .write_store()
            .append_event(rulehaunt_domain::GameEvent::new("game_start"), None);

        let turn = service.advance_turn().await.expect("turn");
        assert_eq!(turn.events.len(), 2);

        let store = service.store().read().expect("store");
        assert_eq!(store.current_turn, 2);
        let kinds: Vec<_> = store.events().iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, vec!["game_start", "npc_action", "rule_triggered"]);
    }

    #[tokio::test]
    async fn invalid_npc_count_never_reaches_backend() {
        let service = service(MockRawApiPort::new());

        let err = service
            .create_game(Difficulty::Hard, 9)
            .await
            .expect_err("npc count out of range");

        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(service.read_store().last_error.is_some());
    }

    #[tokio::test]
    async fn advance_turn_without_game_fails() {
        let service = service(MockRawApiPort::new());
        assert_eq!(
            service.advance_turn().await.expect_err("no game"),
            ServiceError::NoActiveGame
        );
    }

    #[tokio::test]
    async fn load_game_fetches_state_and_rules() {
        let mut raw = MockRawApiPort::new();
        raw.expect_get_json()
            .with(eq("/api/games/game_1"))
            .times(1)
            .returning(|_| Ok(game_state(2, 5, 640)));
        raw.expect_get_json()
            .with(eq("/api/games/game_1/rules"))
            .times(1)
            .returning(|_| {
                Ok(json!([{
                    "id": "rule_1",
                    "name": "No mirrors",
                    "description": "",
                    "level": 1,
                    "cost": 150,
                    "is_active": true,
                    "times_triggered": 2,
                    "loopholes": []
                }]))
            });

        let service = service(raw);
        service.load_game("game_1").await.expect("load");

        let store = service.read_store();
        assert_eq!(store.current_turn, 5);
        assert_eq!(store.fear_points, 640);
        assert_eq!(store.rules().len(), 1);
        assert_eq!(store.rules()[0].times_triggered, 2);
    }

    #[tokio::test]
    async fn create_rule_checks_fear_before_calling_backend() {
        let mut raw = MockRawApiPort::new();
        raw.expect_post_json()
            .withf(|path, _| path == "/api/games")
            .returning(|_, _| Ok(game_state(2, 1, 100)));

        let service = service(raw);
        service
            .create_game(Difficulty::Easy, 2)
            .await
            .expect("create");

        let err = service.create_rule(draft(150)).await.expect_err("too poor");
        assert_eq!(
            err,
            ServiceError::InsufficientFear {
                required: 150,
                available: 100
            }
        );
    }

    #[tokio::test]
    async fn create_rule_refreshes_rule_list() {
        let mut raw = MockRawApiPort::new();
        raw.expect_post_json()
            .withf(|path, _| path == "/api/games")
            .returning(|_, _| Ok(game_state(2, 1, 1000)));
        raw.expect_post_json()
            .withf(|path, body| {
                path == "/api/games/game_1/rules"
                    && body["name"] == "No looking in mirrors"
                    && body["cost"] == 200
            })
            .times(1)
            .returning(|_, _| Ok(json!({"rule_id": "rule_9", "cost": 200})));
        raw.expect_get_json()
            .with(eq("/api/games/game_1/rules"))
            .times(1)
            .returning(|_| {
                Ok(json!([{
                    "id": "rule_9",
                    "name": "No looking in mirrors",
                    "description": "",
                    "level": 1,
                    "cost": 200,
                    "is_active": true,
                    "times_triggered": 0,
                    "loopholes": []
                }]))
            });

        let service = service(raw);
        service
            .create_game(Difficulty::Normal, 2)
            .await
            .expect("create");
        let created = service.create_rule(draft(200)).await.expect("rule");

        assert_eq!(created.rule_id, "rule_9");
        let store = service.read_store();
        assert_eq!(store.rules().len(), 1);
        assert_eq!(store.rules()[0].id.as_str(), "rule_9");
    }

    #[tokio::test]
    async fn server_error_is_returned_and_recorded() {
        let mut raw = MockRawApiPort::new();
        raw.expect_get_json().returning(|_| {
            Err(ApiError::Server {
                status: 404,
                message: "Game not found".to_string(),
            })
        });

        let service = service(raw);
        let err = service.load_game("game_404").await.expect_err("404");

        assert!(err.is_not_found());
        assert_eq!(service.read_store().last_error.as_deref(), Some("Game not found"));
    }

    #[tokio::test]
    async fn delete_game_leaves_and_resets() {
        let mut raw = MockRawApiPort::new();
        raw.expect_post_json()
            .returning(|_, _| Ok(game_state(3, 1, 1000)));
        raw.expect_delete_json()
            .with(eq("/api/games/game_1"))
            .times(1)
            .returning(|_| Ok(json!({"message": "Game game_1 deleted"})));

        let service = service(raw);
        service
            .create_game(Difficulty::Normal, 3)
            .await
            .expect("create");
        service.delete_game().await.expect("delete");

        let store = service.read_store();
        assert!(store.game_id.is_none());
        assert!(store.npcs().is_empty());
    }

    #[test]
    fn send_action_without_connection_returns_false() {
        let service = service(MockRawApiPort::new());
        assert!(!service.send_action(ActionRequest::new("inspect")));
    }

    #[test]
    fn pushed_frames_update_the_store() {
        let mut store = GameStore::default();
        let frames = [
            json!({"type": "state", "data": game_state(2, 3, 700)}),
            json!({"type": "npc", "data": {"id": "npc_2", "hp": 30}}),
            json!({"type": "rule", "data": {"action": "created", "rule": {"id": "rule_1", "name": "No mirrors"}}}),
            json!({"type": "event", "data": {"type": "npc_death", "npc_id": "npc_1"}, "sequence": 7}),
            json!({"type": "event", "data": {"type": "npc_death", "npc_id": "npc_1"}, "sequence": 7}),
            json!({"type": "dialogue", "data": [{"speaker": "Alice", "content": "Who's there?"}, {"speaker": "Bob", "text": "Nobody."}], "id": "d1"}),
            json!({"type": "error", "data": "rate limited"}),
        ];

        for frame in frames {
            let frame = parse_frame(&frame.to_string()).expect("frame");
            apply_frame(&mut store, &frame);
        }

        assert_eq!(store.current_turn, 3);
        assert_eq!(store.fear_points, 700);
        assert_eq!(store.npc(&NpcId::new("npc_2")).map(|n| n.hp), Some(30));
        assert_eq!(store.rules().len(), 1);
        assert_eq!(store.events().len(), 1);
        let speakers: Vec<_> = store.dialogues().iter().map(|d| d.speaker.as_str()).collect();
        assert_eq!(speakers, vec!["Alice", "Bob"]);
        assert_eq!(store.last_error.as_deref(), Some("rate limited"));
    }

    #[test]
    fn reconnect_hello_discards_an_unfinished_stream() {
        let mut store = GameStore::default();
        let frames = [
            json!({"type": "stream_chunk", "data": {"chunk_id": 1, "content": "{\"type\":\"stale\"}"}}),
            json!({"type": "connection", "data": {"status": "connected", "client_id": "tester"}}),
            json!({"type": "stream_chunk", "data": {"chunk_id": 5, "content": "{\"type\":\"fresh\"}", "is_final": true}}),
        ];

        for frame in frames {
            let frame = parse_frame(&frame.to_string()).expect("frame");
            apply_frame(&mut store, &frame);
        }

        let kinds: Vec<_> = store.events().iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, vec!["fresh"]);
        assert_eq!(store.pending_chunks(), 0);
    }
}
