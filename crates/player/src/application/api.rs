//! Typed API wrapper for application services.
//!
//! `GameApi` wraps an `Arc<dyn RawApiPort>` and turns the backend's REST
//! surface into typed methods via serde_json conversions.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use url::form_urlencoded;

use rulehaunt_domain::GameId;
use rulehaunt_shared::{
    CreateGameRequest, CreateRuleRequest, CreateRuleResponse, GameStateResponse, HealthResponse,
    MessageResponse, NpcStatus, RuleInfo, SaveGameResponse, TurnResult,
};

use crate::ports::outbound::{ApiError, RawApiPort};

const GAMES: &str = "/api/games";

#[derive(Clone)]
pub struct GameApi {
    raw: Arc<dyn RawApiPort>,
}

impl GameApi {
    pub fn new(raw: Arc<dyn RawApiPort>) -> Self {
        Self { raw }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let value = self.raw.get_json(path).await?;
        serde_json::from_value(value).map_err(|e| ApiError::ParseError(e.to_string()))
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body_value =
            serde_json::to_value(body).map_err(|e| ApiError::SerializeError(e.to_string()))?;
        let value = self.raw.post_json(path, &body_value).await?;
        serde_json::from_value(value).map_err(|e| ApiError::ParseError(e.to_string()))
    }

    async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let value = self.raw.post_empty_with_response_json(path).await?;
        serde_json::from_value(value).map_err(|e| ApiError::ParseError(e.to_string()))
    }

    async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let value = self.raw.delete_json(path).await?;
        serde_json::from_value(value).map_err(|e| ApiError::ParseError(e.to_string()))
    }

    /// `POST /api/games`
    pub async fn create_game(
        &self,
        request: &CreateGameRequest,
    ) -> Result<GameStateResponse, ApiError> {
        self.post(GAMES, request).await
    }

    /// `GET /api/games/{id}`
    pub async fn get_game(&self, game_id: &GameId) -> Result<GameStateResponse, ApiError> {
        self.get(&game_path(game_id, "")).await
    }

    /// `POST /api/games/{id}/turn`
    pub async fn advance_turn(&self, game_id: &GameId) -> Result<TurnResult, ApiError> {
        self.post_empty(&game_path(game_id, "/turn")).await
    }

    /// `POST /api/games/{id}/rules`
    pub async fn create_rule(
        &self,
        game_id: &GameId,
        request: &CreateRuleRequest,
    ) -> Result<CreateRuleResponse, ApiError> {
        self.post(&game_path(game_id, "/rules"), request).await
    }

    /// `GET /api/games/{id}/rules`
    pub async fn list_rules(&self, game_id: &GameId) -> Result<Vec<RuleInfo>, ApiError> {
        self.get(&game_path(game_id, "/rules")).await
    }

    /// `GET /api/games/{id}/npcs`
    pub async fn list_npcs(&self, game_id: &GameId) -> Result<Vec<NpcStatus>, ApiError> {
        self.get(&game_path(game_id, "/npcs")).await
    }

    /// `POST /api/games/{id}/save`
    pub async fn save_game(&self, game_id: &GameId) -> Result<SaveGameResponse, ApiError> {
        self.post_empty(&game_path(game_id, "/save")).await
    }

    /// `POST /api/games/load?filename=`
    pub async fn load_game(&self, filename: &str) -> Result<GameStateResponse, ApiError> {
        let query: String = form_urlencoded::Serializer::new(String::new())
            .append_pair("filename", filename)
            .finish();
        self.post_empty(&format!("{GAMES}/load?{query}")).await
    }

    /// `DELETE /api/games/{id}`
    pub async fn delete_game(&self, game_id: &GameId) -> Result<MessageResponse, ApiError> {
        self.delete(&game_path(game_id, "")).await
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<HealthResponse, ApiError> {
        self.get("/health").await
    }
}

fn game_path(game_id: &GameId, suffix: &str) -> String {
    let id: String = form_urlencoded::byte_serialize(game_id.as_str().as_bytes()).collect();
    format!("{GAMES}/{id}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::outbound::MockRawApiPort;
    use mockall::predicate::eq;
    use serde_json::json;

    #[tokio::test]
    async fn load_game_encodes_filename_query() {
        let mut raw = MockRawApiPort::new();
        raw.expect_post_empty_with_response_json()
            .with(eq("/api/games/load?filename=my+save+%231.json"))
            .times(1)
            .returning(|_| {
                Ok(json!({
                    "game_id": "game_7",
                    "current_turn": 3,
                    "fear_points": 900,
                    "npcs": []
                }))
            });

        let api = GameApi::new(Arc::new(raw));
        let state = api.load_game("my save #1.json").await.expect("load");
        assert_eq!(state.game_id, "game_7");
        assert_eq!(state.current_turn, 3);
    }

    #[tokio::test]
    async fn unexpected_shape_is_a_parse_error() {
        let mut raw = MockRawApiPort::new();
        raw.expect_get_json()
            .with(eq("/api/games/game_1/npcs"))
            .returning(|_| Ok(json!({"npcs": "nope"})));

        let api = GameApi::new(Arc::new(raw));
        let err = api
            .list_npcs(&GameId::new("game_1"))
            .await
            .expect_err("shape mismatch");
        assert!(matches!(err, ApiError::ParseError(_)));
    }

    #[tokio::test]
    async fn server_errors_pass_through() {
        let mut raw = MockRawApiPort::new();
        raw.expect_post_empty_with_response_json()
            .with(eq("/api/games/game_1/turn"))
            .returning(|_| {
                Err(ApiError::Server {
                    status: 404,
                    message: "Game not found".to_string(),
                })
            });

        let api = GameApi::new(Arc::new(raw));
        let err = api
            .advance_turn(&GameId::new("game_1"))
            .await
            .expect_err("404");
        assert!(err.is_not_found());
    }
}
