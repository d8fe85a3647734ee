//! Rulehaunt Shared - Wire contract between the backend and the player client
//!
//! - WebSocket frame envelopes and the closed set of inbound messages
//! - Outbound client messages
//! - REST request and response DTOs
//!
//! # Design Principles
//!
//! 1. **No business logic** - pure data types and serialization
//! 2. **Forward compatible** - unknown enum values decode to `Unknown`
//! 3. **Domain vocabulary** - enums come from `rulehaunt_domain::types`

pub mod messages;
pub mod requests;
pub mod responses;

pub use messages::{
    parse_frame, ActionRequest, ClientFrame, ConnectionAckData, DialoguePayload, FrameError,
    InboundFrame, InboundMessage, MessageKind, OutboundMessage, RuleEventData, ServerErrorData,
    StreamChunkData,
};
pub use requests::{CreateGameRequest, CreateRuleRequest};
pub use responses::{
    CreateRuleResponse, ErrorBody, GameStateResponse, HealthResponse, MessageResponse, NpcStatus,
    RuleInfo, SaveGameResponse, TurnResult,
};
