//! WebSocket frame types for backend ↔ player communication
//!
//! Every frame on the socket is a JSON object `{type, data, timestamp?, sequence?, id?}`.
//! Older backend pushes (`GameUpdate`) carry the tag in `update_type` instead of
//! `type`; both are accepted.
//!
//! ## Versioning Policy
//!
//! - Inbound kinds form a closed set ([`MessageKind`]); a kind outside it is a
//!   [`FrameError::UnknownType`], logged and dropped by the connection layer
//! - Enumerations inside payloads decode unknown values to `Unknown`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use rulehaunt_domain::{DialogueLine, GameEvent, NpcPatch, Rule, RuleChange};

use crate::responses::GameStateResponse;

// =============================================================================
// Errors
// =============================================================================

/// Failure to turn a text frame into an [`InboundFrame`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The frame is not a JSON object with a `type`
    #[error("Malformed frame: {0}")]
    Malformed(String),

    /// The `type` is not one the player understands
    #[error("Unknown message type: {0}")]
    UnknownType(String),

    /// The `data` does not match the shape expected for the kind
    #[error("Invalid {kind} payload: {message}")]
    InvalidPayload { kind: MessageKind, message: String },
}

// =============================================================================
// Message kinds
// =============================================================================

/// Data-less tag of an inbound message, used to register handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    State,
    Event,
    Npc,
    Rule,
    Dialogue,
    Ping,
    Pong,
    StreamChunk,
    Connection,
    Error,
}

impl MessageKind {
    pub const ALL: [MessageKind; 10] = [
        MessageKind::State,
        MessageKind::Event,
        MessageKind::Npc,
        MessageKind::Rule,
        MessageKind::Dialogue,
        MessageKind::Ping,
        MessageKind::Pong,
        MessageKind::StreamChunk,
        MessageKind::Connection,
        MessageKind::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::State => "state",
            MessageKind::Event => "event",
            MessageKind::Npc => "npc",
            MessageKind::Rule => "rule",
            MessageKind::Dialogue => "dialogue",
            MessageKind::Ping => "ping",
            MessageKind::Pong => "pong",
            MessageKind::StreamChunk => "stream_chunk",
            MessageKind::Connection => "connection",
            MessageKind::Error => "error",
        }
    }

    /// `ping` and `pong` are answered by the connection itself and never
    /// reach registered handlers.
    pub fn is_control(&self) -> bool {
        matches!(self, MessageKind::Ping | MessageKind::Pong)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| FrameError::UnknownType(s.to_string()))
    }
}

// =============================================================================
// Inbound payloads
// =============================================================================

/// Payload of a `rule` push
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEventData {
    pub action: RuleChange,
    pub rule: Rule,
}

/// Payload of a `dialogue` push.
///
/// The backend sends either one line, a list of lines, or free-form content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DialoguePayload {
    Line(DialogueLine),
    Lines(Vec<DialogueLine>),
    Other(Value),
}

impl DialoguePayload {
    /// Flatten into log lines. Free-form content becomes a single line
    /// attributed to the narrator.
    pub fn into_lines(self) -> Vec<DialogueLine> {
        match self {
            DialoguePayload::Line(line) => vec![line],
            DialoguePayload::Lines(lines) => lines,
            DialoguePayload::Other(Value::Null) => Vec::new(),
            DialoguePayload::Other(Value::String(text)) => {
                vec![DialogueLine::new("narrator", text)]
            }
            DialoguePayload::Other(other) => {
                vec![DialogueLine::new("narrator", other.to_string())]
            }
        }
    }
}

/// One piece of a streamed turn result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChunkData {
    pub chunk_id: u64,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_final: bool,
}

/// Server hello sent right after the socket opens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionAckData {
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Seconds the server keeps queued messages for a reconnecting client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_window: Option<u64>,
}

/// Error reported by the server over the socket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerErrorData {
    #[serde(alias = "error", alias = "detail")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

// =============================================================================
// Inbound messages
// =============================================================================

/// Every message the server may push, one variant per [`MessageKind`]
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    State(Box<GameStateResponse>),
    Event(GameEvent),
    Npc(NpcPatch),
    Rule(RuleEventData),
    Dialogue(DialoguePayload),
    Ping,
    Pong,
    StreamChunk(StreamChunkData),
    Connection(ConnectionAckData),
    Error(ServerErrorData),
}

fn payload<T: serde::de::DeserializeOwned>(kind: MessageKind, data: Value) -> Result<T, FrameError> {
    serde_json::from_value(data).map_err(|e| FrameError::InvalidPayload {
        kind,
        message: e.to_string(),
    })
}

impl InboundMessage {
    /// Decode the `data` of a frame whose tag is `kind`.
    pub fn from_parts(kind: MessageKind, data: Value) -> Result<Self, FrameError> {
        let message = match kind {
            MessageKind::State => InboundMessage::State(Box::new(payload(kind, data)?)),
            MessageKind::Event => InboundMessage::Event(payload(kind, data)?),
            MessageKind::Npc => InboundMessage::Npc(payload(kind, data)?),
            MessageKind::Rule => InboundMessage::Rule(payload(kind, data)?),
            MessageKind::Dialogue => InboundMessage::Dialogue(payload(kind, data)?),
            MessageKind::Ping => InboundMessage::Ping,
            MessageKind::Pong => InboundMessage::Pong,
            MessageKind::StreamChunk => InboundMessage::StreamChunk(payload(kind, data)?),
            MessageKind::Connection => InboundMessage::Connection(payload(kind, data)?),
            MessageKind::Error => match data {
                Value::String(message) => {
                    InboundMessage::Error(ServerErrorData { message, code: None })
                }
                other => InboundMessage::Error(payload(kind, other)?),
            },
        };
        Ok(message)
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            InboundMessage::State(_) => MessageKind::State,
            InboundMessage::Event(_) => MessageKind::Event,
            InboundMessage::Npc(_) => MessageKind::Npc,
            InboundMessage::Rule(_) => MessageKind::Rule,
            InboundMessage::Dialogue(_) => MessageKind::Dialogue,
            InboundMessage::Ping => MessageKind::Ping,
            InboundMessage::Pong => MessageKind::Pong,
            InboundMessage::StreamChunk(_) => MessageKind::StreamChunk,
            InboundMessage::Connection(_) => MessageKind::Connection,
            InboundMessage::Error(_) => MessageKind::Error,
        }
    }
}

/// Envelope as it appears on the socket, before the payload is decoded
#[derive(Debug, Clone, Deserialize)]
struct RawFrame {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    update_type: Option<String>,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    sequence: Option<u64>,
    #[serde(default)]
    id: Option<String>,
}

/// A decoded inbound frame with its delivery metadata
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    pub message: InboundMessage,
    pub timestamp: Option<String>,
    pub sequence: Option<u64>,
    /// Server-assigned frame id (`{client_id}_{seq}`)
    pub id: Option<String>,
}

impl InboundFrame {
    pub fn new(message: InboundMessage) -> Self {
        Self {
            message,
            timestamp: None,
            sequence: None,
            id: None,
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.message.kind()
    }

    /// Key identifying a delivery for deduplication: the frame id, else the
    /// sequence number.
    pub fn delivery_key(&self) -> Option<String> {
        self.id
            .clone()
            .or_else(|| self.sequence.map(|seq| format!("seq:{seq}")))
    }
}

/// Parse one text frame.
///
/// `update_type` wins over `type` when both are present; `GameUpdate` pushes
/// use `update_type` for the real tag.
pub fn parse_frame(text: &str) -> Result<InboundFrame, FrameError> {
    let raw: RawFrame =
        serde_json::from_str(text).map_err(|e| FrameError::Malformed(e.to_string()))?;
    let tag = raw
        .update_type
        .or(raw.kind)
        .ok_or_else(|| FrameError::Malformed("missing type".to_string()))?;
    let kind = MessageKind::from_str(&tag)?;
    let message = InboundMessage::from_parts(kind, raw.data)?;

    Ok(InboundFrame {
        message,
        timestamp: raw.timestamp,
        sequence: raw.sequence,
        id: raw.id,
    })
}

// =============================================================================
// Outbound messages
// =============================================================================

/// Player action sent over the socket (`action` frame)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl ActionRequest {
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            target: None,
            params: Map::new(),
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// Messages the player sends to the server
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Ping,
    Pong,
    Action(ActionRequest),
    /// Sent after a successful reconnect so the server can replay missed frames
    Reconnect { last_sequence: u64 },
    /// Ask the server to advance the turn and stream the result
    Turn,
}

impl OutboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::Ping => "ping",
            OutboundMessage::Pong => "pong",
            OutboundMessage::Action(_) => "action",
            OutboundMessage::Reconnect { .. } => "reconnect",
            OutboundMessage::Turn => "turn",
        }
    }

    pub fn data(&self) -> Value {
        match self {
            OutboundMessage::Ping | OutboundMessage::Pong | OutboundMessage::Turn => {
                Value::Object(Map::new())
            }
            OutboundMessage::Action(action) => {
                serde_json::to_value(action).unwrap_or_else(|_| Value::Object(Map::new()))
            }
            OutboundMessage::Reconnect { last_sequence } => {
                serde_json::json!({ "last_sequence": last_sequence })
            }
        }
    }

    /// Wrap in the wire envelope with the given RFC 3339 timestamp.
    pub fn to_frame(&self, timestamp: impl Into<String>) -> ClientFrame {
        ClientFrame {
            kind: self.kind().to_string(),
            data: self.data(),
            timestamp: timestamp.into(),
        }
    }
}

/// `{type, data, timestamp}` envelope sent by the player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientFrame {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
    pub timestamp: String,
}
