//! Shared helpers for the WebSocket connection: defaults, session URLs and
//! frame encoding.

use rulehaunt_domain::GameId;
use rulehaunt_shared::OutboundMessage;
use url::Url;

use super::error::ConnectionError;

// Reconnection defaults
pub const INITIAL_RETRY_DELAY_MS: u64 = 5_000;
pub const MAX_RETRY_DELAY_MS: u64 = 30_000;
pub const MAX_RETRY_ATTEMPTS: u32 = 5;
pub const BACKOFF_MULTIPLIER: f64 = 2.0;

pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 30_000;
/// Shortest heartbeat period the session task will run with
pub const MIN_HEARTBEAT_INTERVAL_MS: u64 = 10;

/// Capacity of the outbound queue between `send` and the socket writer
pub const OUTBOUND_QUEUE_CAPACITY: usize = 64;

/// How long `disconnect` waits for the session task before aborting it
pub const SHUTDOWN_GRACE_MS: u64 = 2_000;

/// Build `{ws|wss}://<host>/ws/<game_id>[?client_id=<id>]` from a base URL.
///
/// `http`/`https` bases are mapped to `ws`/`wss`; any path on the base is
/// kept as a prefix.
pub fn build_session_url(
    base_url: &str,
    game_id: &GameId,
    client_id: Option<&str>,
) -> Result<Url, ConnectionError> {
    let mut url = Url::parse(base_url)
        .map_err(|e| ConnectionError::InvalidUrl(format!("{base_url}: {e}")))?;

    let scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => {
            return Err(ConnectionError::InvalidUrl(format!(
                "unsupported scheme `{other}` in {base_url}"
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| ConnectionError::InvalidUrl(format!("cannot use {scheme} for {base_url}")))?;

    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|()| ConnectionError::InvalidUrl(format!("{base_url} cannot be a base")))?;
        segments.pop_if_empty().push("ws").push(game_id.as_str());
    }

    url.set_query(None);
    if let Some(client_id) = client_id {
        url.query_pairs_mut().append_pair("client_id", client_id);
    }
    Ok(url)
}

/// Serialize an outbound message into its `{type, data, timestamp}` envelope.
pub fn encode_outbound(message: &OutboundMessage) -> Result<String, serde_json::Error> {
    let frame = message.to_frame(chrono::Utc::now().to_rfc3339());
    serde_json::to_string(&frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_base_maps_to_ws() {
        let url = build_session_url("http://localhost:8000", &GameId::new("game_1"), None)
            .expect("valid url");
        assert_eq!(url.as_str(), "ws://localhost:8000/ws/game_1");
    }

    #[test]
    fn https_base_maps_to_wss_with_client_id() {
        let url = build_session_url(
            "https://haunt.example.com/",
            &GameId::new("game_1"),
            Some("player-7"),
        )
        .expect("valid url");
        assert_eq!(
            url.as_str(),
            "wss://haunt.example.com/ws/game_1?client_id=player-7"
        );
    }

    #[test]
    fn base_path_is_kept_as_prefix() {
        let url = build_session_url("ws://host:9000/backend", &GameId::new("g"), None)
            .expect("valid url");
        assert_eq!(url.as_str(), "ws://host:9000/backend/ws/g");
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        let err = build_session_url("ftp://host", &GameId::new("g"), None).expect_err("bad scheme");
        assert!(matches!(err, ConnectionError::InvalidUrl(_)));
    }

    #[test]
    fn encoded_frame_has_envelope_fields() {
        let text = encode_outbound(&OutboundMessage::Ping).expect("encode");
        let value: serde_json::Value = serde_json::from_str(&text).expect("json");
        assert_eq!(value["type"], "ping");
        assert_eq!(value["data"], serde_json::json!({}));
        assert!(value["timestamp"].as_str().is_some());
    }
}
