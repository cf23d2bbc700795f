//! Real-time channel protocol.
//!
//! Every frame is a JSON envelope `{"event": ..., "data": ...}`. Event
//! names match the original deployment so existing clients keep working.
//! Events delivered by the server are re-addressed with `from` = the
//! sending identity before forwarding.

use serde::{Deserialize, Serialize};

use crate::types::{ChatMessage, MediaKind, UserId};

/// One network-path candidate exchanged while establishing a media
/// connection. Field names follow the browser's RTCIceCandidate JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid")]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u32>,
}

/// Events a client may emit after its connection is authenticated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Re-register presence (reconnect / extra tab).
    #[serde(rename = "join")]
    Join { identity: UserId },

    /// Relay an already-persisted message to its recipient. The record's
    /// fields sit directly in `data`, as the original flat payload did.
    #[serde(rename = "private:send")]
    PrivateSend {
        #[serde(flatten)]
        message: ChatMessage,
    },

    #[serde(rename = "call:request")]
    CallRequest {
        to: UserId,
        #[serde(rename = "type")]
        kind: MediaKind,
    },

    #[serde(rename = "call:answer")]
    CallAnswer {
        to: UserId,
        accepted: bool,
        #[serde(rename = "type")]
        kind: MediaKind,
    },

    #[serde(rename = "call:end")]
    CallEnd { to: UserId },

    #[serde(rename = "webrtc:offer")]
    Offer { to: UserId, sdp: String },

    #[serde(rename = "webrtc:answer")]
    Answer { to: UserId, sdp: String },

    #[serde(rename = "webrtc:candidate")]
    Candidate { to: UserId, candidate: IceCandidate },
}

/// Events the server delivers to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Full snapshot of currently registered identities, emitted to every
    /// connection whenever the presence directory changes.
    #[serde(rename = "onlineUsers")]
    OnlineUsers { users: Vec<UserId> },

    #[serde(rename = "private:receive")]
    PrivateReceive {
        #[serde(flatten)]
        message: ChatMessage,
    },

    #[serde(rename = "call:request")]
    CallRequest {
        from: UserId,
        name: String,
        #[serde(rename = "type")]
        kind: MediaKind,
    },

    #[serde(rename = "call:answer")]
    CallAnswer {
        from: UserId,
        accepted: bool,
        #[serde(rename = "type")]
        kind: MediaKind,
        name: String,
    },

    #[serde(rename = "call:end")]
    CallEnd { from: UserId },

    #[serde(rename = "webrtc:offer")]
    Offer { from: UserId, sdp: String },

    #[serde(rename = "webrtc:answer")]
    Answer { from: UserId, sdp: String },

    #[serde(rename = "webrtc:candidate")]
    Candidate { from: UserId, candidate: IceCandidate },

    #[serde(rename = "message:error")]
    MessageError { error: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MessageBody, PeerRef};
    use chrono::Utc;

    #[test]
    fn client_event_envelope_names() {
        let ev = ClientEvent::CallRequest {
            to: UserId::new("u2"),
            kind: MediaKind::Video,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "call:request");
        assert_eq!(json["data"]["to"], "u2");
        assert_eq!(json["data"]["type"], "video");
    }

    #[test]
    fn server_event_envelope_names() {
        let ev = ServerEvent::CallAnswer {
            from: UserId::new("u1"),
            accepted: false,
            kind: MediaKind::Audio,
            name: "Ada".to_string(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "call:answer");
        assert_eq!(json["data"]["accepted"], false);
        assert_eq!(json["data"]["type"], "audio");
    }

    #[test]
    fn candidate_uses_browser_field_names() {
        let ev = ClientEvent::Candidate {
            to: UserId::new("u2"),
            candidate: IceCandidate {
                candidate: "candidate:1 1 udp ...".to_string(),
                sdp_mid: Some("0".to_string()),
                sdp_m_line_index: Some(0),
            },
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["data"]["candidate"]["sdpMid"], "0");
        assert_eq!(json["data"]["candidate"]["sdpMLineIndex"], 0);
    }

    #[test]
    fn private_send_round_trip() {
        let ev = ClientEvent::PrivateSend {
            message: ChatMessage {
                id: uuid::Uuid::new_v4(),
                from: UserId::new("u1"),
                to: PeerRef::from_wire("u2"),
                body: MessageBody::Text {
                    text: "hi".to_string(),
                },
                created_at: Utc::now(),
            },
        };

        // The record's fields sit directly under `data`, with no extra
        // nesting level.
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "private:send");
        assert_eq!(json["data"]["to"], "u2");
        assert_eq!(json["data"]["type"], "text");
        assert_eq!(json["data"]["text"], "hi");
        assert!(json["data"].get("message").is_none());

        let encoded = serde_json::to_string(&ev).unwrap();
        let decoded: ClientEvent = serde_json::from_str(&encoded).unwrap();
        match decoded {
            ClientEvent::PrivateSend { message } => {
                assert_eq!(message.from, UserId::new("u1"));
                assert_eq!(message.to, PeerRef::from_wire("u2"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
