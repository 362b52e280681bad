use crate::store::history::HistoryEntry;
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;

/// Requests accepted from clients. The wire form is a flat JSON document
/// tagged by its `command` field.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Login {
        username: String,
        password: String,
    },
    Register {
        username: String,
        password: String,
    },
    GetUsers,
    GetHistory {
        peer: String,
    },
    /// An empty `peer` addresses the broadcast stream.
    Chat {
        peer: String,
        message: String,
    },
    FileRequest {
        peer: String,
        filename: String,
        size: String,
        md5: String,
    },
    FileResponse {
        peer: String,
        response: String,
    },
    Close,
}

impl Command {
    /// Parses a decoded frame document. `None` when the document does not
    /// form a known command; sessions log and ignore those.
    #[inline]
    pub fn parse(document: Value) -> Option<Command> {
        serde_json::from_value(document).ok()
    }

    /// The command name a document claims to carry, for diagnostics.
    #[inline]
    pub fn claimed_name(document: &Value) -> &str {
        document
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or("<missing>")
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Command::Login { .. } => "login",
            Command::Register { .. } => "register",
            Command::GetUsers => "get_users",
            Command::GetHistory { .. } => "get_history",
            Command::Chat { .. } => "chat",
            Command::FileRequest { .. } => "file_request",
            Command::FileResponse { .. } => "file_response",
            Command::Close => "close",
        }
    }
}

/// Replies and notifications sent to clients, tagged by the `type` field.
/// Optional fields stay off the wire entirely when unset.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    LoginResult {
        username: String,
        response: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    RegisterResult {
        username: String,
        response: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    PeerJoined {
        peer: String,
    },
    PeerLeft {
        peer: String,
    },
    GetUsers {
        data: Vec<String>,
    },
    GetHistory {
        peer: String,
        data: Vec<HistoryEntry>,
    },
    PrivateMessage {
        peer: String,
        message: String,
    },
    BroadcastMessage {
        peer: String,
        message: String,
    },
    FileRequest {
        peer: String,
        filename: String,
        size: String,
        md5: String,
    },
    FileResponse {
        #[serde(skip_serializing_if = "Option::is_none")]
        peer: Option<String>,
        response: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        ip: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_wire_shapes() {
        let login = Command::parse(json!({
            "command": "login", "username": "alice", "password": "p"
        }))
        .unwrap();

        assert_eq!(
            login,
            Command::Login {
                username: "alice".to_string(),
                password: "p".to_string(),
            }
        );

        let chat = Command::parse(json!({
            "command": "chat", "peer": "", "message": "hello"
        }))
        .unwrap();

        match chat {
            Command::Chat { peer, message } => {
                assert!(peer.is_empty());
                assert_eq!(message, "hello");
            }
            other => panic!("Unexpected command {:?}", other),
        }

        assert_eq!(
            Command::parse(json!({"command": "get_users"})).unwrap(),
            Command::GetUsers
        );
    }

    #[test]
    fn test_command_parse_rejects_unknown() {
        assert!(Command::parse(json!({"command": "teleport"})).is_none());
        assert!(Command::parse(json!({"command": "chat", "peer": "bob"})).is_none());
        assert!(Command::parse(json!("not a map")).is_none());
    }

    #[test]
    fn test_claimed_name() {
        assert_eq!(Command::claimed_name(&json!({"command": "teleport"})), "teleport");
        assert_eq!(Command::claimed_name(&json!({"peer": "bob"})), "<missing>");
        assert_eq!(Command::claimed_name(&json!(42)), "<missing>");
    }

    #[test]
    fn test_login_result_shape() {
        let ok = Event::LoginResult {
            username: "alice".to_string(),
            response: "ok".to_string(),
            reason: None,
        };

        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"type": "login_result", "username": "alice", "response": "ok"})
        );

        let fail = Event::LoginResult {
            username: "alice".to_string(),
            response: "fail".to_string(),
            reason: Some("Incorrect username or password!".to_string()),
        };

        assert_eq!(
            serde_json::to_value(&fail).unwrap(),
            json!({
                "type": "login_result",
                "username": "alice",
                "response": "fail",
                "reason": "Incorrect username or password!"
            })
        );
    }

    #[test]
    fn test_file_response_shapes() {
        let accept = Event::FileResponse {
            peer: Some("bob".to_string()),
            response: "accept".to_string(),
            ip: Some("10.0.0.7".to_string()),
            reason: None,
        };

        assert_eq!(
            serde_json::to_value(&accept).unwrap(),
            json!({
                "type": "file_response",
                "peer": "bob",
                "response": "accept",
                "ip": "10.0.0.7"
            })
        );

        // The absent-peer error reply carries neither peer nor ip.
        let error = Event::FileResponse {
            peer: None,
            response: "error".to_string(),
            ip: None,
            reason: Some("Peer not found or not connected".to_string()),
        };

        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({
                "type": "file_response",
                "response": "error",
                "reason": "Peer not found or not connected"
            })
        );
    }

    #[test]
    fn test_history_reply_shape() {
        let event = Event::GetHistory {
            peer: "bob".to_string(),
            data: vec![HistoryEntry(
                "alice".to_string(),
                "01/02 03:04".to_string(),
                "hi".to_string(),
            )],
        };

        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "get_history",
                "peer": "bob",
                "data": [["alice", "01/02 03:04", "hi"]]
            })
        );
    }

    #[test]
    fn test_presence_shapes() {
        assert_eq!(
            serde_json::to_value(&Event::PeerJoined {
                peer: "alice".to_string()
            })
            .unwrap(),
            json!({"type": "peer_joined", "peer": "alice"})
        );

        assert_eq!(
            serde_json::to_value(&Event::PeerLeft {
                peer: "alice".to_string()
            })
            .unwrap(),
            json!({"type": "peer_left", "peer": "alice"})
        );
    }
}
