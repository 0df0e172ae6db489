use serde::{Deserialize, Serialize};

use crate::board::{MapData, MilepostId};
use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    Joinable,
    Resumeable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpgradeKind {
    Capacity,
    Speed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Outbound message, tagged by `messageType` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "messageType",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Request {
    List {
        list_type: ListType,
    },
    JoinGame {
        gid: String,
        color: String,
        pid: String,
    },
    ResumeGame {
        gid: String,
        pid: String,
    },
    NewGame {
        color: String,
        pid: String,
        game_type: String,
    },
    StartGame {
        gid: String,
        pid: String,
    },
    TrackBuilt {
        pid: String,
        gid: String,
        edges_built: Vec<MilepostId>,
    },
    StartedTrain {
        pid: String,
        gid: String,
        position: MilepostId,
    },
    UpgradedTrain {
        pid: String,
        gid: String,
        upgrade_state: UpgradeKind,
    },
    EndTurn {
        pid: String,
        gid: String,
    },
    EndGame {
        pid: String,
        gid: String,
    },
    StatusUpdate {
        #[serde(skip_serializing_if = "Option::is_none")]
        pid: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        gid: Option<String>,
    },
}

impl Request {
    pub fn method(&self) -> Method {
        match self {
            Self::List { .. } | Self::StatusUpdate { .. } => Method::Get,
            _ => Method::Post,
        }
    }

    pub fn message_type(&self) -> &'static str {
        match self {
            Self::List { .. } => "list",
            Self::JoinGame { .. } => "joinGame",
            Self::ResumeGame { .. } => "resumeGame",
            Self::NewGame { .. } => "newGame",
            Self::StartGame { .. } => "startGame",
            Self::TrackBuilt { .. } => "trackBuilt",
            Self::StartedTrain { .. } => "startedTrain",
            Self::UpgradedTrain { .. } => "upgradedTrain",
            Self::EndTurn { .. } => "endTurn",
            Self::EndGame { .. } => "endGame",
            Self::StatusUpdate { .. } => "statusUpdate",
        }
    }

    pub fn to_json(&self) -> Result<String, ClientError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Pregame,
    Lobby,
    Active,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSummary {
    pub gid: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl GameSummary {
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.gid)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStatus {
    pub pid: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub money: Option<i64>,
    #[serde(default)]
    pub spendings: Option<i64>,
    #[serde(default)]
    pub moves_made: Option<i64>,
}

/// Lobby rosters list bare handles; in-game statuses list full player records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RosterEntry {
    Handle(String),
    Player(PlayerStatus),
}

impl RosterEntry {
    pub fn pid(&self) -> &str {
        match self {
            Self::Handle(pid) => pid,
            Self::Player(p) => &p.pid,
        }
    }

    pub fn color(&self) -> Option<&str> {
        match self {
            Self::Handle(_) => None,
            Self::Player(p) => p.color.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    StartGame,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geography: Option<String>,
    #[serde(default, rename = "mapData", skip_serializing_if = "Option::is_none")]
    pub map_data: Option<MapData>,
}

impl GameEvent {
    /// `None` for event types this client does not know.
    pub fn known_kind(&self) -> Option<EventKind> {
        match self.kind.as_str() {
            "startGame" => Some(EventKind::StartGame),
            _ => None,
        }
    }
}

/// One status poll response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub phase: Phase,
    #[serde(default)]
    pub games: Option<Vec<GameSummary>>,
    #[serde(default)]
    pub players: Option<Vec<RosterEntry>>,
    #[serde(default)]
    pub events: Vec<GameEvent>,
    #[serde(default)]
    pub geography: Option<String>,
    #[serde(default, rename = "mapData")]
    pub map_data: Option<MapData>,
    #[serde(default)]
    pub activeid: Option<String>,
    #[serde(default)]
    pub lastid: Option<String>,
}

impl StatusPayload {
    pub fn parse(text: &str) -> Result<Self, ClientError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse {
    #[serde(default)]
    pub gids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewGameResponse {
    pub gid: String,
    #[serde(default, rename = "mapData")]
    pub map_data: Option<MapData>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn encode(req: &Request) -> Value {
        serde_json::from_str(&req.to_json().unwrap()).unwrap()
    }

    #[test]
    fn requests_use_message_type_tag_and_camel_case_fields() {
        let req = Request::NewGame {
            color: "teal".into(),
            pid: "louie".into(),
            game_type: "africa".into(),
        };
        assert_eq!(
            encode(&req),
            json!({"messageType": "newGame", "color": "teal", "pid": "louie", "gameType": "africa"})
        );
        assert_eq!(req.method(), Method::Post);

        let list = Request::List {
            list_type: ListType::Resumeable,
        };
        assert_eq!(
            encode(&list),
            json!({"messageType": "list", "listType": "resumeable"})
        );
        assert_eq!(list.method(), Method::Get);
    }

    #[test]
    fn track_and_train_payloads() {
        let track = Request::TrackBuilt {
            pid: "p".into(),
            gid: "g".into(),
            edges_built: vec![MilepostId::new(34, 58), MilepostId::new(33, 58)],
        };
        assert_eq!(
            encode(&track),
            json!({
                "messageType": "trackBuilt", "pid": "p", "gid": "g",
                "edgesBuilt": [{"x": 34, "y": 58}, {"x": 33, "y": 58}]
            })
        );
        let upgrade = Request::UpgradedTrain {
            pid: "p".into(),
            gid: "g".into(),
            upgrade_state: UpgradeKind::Speed,
        };
        assert_eq!(encode(&upgrade)["upgradeState"], json!("Speed"));
    }

    #[test]
    fn message_type_matches_serialized_tag() {
        let reqs = [
            Request::EndTurn {
                pid: "p".into(),
                gid: "g".into(),
            },
            Request::StartedTrain {
                pid: "p".into(),
                gid: "g".into(),
                position: MilepostId::new(1, 2),
            },
            Request::StatusUpdate {
                pid: None,
                gid: None,
            },
        ];
        for req in reqs {
            assert_eq!(encode(&req)["messageType"], json!(req.message_type()));
        }
    }

    #[test]
    fn status_update_omits_unknown_session_fields() {
        let req = Request::StatusUpdate {
            pid: Some("huey".into()),
            gid: None,
        };
        assert_eq!(
            encode(&req),
            json!({"messageType": "statusUpdate", "pid": "huey"})
        );
    }

    #[test]
    fn status_payload_roster_accepts_handles_and_records() {
        let status = StatusPayload::parse(
            r#"{"phase":"active","players":["huey",{"pid":"dewey","color":"red","money":50}],
                "events":[{"type":"startGame","geography":"africa"},{"type":"fireworks"}]}"#,
        )
        .unwrap();
        let players = status.players.unwrap();
        assert_eq!(players[0].pid(), "huey");
        assert_eq!(players[1].pid(), "dewey");
        assert_eq!(players[1].color(), Some("red"));
        assert_eq!(status.events[0].known_kind(), Some(EventKind::StartGame));
        assert_eq!(status.events[1].known_kind(), None);
    }

    #[test]
    fn unknown_phase_is_malformed() {
        assert!(matches!(
            StatusPayload::parse(r#"{"phase":"intermission"}"#),
            Err(ClientError::MalformedServerPayload(_))
        ));
        assert!(StatusPayload::parse(r#"{"games":[]}"#).is_err());
    }

    #[test]
    fn game_label_falls_back_to_id() {
        let g: GameSummary = serde_json::from_value(json!({"gid": "g7"})).unwrap();
        assert_eq!(g.label(), "g7");
    }
}
