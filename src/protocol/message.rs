// Envelope codec and the typed message unions.
//
// Every frame on the socket is `{ type, value, author?, ping? }`. Inbound
// frames are decoded in two steps: the envelope first (so `ping` is usable
// even when the payload is not), then `Inbound::decode` switches on `type`
// and deserializes `value` into the matching variant. Unknown types are
// reported separately from malformed payloads so callers can log them
// differently; neither is fatal.

use crate::draw::model::StrokePath;
use crate::protocol::types::{
    timestamp, ArtifactImage, Event, EventData, Matchup, Notification, Player, PollData,
    SessionStatus, Side, SwapCandidate,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: Value,
    /// Originating player, or `0` for server/host frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Value>,
    #[serde(default, alias = "pingMs", skip_serializing_if = "Option::is_none")]
    pub ping: Option<f64>,
}

impl Envelope {
    pub fn new(kind: impl Into<String>, value: Value) -> Self {
        Self {
            kind: kind.into(),
            value,
            author: None,
            ping: None,
        }
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatePayload {
    pub status: SessionStatus,
    #[serde(default = "assume_host_connected", alias = "hostConnected")]
    pub host_connected: bool,
    #[serde(default)]
    pub players: Vec<Player>,
    #[serde(default)]
    pub event: Option<Event>,
    #[serde(default, alias = "eventData")]
    pub event_data: Option<EventData>,
    #[serde(default, alias = "playersReady")]
    pub players_ready: Option<Vec<String>>,
    #[serde(default)]
    pub matchup: Option<Matchup>,
    #[serde(default)]
    pub idx: Option<u32>,
}

fn assume_host_connected() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConnectPayload {
    #[serde(default)]
    pub players: Vec<Player>,
    #[serde(default)]
    pub target: Option<Player>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MatchupAnnounce {
    pub idx: u32,
    pub matchup: Matchup,
    #[serde(default, with = "timestamp::option")]
    pub ends: Option<DateTime<Utc>>,
    #[serde(default)]
    pub swap_candidates: Option<Vec<SwapCandidate>>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct VoteSets {
    #[serde(default)]
    pub left: BTreeSet<String>,
    #[serde(default)]
    pub right: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchupResult {
    #[serde(default)]
    pub left_points: i64,
    #[serde(default)]
    pub right_points: i64,
}

impl MatchupResult {
    pub fn points(&self, side: Side) -> i64 {
        match side {
            Side::Left => self.left_points,
            Side::Right => self.right_points,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageSwap {
    pub target: Side,
    pub matchup: Matchup,
}

impl ImageSwap {
    pub fn replacement(&self) -> &ArtifactImage {
        self.matchup.image(self.target)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum ReadyRoster {
    Bare(Vec<String>),
    Wrapped { usernames: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PathPayload {
    pub path: StrokePath,
    #[serde(default, rename = "dUri")]
    pub data_uri: String,
}

/// Every inbound message the client acts on.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    State(Box<StatePayload>),
    Status(SessionStatus),
    Connect(ConnectPayload),
    Disconnect(Vec<Player>),
    HostConnect,
    HostDisconnect,
    Ping,
    Matchup(Box<MatchupAnnounce>),
    MatchupStart,
    MatchupVote(VoteSets),
    MatchupResult(MatchupResult),
    ImageSwap(Box<ImageSwap>),
    ImageSubmits(Vec<String>),
    Path(Box<PathPayload>),
    Clear,
    Notify(Notification),
    Poll(PollData),
    PollVote(PollData),
}

#[derive(Debug)]
pub enum DecodeError {
    UnknownType(String),
    Malformed {
        kind: String,
        error: serde_json::Error,
    },
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::UnknownType(kind) => write!(f, "unknown message type '{kind}'"),
            DecodeError::Malformed { kind, error } => {
                write!(f, "malformed {kind} payload: {error}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

impl Inbound {
    pub fn decode(envelope: &Envelope) -> Result<Self, DecodeError> {
        let kind = envelope.kind.as_str();
        let value = envelope.value.clone();
        let malformed = |error| DecodeError::Malformed {
            kind: kind.to_string(),
            error,
        };

        macro_rules! parse {
            ($value:expr) => {
                serde_json::from_value($value.clone()).map_err(malformed)?
            };
        }

        let message = match kind {
            "STATE" => Inbound::State(Box::new(parse!(value))),
            "STATUS" => Inbound::Status(parse!(value)),
            "CONNECT" => Inbound::Connect(parse!(value)),
            "DISCONNECT" => Inbound::Disconnect(parse!(value)),
            "HOST_CONNECT" => Inbound::HostConnect,
            "HOST_DISCONNECT" => Inbound::HostDisconnect,
            "PING" => Inbound::Ping,
            "MATCHUP" => Inbound::Matchup(Box::new(parse!(value))),
            "MATCHUP_START" => Inbound::MatchupStart,
            "MATCHUP_VOTE" => Inbound::MatchupVote(parse!(value)),
            "MATCHUP_RESULT" => Inbound::MatchupResult(parse!(value)),
            "IMAGE_SWAP" => Inbound::ImageSwap(Box::new(parse!(value))),
            "IMAGE_SUBMITS" => {
                let roster: ReadyRoster = parse!(value);
                Inbound::ImageSubmits(match roster {
                    ReadyRoster::Bare(names) | ReadyRoster::Wrapped { usernames: names } => names,
                })
            }
            "PATH" => Inbound::Path(Box::new(parse!(value))),
            "CLEAR" => Inbound::Clear,
            "NOTIFY" => Inbound::Notify(parse!(value)),
            "POLL" => Inbound::Poll(parse!(value)),
            "POLL_VOTE" => Inbound::PollVote(parse!(value)),
            other => return Err(DecodeError::UnknownType(other.to_string())),
        };
        Ok(message)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Inbound::State(_) => "STATE",
            Inbound::Status(_) => "STATUS",
            Inbound::Connect(_) => "CONNECT",
            Inbound::Disconnect(_) => "DISCONNECT",
            Inbound::HostConnect => "HOST_CONNECT",
            Inbound::HostDisconnect => "HOST_DISCONNECT",
            Inbound::Ping => "PING",
            Inbound::Matchup(_) => "MATCHUP",
            Inbound::MatchupStart => "MATCHUP_START",
            Inbound::MatchupVote(_) => "MATCHUP_VOTE",
            Inbound::MatchupResult(_) => "MATCHUP_RESULT",
            Inbound::ImageSwap(_) => "IMAGE_SWAP",
            Inbound::ImageSubmits(_) => "IMAGE_SUBMITS",
            Inbound::Path(_) => "PATH",
            Inbound::Clear => "CLEAR",
            Inbound::Notify(_) => "NOTIFY",
            Inbound::Poll(_) => "POLL",
            Inbound::PollVote(_) => "POLL_VOTE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollChoice {
    Yes,
    No,
}

/// Every message the client sends.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Image { data_uri: String, title: String },
    Path { path: StrokePath, data_uri: String },
    Clear,
    MatchupVote(Side),
    ImageSwap { content_hash: String },
    PollVote(PollChoice),
    Start,
    Stop,
}

impl Outbound {
    pub fn kind(&self) -> &'static str {
        match self {
            Outbound::Image { .. } => "IMAGE",
            Outbound::Path { .. } => "PATH",
            Outbound::Clear => "CLEAR",
            Outbound::MatchupVote(_) => "MATCHUP_VOTE",
            Outbound::ImageSwap { .. } => "IMAGE_SWAP",
            Outbound::PollVote(_) => "POLL_VOTE",
            Outbound::Start => "START",
            Outbound::Stop => "STOP",
        }
    }

    pub fn to_envelope(&self) -> serde_json::Result<Envelope> {
        let value = match self {
            Outbound::Image { data_uri, title } => {
                serde_json::json!({ "dUri": data_uri, "title": title })
            }
            Outbound::Path { path, data_uri } => {
                serde_json::json!({ "path": serde_json::to_value(path)?, "dUri": data_uri })
            }
            Outbound::Clear | Outbound::Start | Outbound::Stop => Value::Null,
            Outbound::MatchupVote(side) => serde_json::to_value(side)?,
            Outbound::ImageSwap { content_hash } => Value::String(content_hash.clone()),
            Outbound::PollVote(choice) => serde_json::to_value(choice)?,
        };
        Ok(Envelope::new(self.kind(), value))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.to_envelope()?)
    }
}
