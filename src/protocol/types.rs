// Wire data model shared by inbound and outbound messages.
//
// Field names follow what the game server actually emits: a mix of
// camelCase (`dUri`, `leftVotes`) and snake_case (`avatar_data_url`,
// `left_points`). Aliases accept the other spelling where both occur.

use crate::draw::model::StrokePath;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Timestamps arrive either as RFC 3339 or as naive ISO-8601 (server local
/// `datetime.isoformat()`), which is read as UTC.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                None => Ok(None),
                Some(raw) if raw.is_empty() => Ok(None),
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'"))),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    #[default]
    Waiting,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    #[default]
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub username: String,
    #[serde(default)]
    pub is_host: bool,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub points: i64,
    #[serde(default, rename = "color", alias = "colorTag")]
    pub color_tag: String,
    #[serde(default, rename = "avatar_data_url", alias = "avatarRef")]
    pub avatar_ref: String,
    #[serde(default, rename = "connection_status", alias = "connectionState")]
    pub connection_state: ConnectionState,
}

/// Round phases, in the order a full game visits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    #[serde(rename = "D1", alias = "FirstDraw")]
    FirstDraw,
    #[serde(rename = "C1", alias = "FirstCounter")]
    FirstCounter,
    #[serde(rename = "V1", alias = "FirstVote")]
    FirstVote,
    #[serde(rename = "D2", alias = "SecondDraw")]
    SecondDraw,
    #[serde(rename = "C2", alias = "SecondCounter")]
    SecondCounter,
    #[serde(rename = "V2", alias = "SecondVote")]
    SecondVote,
    #[serde(rename = "B", alias = "BonusDraw")]
    BonusDraw,
    #[serde(rename = "BC", alias = "BonusCounter")]
    BonusCounter,
    #[serde(rename = "BV", alias = "BonusVote")]
    BonusVote,
    #[serde(rename = "L", alias = "Leaderboard")]
    Leaderboard,
}

impl EventName {
    pub fn wire_name(self) -> &'static str {
        match self {
            EventName::FirstDraw => "D1",
            EventName::FirstCounter => "C1",
            EventName::FirstVote => "V1",
            EventName::SecondDraw => "D2",
            EventName::SecondCounter => "C2",
            EventName::SecondVote => "V2",
            EventName::BonusDraw => "B",
            EventName::BonusCounter => "BC",
            EventName::BonusVote => "BV",
            EventName::Leaderboard => "L",
        }
    }

    /// Bonus phases share one surface between several authors.
    pub fn is_multi_author(self) -> bool {
        self.wire_name().starts_with('B')
    }

    /// Phases during which the local canvas accepts input.
    pub fn is_drawing(self) -> bool {
        matches!(
            self,
            EventName::FirstDraw
                | EventName::FirstCounter
                | EventName::SecondDraw
                | EventName::SecondCounter
                | EventName::BonusDraw
                | EventName::BonusCounter
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: EventName,
    #[serde(default)]
    pub timed: bool,
    #[serde(default, alias = "endsAt", with = "timestamp::option")]
    pub ends: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactImage {
    #[serde(default)]
    pub artists: Vec<Player>,
    #[serde(rename = "dUri", alias = "renderedData")]
    pub rendered_data: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub points: i64,
    #[serde(
        default,
        alias = "lastChangedAt",
        alias = "last_changed",
        with = "timestamp::option"
    )]
    pub last_changed_at: Option<DateTime<Utc>>,
}

impl ArtifactImage {
    pub fn is_authored_by(&self, username: &str) -> bool {
        self.artists.iter().any(|p| p.username == username)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Matchup {
    pub left: ArtifactImage,
    #[serde(default)]
    pub left_votes: BTreeSet<String>,
    pub right: ArtifactImage,
    #[serde(default)]
    pub right_votes: BTreeSet<String>,
    #[serde(default)]
    pub initial_leader: Option<Side>,
    #[serde(default)]
    pub started: bool,
}

impl Matchup {
    pub fn image(&self, side: Side) -> &ArtifactImage {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapCandidate {
    pub image: ArtifactImage,
    #[serde(rename = "image_hash", alias = "contentHash")]
    pub content_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AwardName {
    Domination,
    OnFire,
    Bruh,
    Comeback,
    Fast,
    Pride,
}

impl AwardName {
    pub fn description(self) -> &'static str {
        match self {
            AwardName::Domination => "Received all votes!",
            AwardName::OnFire => {
                "Didn't receive all votes but got at least double their opponent"
            }
            AwardName::Bruh => "Nobody voted at all...",
            AwardName::Comeback => "Started off behind but brought it back",
            AwardName::Fast => "The last change was within the first third of the round",
            AwardName::Pride => "Awarded at the host's discretion",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Award {
    pub name: AwardName,
    #[serde(default, alias = "bonusPoints")]
    pub bonus_points: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardImage {
    pub image: ArtifactImage,
    #[serde(default)]
    pub awards: Vec<Award>,
}

/// Phase-specific payload of a STATE message. Only the fields a phase uses
/// are present; the rest of the object is kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter: Option<ArtifactImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teammates: Option<Vec<Player>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paths_chunk: Option<Vec<StrokePath>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaderboard: Option<Vec<Player>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaderboard_images: Option<Vec<LeaderboardImage>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollData {
    #[serde(with = "timestamp", alias = "endsAt")]
    pub ends: DateTime<Utc>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default, alias = "yesVoters")]
    pub yes: BTreeSet<String>,
    #[serde(default, alias = "noVoters")]
    pub no: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotifyKind {
    Success,
    Fail,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: NotifyKind,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_names_accept_short_and_long_forms() {
        let short: Event = serde_json::from_value(json!({"name": "V1"})).unwrap();
        let long: Event = serde_json::from_value(json!({"name": "FirstVote"})).unwrap();
        assert_eq!(short.name, EventName::FirstVote);
        assert_eq!(long.name, EventName::FirstVote);
        assert!(!short.timed);
        assert_eq!(short.ends, None);
    }

    #[test]
    fn bonus_phases_are_multi_author() {
        assert!(EventName::BonusDraw.is_multi_author());
        assert!(EventName::BonusCounter.is_multi_author());
        assert!(!EventName::FirstDraw.is_multi_author());
        assert!(!EventName::Leaderboard.is_multi_author());
    }

    #[test]
    fn naive_server_timestamps_parse_as_utc() {
        let event: Event = serde_json::from_value(json!({
            "name": "D1",
            "timed": true,
            "ends": "2024-05-01T12:00:30.500000"
        }))
        .unwrap();
        let ends = event.ends.unwrap();
        assert_eq!(ends.to_rfc3339(), "2024-05-01T12:00:30.500+00:00");
    }

    #[test]
    fn matchup_reads_camel_case_vote_sets() {
        let matchup: Matchup = serde_json::from_value(json!({
            "left": {"artists": [{"username": "ann"}], "dUri": "data:,", "title": "L"},
            "right": {"artists": [{"username": "bob"}], "dUri": "data:,", "title": "R"},
            "leftVotes": ["cat"],
            "rightVotes": [],
            "initialLeader": "left",
            "started": false
        }))
        .unwrap();
        assert!(matchup.left.is_authored_by("ann"));
        assert!(matchup.left_votes.contains("cat"));
        assert_eq!(matchup.initial_leader, Some(Side::Left));
    }

    #[test]
    fn event_data_keeps_unknown_fields() {
        let data: EventData = serde_json::from_value(json!({
            "prompt": "a frog",
            "round": 2
        }))
        .unwrap();
        assert_eq!(data.prompt.as_deref(), Some("a frog"));
        assert_eq!(data.extra["round"], 2);
    }

    #[test]
    fn award_descriptions_are_fixed() {
        assert_eq!(AwardName::Domination.description(), "Received all votes!");
        assert_eq!(AwardName::Bruh.description(), "Nobody voted at all...");
    }
}
