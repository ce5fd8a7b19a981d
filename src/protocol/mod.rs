// Wire types shared with the game server.
//
// `types` holds the data model carried inside messages (players, images,
// matchups, phase payloads). `message` holds the `{type, value}` envelope and
// the typed `Inbound`/`Outbound` unions built on top of it.

pub mod message;
pub mod types;

pub use message::{DecodeError, Envelope, Inbound, Outbound, PollChoice};
pub use types::{
    ArtifactImage, Award, AwardName, Event, EventData, EventName, LeaderboardImage, Matchup,
    Notification, NotifyKind, Player, PollData, SessionStatus, Side, SwapCandidate,
};
