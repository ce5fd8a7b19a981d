// Read models for the two kinds of screen.
//
// The host display shows the whole room: roster, who is ready, the matchup
// with live tallies, the leaderboard. A player device shows what that player
// can act on: the prompt, their canvas, whether they may vote or swap.
// Both are plain serializable snapshots rebuilt on demand; nothing here is
// stored or mutated.

use crate::draw::capture::DrawingCapture;
use crate::matchup::{ActiveMatchup, MatchupMachine, MatchupPhase};
use crate::phase::SessionPhase;
use crate::poll::PollBoard;
use crate::protocol::message::PollChoice;
use crate::protocol::types::{
    ArtifactImage, ConnectionState, EventName, LeaderboardImage, SessionStatus, Side,
};
use crate::settings::ClientSettings;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ViewProjection {
    Host(HostView),
    Player(PlayerView),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostView {
    pub status: SessionStatus,
    pub host_connected: bool,
    pub event: Option<EventName>,
    pub previous_event: Option<EventName>,
    pub countdown: Option<u64>,
    pub players: Vec<PlayerSummary>,
    pub matchup: Option<MatchupView>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub poll: Option<PollView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerView {
    pub username: String,
    pub status: SessionStatus,
    pub host_connected: bool,
    pub event: Option<EventName>,
    pub countdown: Option<u64>,
    pub prompt: Option<String>,
    pub counter_title: Option<String>,
    pub teammates: Vec<String>,
    pub canvas: CanvasView,
    pub matchup: Option<MatchupView>,
    pub can_vote: bool,
    pub can_swap: bool,
    pub swap_candidates: Vec<String>,
    pub my_vote: Option<Side>,
    pub poll: Option<PollView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSummary {
    pub username: String,
    pub points: i64,
    pub connected: bool,
    pub ready: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanvasView {
    pub strokes: usize,
    pub remote_strokes: usize,
    pub can_undo: bool,
    pub submitted: bool,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchupView {
    pub idx: u32,
    pub phase: MatchupPhase,
    pub left: SideView,
    pub right: SideView,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SideView {
    pub title: String,
    pub artists: Vec<String>,
    pub votes: usize,
    /// Percentage of all votes, 0 when nobody voted.
    pub percent: f64,
    pub points: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub title: String,
    pub artists: Vec<String>,
    pub points: i64,
    pub awards: Vec<AwardView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AwardView {
    pub name: String,
    pub description: &'static str,
    pub bonus_points: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollView {
    pub prompt: String,
    pub yes_percent: f64,
    pub no_percent: f64,
    pub open: bool,
    pub my_vote: Option<PollChoice>,
}

pub fn project(
    settings: &ClientSettings,
    phase: &SessionPhase,
    matchup: &MatchupMachine,
    drawing: &DrawingCapture,
    poll: &PollBoard,
    now: DateTime<Utc>,
) -> ViewProjection {
    if settings.is_host {
        ViewProjection::Host(host_view(phase, matchup, poll, now))
    } else {
        ViewProjection::Player(player_view(
            &settings.username,
            phase,
            matchup,
            drawing,
            poll,
            now,
        ))
    }
}

fn host_view(
    phase: &SessionPhase,
    matchup: &MatchupMachine,
    poll: &PollBoard,
    now: DateTime<Utc>,
) -> HostView {
    let players: Vec<PlayerSummary> = phase
        .players()
        .iter()
        .map(|p| PlayerSummary {
            username: p.username.clone(),
            points: p.points,
            connected: p.connection_state == ConnectionState::Connected,
            ready: phase.is_ready(&p.username),
        })
        .collect();
    let leaderboard: Vec<LeaderboardEntry> = phase
        .current_data()
        .and_then(|data| data.leaderboard_images.as_deref())
        .map(|images| images.iter().map(leaderboard_entry).collect())
        .unwrap_or_default();
    HostView {
        status: phase.status(),
        host_connected: phase.host_connected(),
        event: phase.current_event().map(|e| e.name),
        previous_event: phase.previous_event().map(|e| e.name),
        countdown: phase.countdown(now),
        players,
        matchup: matchup_view(matchup),
        leaderboard,
        poll: poll_view(poll),
    }
}

fn player_view(
    username: &str,
    phase: &SessionPhase,
    matchup: &MatchupMachine,
    drawing: &DrawingCapture,
    poll: &PollBoard,
    now: DateTime<Utc>,
) -> PlayerView {
    let data = phase.current_data();
    PlayerView {
        username: username.to_string(),
        status: phase.status(),
        host_connected: phase.host_connected(),
        event: phase.current_event().map(|e| e.name),
        countdown: phase.countdown(now),
        prompt: data.and_then(|d| d.prompt.clone()),
        counter_title: data.and_then(|d| d.counter.as_ref()).map(|c| c.title.clone()),
        teammates: data
            .and_then(|d| d.teammates.as_deref())
            .map(|t| t.iter().map(|p| p.username.clone()).collect())
            .unwrap_or_default(),
        canvas: CanvasView {
            strokes: drawing.local_strokes().len(),
            remote_strokes: drawing.mirror_strokes().len(),
            can_undo: drawing.can_undo(),
            submitted: drawing.is_submitted(),
            title: drawing.title().to_string(),
        },
        matchup: matchup_view(matchup),
        can_vote: matchup.can_vote(username),
        can_swap: matchup.can_swap(username),
        swap_candidates: if matchup.can_swap(username) {
            matchup
                .current()
                .map(|m| m.swap_candidates.iter().map(|c| c.content_hash.clone()).collect())
                .unwrap_or_default()
        } else {
            Vec::new()
        },
        my_vote: matchup.current().and_then(|m| m.my_vote),
        poll: poll_view(poll),
    }
}

fn matchup_view(machine: &MatchupMachine) -> Option<MatchupView> {
    let round = machine.current()?;
    Some(MatchupView {
        idx: round.idx,
        phase: machine.phase(),
        left: side_view(machine, round, Side::Left),
        right: side_view(machine, round, Side::Right),
    })
}

fn side_view(machine: &MatchupMachine, round: &ActiveMatchup, side: Side) -> SideView {
    let image = round.image(side);
    SideView {
        title: image.title.clone(),
        artists: artist_names(image),
        votes: round.votes(side).len(),
        percent: machine.vote_share(side) * 100.0,
        points: round.result.map(|r| r.points(side)),
    }
}

fn leaderboard_entry(entry: &LeaderboardImage) -> LeaderboardEntry {
    LeaderboardEntry {
        title: entry.image.title.clone(),
        artists: artist_names(&entry.image),
        points: entry.image.points,
        awards: entry
            .awards
            .iter()
            .map(|award| AwardView {
                name: serde_json::to_value(award.name)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default(),
                description: award.name.description(),
                bonus_points: award.bonus_points,
            })
            .collect(),
    }
}

fn poll_view(board: &PollBoard) -> Option<PollView> {
    let poll = board.current()?;
    Some(PollView {
        prompt: poll.prompt.clone(),
        yes_percent: poll.share(PollChoice::Yes) * 100.0,
        no_percent: poll.share(PollChoice::No) * 100.0,
        open: !poll.closed,
        my_vote: poll.my_vote,
    })
}

fn artist_names(image: &ArtifactImage) -> Vec<String> {
    image.artists.iter().map(|p| p.username.clone()).collect()
}
