use crate::dispatch::IgnoreReason;
use crate::protocol::message::{ConnectPayload, StatePayload};
use crate::protocol::types::{Event, EventData, LeaderboardImage, Player, SessionStatus};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// The parts of session state a browser client persists between reloads.
/// They carry avatar and artwork data URIs, so they are what grows.
#[derive(Debug, Serialize)]
pub struct SessionMirror<'a> {
    pub players: &'a [Player],
    pub leaderboard: Option<&'a [Player]>,
    pub leaderboard_images: Option<&'a [LeaderboardImage]>,
}

/// An event and the payload that came with it.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSnapshot {
    pub event: Event,
    pub data: EventData,
    /// Local arrival time of the STATE that opened this event.
    pub entered_at: DateTime<Utc>,
}

/// What a STATE message did to the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseChange {
    /// Same event restated; only its payload was replaced.
    Unchanged,
    /// A different event became current and the old one was kept as previous.
    Entered,
}

/// Session status, roster and the current/previous event.
///
/// Every STATE replaces the snapshot wholesale. `ends` deadlines are kept
/// for countdowns only; nothing here advances on a local timer.
#[derive(Debug, Clone)]
pub struct SessionPhase {
    status: SessionStatus,
    host_connected: bool,
    players: Vec<Player>,
    last_player: Option<Player>,
    current: Option<PhaseSnapshot>,
    previous: Option<PhaseSnapshot>,
    players_ready: Vec<String>,
}

impl Default for SessionPhase {
    fn default() -> Self {
        Self {
            status: SessionStatus::Waiting,
            host_connected: true,
            players: Vec::new(),
            last_player: None,
            current: None,
            previous: None,
            players_ready: Vec::new(),
        }
    }
}

impl SessionPhase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_state(&mut self, state: &StatePayload, now: DateTime<Utc>) -> PhaseChange {
        if let Err(reason) = self.apply_status(state.status) {
            tracing::debug!(?reason, "keeping terminal status from state snapshot");
        }
        self.host_connected = state.host_connected;
        self.players = state.players.clone();

        let incoming = state.event.clone();
        let same_event = match (&self.current, &incoming) {
            (Some(current), Some(event)) => current.event == *event,
            (None, None) => true,
            _ => false,
        };

        let change = if same_event {
            if let (Some(current), Some(data)) = (self.current.as_mut(), state.event_data.clone()) {
                current.data = data;
            }
            PhaseChange::Unchanged
        } else {
            let next = incoming.map(|event| PhaseSnapshot {
                event,
                data: state.event_data.clone().unwrap_or_default(),
                entered_at: now,
            });
            if let Some(old) = std::mem::replace(&mut self.current, next) {
                self.previous = Some(old);
            }
            self.players_ready.clear();
            tracing::debug!(
                event = ?self.current.as_ref().map(|p| p.event.name),
                "phase changed"
            );
            PhaseChange::Entered
        };

        if let Some(ready) = &state.players_ready {
            self.players_ready = ready.clone();
        }
        change
    }

    /// Applies a bare status change. STOPPED is terminal.
    pub fn apply_status(&mut self, status: SessionStatus) -> Result<(), IgnoreReason> {
        if self.status == SessionStatus::Stopped && status != SessionStatus::Stopped {
            return Err(IgnoreReason::StatusTerminal);
        }
        self.status = status;
        Ok(())
    }

    pub fn connect(&mut self, payload: ConnectPayload) {
        self.players = payload.players;
        if payload.target.is_some() {
            self.last_player = payload.target;
        }
    }

    pub fn disconnect(&mut self, players: Vec<Player>) {
        self.players = players;
    }

    pub fn set_host_connected(&mut self, connected: bool) {
        self.host_connected = connected;
    }

    pub fn set_ready(&mut self, usernames: Vec<String>) {
        self.players_ready = usernames;
    }

    pub fn mirror(&self) -> SessionMirror<'_> {
        let data = self.current_data();
        SessionMirror {
            players: &self.players,
            leaderboard: data.and_then(|d| d.leaderboard.as_deref()),
            leaderboard_images: data.and_then(|d| d.leaderboard_images.as_deref()),
        }
    }

    /// Forgets the roster and leaderboard mirrors after they outgrew local
    /// storage.
    pub fn drop_mirror(&mut self) {
        self.players.clear();
        self.last_player = None;
        if let Some(current) = self.current.as_mut() {
            current.data.leaderboard = None;
            current.data.leaderboard_images = None;
        }
    }

    /// Whole seconds until the current deadline, floored at zero.
    pub fn countdown(&self, now: DateTime<Utc>) -> Option<u64> {
        let ends = self.current.as_ref()?.event.ends?;
        Some((ends - now).num_seconds().max(0) as u64)
    }

    /// When to nag about an unsent drawing: `fraction` of the way from
    /// entering the phase to its deadline.
    pub fn reminder_at(&self, fraction: f64) -> Option<DateTime<Utc>> {
        let current = self.current.as_ref()?;
        if !current.event.name.is_drawing() {
            return None;
        }
        let ends = current.event.ends?;
        let span = ends - current.entered_at;
        if span <= Duration::zero() {
            return None;
        }
        let offset_ms = (span.num_milliseconds() as f64 * fraction.clamp(0.0, 1.0)).round() as i64;
        Some(current.entered_at + Duration::milliseconds(offset_ms))
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn host_connected(&self) -> bool {
        self.host_connected
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, username: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.username == username)
    }

    pub fn last_player(&self) -> Option<&Player> {
        self.last_player.as_ref()
    }

    pub fn current(&self) -> Option<&PhaseSnapshot> {
        self.current.as_ref()
    }

    pub fn previous(&self) -> Option<&PhaseSnapshot> {
        self.previous.as_ref()
    }

    pub fn current_event(&self) -> Option<&Event> {
        self.current.as_ref().map(|p| &p.event)
    }

    pub fn previous_event(&self) -> Option<&Event> {
        self.previous.as_ref().map(|p| &p.event)
    }

    pub fn current_data(&self) -> Option<&EventData> {
        self.current.as_ref().map(|p| &p.data)
    }

    pub fn players_ready(&self) -> &[String] {
        &self.players_ready
    }

    pub fn is_ready(&self, username: &str) -> bool {
        self.players_ready.iter().any(|u| u == username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::EventName;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn state(name: EventName, ends_in: Option<i64>) -> StatePayload {
        StatePayload {
            status: SessionStatus::Running,
            host_connected: true,
            players: Vec::new(),
            event: Some(Event {
                name,
                timed: ends_in.is_some(),
                ends: ends_in.map(|s| now() + Duration::seconds(s)),
            }),
            event_data: None,
            players_ready: None,
            matchup: None,
            idx: None,
        }
    }

    #[test]
    fn new_event_demotes_the_current_one() {
        let mut phase = SessionPhase::new();
        assert_eq!(phase.apply_state(&state(EventName::FirstVote, None), now()), PhaseChange::Entered);
        assert_eq!(phase.apply_state(&state(EventName::Leaderboard, None), now()), PhaseChange::Entered);
        assert_eq!(phase.previous_event().unwrap().name, EventName::FirstVote);
        assert_eq!(phase.current_event().unwrap().name, EventName::Leaderboard);
    }

    #[test]
    fn restated_event_only_replaces_data() {
        let mut phase = SessionPhase::new();
        phase.apply_state(&state(EventName::FirstDraw, Some(60)), now());
        phase.set_ready(vec!["ann".into()]);

        let mut again = state(EventName::FirstDraw, Some(60));
        again.event_data = Some(EventData {
            prompt: Some("a frog".into()),
            ..Default::default()
        });
        assert_eq!(phase.apply_state(&again, now()), PhaseChange::Unchanged);
        assert!(phase.previous().is_none());
        assert!(phase.is_ready("ann"));
        assert_eq!(phase.current_data().unwrap().prompt.as_deref(), Some("a frog"));
    }

    #[test]
    fn stopped_is_terminal() {
        let mut phase = SessionPhase::new();
        phase.apply_status(SessionStatus::Running).unwrap();
        phase.apply_status(SessionStatus::Waiting).unwrap();
        phase.apply_status(SessionStatus::Stopped).unwrap();
        assert_eq!(
            phase.apply_status(SessionStatus::Running),
            Err(IgnoreReason::StatusTerminal)
        );
        assert_eq!(phase.status(), SessionStatus::Stopped);
    }

    #[test]
    fn countdown_saturates_and_reminder_lands_late_in_the_phase() {
        let mut phase = SessionPhase::new();
        phase.apply_state(&state(EventName::FirstDraw, Some(100)), now());
        assert_eq!(phase.countdown(now()), Some(100));
        assert_eq!(phase.countdown(now() + Duration::seconds(300)), Some(0));
        assert_eq!(phase.reminder_at(0.9), Some(now() + Duration::seconds(90)));

        phase.apply_state(&state(EventName::FirstVote, Some(100)), now());
        assert_eq!(phase.reminder_at(0.9), None);
    }

    #[test]
    fn host_assumed_connected_until_told_otherwise() {
        let mut phase = SessionPhase::new();
        assert!(phase.host_connected());
        phase.set_host_connected(false);
        assert!(!phase.host_connected());
    }

    #[test]
    fn dropping_the_mirror_keeps_the_phase() {
        let ann: Player = serde_json::from_value(serde_json::json!({"username": "ann"})).unwrap();
        let mut leaderboard = state(EventName::Leaderboard, None);
        leaderboard.players = vec![ann.clone()];
        leaderboard.event_data = Some(EventData {
            leaderboard: Some(vec![ann]),
            ..Default::default()
        });
        let mut phase = SessionPhase::new();
        phase.apply_state(&leaderboard, now());
        assert_eq!(phase.mirror().leaderboard.map(<[Player]>::len), Some(1));

        phase.drop_mirror();
        let mirror = phase.mirror();
        assert!(mirror.players.is_empty());
        assert!(mirror.leaderboard.is_none());
        assert_eq!(phase.current_event().unwrap().name, EventName::Leaderboard);
    }
}
