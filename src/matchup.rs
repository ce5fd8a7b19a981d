use crate::dispatch::IgnoreReason;
use crate::protocol::message::{ImageSwap, MatchupAnnounce, MatchupResult, Outbound, VoteSets};
use crate::protocol::types::{ArtifactImage, Matchup, Side, SwapCandidate};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchupPhase {
    NoMatchup,
    GracePeriod,
    Voting,
    Resolved,
}

/// One round's pair of images, as last reported by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveMatchup {
    pub idx: u32,
    pub left: ArtifactImage,
    pub right: ArtifactImage,
    pub left_votes: BTreeSet<String>,
    pub right_votes: BTreeSet<String>,
    pub initial_leader: Option<Side>,
    pub started: bool,
    pub ends: Option<DateTime<Utc>>,
    pub result: Option<MatchupResult>,
    pub swap_candidates: Vec<SwapCandidate>,
    /// Side this viewer clicked, if any. Display only.
    pub my_vote: Option<Side>,
}

impl ActiveMatchup {
    fn from_wire(idx: u32, matchup: Matchup, ends: Option<DateTime<Utc>>) -> Self {
        Self {
            idx,
            left: matchup.left,
            right: matchup.right,
            left_votes: matchup.left_votes,
            right_votes: matchup.right_votes,
            initial_leader: matchup.initial_leader,
            started: matchup.started,
            ends,
            result: None,
            swap_candidates: Vec::new(),
            my_vote: None,
        }
    }

    pub fn image(&self, side: Side) -> &ArtifactImage {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn votes(&self, side: Side) -> &BTreeSet<String> {
        match side {
            Side::Left => &self.left_votes,
            Side::Right => &self.right_votes,
        }
    }

    /// Side whose image `username` helped draw.
    pub fn authored_side(&self, username: &str) -> Option<Side> {
        if self.left.is_authored_by(username) {
            Some(Side::Left)
        } else if self.right.is_authored_by(username) {
            Some(Side::Right)
        } else {
            None
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.result.is_some()
    }

    fn sanitize_votes(&mut self) {
        let authors: Vec<String> = self
            .left
            .artists
            .iter()
            .chain(self.right.artists.iter())
            .map(|p| p.username.clone())
            .collect();
        let mut dropped = enforce_disjoint(&mut self.left_votes, &mut self.right_votes);
        for author in authors {
            let in_left = self.left_votes.remove(&author);
            let in_right = self.right_votes.remove(&author);
            if in_left || in_right {
                dropped.push(author);
            }
        }
        if !dropped.is_empty() {
            tracing::warn!(idx = self.idx, ?dropped, "dropped ineligible votes");
        }
    }
}

/// Removes every name present in both sets and returns them.
pub(crate) fn enforce_disjoint(a: &mut BTreeSet<String>, b: &mut BTreeSet<String>) -> Vec<String> {
    let both: Vec<String> = a.intersection(b).cloned().collect();
    for name in &both {
        a.remove(name);
        b.remove(name);
    }
    both
}

/// Tracks the current matchup of a vote phase.
///
/// Index bookkeeping survives a resolved round so a redelivered MATCHUP for
/// an older round cannot resurrect it; it is reset when the phase changes,
/// since the server numbers matchups per phase.
#[derive(Debug, Clone, Default)]
pub struct MatchupMachine {
    current: Option<ActiveMatchup>,
    highest_idx: Option<u32>,
}

impl MatchupMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> MatchupPhase {
        match &self.current {
            None => MatchupPhase::NoMatchup,
            Some(m) if m.is_resolved() => MatchupPhase::Resolved,
            Some(m) if m.started => MatchupPhase::Voting,
            Some(_) => MatchupPhase::GracePeriod,
        }
    }

    pub fn current(&self) -> Option<&ActiveMatchup> {
        self.current.as_ref()
    }

    pub fn highest_idx(&self) -> Option<u32> {
        self.highest_idx
    }

    /// Starts a new round in its grace period. Indices at or below the
    /// highest one seen are dropped.
    pub fn announce(&mut self, announce: MatchupAnnounce) -> Result<(), IgnoreReason> {
        self.check_idx(announce.idx)?;
        let mut round = ActiveMatchup::from_wire(announce.idx, announce.matchup, announce.ends);
        round.left_votes.clear();
        round.right_votes.clear();
        round.started = false;
        round.swap_candidates = announce.swap_candidates.unwrap_or_default();
        tracing::debug!(idx = round.idx, "matchup announced");
        self.highest_idx = Some(round.idx);
        self.current = Some(round);
        Ok(())
    }

    /// Adopts a round from a full STATE snapshot (reconnect). Unlike
    /// [`announce`](Self::announce) the vote sets and `started` are kept, and
    /// the current index may be restated.
    pub fn restore(&mut self, idx: u32, matchup: Matchup) -> Result<(), IgnoreReason> {
        if let Some(highest) = self.highest_idx {
            if idx < highest {
                tracing::debug!(idx, highest, "stale matchup in state snapshot");
                return Err(IgnoreReason::StaleMatchup(idx));
            }
        }
        let mut round = ActiveMatchup::from_wire(idx, matchup, None);
        if let Some(existing) = self.current.as_ref().filter(|m| m.idx == idx) {
            round.started |= existing.started;
            round.ends = existing.ends;
            round.result = existing.result;
            round.swap_candidates = existing.swap_candidates.clone();
            round.my_vote = existing.my_vote;
        }
        round.sanitize_votes();
        self.highest_idx = Some(idx);
        self.current = Some(round);
        Ok(())
    }

    /// Closes the grace period. `started` only ever goes from false to true.
    pub fn start(&mut self) -> Result<(), IgnoreReason> {
        let round = self.current.as_mut().ok_or(IgnoreReason::NoMatchup)?;
        if round.is_resolved() {
            return Err(IgnoreReason::RoundResolved(round.idx));
        }
        if round.started {
            return Err(IgnoreReason::AlreadyStarted(round.idx));
        }
        round.started = true;
        tracing::debug!(idx = round.idx, "matchup voting open");
        Ok(())
    }

    /// Replaces both vote sets with the server's full copy.
    pub fn apply_votes(&mut self, votes: VoteSets) -> Result<(), IgnoreReason> {
        let round = self.current.as_mut().ok_or(IgnoreReason::NoMatchup)?;
        if round.is_resolved() {
            return Err(IgnoreReason::RoundResolved(round.idx));
        }
        round.left_votes = votes.left;
        round.right_votes = votes.right;
        round.sanitize_votes();
        Ok(())
    }

    pub fn resolve(&mut self, result: MatchupResult) -> Result<(), IgnoreReason> {
        let round = self.current.as_mut().ok_or(IgnoreReason::NoMatchup)?;
        if round.is_resolved() {
            return Err(IgnoreReason::RoundResolved(round.idx));
        }
        tracing::debug!(
            idx = round.idx,
            left = result.left_points,
            right = result.right_points,
            "matchup resolved"
        );
        round.result = Some(result);
        Ok(())
    }

    /// Replaces one side's image. Votes, index and `started` are untouched.
    pub fn swap_image(&mut self, swap: ImageSwap) -> Result<(), IgnoreReason> {
        let round = self.current.as_mut().ok_or(IgnoreReason::NoMatchup)?;
        let replacement = swap.replacement().clone();
        match swap.target {
            Side::Left => round.left = replacement,
            Side::Right => round.right = replacement,
        }
        round.sanitize_votes();
        Ok(())
    }

    pub fn reset(&mut self) {
        self.current = None;
        self.highest_idx = None;
    }

    /// Voting opens on MATCHUP_START and closes with the result. Authors of
    /// either image never vote.
    pub fn can_vote(&self, viewer: &str) -> bool {
        self.current.as_ref().is_some_and(|m| {
            m.started && !m.is_resolved() && m.authored_side(viewer).is_none()
        })
    }

    pub fn can_swap(&self, viewer: &str) -> bool {
        self.current.as_ref().is_some_and(|m| {
            !m.started && !m.is_resolved() && m.authored_side(viewer).is_some()
        })
    }

    /// Records the viewer's click and builds the vote message. The vote sets
    /// themselves only change when the server echoes MATCHUP_VOTE.
    pub fn cast_vote(&mut self, viewer: &str, side: Side) -> Option<Outbound> {
        if !self.can_vote(viewer) {
            tracing::trace!(%viewer, phase = ?self.phase(), "vote not allowed");
            return None;
        }
        let round = self.current.as_mut()?;
        round.my_vote = Some(side);
        Some(Outbound::MatchupVote(side))
    }

    /// Builds a swap request for one of the server-offered candidates.
    pub fn request_swap(&self, viewer: &str, content_hash: &str) -> Option<Outbound> {
        if !self.can_swap(viewer) {
            tracing::trace!(%viewer, "swap not allowed");
            return None;
        }
        let round = self.current.as_ref()?;
        if !round
            .swap_candidates
            .iter()
            .any(|c| c.content_hash == content_hash)
        {
            tracing::trace!(%content_hash, "unknown swap candidate");
            return None;
        }
        Some(Outbound::ImageSwap {
            content_hash: content_hash.to_string(),
        })
    }

    /// Fraction of all votes cast for `side`; zero when nobody has voted.
    pub fn vote_share(&self, side: Side) -> f64 {
        let Some(round) = self.current.as_ref() else {
            return 0.0;
        };
        vote_share(round.left_votes.len(), round.right_votes.len(), side)
    }

    /// Points awarded to `username`'s image once the round is resolved.
    pub fn points_for(&self, username: &str) -> Option<i64> {
        let round = self.current.as_ref()?;
        let result = round.result?;
        round.authored_side(username).map(|side| result.points(side))
    }

    fn check_idx(&self, idx: u32) -> Result<(), IgnoreReason> {
        match self.highest_idx {
            Some(highest) if idx == highest => {
                tracing::debug!(idx, "duplicate matchup");
                Err(IgnoreReason::DuplicateMatchup(idx))
            }
            Some(highest) if idx < highest => {
                tracing::debug!(idx, highest, "stale matchup");
                Err(IgnoreReason::StaleMatchup(idx))
            }
            _ => Ok(()),
        }
    }
}

pub fn vote_share(left: usize, right: usize, side: Side) -> f64 {
    let total = left + right;
    if total == 0 {
        return 0.0;
    }
    let count = match side {
        Side::Left => left,
        Side::Right => right,
    };
    count as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::Player;

    fn image(artist: &str, title: &str) -> ArtifactImage {
        ArtifactImage {
            artists: vec![Player {
                username: artist.into(),
                is_host: false,
                bio: String::new(),
                points: 0,
                color_tag: String::new(),
                avatar_ref: String::new(),
                connection_state: Default::default(),
            }],
            rendered_data: format!("data:image/png;base64,{title}"),
            title: title.into(),
            prompt: "a frog".into(),
            points: 0,
            last_changed_at: None,
        }
    }

    fn announce(idx: u32, left_title: &str) -> MatchupAnnounce {
        MatchupAnnounce {
            idx,
            matchup: Matchup {
                left: image("ann", left_title),
                left_votes: BTreeSet::new(),
                right: image("bob", "Toad"),
                right_votes: BTreeSet::new(),
                initial_leader: None,
                started: false,
            },
            ends: None,
            swap_candidates: Some(vec![SwapCandidate {
                image: image("ann", "Older frog"),
                content_hash: "h1".into(),
            }]),
        }
    }

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn duplicate_index_is_ignored() {
        let mut machine = MatchupMachine::new();
        machine.announce(announce(3, "Frog")).unwrap();
        let before = machine.current().cloned();

        assert_eq!(
            machine.announce(announce(3, "Different")),
            Err(IgnoreReason::DuplicateMatchup(3))
        );
        assert_eq!(machine.current().cloned(), before);
        assert_eq!(
            machine.announce(announce(2, "Older")),
            Err(IgnoreReason::StaleMatchup(2))
        );
    }

    #[test]
    fn grace_period_then_voting_then_resolved() {
        let mut machine = MatchupMachine::new();
        assert_eq!(machine.phase(), MatchupPhase::NoMatchup);
        machine.announce(announce(1, "Frog")).unwrap();
        assert_eq!(machine.phase(), MatchupPhase::GracePeriod);
        machine.start().unwrap();
        assert_eq!(machine.phase(), MatchupPhase::Voting);
        assert_eq!(machine.start(), Err(IgnoreReason::AlreadyStarted(1)));
        machine
            .resolve(MatchupResult {
                left_points: 300,
                right_points: 100,
            })
            .unwrap();
        assert_eq!(machine.phase(), MatchupPhase::Resolved);
        assert_eq!(machine.points_for("ann"), Some(300));
        assert_eq!(machine.points_for("carl"), None);
        assert_eq!(
            machine.apply_votes(VoteSets::default()),
            Err(IgnoreReason::RoundResolved(1))
        );
    }

    #[test]
    fn votes_are_replaced_and_kept_disjoint() {
        let mut machine = MatchupMachine::new();
        machine.announce(announce(1, "Frog")).unwrap();
        machine
            .apply_votes(VoteSets {
                left: names(&["carl", "dee", "ann"]),
                right: names(&["dee", "eve"]),
            })
            .unwrap();
        let round = machine.current().unwrap();
        assert_eq!(round.left_votes, names(&["carl"]));
        assert_eq!(round.right_votes, names(&["eve"]));

        machine
            .apply_votes(VoteSets {
                left: BTreeSet::new(),
                right: names(&["carl"]),
            })
            .unwrap();
        let round = machine.current().unwrap();
        assert!(round.left_votes.is_empty());
        assert_eq!(round.right_votes, names(&["carl"]));
    }

    #[test]
    fn author_can_swap_only_during_grace_period() {
        let mut machine = MatchupMachine::new();
        machine.announce(announce(1, "Frog")).unwrap();
        assert!(!machine.can_vote("ann"));
        assert!(machine.can_swap("ann"));
        assert!(!machine.can_swap("carl"));
        assert!(machine.request_swap("ann", "h1").is_some());
        assert!(machine.request_swap("ann", "unknown").is_none());

        machine.start().unwrap();
        assert!(!machine.can_swap("ann"));
        assert!(machine.request_swap("ann", "h1").is_none());
    }

    #[test]
    fn swap_replaces_one_side_without_touching_votes() {
        let mut machine = MatchupMachine::new();
        machine.announce(announce(1, "Frog")).unwrap();
        machine
            .apply_votes(VoteSets {
                left: names(&["carl"]),
                right: names(&["dee"]),
            })
            .unwrap();
        let incoming = announce(1, "Swapped frog").matchup;
        machine
            .swap_image(ImageSwap {
                target: Side::Left,
                matchup: incoming,
            })
            .unwrap();
        let round = machine.current().unwrap();
        assert_eq!(round.left.title, "Swapped frog");
        assert_eq!(round.left_votes, names(&["carl"]));
        assert_eq!(round.idx, 1);
        assert!(!round.started);
    }

    #[test]
    fn cast_vote_remembers_the_click() {
        let mut machine = MatchupMachine::new();
        assert_eq!(machine.cast_vote("carl", Side::Left), None);
        machine.announce(announce(1, "Frog")).unwrap();
        machine.start().unwrap();
        assert_eq!(machine.cast_vote("ann", Side::Right), None);
        assert_eq!(
            machine.cast_vote("carl", Side::Right),
            Some(Outbound::MatchupVote(Side::Right))
        );
        assert_eq!(machine.current().unwrap().my_vote, Some(Side::Right));
    }

    #[test]
    fn voting_waits_for_the_start_and_ends_with_the_result() {
        let mut machine = MatchupMachine::new();
        machine.announce(announce(1, "Frog")).unwrap();
        assert!(!machine.can_vote("carl"));
        assert_eq!(machine.cast_vote("carl", Side::Left), None);
        assert_eq!(machine.current().unwrap().my_vote, None);

        machine.start().unwrap();
        assert!(machine.can_vote("carl"));

        machine
            .resolve(MatchupResult {
                left_points: 100,
                right_points: 100,
            })
            .unwrap();
        assert!(!machine.can_vote("carl"));
        assert_eq!(machine.cast_vote("carl", Side::Left), None);
    }

    #[test]
    fn restore_keeps_started_monotonic() {
        let mut machine = MatchupMachine::new();
        machine.announce(announce(4, "Frog")).unwrap();
        machine.start().unwrap();
        let mut snapshot = announce(4, "Frog").matchup;
        snapshot.started = false;
        snapshot.left_votes = names(&["carl"]);
        machine.restore(4, snapshot).unwrap();
        let round = machine.current().unwrap();
        assert!(round.started);
        assert_eq!(round.left_votes, names(&["carl"]));
    }

    #[test]
    fn vote_share_handles_empty_rounds() {
        assert_eq!(vote_share(0, 0, Side::Left), 0.0);
        assert_eq!(vote_share(0, 0, Side::Right), 0.0);
        assert_eq!(vote_share(3, 1, Side::Left), 0.75);
        assert_eq!(vote_share(3, 1, Side::Right), 0.25);
    }
}
