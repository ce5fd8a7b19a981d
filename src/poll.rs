use crate::dispatch::IgnoreReason;
use crate::matchup::enforce_disjoint;
use crate::protocol::message::{Outbound, PollChoice};
use crate::protocol::types::PollData;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub struct ActivePoll {
    pub prompt: String,
    pub ends: DateTime<Utc>,
    /// Local close time, a little ahead of `ends` so late clicks are not sent.
    pub closes_at: DateTime<Utc>,
    pub yes: BTreeSet<String>,
    pub no: BTreeSet<String>,
    pub my_vote: Option<PollChoice>,
    pub closed: bool,
}

impl ActivePoll {
    pub fn share(&self, choice: PollChoice) -> f64 {
        let total = self.yes.len() + self.no.len();
        if total == 0 {
            return 0.0;
        }
        let count = match choice {
            PollChoice::Yes => self.yes.len(),
            PollChoice::No => self.no.len(),
        };
        count as f64 / total as f64
    }
}

#[derive(Debug, Clone, Default)]
pub struct PollBoard {
    current: Option<ActivePoll>,
}

impl PollBoard {
    /// Opens a poll and returns the local close time. Polls whose close time
    /// has already passed are not shown at all.
    pub fn open(
        &mut self,
        data: PollData,
        now: DateTime<Utc>,
        early_close_ms: u64,
    ) -> Result<DateTime<Utc>, IgnoreReason> {
        let closes_at = data.ends - Duration::milliseconds(early_close_ms as i64);
        if closes_at <= now {
            tracing::debug!(prompt = %data.prompt, "poll already expired");
            return Err(IgnoreReason::PollExpired);
        }
        let mut yes = data.yes;
        let mut no = data.no;
        sanitize(&mut yes, &mut no);
        self.current = Some(ActivePoll {
            prompt: data.prompt,
            ends: data.ends,
            closes_at,
            yes,
            no,
            my_vote: None,
            closed: false,
        });
        Ok(closes_at)
    }

    /// Replaces both voter sets with the server's copy.
    pub fn apply_votes(&mut self, data: PollData) -> Result<(), IgnoreReason> {
        let poll = self.current.as_mut().ok_or(IgnoreReason::NoPoll)?;
        poll.yes = data.yes;
        poll.no = data.no;
        sanitize(&mut poll.yes, &mut poll.no);
        Ok(())
    }

    pub fn close(&mut self) {
        if let Some(poll) = self.current.as_mut() {
            poll.closed = true;
        }
    }

    pub fn vote(&mut self, choice: PollChoice) -> Option<Outbound> {
        let poll = self.current.as_mut()?;
        if poll.closed {
            tracing::trace!("vote on closed poll");
            return None;
        }
        poll.my_vote = Some(choice);
        Some(Outbound::PollVote(choice))
    }

    pub fn current(&self) -> Option<&ActivePoll> {
        self.current.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.current.as_ref().is_some_and(|p| !p.closed)
    }
}

fn sanitize(yes: &mut BTreeSet<String>, no: &mut BTreeSet<String>) {
    let dropped = enforce_disjoint(yes, no);
    if !dropped.is_empty() {
        tracing::warn!(?dropped, "poll voters in both sets");
    }
}
