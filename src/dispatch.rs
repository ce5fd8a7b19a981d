use crate::draw::capture::DrawingCapture;
use crate::draw::model::Point;
use crate::draw::render::DirtyRect;
use crate::matchup::MatchupMachine;
use crate::phase::{PhaseChange, SessionPhase};
use crate::poll::PollBoard;
use crate::protocol::message::{DecodeError, Envelope, Inbound, Outbound, PollChoice, StatePayload};
use crate::protocol::types::{Notification, Side};
use crate::schedule::{Clock, Scheduler, SystemClock, TaskKind};
use crate::settings::ClientSettings;
use crate::storage::{BudgetCheck, StorageBudget};
use crate::view::ViewProjection;
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::sync::mpsc::Sender;

/// Outbound half of the socket. Implementations only move bytes; ordering
/// and reconnects are their concern.
pub trait Transport {
    fn send(&mut self, envelope: &Envelope) -> Result<()>;
}

/// Hands envelopes to whatever drains the channel (a socket writer thread,
/// or a test).
pub struct ChannelTransport {
    tx: Sender<Envelope>,
}

impl ChannelTransport {
    pub fn new(tx: Sender<Envelope>) -> Self {
        Self { tx }
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, envelope: &Envelope) -> Result<()> {
        self.tx
            .send(envelope.clone())
            .map_err(|_| anyhow!("transport channel closed"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyState {
    #[default]
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Something the UI should show once and then forget.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    Notify(Notification),
    /// The drawing deadline is close and nothing was submitted.
    Reminder,
    /// The roster and leaderboard mirrors outgrew local storage and were dropped.
    StorageCleared { bytes: usize, limit: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    UnknownType(String),
    Malformed { kind: String, error: String },
    DuplicateMatchup(u32),
    StaleMatchup(u32),
    NoMatchup,
    RoundResolved(u32),
    AlreadyStarted(u32),
    StatusTerminal,
    PollExpired,
    NoPoll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Applied,
    Ignored(IgnoreReason),
}

impl DispatchOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, DispatchOutcome::Applied)
    }
}

impl From<Result<(), IgnoreReason>> for DispatchOutcome {
    fn from(result: Result<(), IgnoreReason>) -> Self {
        match result {
            Ok(()) => DispatchOutcome::Applied,
            Err(reason) => DispatchOutcome::Ignored(reason),
        }
    }
}

/// Single owner of the client's session state.
///
/// Inbound messages go through [`dispatch`](Self::dispatch), one at a time;
/// user input goes through the methods below, which mutate local state and
/// emit at most one outbound message each via [`send`](Self::send). Neither
/// path calls the other.
pub struct Dispatcher<T: Transport, C: Clock = SystemClock> {
    settings: ClientSettings,
    transport: T,
    clock: C,
    phase: SessionPhase,
    matchup: MatchupMachine,
    drawing: DrawingCapture,
    poll: PollBoard,
    scheduler: Scheduler,
    storage: StorageBudget,
    notices: Vec<Notice>,
    ready_state: ReadyState,
    ping_ms: Option<f64>,
}

impl<T: Transport> Dispatcher<T, SystemClock> {
    pub fn new(settings: ClientSettings, transport: T) -> Self {
        Self::with_clock(settings, transport, SystemClock)
    }
}

impl<T: Transport, C: Clock> Dispatcher<T, C> {
    pub fn with_clock(settings: ClientSettings, transport: T, clock: C) -> Self {
        let drawing = DrawingCapture::new(
            settings.canvas_size,
            settings.brush_style(),
            settings.brush_width_range(),
        );
        let storage = StorageBudget::new(settings.storage_budget_bytes);
        Self {
            settings,
            transport,
            clock,
            phase: SessionPhase::new(),
            matchup: MatchupMachine::new(),
            drawing,
            poll: PollBoard::default(),
            scheduler: Scheduler::new(),
            storage,
            notices: Vec::new(),
            ready_state: ReadyState::default(),
            ping_ms: None,
        }
    }

    /// Parses one raw frame and dispatches it.
    pub fn dispatch_json(&mut self, raw: &str) -> DispatchOutcome {
        match Envelope::from_json(raw) {
            Ok(envelope) => self.dispatch(envelope),
            Err(err) => {
                tracing::warn!(error = %err, "dropping unparseable frame");
                DispatchOutcome::Ignored(IgnoreReason::Malformed {
                    kind: String::new(),
                    error: err.to_string(),
                })
            }
        }
    }

    pub fn dispatch(&mut self, envelope: Envelope) -> DispatchOutcome {
        if let Some(ping) = envelope.ping {
            self.ping_ms = Some(ping);
        }
        let message = match Inbound::decode(&envelope) {
            Ok(message) => message,
            Err(DecodeError::UnknownType(kind)) => {
                tracing::warn!(%kind, "ignoring unknown message type");
                return DispatchOutcome::Ignored(IgnoreReason::UnknownType(kind));
            }
            Err(DecodeError::Malformed { kind, error }) => {
                tracing::warn!(%kind, error = %error, "ignoring malformed message");
                return DispatchOutcome::Ignored(IgnoreReason::Malformed {
                    kind,
                    error: error.to_string(),
                });
            }
        };
        let kind = message.kind();
        let outcome = self.apply(message);
        if let DispatchOutcome::Ignored(reason) = &outcome {
            tracing::debug!(kind, ?reason, "message had no effect");
        }
        outcome
    }

    fn apply(&mut self, message: Inbound) -> DispatchOutcome {
        let now = self.clock.now();
        match message {
            Inbound::State(state) => self.apply_state(*state),
            Inbound::Status(status) => self.phase.apply_status(status).into(),
            Inbound::Connect(payload) => {
                self.phase.connect(payload);
                self.check_storage();
                DispatchOutcome::Applied
            }
            Inbound::Disconnect(players) => {
                self.phase.disconnect(players);
                DispatchOutcome::Applied
            }
            Inbound::HostConnect => {
                self.phase.set_host_connected(true);
                DispatchOutcome::Applied
            }
            Inbound::HostDisconnect => {
                self.phase.set_host_connected(false);
                DispatchOutcome::Applied
            }
            Inbound::Ping => DispatchOutcome::Applied,
            Inbound::Matchup(announce) => self.matchup.announce(*announce).into(),
            Inbound::MatchupStart => self.matchup.start().into(),
            Inbound::MatchupVote(votes) => self.matchup.apply_votes(votes).into(),
            Inbound::MatchupResult(result) => self.matchup.resolve(result).into(),
            Inbound::ImageSwap(swap) => self.matchup.swap_image(*swap).into(),
            Inbound::ImageSubmits(usernames) => {
                self.phase.set_ready(usernames);
                DispatchOutcome::Applied
            }
            Inbound::Path(payload) => {
                self.drawing.apply_remote_path(payload.path);
                DispatchOutcome::Applied
            }
            Inbound::Clear => {
                self.drawing.apply_remote_clear();
                DispatchOutcome::Applied
            }
            Inbound::Notify(notification) => {
                self.notices.push(Notice::Notify(notification));
                DispatchOutcome::Applied
            }
            Inbound::Poll(data) => {
                match self.poll.open(data, now, self.settings.poll_early_close_ms) {
                    Ok(closes_at) => {
                        self.scheduler.schedule(TaskKind::PollClose, closes_at);
                        DispatchOutcome::Applied
                    }
                    Err(reason) => DispatchOutcome::Ignored(reason),
                }
            }
            Inbound::PollVote(data) => self.poll.apply_votes(data).into(),
        }
    }

    fn apply_state(&mut self, state: StatePayload) -> DispatchOutcome {
        let now = self.clock.now();
        if self.phase.apply_state(&state, now) == PhaseChange::Entered {
            self.enter_phase();
        }
        if let Some(paths) = state.event_data.and_then(|data| data.paths_chunk) {
            self.drawing.resync_mirror(paths);
        }
        if let (Some(matchup), Some(idx)) = (state.matchup, state.idx) {
            if let Err(reason) = self.matchup.restore(idx, matchup) {
                tracing::debug!(?reason, "matchup in state snapshot not adopted");
            }
        }
        self.check_storage();
        DispatchOutcome::Applied
    }

    fn enter_phase(&mut self) {
        self.matchup.reset();
        self.scheduler.cancel(TaskKind::SubmitReminder);
        let multi_author = self
            .phase
            .current_event()
            .is_some_and(|event| event.name.is_multi_author());
        self.drawing.reset_for_phase(multi_author);
        if self.settings.is_host {
            return;
        }
        if let Some(at) = self.phase.reminder_at(self.settings.reminder_fraction) {
            self.scheduler.schedule(TaskKind::SubmitReminder, at);
        }
    }

    fn check_storage(&mut self) {
        match self.storage.check(&self.phase.mirror()) {
            Ok(BudgetCheck::Fits { .. }) => {}
            Ok(BudgetCheck::Exceeded { bytes, limit }) => {
                tracing::warn!(bytes, limit, "session mirror exceeds storage budget; clearing");
                self.phase.drop_mirror();
                self.notices.push(Notice::StorageCleared { bytes, limit });
            }
            Err(err) => tracing::error!(error = %err, "failed to measure session mirror"),
        }
    }

    /// Runs local callbacks that have come due. Only ever raises notices or
    /// closes local UI; phase changes wait for the server.
    pub fn tick(&mut self) {
        let now = self.clock.now();
        for task in self.scheduler.due(now) {
            match task {
                TaskKind::SubmitReminder => {
                    if !self.drawing.is_submitted() {
                        self.notices.push(Notice::Reminder);
                    }
                }
                TaskKind::PollClose => self.poll.close(),
            }
        }
    }

    pub fn send(&mut self, message: &Outbound) -> Result<()> {
        let envelope = message
            .to_envelope()
            .with_context(|| format!("encode {} message", message.kind()))?;
        if let Err(err) = self.transport.send(&envelope) {
            tracing::error!(kind = message.kind(), error = %err, "send failed");
            return Err(err.context(format!("send {} message", message.kind())));
        }
        Ok(())
    }

    /// Drawing input is accepted during draw and counter phases until the
    /// artwork has been submitted.
    pub fn can_draw(&self) -> bool {
        !self.settings.is_host
            && !self.drawing.is_submitted()
            && self
                .phase
                .current_event()
                .is_some_and(|event| event.name.is_drawing())
    }

    pub fn begin_stroke(&mut self, position: Point) -> bool {
        if !self.can_draw() {
            tracing::trace!("stroke outside a drawing phase");
            return false;
        }
        self.drawing.begin_stroke(position);
        true
    }

    pub fn extend_stroke(&mut self, position: Point) -> Option<DirtyRect> {
        self.drawing.extend_stroke(position)
    }

    pub fn end_stroke(&mut self) -> Result<bool> {
        let now = self.clock.now();
        match self.drawing.end_stroke(now) {
            Some(message) => self.send(&message).map(|_| true),
            None => Ok(false),
        }
    }

    pub fn undo(&mut self) -> bool {
        if !self.can_draw() {
            tracing::trace!("undo outside a drawing phase");
            return false;
        }
        self.drawing.undo()
    }

    /// Wipes the local canvas and tells the room. In bonus phases this also
    /// wipes teammates' strokes, so it is held to the same gate as drawing.
    pub fn clear(&mut self) -> Result<bool> {
        if !self.can_draw() {
            tracing::trace!("clear outside a drawing phase");
            return Ok(false);
        }
        let message = self.drawing.clear();
        self.send(&message).map(|_| true)
    }

    pub fn submit(&mut self, title: &str) -> Result<()> {
        let message = self.drawing.submit(title, self.settings.title_max_len)?;
        self.scheduler.cancel(TaskKind::SubmitReminder);
        self.send(&message)
    }

    pub fn vote(&mut self, side: Side) -> Result<bool> {
        match self.matchup.cast_vote(&self.settings.username, side) {
            Some(message) => self.send(&message).map(|_| true),
            None => Ok(false),
        }
    }

    pub fn request_swap(&mut self, content_hash: &str) -> Result<bool> {
        match self
            .matchup
            .request_swap(&self.settings.username, content_hash)
        {
            Some(message) => self.send(&message).map(|_| true),
            None => Ok(false),
        }
    }

    pub fn poll_vote(&mut self, choice: PollChoice) -> Result<bool> {
        match self.poll.vote(choice) {
            Some(message) => self.send(&message).map(|_| true),
            None => Ok(false),
        }
    }

    /// Host-only session controls.
    pub fn start_session(&mut self) -> Result<bool> {
        self.host_command(Outbound::Start)
    }

    pub fn stop_session(&mut self) -> Result<bool> {
        self.host_command(Outbound::Stop)
    }

    fn host_command(&mut self, message: Outbound) -> Result<bool> {
        if !self.settings.is_host {
            tracing::trace!(kind = message.kind(), "host command from a player");
            return Ok(false);
        }
        self.send(&message).map(|_| true)
    }

    pub fn set_brush_color(&mut self, hex: &str) -> bool {
        self.drawing.set_brush_color(hex)
    }

    pub fn set_brush_width(&mut self, width: u32) -> u32 {
        self.drawing.set_brush_width(width)
    }

    pub fn set_ready_state(&mut self, state: ReadyState) {
        self.ready_state = state;
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn view(&self) -> ViewProjection {
        crate::view::project(
            &self.settings,
            &self.phase,
            &self.matchup,
            &self.drawing,
            &self.poll,
            self.clock.now(),
        )
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn matchup(&self) -> &MatchupMachine {
        &self.matchup
    }

    pub fn drawing(&self) -> &DrawingCapture {
        &self.drawing
    }

    pub fn poll(&self) -> &PollBoard {
        &self.poll
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    pub fn ping_ms(&self) -> Option<f64> {
        self.ping_ms
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}
