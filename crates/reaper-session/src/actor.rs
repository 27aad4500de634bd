//! Session actor: an isolated Tokio task that owns one [`Session`].
//!
//! Each session runs in its own task and talks to the outside world over
//! an mpsc channel. Commands are applied strictly in the order they
//! arrive; the turn clock sits in the same `select!` loop, so a timeout
//! and a move can never interleave inside the state machine.
//!
//! After every accepted command the actor:
//! 1. delivers the operation's targeted events,
//! 2. sends every member a snapshot redacted for them,
//! 3. re-syncs the turn clock with the session's current turn.

use std::collections::HashMap;
use std::sync::Weak;

use reaper_grid::Cell;
use reaper_protocol::{
    ModerationAction, ParticipantId, PowerUpId, ServerEvent, SessionCode,
    SessionSnapshot, SessionStatus, Side,
};
use reaper_turn::{TurnClock, TurnMetrics};
use tokio::sync::{mpsc, oneshot};

use crate::registry::RegistryInner;
use crate::session::{Events, Layout, Session};
use crate::{SessionError, SessionRegistry};

/// Channel sender for delivering events to one participant's connection.
pub type ParticipantSender = mpsc::UnboundedSender<ServerEvent>;

/// A rules operation on behalf of one participant.
#[derive(Debug, Clone)]
pub(crate) enum Action {
    Start,
    StartWith(Layout),
    Move(Cell),
    UsePowerUp(PowerUpId),
    Chat(String),
    Answer(String),
    Moderate(ModerationAction, ParticipantId),
    Leave,
}

/// Commands sent to a session actor through its channel.
pub(crate) enum SessionCommand {
    /// Add a participant and remember where to send their events.
    Join {
        participant_id: ParticipantId,
        name: String,
        sender: ParticipantSender,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },

    /// Apply a rules operation.
    Apply {
        participant_id: ParticipantId,
        action: Action,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },

    /// Redacted snapshot for one member, `None` if not a member.
    Snapshot {
        viewer: ParticipantId,
        reply: oneshot::Sender<Option<SessionSnapshot>>,
    },

    /// Cells one participant could step to.
    ValidMoves {
        participant_id: ParticipantId,
        reply: oneshot::Sender<Result<Vec<Cell>, SessionError>>,
    },

    /// Session metadata.
    Info { reply: oneshot::Sender<SessionInfo> },

    /// Stop the actor.
    Shutdown,
}

/// Metadata about a running session (not the game state itself).
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub code: SessionCode,
    /// Distinguishes this session from earlier ones that used the same
    /// code.
    pub instance: u64,
    pub status: SessionStatus,
    pub participant_count: usize,
    pub max_players: usize,
    pub host: Option<ParticipantId>,
    pub winner: Option<Side>,
    /// Unix milliseconds.
    pub created_at_ms: u64,
    pub turn_metrics: TurnMetrics,
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// Handle to a running session actor.
///
/// Cheap to clone; it is just an `mpsc::Sender` wrapper. Every method
/// maps a closed channel or a dropped reply to
/// [`SessionError::Unavailable`].
#[derive(Clone)]
pub struct SessionHandle {
    code: SessionCode,
    instance: u64,
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn code(&self) -> &SessionCode {
        &self.code
    }

    pub fn instance(&self) -> u64 {
        self.instance
    }

    /// Whether the actor has stopped accepting commands.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn unavailable(&self) -> SessionError {
        SessionError::Unavailable(self.code.clone())
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    async fn apply(
        &self,
        participant_id: ParticipantId,
        action: Action,
    ) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::Apply {
            participant_id,
            action,
            reply,
        })
        .await?
    }

    /// Joins the session. Events for the participant go to `sender`.
    pub async fn join(
        &self,
        participant_id: ParticipantId,
        name: impl Into<String>,
        sender: ParticipantSender,
    ) -> Result<(), SessionError> {
        let name = name.into();
        self.request(|reply| SessionCommand::Join {
            participant_id,
            name,
            sender,
            reply,
        })
        .await?
    }

    pub async fn start(&self, requester: ParticipantId) -> Result<(), SessionError> {
        self.apply(requester, Action::Start).await
    }

    /// Starts with a fixed layout instead of a random deal.
    pub async fn start_with(
        &self,
        requester: ParticipantId,
        layout: Layout,
    ) -> Result<(), SessionError> {
        self.apply(requester, Action::StartWith(layout)).await
    }

    pub async fn move_to(
        &self,
        participant_id: ParticipantId,
        target: Cell,
    ) -> Result<(), SessionError> {
        self.apply(participant_id, Action::Move(target)).await
    }

    pub async fn use_power_up(
        &self,
        participant_id: ParticipantId,
        power_up_id: PowerUpId,
    ) -> Result<(), SessionError> {
        self.apply(participant_id, Action::UsePowerUp(power_up_id))
            .await
    }

    pub async fn chat(
        &self,
        participant_id: ParticipantId,
        text: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.apply(participant_id, Action::Chat(text.into())).await
    }

    pub async fn answer(
        &self,
        participant_id: ParticipantId,
        answer: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.apply(participant_id, Action::Answer(answer.into()))
            .await
    }

    pub async fn moderate(
        &self,
        requester: ParticipantId,
        action: ModerationAction,
        target: ParticipantId,
    ) -> Result<(), SessionError> {
        self.apply(requester, Action::Moderate(action, target)).await
    }

    pub async fn leave(&self, participant_id: ParticipantId) -> Result<(), SessionError> {
        self.apply(participant_id, Action::Leave).await
    }

    /// The session as `viewer` sees it, or `None` if they are not a
    /// member.
    pub async fn snapshot(
        &self,
        viewer: ParticipantId,
    ) -> Result<Option<SessionSnapshot>, SessionError> {
        self.request(|reply| SessionCommand::Snapshot { viewer, reply })
            .await
    }

    /// Whether `participant_id` is currently on the roster.
    pub async fn is_member(&self, participant_id: ParticipantId) -> Result<bool, SessionError> {
        Ok(self.snapshot(participant_id).await?.is_some())
    }

    /// The cells `participant_id` could step to. Publishes nothing.
    pub async fn valid_moves(
        &self,
        participant_id: ParticipantId,
    ) -> Result<Vec<Cell>, SessionError> {
        self.request(|reply| SessionCommand::ValidMoves {
            participant_id,
            reply,
        })
        .await?
    }

    pub async fn info(&self) -> Result<SessionInfo, SessionError> {
        self.request(|reply| SessionCommand::Info { reply }).await
    }

    /// Tells the actor to stop.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.sender
            .send(SessionCommand::Shutdown)
            .await
            .map_err(|_| self.unavailable())
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// Why the actor loop ended.
#[derive(Debug, PartialEq, Eq)]
enum Exit {
    Shutdown,
    Empty,
    Orphaned,
}

struct SessionActor {
    instance: u64,
    session: Session,
    clock: TurnClock,
    senders: HashMap<ParticipantId, ParticipantSender>,
    receiver: mpsc::Receiver<SessionCommand>,
    registry: Weak<RegistryInner>,
}

impl SessionActor {
    async fn run(mut self) {
        let code = self.session.code().clone();
        tracing::info!(session = %code, instance = self.instance, "session actor started");

        let exit = loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else {
                        break Exit::Orphaned;
                    };
                    if let SessionCommand::Shutdown = cmd {
                        break Exit::Shutdown;
                    }
                    let mutated = self.handle(cmd);
                    if mutated && self.session.is_empty() {
                        break Exit::Empty;
                    }
                }
                expiry = self.clock.wait_for_expiry() => {
                    if let Some(events) = self.session.on_turn_timeout(expiry.generation) {
                        self.publish(events);
                    }
                }
            }
            self.clock.follow(self.session.turn());
        };

        self.clock.disarm();
        if exit == Exit::Empty {
            // Refuse anything still queued, then drop the registry entry.
            self.receiver.close();
            if let Some(inner) = self.registry.upgrade() {
                SessionRegistry::from_inner(inner)
                    .evict_if_empty(&code, self.instance)
                    .await;
            }
        }
        tracing::info!(session = %code, instance = self.instance, reason = ?exit, "session actor stopped");
    }

    /// Applies one command. Returns `true` if the roster may have changed.
    fn handle(&mut self, cmd: SessionCommand) -> bool {
        match cmd {
            SessionCommand::Join {
                participant_id,
                name,
                sender,
                reply,
            } => {
                let result = self.session.join(participant_id, &name);
                let ok = result.is_ok();
                if ok {
                    self.senders.insert(participant_id, sender);
                }
                let _ = reply.send(self.settle(participant_id, result));
                true
            }
            SessionCommand::Apply {
                participant_id,
                action,
                reply,
            } => {
                let result = self.apply(participant_id, action);
                let _ = reply.send(self.settle(participant_id, result));
                true
            }
            SessionCommand::Snapshot { viewer, reply } => {
                let snapshot = self
                    .session
                    .participant(viewer)
                    .map(|_| self.session.snapshot_for(viewer));
                let _ = reply.send(snapshot);
                false
            }
            SessionCommand::ValidMoves {
                participant_id,
                reply,
            } => {
                let _ = reply.send(self.session.valid_moves(participant_id));
                false
            }
            SessionCommand::Info { reply } => {
                let _ = reply.send(self.info());
                false
            }
            SessionCommand::Shutdown => false,
        }
    }

    fn apply(&mut self, id: ParticipantId, action: Action) -> Result<Events, SessionError> {
        match action {
            Action::Start => self.session.start(id),
            Action::StartWith(layout) => self.session.start_with(id, layout),
            Action::Move(target) => self.session.apply_move(id, target),
            Action::UsePowerUp(power_up_id) => self.session.use_power_up(id, power_up_id),
            Action::Chat(text) => self.session.chat(id, &text),
            Action::Answer(answer) => self.session.answer(id, &answer),
            Action::Moderate(action, target) => self.session.moderate(id, action, target),
            Action::Leave => self.session.leave(id),
        }
    }

    /// Publishes the events of an accepted operation; logs a rejected one.
    fn settle(
        &mut self,
        id: ParticipantId,
        result: Result<Events, SessionError>,
    ) -> Result<(), SessionError> {
        match result {
            Ok(events) => {
                self.publish(events);
                Ok(())
            }
            Err(e) => {
                tracing::debug!(
                    session = %self.session.code(),
                    participant = %id,
                    error = %e,
                    "operation rejected"
                );
                Err(e)
            }
        }
    }

    /// Delivers targeted events, then a redacted snapshot to every member,
    /// then forgets connections whose participant is gone.
    fn publish(&mut self, events: Events) {
        for (recipient, event) in events {
            for (pid, sender) in &self.senders {
                if recipient.includes(*pid) {
                    let _ = sender.send(event.clone());
                }
            }
        }

        let session = &self.session;
        self.senders
            .retain(|pid, _| session.participant(*pid).is_some());
        for (pid, sender) in &self.senders {
            let snapshot = session.snapshot_for(*pid);
            let _ = sender.send(ServerEvent::Snapshot(snapshot));
        }
    }

    fn info(&self) -> SessionInfo {
        SessionInfo {
            code: self.session.code().clone(),
            instance: self.instance,
            status: self.session.status(),
            participant_count: self.session.roster().len(),
            max_players: self.session.config().max_players,
            host: self.session.host(),
            winner: self.session.winner(),
            created_at_ms: self.session.created_at_ms(),
            turn_metrics: self.clock.metrics().clone(),
        }
    }
}

/// Spawns a session actor task and returns a handle to it.
///
/// `channel_size` bounds the command queue; senders wait when it is full.
pub(crate) fn spawn_session(
    session: Session,
    instance: u64,
    channel_size: usize,
    registry: Weak<RegistryInner>,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(channel_size);
    let code = session.code().clone();

    let actor = SessionActor {
        instance,
        session,
        clock: TurnClock::new(),
        senders: HashMap::new(),
        receiver: rx,
        registry,
    };

    tokio::spawn(actor.run());

    SessionHandle {
        code,
        instance,
        sender: tx,
    }
}
