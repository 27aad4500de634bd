//! The session state machine.
//!
//! A [`Session`] is plain data plus rules: no channels, no clocks, no
//! tasks. Every operation validates first and mutates only once nothing
//! can fail any more, so a rejected operation leaves the session exactly
//! as it was. Successful operations return the events that only some
//! members may see (reveals, challenges, chat). The owning actor follows
//! each one with a redacted snapshot per member.
//!
//! ```text
//! waiting ──start──▶ active ──win / removal──▶ finished
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use reaper_grid::{Cell, Grid};
use reaper_protocol::{
    ChallengeKind, ChatEntry, ModerationAction, ParticipantId, ParticipantView, PowerUpId,
    PowerUpKind, PowerUpView, Recipient, RemovalReason, Role, ServerEvent,
    SessionCode, SessionSnapshot, SessionStatus, Side,
};
use reaper_turn::{Turn, next_in_rotation, unix_millis};
use tracing::{debug, info, warn};

use crate::challenge::{Challenge, ChallengeProvider, WordPuzzles};
use crate::{PickupMode, SessionConfig, SessionError};

/// Longest display name, in characters.
pub const MAX_NAME_LEN: usize = 24;

/// Longest chat line, in characters.
pub const MAX_CHAT_LEN: usize = 280;

/// Events produced by an operation, each with its audience.
pub type Events = Vec<(Recipient, ServerEvent)>;

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

/// A held power-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerUp {
    pub id: PowerUpId,
    pub kind: PowerUpKind,
}

/// One member of a session's roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub role: Role,
    /// `None` until the game starts.
    pub position: Option<Cell>,
    /// Once `false`, never `true` again.
    pub alive: bool,
    pub power_ups: Vec<PowerUp>,
    /// An armed shield absorbs the next catch.
    pub shielded: bool,
    /// Extra moves left in the current turn.
    pub extra_moves: u32,
}

impl Participant {
    fn new(id: ParticipantId, name: String) -> Self {
        Self {
            id,
            name,
            role: Role::Survivor,
            position: None,
            alive: true,
            power_ups: Vec::new(),
            shielded: false,
            extra_moves: 0,
        }
    }

    pub fn is_adversary(&self) -> bool {
        self.role == Role::Adversary
    }
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// A power-up lying on the board, waiting to be collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pickup {
    pub cell: Cell,
    pub kind: PowerUpKind,
}

/// Where everything stands when a game starts.
///
/// [`Session::start`] deals one at random; [`Session::start_with`] takes
/// one from the caller (replays, scripted matches).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub adversary: ParticipantId,
    /// One cell per roster entry, in roster order.
    pub start_cells: Vec<Cell>,
    pub pickups: Vec<Pickup>,
}

struct OpenChallenge {
    owner: ParticipantId,
    challenge: Challenge,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Authoritative state of one game.
pub struct Session {
    code: SessionCode,
    config: SessionConfig,
    grid: Grid,
    goal_cells: Vec<Cell>,
    status: SessionStatus,
    roster: Vec<Participant>,
    /// Occupant of each cell. Only living participants appear here.
    board: Vec<Option<ParticipantId>>,
    pickups: Vec<Pickup>,
    /// Cells whose pickup is gone, with the participants who know it.
    taken: HashMap<Cell, HashSet<ParticipantId>>,
    turn: Option<Turn>,
    last_generation: u64,
    created_at_ms: u64,
    host: Option<ParticipantId>,
    banned: HashSet<ParticipantId>,
    muted: HashSet<ParticipantId>,
    chat: VecDeque<ChatEntry>,
    winner: Option<Side>,
    challenges: HashMap<ParticipantId, OpenChallenge>,
    next_power_up_id: PowerUpId,
    rng: StdRng,
    provider: Arc<dyn ChallengeProvider>,
}

impl Session {
    /// Creates an empty session in `waiting` with the built-in word
    /// puzzles.
    pub fn new(code: SessionCode, config: SessionConfig, rng: StdRng) -> Self {
        Self::with_provider(code, config, rng, Arc::new(WordPuzzles))
    }

    /// Creates an empty session that asks `provider` for challenges.
    pub fn with_provider(
        code: SessionCode,
        config: SessionConfig,
        rng: StdRng,
        provider: Arc<dyn ChallengeProvider>,
    ) -> Self {
        let config = config.validated();
        let grid = Grid::new(config.board_size).unwrap_or_default();
        let goal_cells = config.goal_cells_for(&grid);
        Self {
            code,
            grid,
            goal_cells,
            status: SessionStatus::Waiting,
            roster: Vec::new(),
            board: vec![None; grid.cell_count()],
            pickups: Vec::new(),
            taken: HashMap::new(),
            turn: None,
            last_generation: 0,
            created_at_ms: unix_millis(),
            host: None,
            banned: HashSet::new(),
            muted: HashSet::new(),
            chat: VecDeque::new(),
            winner: None,
            challenges: HashMap::new(),
            next_power_up_id: 1,
            rng,
            provider,
            config,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn code(&self) -> &SessionCode {
        &self.code
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn roster(&self) -> &[Participant] {
        &self.roster
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.roster.iter().find(|p| p.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    pub fn turn(&self) -> Option<&Turn> {
        self.turn.as_ref()
    }

    pub fn winner(&self) -> Option<Side> {
        self.winner
    }

    pub fn host(&self) -> Option<ParticipantId> {
        self.host
    }

    pub fn occupant(&self, cell: Cell) -> Option<ParticipantId> {
        self.board.get(cell).copied().flatten()
    }

    pub fn pickups(&self) -> &[Pickup] {
        &self.pickups
    }

    pub fn goal_cells(&self) -> &[Cell] {
        &self.goal_cells
    }

    pub fn is_banned(&self, id: ParticipantId) -> bool {
        self.banned.contains(&id)
    }

    pub fn is_muted(&self, id: ParticipantId) -> bool {
        self.muted.contains(&id)
    }

    pub fn chat_log(&self) -> impl Iterator<Item = &ChatEntry> {
        self.chat.iter()
    }

    /// Unix milliseconds.
    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }

    /// The cell of the challenge `id` currently has open, if any.
    pub fn open_challenge_cell(&self, id: ParticipantId) -> Option<Cell> {
        self.challenges.get(&id).map(|c| c.challenge.cell)
    }

    pub fn adversary(&self) -> Option<&Participant> {
        self.roster.iter().find(|p| p.is_adversary())
    }

    // -----------------------------------------------------------------------
    // Lobby
    // -----------------------------------------------------------------------

    /// Adds a survivor to the roster. The first joiner becomes host.
    ///
    /// # Errors
    /// `AlreadyBanned`, `InvalidState` (not waiting, already on the
    /// roster, or a blank/over-long name), `NameTaken`, `SessionFull`.
    pub fn join(&mut self, id: ParticipantId, name: &str) -> Result<Events, SessionError> {
        if self.banned.contains(&id) {
            return Err(SessionError::AlreadyBanned(id));
        }
        if self.status != SessionStatus::Waiting {
            return Err(SessionError::InvalidState(format!(
                "cannot join a session that is {}",
                self.status
            )));
        }
        if self.participant(id).is_some() {
            return Err(SessionError::InvalidState(format!(
                "{id} is already in session {}",
                self.code
            )));
        }
        let name = name.trim();
        let len = name.chars().count();
        if len == 0 || len > MAX_NAME_LEN {
            return Err(SessionError::InvalidState(format!(
                "name must be 1 to {MAX_NAME_LEN} characters"
            )));
        }
        if self.roster.iter().any(|p| p.name == name) {
            return Err(SessionError::NameTaken(name.to_string()));
        }
        if self.roster.len() >= self.config.max_players {
            return Err(SessionError::SessionFull(self.code.clone()));
        }

        self.roster.push(Participant::new(id, name.to_string()));
        if self.host.is_none() {
            self.host = Some(id);
        }
        info!(
            session = %self.code,
            participant = %id,
            name,
            players = self.roster.len(),
            "participant joined"
        );
        Ok(Vec::new())
    }

    /// Deals a random layout and starts the game.
    ///
    /// # Errors
    /// `NotHost`, `InvalidState` (not waiting), `InsufficientPlayers`.
    pub fn start(&mut self, requester: ParticipantId) -> Result<Events, SessionError> {
        self.check_can_start(requester)?;
        let layout = self.deal();
        self.start_with(requester, layout)
    }

    /// Starts the game with a caller-supplied layout.
    ///
    /// # Errors
    /// Same as [`start`](Self::start), plus `InvalidState` when the layout
    /// does not fit the roster and `OutOfBounds` for cells off the board.
    pub fn start_with(
        &mut self,
        requester: ParticipantId,
        layout: Layout,
    ) -> Result<Events, SessionError> {
        self.check_can_start(requester)?;
        self.check_layout(&layout)?;

        let Layout {
            adversary,
            start_cells,
            pickups,
        } = layout;
        for (participant, cell) in self.roster.iter_mut().zip(start_cells) {
            participant.role = if participant.id == adversary {
                Role::Adversary
            } else {
                Role::Survivor
            };
            participant.position = Some(cell);
            self.board[cell] = Some(participant.id);
        }
        self.pickups = pickups;
        self.status = SessionStatus::Active;
        let first = self.roster[0].id;
        self.begin_turn(first);

        debug_assert_eq!(
            self.roster.iter().filter(|p| p.is_adversary()).count(),
            1,
            "an active session has exactly one adversary"
        );
        info!(
            session = %self.code,
            players = self.roster.len(),
            pickups = self.pickups.len(),
            "game started"
        );
        Ok(Vec::new())
    }

    fn check_can_start(&self, requester: ParticipantId) -> Result<(), SessionError> {
        if self.host != Some(requester) {
            return Err(SessionError::NotHost);
        }
        if self.status != SessionStatus::Waiting {
            return Err(SessionError::InvalidState(format!(
                "cannot start a session that is {}",
                self.status
            )));
        }
        if self.roster.len() < self.config.min_players {
            return Err(SessionError::InsufficientPlayers {
                needed: self.config.min_players,
                have: self.roster.len(),
            });
        }
        Ok(())
    }

    fn check_layout(&self, layout: &Layout) -> Result<(), SessionError> {
        if self.participant(layout.adversary).is_none() {
            return Err(SessionError::UnknownParticipant(layout.adversary));
        }
        if layout.start_cells.len() != self.roster.len() {
            return Err(SessionError::InvalidState(format!(
                "layout has {} start cells for {} participants",
                layout.start_cells.len(),
                self.roster.len()
            )));
        }
        let mut seen = HashSet::new();
        let pickup_cells = layout.pickups.iter().map(|p| p.cell);
        for cell in layout.start_cells.iter().copied().chain(pickup_cells) {
            self.grid.row_col(cell)?;
            if !seen.insert(cell) {
                return Err(SessionError::InvalidState(format!(
                    "cell {cell} is used twice in the layout"
                )));
            }
        }
        Ok(())
    }

    /// Random layout: start cells off the goal set where the board allows,
    /// pickups off both.
    fn deal(&mut self) -> Layout {
        let adversary = self.roster[self.rng.random_range(0..self.roster.len())].id;

        let mut open: Vec<Cell> = self
            .grid
            .cells()
            .filter(|c| !self.goal_cells.contains(c))
            .collect();
        if open.len() < self.roster.len() {
            // Tiny boards: every cell may be a goal.
            open = self.grid.cells().collect();
        }
        open.shuffle(&mut self.rng);
        let start_cells: Vec<Cell> = open.drain(..self.roster.len()).collect();

        let pickup_cells: Vec<Cell> = open
            .into_iter()
            .filter(|c| !self.goal_cells.contains(c))
            .take(self.config.power_up_count)
            .collect();
        let pickups = pickup_cells
            .into_iter()
            .map(|cell| Pickup {
                cell,
                kind: self.random_kind(),
            })
            .collect();

        Layout {
            adversary,
            start_cells,
            pickups,
        }
    }

    // -----------------------------------------------------------------------
    // Turns
    // -----------------------------------------------------------------------

    /// Moves the caller one cell.
    ///
    /// # Errors
    /// `InvalidState` (not active), `UnknownParticipant`, `Eliminated`,
    /// `NotYourTurn`, `OutOfBounds`, `IllegalMove` (not adjacent, or a
    /// survivor stepping onto another survivor).
    pub fn apply_move(&mut self, id: ParticipantId, target: Cell) -> Result<Events, SessionError> {
        let mover_idx = self.check_turn(id)?;
        let mover = &self.roster[mover_idx];
        let from = mover.position.ok_or_else(|| {
            SessionError::InvalidState(format!("{id} has no position"))
        })?;
        if !self.grid.is_valid_move(from, target)? {
            return Err(SessionError::IllegalMove(format!(
                "cell {target} is not adjacent to {from}"
            )));
        }
        let occupant = self.occupant(target).and_then(|o| self.index_of(o));
        if let Some(other) = occupant {
            if !mover.is_adversary() && !self.roster[other].is_adversary() {
                return Err(SessionError::IllegalMove(format!(
                    "cell {target} is occupied"
                )));
            }
        }

        // Validated; from here on nothing fails.
        let mut events = Vec::new();
        self.board[from] = None;
        let mut caught = false;
        match occupant {
            None => self.place(mover_idx, target),
            Some(other) if self.roster[mover_idx].is_adversary() => {
                // Adversary steps onto a survivor.
                self.place(mover_idx, target);
                caught = !self.absorb_catch(other, target);
            }
            Some(_) => {
                // Survivor steps onto the adversary.
                self.roster[mover_idx].position = Some(target);
                self.mark_seen(id, target);
                caught = !self.absorb_catch(mover_idx, target);
            }
        }

        let mover = &self.roster[mover_idx];
        let landed = mover.alive && mover.position == Some(target);
        if self
            .challenges
            .get(&id)
            .is_some_and(|c| Some(c.challenge.cell) != mover.position)
        {
            self.challenges.remove(&id);
        }
        if landed {
            if let Some(pickup) = self.pickup_at(target) {
                self.collect_pickup(mover_idx, pickup, &mut events);
            }
        }

        debug!(session = %self.code, participant = %id, from, to = target, caught, "move applied");

        if let Some(side) = self.evaluate_winner(caught) {
            self.finish(side);
        } else if self.roster[mover_idx].extra_moves > 0 {
            self.roster[mover_idx].extra_moves -= 1;
            self.begin_turn(id);
        } else {
            self.rotate_from(mover_idx);
        }
        self.debug_check_occupancy();
        Ok(events)
    }

    /// The cells `id` could step to, in the order up, down, left, right.
    ///
    /// Needs no turn. Occupancy is not considered: who stands where may be
    /// hidden from the caller, and a survivor may step onto the adversary.
    ///
    /// # Errors
    /// `InvalidState` (not active), `UnknownParticipant`, `Eliminated`.
    pub fn valid_moves(&self, id: ParticipantId) -> Result<Vec<Cell>, SessionError> {
        if self.status != SessionStatus::Active {
            return Err(SessionError::InvalidState(format!(
                "session is {}, not active",
                self.status
            )));
        }
        let participant = self
            .participant(id)
            .ok_or(SessionError::UnknownParticipant(id))?;
        if !participant.alive {
            return Err(SessionError::Eliminated(id));
        }
        let from = participant.position.ok_or_else(|| {
            SessionError::InvalidState(format!("{id} has no position"))
        })?;
        Ok(self.grid.neighbors(from)?)
    }

    /// Spends a held power-up. Does not end the turn.
    ///
    /// # Errors
    /// `InvalidState`, `UnknownParticipant`, `Eliminated`, `NotYourTurn`,
    /// `PowerUpNotHeld`.
    pub fn use_power_up(
        &mut self,
        id: ParticipantId,
        power_up_id: PowerUpId,
    ) -> Result<Events, SessionError> {
        let idx = self.check_turn(id)?;
        let slot = self.roster[idx]
            .power_ups
            .iter()
            .position(|p| p.id == power_up_id)
            .ok_or(SessionError::PowerUpNotHeld(power_up_id))?;

        let power_up = self.roster[idx].power_ups.remove(slot);
        let mut events = Vec::new();
        match power_up.kind {
            PowerUpKind::Shield => self.roster[idx].shielded = true,
            PowerUpKind::Speed => self.roster[idx].extra_moves += 1,
            PowerUpKind::Reveal => {
                let adversary_cell = self.adversary().and_then(|a| a.position);
                events.push((
                    Recipient::Participant(id),
                    ServerEvent::Revealed { adversary_cell },
                ));
            }
        }
        debug!(session = %self.code, participant = %id, kind = ?power_up.kind, "power-up used");
        Ok(events)
    }

    /// Handles an elapsed turn deadline.
    ///
    /// Returns `None` when the generation is stale or the session is not
    /// active; the call is then a no-op.
    pub fn on_turn_timeout(&mut self, generation: u64) -> Option<Events> {
        if self.status != SessionStatus::Active {
            return None;
        }
        let turn = self.turn?;
        if turn.generation != generation {
            debug!(
                session = %self.code,
                generation,
                current = turn.generation,
                "ignoring stale turn timeout"
            );
            return None;
        }

        let idx = self.index_of(turn.holder)?;
        debug!(session = %self.code, participant = %turn.holder, generation, "turn expired");
        self.challenges.remove(&turn.holder);
        self.rotate_from(idx);
        Some(vec![(
            Recipient::Participant(turn.holder),
            ServerEvent::TurnExpired { generation },
        )])
    }

    fn check_turn(&self, id: ParticipantId) -> Result<usize, SessionError> {
        if self.status != SessionStatus::Active {
            return Err(SessionError::InvalidState(format!(
                "session is {}, not active",
                self.status
            )));
        }
        let idx = self
            .index_of(id)
            .ok_or(SessionError::UnknownParticipant(id))?;
        if !self.roster[idx].alive {
            return Err(SessionError::Eliminated(id));
        }
        if self.turn.map(|t| t.holder) != Some(id) {
            return Err(SessionError::NotYourTurn);
        }
        Ok(idx)
    }

    fn begin_turn(&mut self, holder: ParticipantId) {
        self.last_generation += 1;
        self.turn = Some(Turn::begin(
            holder,
            self.last_generation,
            self.config.turn_duration,
        ));
    }

    /// Ends the turn of the participant at `idx` and hands it to the next
    /// living roster member.
    fn rotate_from(&mut self, idx: usize) {
        if let Some(holder) = self.roster.get_mut(idx) {
            holder.extra_moves = 0;
        }
        self.pass_turn_after(idx);
    }

    /// Gives the turn to the first living participant after roster index
    /// `from`, wrapping. Finishes the session if nobody is left.
    fn pass_turn_after(&mut self, from: usize) {
        let roster = &self.roster;
        match next_in_rotation(roster.len(), from, |i| roster[i].alive) {
            Some(next) => {
                let holder = self.roster[next].id;
                self.begin_turn(holder);
            }
            None => {
                let side = self.evaluate_winner(false).unwrap_or(Side::Adversary);
                self.finish(side);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Movement helpers
    // -----------------------------------------------------------------------

    fn place(&mut self, idx: usize, cell: Cell) {
        let id = self.roster[idx].id;
        self.roster[idx].position = Some(cell);
        self.board[cell] = Some(id);
        self.mark_seen(id, cell);
    }

    /// `id` stood on `cell`, so they know whether its pickup is still there.
    fn mark_seen(&mut self, id: ParticipantId, cell: Cell) {
        if let Some(seen) = self.taken.get_mut(&cell) {
            seen.insert(id);
        }
    }

    /// Resolves a catch of the survivor at `idx` on `cell`, where the
    /// adversary now stands. Returns `true` if a shield saved them.
    fn absorb_catch(&mut self, idx: usize, cell: Cell) -> bool {
        if self.roster[idx].shielded {
            let refuge = self
                .grid
                .neighbors(cell)
                .unwrap_or_default()
                .into_iter()
                .find(|&n| self.board[n].is_none());
            if let Some(refuge) = refuge {
                self.roster[idx].shielded = false;
                self.challenges.remove(&self.roster[idx].id);
                self.place(idx, refuge);
                info!(
                    session = %self.code,
                    participant = %self.roster[idx].id,
                    refuge,
                    "shield absorbed a catch"
                );
                return true;
            }
        }

        let victim = &mut self.roster[idx];
        victim.alive = false;
        victim.position = Some(cell);
        victim.shielded = false;
        victim.extra_moves = 0;
        let id = victim.id;
        self.challenges.remove(&id);
        info!(session = %self.code, participant = %id, cell, "survivor caught");
        false
    }

    fn collect_pickup(&mut self, idx: usize, pickup: Pickup, events: &mut Events) {
        let id = self.roster[idx].id;
        let cell = pickup.cell;
        match self.config.pickup_mode {
            PickupMode::Instant => {
                self.grant_power_up(idx, pickup);
                debug!(session = %self.code, participant = %id, kind = ?pickup.kind, "power-up collected");
            }
            PickupMode::Challenge => {
                let challenge = match self.provider.generate(cell, &mut self.rng) {
                    Ok(challenge) => challenge,
                    Err(e) => {
                        warn!(session = %self.code, error = %e, "challenge provider failed, using fallback");
                        Challenge::fallback(cell)
                    }
                };
                events.push((
                    Recipient::Participant(id),
                    ServerEvent::Challenge(challenge.prompt()),
                ));
                self.challenges.insert(id, OpenChallenge { owner: id, challenge });
            }
        }
    }

    /// Moves `pickup` off the board into the inventory of `idx`.
    fn grant_power_up(&mut self, idx: usize, pickup: Pickup) {
        let id = self.next_power_up_id;
        self.next_power_up_id += 1;
        self.roster[idx].power_ups.push(PowerUp {
            id,
            kind: pickup.kind,
        });
        self.pickups.retain(|p| p.cell != pickup.cell);
        self.taken
            .entry(pickup.cell)
            .or_default()
            .insert(self.roster[idx].id);
    }

    fn pickup_at(&self, cell: Cell) -> Option<Pickup> {
        self.pickups.iter().find(|p| p.cell == cell).copied()
    }

    fn random_kind(&mut self) -> PowerUpKind {
        PowerUpKind::ALL[self.rng.random_range(0..PowerUpKind::ALL.len())]
    }

    // -----------------------------------------------------------------------
    // Challenges
    // -----------------------------------------------------------------------

    /// Answers the caller's open challenge. Needs no turn and does not end
    /// one. A challenge stays open while its owner stands on the pickup and
    /// expires when they move away or let a turn run out.
    ///
    /// # Errors
    /// `UnknownParticipant`, `InvalidState` (not active), `NoChallenge`.
    pub fn answer(&mut self, id: ParticipantId, answer: &str) -> Result<Events, SessionError> {
        let idx = self
            .index_of(id)
            .ok_or(SessionError::UnknownParticipant(id))?;
        if self.status != SessionStatus::Active {
            return Err(SessionError::InvalidState(format!(
                "session is {}, not active",
                self.status
            )));
        }
        let open = self.challenges.remove(&id).ok_or(SessionError::NoChallenge)?;
        debug_assert_eq!(open.owner, id);

        let challenge = open.challenge;
        let solved = if challenge.kind == ChallengeKind::Fallback {
            challenge.accepts(answer)
        } else {
            match self.provider.validate(&challenge, answer) {
                Ok(solved) => solved,
                Err(e) => {
                    warn!(session = %self.code, error = %e, "challenge validation failed, accepting answer");
                    true
                }
            }
        };

        let granted = match self.pickup_at(challenge.cell) {
            Some(pickup) if solved => {
                self.grant_power_up(idx, pickup);
                Some(pickup.kind)
            }
            _ => None,
        };
        debug!(session = %self.code, participant = %id, solved, "challenge answered");
        Ok(vec![(
            Recipient::Participant(id),
            ServerEvent::ChallengeResult { solved, granted },
        )])
    }

    // -----------------------------------------------------------------------
    // Chat
    // -----------------------------------------------------------------------

    /// Appends a chat line and broadcasts it. Allowed in every status and
    /// for eliminated participants.
    ///
    /// # Errors
    /// `UnknownParticipant`, `Muted`, `InvalidState` (blank or over-long).
    pub fn chat(&mut self, id: ParticipantId, text: &str) -> Result<Events, SessionError> {
        let sender = self
            .participant(id)
            .ok_or(SessionError::UnknownParticipant(id))?;
        if self.muted.contains(&id) {
            return Err(SessionError::Muted);
        }
        let text = text.trim();
        let len = text.chars().count();
        if len == 0 || len > MAX_CHAT_LEN {
            return Err(SessionError::InvalidState(format!(
                "chat messages must be 1 to {MAX_CHAT_LEN} characters"
            )));
        }

        let entry = ChatEntry {
            sender: id,
            name: sender.name.clone(),
            text: text.to_string(),
            timestamp_ms: unix_millis(),
        };
        self.chat.push_back(entry.clone());
        while self.chat.len() > self.config.chat_history {
            self.chat.pop_front();
        }
        Ok(vec![(Recipient::All, ServerEvent::Chat(entry))])
    }

    // -----------------------------------------------------------------------
    // Moderation and departures
    // -----------------------------------------------------------------------

    /// Host moderation.
    ///
    /// # Errors
    /// `NotHost`, `InvalidState` (targeting yourself),
    /// `UnknownParticipant` (kick or mute of a non-member).
    pub fn moderate(
        &mut self,
        requester: ParticipantId,
        action: ModerationAction,
        target: ParticipantId,
    ) -> Result<Events, SessionError> {
        if self.host != Some(requester) {
            return Err(SessionError::NotHost);
        }
        if target == requester {
            return Err(SessionError::InvalidState(format!(
                "the host cannot {action} themselves"
            )));
        }
        let present = self.index_of(target).is_some();
        if matches!(action, ModerationAction::Kick | ModerationAction::Mute) && !present {
            return Err(SessionError::UnknownParticipant(target));
        }

        let mut events = Vec::new();
        match action {
            ModerationAction::Kick => {
                events.push(removed(target, RemovalReason::Kicked));
                self.remove_participant(target);
            }
            ModerationAction::Ban => {
                self.banned.insert(target);
                if present {
                    events.push(removed(target, RemovalReason::Banned));
                    self.remove_participant(target);
                }
            }
            ModerationAction::Mute => {
                self.muted.insert(target);
            }
            ModerationAction::Unban => {
                self.banned.remove(&target);
            }
            ModerationAction::Unmute => {
                self.muted.remove(&target);
            }
        }
        info!(session = %self.code, host = %requester, target = %target, %action, "moderation applied");
        Ok(events)
    }

    /// Removes the caller from the session.
    ///
    /// # Errors
    /// `UnknownParticipant`.
    pub fn leave(&mut self, id: ParticipantId) -> Result<Events, SessionError> {
        if self.index_of(id).is_none() {
            return Err(SessionError::UnknownParticipant(id));
        }
        self.remove_participant(id);
        Ok(Vec::new())
    }

    fn remove_participant(&mut self, id: ParticipantId) {
        let Some(idx) = self.index_of(id) else {
            return;
        };
        let gone = self.roster.remove(idx);
        if let Some(cell) = gone.position {
            if self.board[cell] == Some(id) {
                self.board[cell] = None;
            }
        }
        self.challenges.remove(&id);
        self.muted.remove(&id);

        if self.host == Some(id) {
            self.host = self
                .roster
                .get(idx)
                .or_else(|| self.roster.first())
                .map(|p| p.id);
        }
        info!(
            session = %self.code,
            participant = %id,
            players = self.roster.len(),
            "participant left"
        );

        if self.status != SessionStatus::Active {
            return;
        }
        if let Some(side) = self.evaluate_winner(false) {
            self.finish(side);
        } else if self.turn.is_some_and(|t| t.holder == id) && !self.roster.is_empty() {
            let len = self.roster.len();
            self.pass_turn_after((idx + len - 1) % len);
        }
        self.debug_check_occupancy();
    }

    // -----------------------------------------------------------------------
    // Outcome
    // -----------------------------------------------------------------------

    /// Decides whether the game is over.
    ///
    /// In order: a catch, or a living survivor on the adversary's cell,
    /// wins for the adversary; a missing adversary wins for the survivors;
    /// no living survivors wins for the adversary; every living survivor
    /// on a goal cell wins for the survivors.
    fn evaluate_winner(&self, caught: bool) -> Option<Side> {
        if caught {
            return Some(Side::Adversary);
        }
        let Some(adversary) = self.adversary() else {
            return Some(Side::Survivors);
        };
        let mut survivors = self
            .roster
            .iter()
            .filter(|p| p.alive && !p.is_adversary())
            .peekable();
        if survivors.peek().is_none() {
            return Some(Side::Adversary);
        }
        let mut all_home = true;
        for survivor in survivors {
            if survivor.position.is_some() && survivor.position == adversary.position {
                return Some(Side::Adversary);
            }
            all_home &= survivor
                .position
                .is_some_and(|c| self.goal_cells.contains(&c));
        }
        all_home.then_some(Side::Survivors)
    }

    fn finish(&mut self, side: Side) {
        debug_assert!(self.status.can_transition_to(SessionStatus::Finished));
        self.status = SessionStatus::Finished;
        self.winner = Some(side);
        self.turn = None;
        self.challenges.clear();
        info!(session = %self.code, winner = %side, "game finished");
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// The session as `viewer` may see it.
    ///
    /// Until the game is finished a survivor sees only their own role,
    /// position and power-up count; the adversary sees everything.
    /// Inventories are only listed for the viewer themselves.
    ///
    /// A pickup someone else took stays on a survivor's map until that
    /// survivor stands on its cell, so a vanished pickup never gives away
    /// where another participant is.
    pub fn snapshot_for(&self, viewer: ParticipantId) -> SessionSnapshot {
        let viewer_entry = self.participant(viewer);
        let sees_all = self.status == SessionStatus::Finished
            || viewer_entry.is_some_and(|p| p.is_adversary());
        let visible = |p: &Participant| sees_all || p.id == viewer;

        let roster = self
            .roster
            .iter()
            .map(|p| {
                let shown = visible(p);
                ParticipantView {
                    id: p.id,
                    name: p.name.clone(),
                    role: shown.then_some(p.role),
                    position: if shown { p.position } else { None },
                    alive: p.alive,
                    muted: self.muted.contains(&p.id),
                    power_ups: if p.id == viewer {
                        p.power_ups
                            .iter()
                            .map(|pu| PowerUpView { id: pu.id, kind: pu.kind })
                            .collect()
                    } else {
                        Vec::new()
                    },
                    power_up_count: shown.then_some(p.power_ups.len()),
                }
            })
            .collect();

        let board = self
            .board
            .iter()
            .map(|&slot| {
                slot.filter(|id| self.participant(*id).is_some_and(|p| visible(p)))
            })
            .collect();

        SessionSnapshot {
            session_code: self.code.clone(),
            status: self.status,
            roster,
            board,
            current_turn: self.turn.map(|t| t.view()),
            winner: self.winner,
            host: self.host,
            board_size: self.grid.size(),
            goal_cells: self.goal_cells.clone(),
            power_up_cells: self.power_up_cells_for(viewer, sees_all),
            viewer,
        }
    }

    fn power_up_cells_for(&self, viewer: ParticipantId, sees_all: bool) -> Vec<Cell> {
        let mut cells: Vec<Cell> = self.pickups.iter().map(|p| p.cell).collect();
        if !sees_all {
            cells.extend(
                self.taken
                    .iter()
                    .filter(|(_, seen)| !seen.contains(&viewer))
                    .map(|(&cell, _)| cell),
            );
        }
        cells.sort_unstable();
        cells
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn index_of(&self, id: ParticipantId) -> Option<usize> {
        self.roster.iter().position(|p| p.id == id)
    }

    fn debug_check_occupancy(&self) {
        if cfg!(debug_assertions) {
            for p in self.roster.iter().filter(|p| p.alive) {
                if let Some(cell) = p.position {
                    debug_assert_eq!(
                        self.board[cell],
                        Some(p.id),
                        "occupancy drifted for {}",
                        p.id
                    );
                }
            }
            let adversaries = self.roster.iter().filter(|p| p.is_adversary()).count();
            debug_assert!(adversaries <= 1, "more than one adversary");
        }
    }
}

fn removed(target: ParticipantId, reason: RemovalReason) -> (Recipient, ServerEvent) {
    (Recipient::Participant(target), ServerEvent::Removed { reason })
}
