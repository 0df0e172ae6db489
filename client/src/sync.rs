use tracing::{debug, info, warn};

use trainmap_shared::{
    Board, ClientError, EventKind, GameSummary, Phase, RosterEntry, StatusPayload,
};

use crate::config::{
    AWAITING_GEOGRAPHY_POLL_MS, NORMAL_POLL_MS, POLL_BACKOFF_CAP_MS, POLL_BACKOFF_MAX_EXPONENT,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollCadence {
    Normal,
    /// Fast polling until the session's geography and board are known.
    AwaitingGeography,
}

impl PollCadence {
    pub const fn interval_ms(self) -> u32 {
        match self {
            Self::Normal => NORMAL_POLL_MS,
            Self::AwaitingGeography => AWAITING_GEOGRAPHY_POLL_MS,
        }
    }
}

/// Issued when a poll is sent; results carrying an older ticket than the
/// last applied one are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PollTicket {
    seq: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEffect {
    GamesChanged,
    RosterChanged,
    TurnChanged,
    InitializeMap { geography: String, board: Board },
    CadenceChanged(PollCadence),
    SessionEnded,
}

/// Client-side mirror of the server's game state, driven by status payloads.
#[derive(Debug, Clone, PartialEq)]
pub struct Synchronizer {
    phase: Option<Phase>,
    cadence: PollCadence,
    next_seq: u64,
    last_applied_seq: u64,
    games: Vec<GameSummary>,
    roster: Vec<RosterEntry>,
    active_pid: Option<String>,
    last_pid: Option<String>,
    geography: Option<String>,
    board: Option<Board>,
    map_requested: bool,
    map_initialized: bool,
    consecutive_failures: u32,
    last_error: Option<ClientError>,
}

impl Default for Synchronizer {
    fn default() -> Self {
        Self {
            phase: None,
            cadence: PollCadence::Normal,
            next_seq: 0,
            last_applied_seq: 0,
            games: Vec::new(),
            roster: Vec::new(),
            active_pid: None,
            last_pid: None,
            geography: None,
            board: None,
            map_requested: false,
            map_initialized: false,
            consecutive_failures: 0,
            last_error: None,
        }
    }
}

/// Everything a payload contributes, validated before any of it lands.
struct Validated {
    phase: Phase,
    games: Option<Vec<GameSummary>>,
    players: Option<Vec<RosterEntry>>,
    activeid: Option<String>,
    lastid: Option<String>,
    geography: Option<String>,
    board: Option<Board>,
    start_event: bool,
}

fn validate(status: StatusPayload) -> Result<Validated, ClientError> {
    match status.phase {
        Phase::Pregame if status.games.is_none() => {
            return Err(ClientError::malformed("pregame status without games"));
        }
        Phase::Lobby if status.players.is_none() => {
            return Err(ClientError::malformed("lobby status without players"));
        }
        _ => {}
    }

    let mut geography = status.geography;
    let mut map_data = status.map_data;
    let mut start_event = false;
    for event in status.events {
        match event.known_kind() {
            Some(EventKind::StartGame) => {
                start_event = true;
                geography = geography.or(event.geography);
                map_data = map_data.or(event.map_data);
            }
            None => debug!(kind = %event.kind, "ignoring unknown event"),
        }
    }
    let board = map_data.map(Board::from_wire).transpose()?;

    Ok(Validated {
        phase: status.phase,
        games: status.games,
        players: status.players,
        activeid: status.activeid,
        lastid: status.lastid,
        geography,
        board,
        start_event,
    })
}

impl Synchronizer {
    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    pub fn cadence(&self) -> PollCadence {
        self.cadence
    }

    pub fn games(&self) -> &[GameSummary] {
        &self.games
    }

    pub fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }

    pub fn active_pid(&self) -> Option<&str> {
        self.active_pid.as_deref()
    }

    pub fn last_pid(&self) -> Option<&str> {
        self.last_pid.as_deref()
    }

    pub fn board(&self) -> Option<&Board> {
        self.board.as_ref()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_error(&self) -> Option<&ClientError> {
        self.last_error.as_ref()
    }

    /// A session was joined, created or resumed. Tickets issued before this
    /// point can no longer apply.
    pub fn on_session_started(&mut self, geography_known: bool) -> PollCadence {
        self.last_applied_seq = self.next_seq;
        self.cadence = if geography_known {
            PollCadence::Normal
        } else {
            PollCadence::AwaitingGeography
        };
        self.consecutive_failures = 0;
        self.last_error = None;
        info!(cadence = ?self.cadence, "session started");
        self.cadence
    }

    pub fn begin_poll(&mut self) -> PollTicket {
        self.next_seq += 1;
        PollTicket { seq: self.next_seq }
    }

    /// Apply one status payload. Nothing is changed unless the whole payload
    /// is valid for its phase.
    pub fn apply(
        &mut self,
        ticket: PollTicket,
        status: StatusPayload,
    ) -> Result<Vec<SyncEffect>, ClientError> {
        if ticket.seq <= self.last_applied_seq {
            debug!(seq = ticket.seq, last = self.last_applied_seq, "dropping stale status");
            return Ok(Vec::new());
        }
        let update = validate(status)?;

        self.last_applied_seq = ticket.seq;
        self.consecutive_failures = 0;
        self.last_error = None;
        self.phase = Some(update.phase);

        let mut effects = Vec::new();
        match update.phase {
            Phase::Pregame => {
                self.replace_games(update.games.unwrap_or_default(), &mut effects);
                self.replace_roster(Vec::new(), &mut effects);
            }
            Phase::Lobby => {
                self.replace_games(Vec::new(), &mut effects);
                self.replace_roster(update.players.unwrap_or_default(), &mut effects);
            }
            Phase::Active => {
                self.replace_games(Vec::new(), &mut effects);
                if let Some(players) = update.players {
                    self.replace_roster(players, &mut effects);
                }
                if self.active_pid != update.activeid || self.last_pid != update.lastid {
                    self.active_pid = update.activeid;
                    self.last_pid = update.lastid;
                    effects.push(SyncEffect::TurnChanged);
                }
            }
            Phase::Ended => {
                self.replace_games(Vec::new(), &mut effects);
                self.replace_roster(Vec::new(), &mut effects);
            }
        }

        if let Some(geography) = update.geography {
            self.geography = Some(geography);
        }
        if let Some(board) = update.board {
            self.board = Some(board);
        }
        if update.start_event {
            info!("game started");
        }
        self.push_map_init(&mut effects);

        if self.cadence == PollCadence::AwaitingGeography && self.map_ready() {
            self.cadence = PollCadence::Normal;
            effects.push(SyncEffect::CadenceChanged(PollCadence::Normal));
        }
        if update.phase == Phase::Ended {
            effects.push(SyncEffect::SessionEnded);
        }
        Ok(effects)
    }

    fn replace_games(&mut self, games: Vec<GameSummary>, effects: &mut Vec<SyncEffect>) {
        if self.games != games {
            self.games = games;
            effects.push(SyncEffect::GamesChanged);
        }
    }

    fn replace_roster(&mut self, roster: Vec<RosterEntry>, effects: &mut Vec<SyncEffect>) {
        if self.roster != roster {
            self.roster = roster;
            effects.push(SyncEffect::RosterChanged);
        }
    }

    fn map_ready(&self) -> bool {
        self.geography.is_some() && self.board.is_some()
    }

    fn push_map_init(&mut self, effects: &mut Vec<SyncEffect>) {
        if self.map_initialized || self.map_requested {
            return;
        }
        let (Some(geography), Some(board)) = (&self.geography, &self.board) else {
            return;
        };
        self.map_requested = true;
        effects.push(SyncEffect::InitializeMap {
            geography: geography.clone(),
            board: board.clone(),
        });
    }

    /// Board delivered outside polling, e.g. by a `newGame` response.
    pub fn note_board(&mut self, geography: String, board: Board) -> Vec<SyncEffect> {
        self.geography = Some(geography);
        self.board = Some(board);
        let mut effects = Vec::new();
        self.push_map_init(&mut effects);
        effects
    }

    pub fn mark_map_initialized(&mut self) {
        self.map_initialized = true;
    }

    /// Record a poll that produced no usable status. A rejected board is kept
    /// as the last error but does not slow polling down.
    pub fn record_failure(&mut self, error: ClientError) {
        if matches!(error, ClientError::InvalidBoardGeometry { .. }) {
            warn!(error = %error, "status carried an unusable board");
        } else {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            warn!(failures = self.consecutive_failures, error = %error, "status poll failed");
        }
        self.last_error = Some(error);
    }

    /// Delay before the next poll, backing off while polls keep failing.
    pub fn next_delay_ms(&self) -> u32 {
        let base = self.cadence.interval_ms();
        if self.consecutive_failures == 0 {
            return base;
        }
        let exponent = self.consecutive_failures.min(POLL_BACKOFF_MAX_EXPONENT);
        base.saturating_mul(1 << exponent).min(POLL_BACKOFF_CAP_MS)
    }

    /// Forget the session. Tickets already issued stay stale.
    pub fn reset(&mut self) {
        let next_seq = self.next_seq;
        *self = Self {
            next_seq,
            last_applied_seq: next_seq,
            ..Self::default()
        };
    }
}
