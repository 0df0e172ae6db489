use leptos::prelude::*;
use tracing::{debug, error, info, warn};

use trainmap_shared::{Board, ClientError};

use crate::poller;
use crate::sync::{SyncEffect, Synchronizer};

/// Who we are and which game we're in. Set on join/create/resume, cleared on end-game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSessionRef {
    pub player_id: String,
    pub game_id: String,
}

/// The board currently on screen and the geography its assets come from.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedMap {
    pub geography: String,
    pub board: Board,
}

/// Reactive game state shared by the poller, the dispatcher and the UI.
#[derive(Clone, Copy)]
pub struct GameContext {
    pub session: RwSignal<Option<GameSessionRef>>,
    pub sync: RwSignal<Synchronizer>,
    pub map: RwSignal<Option<LoadedMap>>,
    pub menu_open: RwSignal<bool>,
    pub notice: RwSignal<Option<String>>,
    pub last_synced: RwSignal<Option<String>>,
}

impl GameContext {
    pub fn new() -> Self {
        Self {
            session: RwSignal::new(None),
            sync: RwSignal::new(Synchronizer::default()),
            map: RwSignal::new(None),
            menu_open: RwSignal::new(true),
            notice: RwSignal::new(None),
            last_synced: RwSignal::new(None),
        }
    }

    pub fn handle_effects(&self, effects: Vec<SyncEffect>) {
        for effect in effects {
            match effect {
                SyncEffect::InitializeMap { geography, board } => {
                    info!(
                        %geography,
                        columns = board.layout().column_count,
                        rows = board.layout().row_count,
                        "initializing map"
                    );
                    self.map.set(Some(LoadedMap { geography, board }));
                    self.sync.update(Synchronizer::mark_map_initialized);
                }
                SyncEffect::SessionEnded => {
                    info!("game ended");
                    self.end_session();
                }
                SyncEffect::CadenceChanged(cadence) => {
                    debug!(?cadence, interval_ms = cadence.interval_ms(), "poll cadence changed");
                }
                SyncEffect::GamesChanged | SyncEffect::RosterChanged | SyncEffect::TurnChanged => {
                    debug!(?effect, "status applied");
                }
            }
        }
    }

    /// Log a failure; network and payload problems also reach the status line.
    pub fn report(&self, err: ClientError) {
        match &err {
            ClientError::InvalidBoardGeometry { .. } => error!(error = %err, "map initialization aborted"),
            _ => warn!(error = %err, "request failed"),
        }
        if err.is_user_visible() || matches!(err, ClientError::InvalidBoardGeometry { .. }) {
            self.notice.set(Some(err.to_string()));
        }
    }

    pub fn mark_synced(&self) {
        self.last_synced
            .set(Some(chrono::Local::now().format("%H:%M:%S").to_string()));
    }

    pub fn end_session(&self) {
        poller::stop();
        self.session.set(None);
        self.sync.update(Synchronizer::reset);
        self.map.set(None);
        self.menu_open.set(true);
    }
}
