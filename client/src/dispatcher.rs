use leptos::prelude::*;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use wasm_bindgen_futures::spawn_local;

use trainmap_shared::{
    Board, ClientError, ListResponse, ListType, Method, MilepostId, NewGameResponse, Request,
    StatusPayload, UpgradeKind,
};

use crate::config;
use crate::poller;
use crate::session::{GameContext, GameSessionRef};
use crate::sync::Synchronizer;

fn network(e: impl std::fmt::Display) -> ClientError {
    ClientError::Network(format!("fetch error: {e}"))
}

/// Send one request and return the response body.
///
/// GET carries the JSON payload as the query string, POST as the body.
pub async fn send(request: &Request) -> Result<String, ClientError> {
    let payload = request.to_json()?;
    let base = config::server_url();
    debug!(message_type = request.message_type(), "sending request");

    let response = match request.method() {
        Method::Get => {
            let query = String::from(js_sys::encode_uri_component(&payload));
            gloo_net::http::Request::get(&format!("{base}?{query}"))
                .send()
                .await
        }
        // text/plain keeps this a simple CORS request, no preflight.
        Method::Post => {
            gloo_net::http::Request::post(base)
                .header("Content-Type", "text/plain;charset=UTF-8")
                .body(payload)
                .map_err(network)?
                .send()
                .await
        }
    }
    .map_err(network)?;

    if !response.ok() {
        return Err(ClientError::Network(format!(
            "HTTP {} for {}",
            response.status(),
            request.message_type()
        )));
    }
    response.text().await.map_err(network)
}

async fn send_json<T: DeserializeOwned>(request: &Request) -> Result<T, ClientError> {
    let body = send(request).await?;
    Ok(serde_json::from_str(&body)?)
}

pub async fn fetch_status(session: &GameSessionRef) -> Result<StatusPayload, ClientError> {
    let request = Request::StatusUpdate {
        pid: Some(session.player_id.clone()),
        gid: Some(session.game_id.clone()),
    };
    let body = send(&request).await?;
    StatusPayload::parse(&body)
}

pub async fn list_games(list_type: ListType) -> Result<Vec<String>, ClientError> {
    let response: ListResponse = send_json(&Request::List { list_type }).await?;
    Ok(response.gids)
}

fn begin_session(ctx: GameContext, session: GameSessionRef, geography_known: bool) {
    info!(pid = %session.player_id, gid = %session.game_id, "joined game");
    ctx.session.set(Some(session));
    ctx.sync.update(|s| {
        s.on_session_started(geography_known);
    });
    ctx.notice.set(None);
    ctx.menu_open.set(false);
    poller::start(ctx);
}

/// Feed a command response through the synchronizer when it carries a status.
fn absorb_response(ctx: GameContext, body: &str) {
    let carries_status = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .is_some_and(|v| v.get("phase").is_some());
    if !carries_status {
        return;
    }
    let applied = StatusPayload::parse(body).and_then(|status| {
        ctx.sync
            .try_update(|s| {
                let ticket = s.begin_poll();
                s.apply(ticket, status)
            })
            .unwrap_or_else(|| Ok(Vec::new()))
    });
    match applied {
        Ok(effects) => ctx.handle_effects(effects),
        Err(e) => ctx.report(e),
    }
}

fn require_session(ctx: GameContext) -> Option<GameSessionRef> {
    let session = ctx.session.get_untracked();
    if session.is_none() {
        warn!("command ignored: no active game");
    }
    session
}

pub fn create_game(ctx: GameContext, color: String, handle: String, geography: String) {
    let request = Request::NewGame {
        color,
        pid: handle.clone(),
        game_type: geography.clone(),
    };
    spawn_local(async move {
        let response: NewGameResponse = match send_json(&request).await {
            Ok(response) => response,
            Err(e) => return ctx.report(e),
        };
        info!(gid = %response.gid, "new game");
        ctx.session.set(None);
        ctx.sync.update(Synchronizer::reset);
        match response.map_data.map(Board::from_wire).transpose() {
            Ok(Some(board)) => {
                if let Some(effects) = ctx.sync.try_update(|s| s.note_board(geography, board)) {
                    ctx.handle_effects(effects);
                }
            }
            Ok(None) => {}
            Err(e) => ctx.report(e),
        }
        begin_session(
            ctx,
            GameSessionRef {
                player_id: handle,
                game_id: response.gid,
            },
            true,
        );
    });
}

pub fn join_game(ctx: GameContext, gid: String, color: String, handle: String) {
    let request = Request::JoinGame {
        gid: gid.clone(),
        color,
        pid: handle.clone(),
    };
    enter_existing(ctx, request, gid, handle);
}

pub fn resume_game(ctx: GameContext, gid: String, handle: String) {
    let request = Request::ResumeGame {
        gid: gid.clone(),
        pid: handle.clone(),
    };
    enter_existing(ctx, request, gid, handle);
}

fn enter_existing(ctx: GameContext, request: Request, gid: String, handle: String) {
    spawn_local(async move {
        match send(&request).await {
            Ok(body) => {
                ctx.sync.update(Synchronizer::reset);
                ctx.map.set(None);
                begin_session(
                    ctx,
                    GameSessionRef {
                        player_id: handle,
                        game_id: gid,
                    },
                    false,
                );
                absorb_response(ctx, &body);
            }
            Err(e) => ctx.report(e),
        }
    });
}

fn command(ctx: GameContext, build: impl FnOnce(String, String) -> Request) {
    let Some(session) = require_session(ctx) else {
        return;
    };
    let request = build(session.player_id, session.game_id);
    spawn_local(async move {
        match send(&request).await {
            Ok(body) => absorb_response(ctx, &body),
            Err(e) => ctx.report(e),
        }
    });
}

pub fn start_game(ctx: GameContext) {
    command(ctx, |pid, gid| Request::StartGame { gid, pid });
}

pub fn build_track(ctx: GameContext, path: Vec<MilepostId>) {
    if path.is_empty() {
        return;
    }
    command(ctx, move |pid, gid| Request::TrackBuilt {
        pid,
        gid,
        edges_built: path,
    });
}

pub fn start_train(ctx: GameContext, position: MilepostId) {
    command(ctx, move |pid, gid| Request::StartedTrain { pid, gid, position });
}

pub fn upgrade_train(ctx: GameContext, upgrade: UpgradeKind) {
    command(ctx, move |pid, gid| Request::UpgradedTrain {
        pid,
        gid,
        upgrade_state: upgrade,
    });
}

pub fn end_turn(ctx: GameContext) {
    command(ctx, |pid, gid| Request::EndTurn { pid, gid });
}

/// Ends the game for everyone; the session is dropped without waiting for the reply.
pub fn end_game(ctx: GameContext) {
    command(ctx, |pid, gid| Request::EndGame { pid, gid });
    ctx.end_session();
}
