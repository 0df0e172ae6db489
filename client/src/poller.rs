use std::cell::Cell;

use gloo_timers::future::TimeoutFuture;
use leptos::prelude::*;
use tracing::{debug, info};
use wasm_bindgen_futures::spawn_local;

use trainmap_shared::ClientError;

use crate::dispatcher;
use crate::session::GameContext;
use crate::sync::Synchronizer;

thread_local! {
    static POLL_GENERATION: Cell<u64> = const { Cell::new(0) };
}

fn current_generation() -> u64 {
    POLL_GENERATION.with(Cell::get)
}

fn bump_generation() -> u64 {
    POLL_GENERATION.with(|g| {
        let next = g.get().wrapping_add(1);
        g.set(next);
        next
    })
}

/// Start polling for the current session, replacing any running loop.
pub fn start(ctx: GameContext) {
    let generation = bump_generation();
    info!(generation, "status polling started");
    spawn_local(poll_loop(ctx, generation));
}

pub fn stop() {
    bump_generation();
}

async fn poll_loop(ctx: GameContext, generation: u64) {
    loop {
        if current_generation() != generation {
            break;
        }
        let Some(session) = ctx.session.get_untracked() else {
            break;
        };
        let Some(ticket) = ctx.sync.try_update_untracked(Synchronizer::begin_poll) else {
            break;
        };

        let outcome = dispatcher::fetch_status(&session).await;
        if current_generation() != generation {
            break;
        }

        let applied = match outcome {
            Ok(status) => ctx.sync.try_update(|s| s.apply(ticket, status)),
            Err(e) => Some(Err(e)),
        };
        match applied {
            Some(Ok(effects)) => {
                ctx.mark_synced();
                ctx.handle_effects(effects);
            }
            Some(Err(e)) => {
                let repeated = ctx.sync.with_untracked(|s| s.last_error() == Some(&e));
                if matches!(e, ClientError::InvalidBoardGeometry { .. }) && !repeated {
                    ctx.report(e.clone());
                }
                ctx.sync.update(|s| s.record_failure(e));
            }
            None => break,
        }

        let Some(delay) = ctx.sync.try_with_untracked(Synchronizer::next_delay_ms) else {
            break;
        };
        TimeoutFuture::new(delay).await;
    }
    debug!(generation, "status polling stopped");
}
