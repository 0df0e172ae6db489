use std::cell::RefCell;

use leptos::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use wasm_bindgen_futures::spawn_local;

use trainmap_shared::colors::{PLAYER_COLORS, player_color, rgba_css};
use trainmap_shared::{ListType, MilepostId, Phase, RosterEntry, UpgradeKind};

use crate::canvas::MapCanvas;
use crate::config::{self, Settings};
use crate::dispatcher;
use crate::session::GameContext;
use crate::viewport::ViewportController;

pub(crate) fn canvas_dimensions() -> (f64, f64) {
    let Some(window) = web_sys::window() else {
        return (1200.0, 800.0);
    };
    let w = window
        .inner_width()
        .ok()
        .and_then(|v| v.as_f64())
        .unwrap_or(1200.0);
    let h = window
        .inner_height()
        .ok()
        .and_then(|v| v.as_f64())
        .unwrap_or(800.0);
    (w, h)
}

struct KeydownBinding {
    window: web_sys::Window,
    _handler: Closure<dyn Fn(web_sys::KeyboardEvent)>,
}

thread_local! {
    static KEYDOWN_BINDING: RefCell<Option<KeydownBinding>> = const { RefCell::new(None) };
}

/// Newtype wrappers so same-typed signals get distinct context slots.
#[derive(Clone, Copy)]
pub(crate) struct Selected(pub RwSignal<Option<MilepostId>>);
#[derive(Clone, Copy)]
pub(crate) struct PendingTrack(pub RwSignal<Vec<MilepostId>>);
#[derive(Clone, Copy)]
pub(crate) struct PlayerColor(pub RwSignal<String>);
#[derive(Clone, Copy)]
struct Handle(RwSignal<String>);
#[derive(Clone, Copy)]
struct Geography(RwSignal<String>);

#[derive(Clone, Copy, PartialEq, Eq)]
enum MenuAction {
    New,
    Join,
    Resume,
}

impl MenuAction {
    fn parse(label: &str) -> Self {
        match label {
            "Join" => Self::Join,
            "Resume" => Self::Resume,
            _ => Self::New,
        }
    }

    fn list_type(self) -> Option<ListType> {
        match self {
            Self::New => None,
            Self::Join => Some(ListType::Joinable),
            Self::Resume => Some(ListType::Resumeable),
        }
    }
}

const PANEL_STYLE: &str = "position: absolute; z-index: 10; background: rgba(255, 252, 244, 0.94); border: 1px solid #b9ad92; border-radius: 6px; padding: 10px 12px; font-family: system-ui, sans-serif; font-size: 0.82rem; color: #2b2620; box-shadow: 0 2px 10px rgba(0,0,0,0.15);";
const BUTTON_STYLE: &str = "margin: 2px; padding: 4px 10px; border: 1px solid #8c7f63; border-radius: 4px; background: #efe6d0; cursor: pointer;";

/// Root application component. Provides the game context and UI signals.
#[component]
pub fn App() -> impl IntoView {
    let ctx = GameContext::new();
    let viewport: RwSignal<Option<ViewportController>> = RwSignal::new(None);
    let selected: RwSignal<Option<MilepostId>> = RwSignal::new(None);
    let pending: RwSignal<Vec<MilepostId>> = RwSignal::new(Vec::new());

    let saved = Settings::load();
    let handle = RwSignal::new(saved.handle);
    let color = RwSignal::new(saved.color);
    let geography = RwSignal::new(saved.geography);

    provide_context(ctx);
    provide_context(viewport);
    provide_context(Selected(selected));
    provide_context(PendingTrack(pending));
    provide_context(PlayerColor(color));
    provide_context(Handle(handle));
    provide_context(Geography(geography));

    // Persist menu choices on any change
    Effect::new(move || {
        let settings = Settings {
            handle: handle.get(),
            color: color.get(),
            geography: geography.get(),
        };
        settings.save();
    });

    // No map gestures while the main menu is up.
    Effect::new(move || {
        let open = ctx.menu_open.get();
        viewport.update(|vp| {
            if let Some(vp) = vp {
                if open {
                    vp.disable();
                } else {
                    vp.enable();
                }
            }
        });
    });

    // Keyboard zoom and path reset
    Effect::new(move || {
        let Some(window) = web_sys::window() else {
            return;
        };

        KEYDOWN_BINDING.with(|slot| {
            if let Some(old) = slot.borrow_mut().take() {
                let _ = old.window.remove_event_listener_with_callback(
                    "keydown",
                    old._handler.as_ref().unchecked_ref(),
                );
            }
        });

        let handler =
            Closure::<dyn Fn(web_sys::KeyboardEvent)>::new(move |e: web_sys::KeyboardEvent| {
                let target_tag = e
                    .target()
                    .and_then(|t| t.dyn_into::<web_sys::HtmlElement>().ok())
                    .map(|el| el.tag_name())
                    .unwrap_or_default();
                if matches!(target_tag.as_str(), "INPUT" | "SELECT" | "TEXTAREA") {
                    return;
                }
                match e.key().as_str() {
                    "+" | "=" => viewport.update(|vp| {
                        if let Some(vp) = vp {
                            vp.gesture_zoom(true);
                        }
                    }),
                    "-" => viewport.update(|vp| {
                        if let Some(vp) = vp {
                            vp.gesture_zoom(false);
                        }
                    }),
                    "Escape" => {
                        selected.set(None);
                        pending.set(Vec::new());
                    }
                    _ => {}
                }
            });

        if window
            .add_event_listener_with_callback("keydown", handler.as_ref().unchecked_ref())
            .is_ok()
        {
            KEYDOWN_BINDING.with(|slot| {
                *slot.borrow_mut() = Some(KeydownBinding {
                    window: window.clone(),
                    _handler: handler,
                });
            });
        }
    });

    let phase = Memo::new(move |_| ctx.sync.with(|s| s.phase()));

    view! {
        <div style="width: 100%; height: 100%; position: relative; overflow: hidden;">
            <MapCanvas />
            <ZoomControls />
            {move || match phase.get() {
                Some(Phase::Pregame) if ctx.session.with(Option::is_some) => view! { <OpenGames /> }.into_any(),
                Some(Phase::Lobby) if ctx.session.with(Option::is_some) => view! { <Lobby /> }.into_any(),
                Some(Phase::Active) => view! { <GamePanel /> }.into_any(),
                _ => ().into_any(),
            }}
            {move || {
                if ctx.menu_open.get() {
                    view! { <MainMenu /> }.into_any()
                } else {
                    ().into_any()
                }
            }}
            <StatusLine />
        </div>
    }
}

/// New / Join / Resume modal.
#[component]
fn MainMenu() -> impl IntoView {
    let ctx: GameContext = expect_context();
    let PlayerColor(color) = expect_context();
    let Handle(handle) = expect_context();
    let Geography(geography) = expect_context();

    let action = RwSignal::new(MenuAction::New);
    let gids: RwSignal<Vec<String>> = RwSignal::new(Vec::new());
    let chosen_gid: RwSignal<String> = RwSignal::new(String::new());
    let list_nonce = RwSignal::new(0u64);

    // Refresh the game list whenever Join/Resume is picked; older replies are dropped.
    Effect::new(move || {
        gids.set(Vec::new());
        chosen_gid.set(String::new());
        let Some(list_type) = action.get().list_type() else {
            return;
        };
        let nonce = list_nonce.get_untracked().wrapping_add(1);
        list_nonce.set(nonce);
        spawn_local(async move {
            let result = dispatcher::list_games(list_type).await;
            if list_nonce.get_untracked() != nonce {
                return;
            }
            match result {
                Ok(list) => {
                    chosen_gid.set(list.first().cloned().unwrap_or_default());
                    gids.set(list);
                }
                Err(e) => ctx.report(e),
            }
        });
    });

    // Pregame statuses also advertise games.
    let advertised = Memo::new(move |_| {
        ctx.sync.with(|s| {
            s.games()
                .iter()
                .map(|g| (g.gid.clone(), g.label().to_string()))
                .collect::<Vec<_>>()
        })
    });

    let submit = move |_| {
        let who = handle.get_untracked().trim().to_string();
        if who.is_empty() {
            ctx.notice.set(Some("Pick a handle first".to_string()));
            return;
        }
        let gid = chosen_gid.get_untracked();
        match action.get_untracked() {
            MenuAction::New => dispatcher::create_game(
                ctx,
                color.get_untracked(),
                who,
                geography.get_untracked(),
            ),
            MenuAction::Join if !gid.is_empty() => {
                dispatcher::join_game(ctx, gid, color.get_untracked(), who)
            }
            MenuAction::Resume if !gid.is_empty() => dispatcher::resume_game(ctx, gid, who),
            _ => ctx.notice.set(Some("Pick a game first".to_string())),
        }
    };

    view! {
        <div style="position: absolute; inset: 0; z-index: 20; background: rgba(30, 26, 20, 0.35); display: flex; align-items: center; justify-content: center;">
            <div style={format!("{PANEL_STYLE} position: relative; width: 260px; display: flex; flex-direction: column; gap: 6px;")}>
                <h3 style="margin: 0 0 4px 0; text-align: center;">"Train Game"</h3>
                <select on:change=move |ev| action.set(MenuAction::parse(&event_target_value(&ev)))>
                    <option>"New"</option>
                    <option>"Join"</option>
                    <option>"Resume"</option>
                </select>
                {move || {
                    if action.get() == MenuAction::New {
                        return view! {
                            <label>"Geography"</label>
                            <select
                                prop:value=move || geography.get()
                                on:change=move |ev| geography.set(event_target_value(&ev))
                            >
                                {config::GEOGRAPHIES
                                    .iter()
                                    .map(|g| view! { <option value=*g>{*g}</option> })
                                    .collect_view()}
                            </select>
                        }
                            .into_any();
                    }
                    view! {
                        <label>"Game"</label>
                        <select
                            prop:value=move || chosen_gid.get()
                            on:change=move |ev| chosen_gid.set(event_target_value(&ev))
                        >
                            {move || {
                                let mut options: Vec<(String, String)> = gids
                                    .get()
                                    .into_iter()
                                    .map(|gid| (gid.clone(), gid))
                                    .collect();
                                for (gid, label) in advertised.get() {
                                    if !options.iter().any(|(g, _)| *g == gid) {
                                        options.push((gid, label));
                                    }
                                }
                                options
                                    .into_iter()
                                    .map(|(gid, label)| view! { <option value=gid>{label}</option> })
                                    .collect_view()
                            }}
                        </select>
                    }
                        .into_any()
                }}
                <label>"Handle"</label>
                <input
                    type="text"
                    prop:value=move || handle.get()
                    on:input=move |ev| handle.set(event_target_value(&ev))
                />
                <label>"Game Color"</label>
                <select
                    prop:value=move || color.get()
                    on:change=move |ev| color.set(event_target_value(&ev))
                >
                    {PLAYER_COLORS
                        .iter()
                        .map(|(name, _)| view! { <option value=*name>{*name}</option> })
                        .collect_view()}
                </select>
                <button style=BUTTON_STYLE on:click=submit>"OK"</button>
            </div>
        </div>
    }
}

fn roster_swatch(entry: &RosterEntry) -> String {
    let (r, g, b) = player_color(entry.color().unwrap_or(entry.pid()));
    format!(
        "display: inline-block; width: 9px; height: 9px; border-radius: 2px; margin-right: 6px; background: {};",
        rgba_css(r, g, b, 1.0)
    )
}

/// Games the server advertises before this player has a seat.
#[component]
fn OpenGames() -> impl IntoView {
    let ctx: GameContext = expect_context();
    let PlayerColor(color) = expect_context();
    let games = Memo::new(move |_| ctx.sync.with(|s| s.games().to_vec()));

    let join = move |gid: String| {
        let Some(session) = ctx.session.get_untracked() else {
            return;
        };
        dispatcher::join_game(ctx, gid, color.get_untracked(), session.player_id);
    };

    view! {
        <div style={format!("{PANEL_STYLE} top: 16px; left: 16px; min-width: 180px;")}>
            <h4 style="margin: 0 0 6px 0;">"Open games"</h4>
            <Show
                when=move || games.with(|g| !g.is_empty())
                fallback=|| view! { <div style="color: #6b604c;">"No games yet"</div> }
            >
                <ul style="list-style: none; margin: 0; padding: 0;">
                    <For
                        each=move || games.get()
                        key=|game| (game.gid.clone(), game.name.clone())
                        children=move |game| {
                            let label = game.label().to_string();
                            let gid = game.gid;
                            view! {
                                <li
                                    style="padding: 2px 4px; cursor: pointer; border-radius: 3px;"
                                    title="Join this game"
                                    on:click=move |_| join(gid.clone())
                                >
                                    {label}
                                </li>
                            }
                        }
                    />
                </ul>
            </Show>
        </div>
    }
}

#[component]
fn Lobby() -> impl IntoView {
    let ctx: GameContext = expect_context();
    let roster = Memo::new(move |_| ctx.sync.with(|s| s.roster().to_vec()));

    view! {
        <div style={format!("{PANEL_STYLE} top: 16px; left: 16px; min-width: 180px;")}>
            <h4 style="margin: 0 0 6px 0;">"Lobby"</h4>
            <ul style="list-style: none; margin: 0 0 8px 0; padding: 0;">
                {move || {
                    roster
                        .get()
                        .into_iter()
                        .map(|entry| {
                            let swatch = roster_swatch(&entry);
                            view! {
                                <li><span style=swatch />{entry.pid().to_string()}</li>
                            }
                        })
                        .collect_view()
                }}
            </ul>
            <button style=BUTTON_STYLE on:click=move |_| dispatcher::start_game(ctx)>"Start"</button>
        </div>
    }
}

/// Turn indicator and the in-game commands.
#[component]
fn GamePanel() -> impl IntoView {
    let ctx: GameContext = expect_context();
    let Selected(selected) = expect_context();
    let PendingTrack(pending) = expect_context();

    let roster = Memo::new(move |_| ctx.sync.with(|s| s.roster().to_vec()));
    let active = Memo::new(move |_| ctx.sync.with(|s| s.active_pid().map(str::to_string)));
    let last = Memo::new(move |_| ctx.sync.with(|s| s.last_pid().map(str::to_string)));
    let my_turn = move || {
        let me = ctx.session.with(|s| s.as_ref().map(|s| s.player_id.clone()));
        me.is_some() && me == active.get()
    };

    let build = move |_| {
        let path = pending.get_untracked();
        if path.is_empty() {
            ctx.notice.set(Some("Click mileposts to lay out a path".to_string()));
            return;
        }
        dispatcher::build_track(ctx, path);
        pending.set(Vec::new());
    };
    let place_train = move |_| match selected.get_untracked() {
        Some(position) => dispatcher::start_train(ctx, position),
        None => ctx.notice.set(Some("Select a milepost for the train".to_string())),
    };

    view! {
        <div style={format!("{PANEL_STYLE} top: 16px; left: 16px; min-width: 200px;")}>
            <div style="margin-bottom: 6px; font-weight: 600;">
                {move || match active.get() {
                    Some(pid) if my_turn() => format!("Your turn ({pid})"),
                    Some(pid) => format!("Waiting for {pid}"),
                    None => "Waiting for the server".to_string(),
                }}
            </div>
            {move || {
                last.get().map(|pid| view! {
                    <div style="margin-bottom: 6px; color: #6b604c;">{format!("Last move: {pid}")}</div>
                })
            }}
            <ul style="list-style: none; margin: 0 0 8px 0; padding: 0;">
                {move || {
                    let current = active.get();
                    roster
                        .get()
                        .into_iter()
                        .map(|entry| {
                            let swatch = roster_swatch(&entry);
                            let weight = if current.as_deref() == Some(entry.pid()) { "font-weight: 700;" } else { "" };
                            let money = match &entry {
                                RosterEntry::Player(p) => p.money.map(|m| format!(" ${m}")),
                                RosterEntry::Handle(_) => None,
                            };
                            view! {
                                <li style=weight>
                                    <span style=swatch />
                                    {entry.pid().to_string()}
                                    {money}
                                </li>
                            }
                        })
                        .collect_view()
                }}
            </ul>
            <div style="margin-bottom: 4px; color: #6b604c;">
                {move || format!("Path: {} mileposts", pending.with(Vec::len))}
            </div>
            <div>
                <button style=BUTTON_STYLE on:click=build>"Build"</button>
                <button style=BUTTON_STYLE on:click=move |_| pending.set(Vec::new())>"Clear"</button>
                <button style=BUTTON_STYLE on:click=place_train>"Place train"</button>
            </div>
            <div>
                <button style=BUTTON_STYLE on:click=move |_| dispatcher::upgrade_train(ctx, UpgradeKind::Capacity)>"Upgrade capacity"</button>
                <button style=BUTTON_STYLE on:click=move |_| dispatcher::upgrade_train(ctx, UpgradeKind::Speed)>"Upgrade speed"</button>
            </div>
            <div>
                <button style=BUTTON_STYLE on:click=move |_| dispatcher::end_turn(ctx)>"End turn"</button>
                <button style=BUTTON_STYLE on:click=move |_| dispatcher::end_game(ctx)>"End game"</button>
            </div>
        </div>
    }
}

/// Up/down zoom buttons. These bypass the gesture gate.
#[component]
fn ZoomControls() -> impl IntoView {
    let viewport: RwSignal<Option<ViewportController>> = expect_context();
    let zoom = move |zoom_in: bool| {
        viewport.update(|vp| match vp {
            Some(vp) if zoom_in => vp.zoom_in(1),
            Some(vp) => vp.zoom_out(1),
            None => {}
        });
    };
    let level = move || {
        viewport.with(|vp| {
            vp.as_ref()
                .map(|vp| format!("{}/{}", vp.state().zoom_level, config::MAX_ZOOM))
                .unwrap_or_default()
        })
    };

    view! {
        <div style={format!("{PANEL_STYLE} right: 16px; bottom: 40px; padding: 4px; display: flex; flex-direction: column; align-items: center;")}>
            <button style=BUTTON_STYLE title="Zoom in" on:click=move |_| zoom(true)>"\u{25B2}"</button>
            <span style="font-size: 0.7rem; color: #6b604c;">{level}</span>
            <button style=BUTTON_STYLE title="Zoom out" on:click=move |_| zoom(false)>"\u{25BC}"</button>
        </div>
    }
}

/// Last surfaced error plus sync freshness.
#[component]
fn StatusLine() -> impl IntoView {
    let ctx: GameContext = expect_context();

    let message = Memo::new(move |_| {
        let polled = ctx.sync.with(|s| {
            s.last_error()
                .filter(|e| e.is_user_visible())
                .map(ToString::to_string)
        });
        polled.or_else(|| ctx.notice.get())
    });
    let freshness = move || {
        let (phase, failures) = ctx.sync.with(|s| (s.phase(), s.consecutive_failures()));
        let synced = match (phase, ctx.last_synced.get()) {
            (Some(phase), Some(at)) => format!("{phase:?} \u{00B7} synced {at}"),
            (None, Some(at)) => format!("synced {at}"),
            _ => String::new(),
        };
        if failures == 0 {
            synced
        } else {
            format!("{synced} \u{00B7} retrying ({failures})")
        }
    };

    view! {
        <div style="position: absolute; left: 0; right: 0; bottom: 0; z-index: 15; display: flex; justify-content: space-between; padding: 3px 10px; font-family: system-ui, sans-serif; font-size: 0.72rem; background: rgba(43, 38, 32, 0.8); color: #efe6d0;">
            <span style="color: #ffb4a2;">
                {move || message.get().unwrap_or_default()}
            </span>
            <span>{freshness}</span>
            {move || {
                message.get().is_some().then(|| view! {
                    <button
                        style="margin-left: 8px; background: none; border: none; color: #efe6d0; cursor: pointer;"
                        on:click=move |_| ctx.notice.set(None)
                    >
                        "\u{00D7}"
                    </button>
                })
            }}
        </div>
    }
}
