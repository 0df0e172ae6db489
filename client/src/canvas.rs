use std::cell::{Cell, RefCell};
use std::f64::consts::TAU;
use std::rc::Rc;

use leptos::prelude::*;
use tracing::{debug, error, info};
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, PointerEvent, WheelEvent};

use trainmap_shared::colors::{player_color, rgba_css};
use trainmap_shared::{
    CityClusterOracle, GridDelta, MilepostId, Phase, Primitive, Scene, Shape, ViewBox, render,
};

use crate::app::{PendingTrack, PlayerColor, Selected};
use crate::assets::{self, AssetCache, SharedAssets};
use crate::config::{CLICK_SLOP_PX, KNOWN_TERRAIN_KINDS};
use crate::render_loop::RenderScheduler;
use crate::session::{GameContext, LoadedMap};
use crate::viewport::ViewportController;

const BACKGROUND: &str = "#f4efe1";
const SELECTION_RING: &str = "rgba(0, 90, 200, 0.85)";

/// Fallback extent when the map asset carries no viewBox.
fn board_view_box(map: &LoadedMap) -> ViewBox {
    let (min_x, min_y, max_x, max_y) = map.board.layout().extent();
    ViewBox::new(min_x, min_y, max_x - min_x, max_y - min_y)
}

fn container_size(canvas: Option<HtmlCanvasElement>) -> (f64, f64) {
    canvas
        .and_then(|c| c.parent_element())
        .map(|p| (p.client_width() as f64, p.client_height() as f64))
        .filter(|(w, h)| *w > 0.0 && *h > 0.0)
        .unwrap_or_else(crate::app::canvas_dimensions)
}

fn draw_primitive(ctx: &CanvasRenderingContext2d, primitive: &Primitive, assets: &AssetCache) {
    match &primitive.shape {
        Shape::Circle {
            cx,
            cy,
            radius,
            fill,
            stroke,
        } => {
            ctx.begin_path();
            let _ = ctx.arc(*cx, *cy, *radius, 0.0, TAU);
            ctx.set_fill_style_str(fill);
            ctx.fill();
            if let Some(stroke) = stroke {
                ctx.set_stroke_style_str(stroke.color);
                ctx.set_line_width(stroke.width);
                ctx.stroke();
            }
        }
        Shape::Outline { points, stroke } => {
            let Some(((x0, y0), rest)) = points.split_first() else {
                return;
            };
            ctx.begin_path();
            ctx.move_to(*x0, *y0);
            for (x, y) in rest {
                ctx.line_to(*x, *y);
            }
            ctx.close_path();
            ctx.set_stroke_style_str(stroke.color);
            ctx.set_line_width(stroke.width);
            ctx.stroke();
        }
        Shape::Glyph {
            kind,
            translate_x,
            translate_y,
            scale,
            width,
            height,
        } => {
            if let Some(image) = assets.glyph_image(kind) {
                let _ = ctx.draw_image_with_html_image_element_and_dw_and_dh(
                    image,
                    *translate_x,
                    *translate_y,
                    width * scale,
                    height * scale,
                );
            }
        }
    }
}

struct Overlay<'a> {
    map: &'a LoadedMap,
    scene: Option<&'a Scene>,
    pending: &'a [MilepostId],
    selected: Option<MilepostId>,
    track_color: (u8, u8, u8),
}

fn draw_overlay(ctx: &CanvasRenderingContext2d, overlay: Overlay<'_>) {
    let layout = overlay.map.board.layout();
    let Ok(delta) = GridDelta::for_board(&overlay.map.board) else {
        return;
    };
    let center = |id: MilepostId| delta.position(layout, id.column, id.row);

    if let Some(((x0, y0), rest)) = overlay
        .pending
        .iter()
        .map(|id| center(*id))
        .collect::<Vec<_>>()
        .split_first()
    {
        let (r, g, b) = overlay.track_color;
        ctx.begin_path();
        ctx.move_to(*x0, *y0);
        for (x, y) in rest {
            ctx.line_to(*x, *y);
        }
        ctx.set_stroke_style_str(&rgba_css(r, g, b, 0.8));
        ctx.set_line_width(3.0);
        ctx.stroke();
    }

    if let Some(id) = overlay.selected {
        // Ring sits just outside the milepost's own circle.
        let shape = overlay.scene.and_then(|s| s.primitive(id)).map(|p| &p.shape);
        let (x, y, radius) = match shape {
            Some(Shape::Circle { cx, cy, radius, .. }) => (*cx, *cy, radius + 3.0),
            _ => {
                let (x, y) = center(id);
                (x, y, 6.0)
            }
        };
        ctx.begin_path();
        let _ = ctx.arc(x, y, radius, 0.0, TAU);
        ctx.set_stroke_style_str(SELECTION_RING);
        ctx.set_line_width(1.5);
        ctx.stroke();
    }
}

/// Board canvas: draws the current scene under the viewport transform and
/// turns pointer input into pan, zoom and milepost selection.
#[component]
pub fn MapCanvas() -> impl IntoView {
    let ctx: GameContext = expect_context();
    let viewport: RwSignal<Option<ViewportController>> = expect_context();
    let Selected(selected) = expect_context();
    let PendingTrack(pending) = expect_context();
    let PlayerColor(color) = expect_context();

    let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
    let assets: SharedAssets = Rc::new(RefCell::new(AssetCache::default()));
    let scene: Rc<RefCell<Option<Scene>>> = Rc::new(RefCell::new(None));
    let scene_key: Rc<Cell<Option<(u32, usize)>>> = Rc::new(Cell::new(None));
    let fitted_to_asset = Rc::new(Cell::new(false));
    let asset_gen = RwSignal::new(0u64);
    let on_asset_loaded: Rc<dyn Fn()> = Rc::new(move || asset_gen.update(|g| *g += 1));

    let is_dragging = Rc::new(Cell::new(false));
    let drag_start = Rc::new(Cell::new((0.0f64, 0.0f64)));
    let last_pos = Rc::new(Cell::new((0.0f64, 0.0f64)));

    let cached_ctx: Rc<RefCell<Option<CanvasRenderingContext2d>>> = Rc::new(RefCell::new(None));

    let scheduler = {
        let assets = assets.clone();
        let scene = scene.clone();
        let cached_ctx = cached_ctx.clone();
        RenderScheduler::new(move || {
            let Some(canvas) = canvas_ref.get_untracked() else {
                return;
            };
            let canvas: &HtmlCanvasElement = &canvas;
            let Some(parent) = canvas.parent_element() else {
                return;
            };
            let (w, h) = (parent.client_width() as f64, parent.client_height() as f64);
            if w <= 0.0 || h <= 0.0 {
                return;
            }
            let dpr = web_sys::window()
                .map(|win| win.device_pixel_ratio())
                .unwrap_or(1.0)
                .max(1.0);
            let (pw, ph) = ((w * dpr).round() as u32, (h * dpr).round() as u32);
            if canvas.width() != pw || canvas.height() != ph {
                canvas.set_width(pw);
                canvas.set_height(ph);
                *cached_ctx.borrow_mut() = None;
            }

            let draw_ctx = {
                let mut slot = cached_ctx.borrow_mut();
                if slot.is_none() {
                    *slot = canvas
                        .get_context("2d")
                        .ok()
                        .flatten()
                        .and_then(|c| c.dyn_into::<CanvasRenderingContext2d>().ok());
                }
                let Some(c) = slot.clone() else {
                    return;
                };
                c
            };

            let _ = draw_ctx.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0);
            draw_ctx.set_fill_style_str(BACKGROUND);
            draw_ctx.fill_rect(0.0, 0.0, w, h);

            let resized = viewport.with_untracked(|vp| {
                vp.as_ref().is_some_and(|vp| vp.container_size() != (w, h))
            });
            if resized {
                viewport.update_untracked(|vp| {
                    if let Some(vp) = vp {
                        vp.resize(w, h);
                    }
                });
            }
            let Some(transform) = viewport.with_untracked(|vp| vp.as_ref().map(|vp| vp.transform()))
            else {
                return;
            };
            let _ = draw_ctx.set_transform(
                dpr * transform.scale,
                0.0,
                0.0,
                dpr * transform.scale,
                dpr * transform.offset_x,
                dpr * transform.offset_y,
            );

            ctx.map.with_untracked(|map| {
                let Some(map) = map else {
                    return;
                };
                let assets = assets.borrow();
                if let Some(backdrop) = assets.map_for(&map.geography) {
                    let vb = backdrop.view_box.unwrap_or_else(|| board_view_box(map));
                    let _ = draw_ctx.draw_image_with_html_image_element_and_dw_and_dh(
                        &backdrop.image,
                        vb.min_x,
                        vb.min_y,
                        vb.width,
                        vb.height,
                    );
                }
                let scene = scene.borrow();
                if let Some(scene) = scene.as_ref() {
                    for primitive in scene.primitives() {
                        draw_primitive(&draw_ctx, primitive, &assets);
                    }
                }
                pending.with_untracked(|path| {
                    draw_overlay(
                        &draw_ctx,
                        Overlay {
                            map,
                            scene: scene.as_ref(),
                            pending: path,
                            selected: selected.get_untracked(),
                            track_color: player_color(&color.get_untracked()),
                        },
                    );
                });
            });
        })
    };

    let rebuild_scene = {
        let assets = assets.clone();
        let scene = scene.clone();
        let scene_key = scene_key.clone();
        move || {
            ctx.map.with_untracked(|map| {
                let Some(map) = map else {
                    *scene.borrow_mut() = None;
                    scene_key.set(None);
                    return;
                };
                let key = (map.board.fingerprint(), assets.borrow().glyph_count());
                if scene_key.get() == Some(key) {
                    return;
                }
                match render(&map.board, &*assets.borrow(), &CityClusterOracle) {
                    Ok(built) => {
                        if !built.skipped().is_empty() {
                            debug!(skipped = built.skipped().len(), "terrain glyphs still pending");
                        }
                        *scene.borrow_mut() = Some(built);
                        scene_key.set(Some(key));
                    }
                    Err(e) => {
                        error!(error = %e, "could not render board");
                        *scene.borrow_mut() = None;
                        scene_key.set(None);
                        ctx.report(e);
                    }
                }
            });
        }
    };

    Effect::new({
        let assets = assets.clone();
        let on_loaded = on_asset_loaded.clone();
        move || {
            assets::request_glyphs(&assets, KNOWN_TERRAIN_KINDS, on_loaded.clone());
        }
    });

    // New board: fetch what it needs and start the viewport over.
    Effect::new({
        let assets = assets.clone();
        let on_loaded = on_asset_loaded.clone();
        let fitted_to_asset = fitted_to_asset.clone();
        let rebuild_scene = rebuild_scene.clone();
        let scheduler = scheduler.clone();
        move || {
            ctx.map.with(|map| {
                selected.set(None);
                pending.set(Vec::new());
                fitted_to_asset.set(false);
                let Some(map) = map else {
                    viewport.set(None);
                    return;
                };
                assets::request_map(&assets, &map.geography, on_loaded.clone());
                assets::request_glyphs(&assets, map.board.terrain_kinds(), on_loaded.clone());

                let cached = assets
                    .borrow()
                    .map_for(&map.geography)
                    .and_then(|a| a.view_box);
                fitted_to_asset.set(cached.is_some());
                let view_box = cached.unwrap_or_else(|| board_view_box(map));
                let menu_open = ctx.menu_open.get_untracked();
                viewport.update(|vp| {
                    if let Some(vp) = vp.as_mut() {
                        vp.reset(view_box);
                        return;
                    }
                    let (w, h) = container_size(canvas_ref.get_untracked());
                    let mut fresh = ViewportController::new(view_box, w, h);
                    if menu_open {
                        fresh.disable();
                    }
                    *vp = Some(fresh);
                });
            });
            rebuild_scene();
            scheduler.mark_dirty();
        }
    });

    // An asset arrived: adopt the map's own viewBox once, and pick up new glyphs.
    Effect::new({
        let assets = assets.clone();
        let scheduler = scheduler.clone();
        move || {
            asset_gen.track();
            if !fitted_to_asset.get() {
                let view_box = ctx.map.with_untracked(|map| {
                    map.as_ref().and_then(|m| {
                        assets.borrow().map_for(&m.geography).and_then(|a| a.view_box)
                    })
                });
                if let Some(view_box) = view_box {
                    fitted_to_asset.set(true);
                    viewport.update(|vp| {
                        if let Some(vp) = vp {
                            vp.reset(view_box);
                        }
                    });
                }
            }
            rebuild_scene();
            scheduler.mark_dirty();
        }
    });

    Effect::new({
        let scheduler = scheduler.clone();
        move || {
            viewport.track();
            selected.track();
            pending.track();
            color.track();
            scheduler.mark_dirty();
        }
    });

    let board_point = move |e: &MouseEvent| -> Option<(f64, f64)> {
        let canvas = canvas_ref.get_untracked()?;
        let rect = canvas.get_bounding_client_rect();
        let (sx, sy) = (
            e.client_x() as f64 - rect.left(),
            e.client_y() as f64 - rect.top(),
        );
        viewport.with_untracked(|vp| vp.as_ref().map(|vp| vp.screen_to_board(sx, sy)))
    };

    let on_wheel = move |e: WheelEvent| {
        e.prevent_default();
        let zoom_in = e.delta_y() < 0.0;
        viewport.update(|vp| {
            if let Some(vp) = vp {
                vp.gesture_zoom(zoom_in);
            }
        });
    };

    let on_dblclick = move |e: MouseEvent| {
        e.prevent_default();
        viewport.update(|vp| {
            if let Some(vp) = vp {
                vp.gesture_zoom(true);
            }
        });
    };

    let on_pointer_down = {
        let is_dragging = is_dragging.clone();
        let drag_start = drag_start.clone();
        let last_pos = last_pos.clone();
        move |e: PointerEvent| {
            let pos = (e.client_x() as f64, e.client_y() as f64);
            is_dragging.set(true);
            drag_start.set(pos);
            last_pos.set(pos);
            if let Some(target) = e.target()
                && let Ok(el) = target.dyn_into::<web_sys::HtmlElement>()
            {
                el.set_pointer_capture(e.pointer_id()).ok();
                el.style().set_property("cursor", "grabbing").ok();
            }
        }
    };

    let on_pointer_move = {
        let is_dragging = is_dragging.clone();
        let last_pos = last_pos.clone();
        move |e: PointerEvent| {
            if !is_dragging.get() {
                return;
            }
            let pos = (e.client_x() as f64, e.client_y() as f64);
            let (lx, ly) = last_pos.replace(pos);
            viewport.update(|vp| {
                if let Some(vp) = vp {
                    vp.gesture_pan(pos.0 - lx, pos.1 - ly);
                }
            });
        }
    };

    let on_pointer_up = {
        let is_dragging = is_dragging.clone();
        move |e: PointerEvent| {
            is_dragging.set(false);
            if let Some(target) = e.target()
                && let Ok(el) = target.dyn_into::<web_sys::HtmlElement>()
            {
                el.style().set_property("cursor", "grab").ok();
            }
        }
    };

    let on_click = {
        let drag_start = drag_start.clone();
        let scene = scene.clone();
        move |e: MouseEvent| {
            let (sx, sy) = drag_start.get();
            if (e.client_x() as f64 - sx).abs() >= CLICK_SLOP_PX
                || (e.client_y() as f64 - sy).abs() >= CLICK_SLOP_PX
            {
                return;
            }
            let Some((bx, by)) = board_point(&e) else {
                return;
            };
            let Some(id) = scene.borrow().as_ref().and_then(|s| s.hit_test(bx, by)) else {
                return;
            };
            ctx.map.with_untracked(|map| {
                let Some(mp) = map.as_ref().and_then(|m| m.board.milepost_at(id)) else {
                    return;
                };
                match &mp.city {
                    Some(city) => info!(
                        milepost = %id,
                        kind = mp.kind.as_str(),
                        city = %city.name,
                        loads = ?city.loads,
                        "milepost clicked"
                    ),
                    None => info!(milepost = %id, kind = mp.kind.as_str(), "milepost clicked"),
                }
            });
            selected.set(Some(id));
            if ctx.sync.with_untracked(|s| s.phase()) == Some(Phase::Active) {
                pending.update(|path| {
                    if path.last() != Some(&id) {
                        path.push(id);
                    }
                });
            }
        }
    };

    // City name pinned next to the selected milepost, following pan and zoom.
    let city_label = move || {
        let id = selected.get()?;
        let (name, bx, by) = ctx.map.with(|map| {
            let map = map.as_ref()?;
            let city = map.board.milepost_at(id)?.city.as_ref()?;
            let (bx, by) = GridDelta::for_board(&map.board)
                .ok()?
                .position(map.board.layout(), id.column, id.row);
            Some((city.name.clone(), bx, by))
        })?;
        let (sx, sy) = viewport.with(|vp| vp.as_ref().map(|vp| vp.board_to_screen(bx, by)))?;
        let style = format!(
            "position: absolute; left: {}px; top: {}px; pointer-events: none; padding: 1px 6px; border-radius: 3px; background: rgba(43, 38, 32, 0.8); color: #efe6d0; font-family: system-ui, sans-serif; font-size: 0.72rem; white-space: nowrap;",
            sx + 12.0,
            sy - 10.0
        );
        Some(view! { <div style=style>{name}</div> })
    };

    view! {
        <div style="position: absolute; inset: 0; overflow: hidden;">
            <canvas
                node_ref=canvas_ref
                style="position: absolute; inset: 0; width: 100%; height: 100%; touch-action: none; cursor: grab;"
                on:wheel=on_wheel
                on:dblclick=on_dblclick
                on:pointerdown=on_pointer_down
                on:pointermove=on_pointer_move
                on:pointerup=on_pointer_up
                on:click=on_click
            />
            {city_label}
        </div>
    }
}
