use trainmap_shared::ViewBox;

use crate::config::{MAX_ZOOM, ZOOM_STEP_FRACTION};

/// The region of board space currently shown, in view box units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    pub origin_x: f64,
    pub origin_y: f64,
    pub zoom_level: u32,
    pub visible_width: f64,
    pub visible_height: f64,
}

/// Board-to-container mapping: `screen = board * scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

/// Pan/zoom over a surface sized to the map's native view box.
///
/// Zoom moves in integer levels; each level trims a tenth of the view box
/// while holding the visible center still. The visible region never leaves
/// the view box.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportController {
    view_box: ViewBox,
    container_width: f64,
    container_height: f64,
    state: ViewportState,
    enabled: bool,
}

fn visible_size(view_box: &ViewBox, zoom_level: u32) -> (f64, f64) {
    let factor = 1.0 - zoom_level as f64 * ZOOM_STEP_FRACTION;
    (view_box.width * factor, view_box.height * factor)
}

impl ViewportController {
    pub fn new(view_box: ViewBox, container_width: f64, container_height: f64) -> Self {
        Self {
            view_box,
            container_width: container_width.max(1.0),
            container_height: container_height.max(1.0),
            state: ViewportState {
                origin_x: view_box.min_x,
                origin_y: view_box.min_y,
                zoom_level: 0,
                visible_width: view_box.width,
                visible_height: view_box.height,
            },
            enabled: true,
        }
    }

    pub fn state(&self) -> &ViewportState {
        &self.state
    }

    pub fn container_size(&self) -> (f64, f64) {
        (self.container_width, self.container_height)
    }

    pub fn zoom_in(&mut self, step: u32) {
        self.set_zoom(self.state.zoom_level.saturating_add(step));
    }

    pub fn zoom_out(&mut self, step: u32) {
        self.set_zoom(self.state.zoom_level.saturating_sub(step));
    }

    fn set_zoom(&mut self, level: u32) {
        let level = level.min(MAX_ZOOM);
        let center_x = self.state.origin_x + self.state.visible_width / 2.0;
        let center_y = self.state.origin_y + self.state.visible_height / 2.0;
        let (w, h) = visible_size(&self.view_box, level);
        self.state.zoom_level = level;
        self.state.visible_width = w;
        self.state.visible_height = h;
        self.state.origin_x = center_x - w / 2.0;
        self.state.origin_y = center_y - h / 2.0;
        self.clamp_origin();
    }

    /// Pan by a container-pixel delta; dragging right reveals what lies to the left.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        let scale = self.transform().scale;
        self.state.origin_x -= dx / scale;
        self.state.origin_y -= dy / scale;
        self.clamp_origin();
    }

    fn clamp_origin(&mut self) {
        let vb = &self.view_box;
        let max_x = vb.min_x + (vb.width - self.state.visible_width).max(0.0);
        let max_y = vb.min_y + (vb.height - self.state.visible_height).max(0.0);
        self.state.origin_x = self.state.origin_x.clamp(vb.min_x, max_x);
        self.state.origin_y = self.state.origin_y.clamp(vb.min_y, max_y);
    }

    /// Adopt a new container size; zoom level and origin are kept.
    pub fn resize(&mut self, width: f64, height: f64) {
        if !(width > 0.0 && height > 0.0) {
            return;
        }
        self.container_width = width;
        self.container_height = height;
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Drag-driven pan. Returns whether the gesture was accepted.
    pub fn gesture_pan(&mut self, dx: f64, dy: f64) -> bool {
        if !self.is_enabled() {
            return false;
        }
        self.pan(dx, dy);
        true
    }

    /// Wheel/double-click zoom; `zoom_in` picks the direction.
    pub fn gesture_zoom(&mut self, zoom_in: bool) -> bool {
        if !self.is_enabled() {
            return false;
        }
        if zoom_in {
            self.zoom_in(1);
        } else {
            self.zoom_out(1);
        }
        true
    }

    /// Start over on a new board, keeping container size and gesture gate.
    pub fn reset(&mut self, view_box: ViewBox) {
        let enabled = self.enabled;
        *self = Self::new(view_box, self.container_width, self.container_height);
        self.enabled = enabled;
    }

    /// Uniform fit of the visible region into the container, centered.
    pub fn transform(&self) -> Transform {
        let s = &self.state;
        let scale = (self.container_width / s.visible_width)
            .min(self.container_height / s.visible_height);
        Transform {
            scale,
            offset_x: (self.container_width - s.visible_width * scale) / 2.0 - s.origin_x * scale,
            offset_y: (self.container_height - s.visible_height * scale) / 2.0
                - s.origin_y * scale,
        }
    }

    pub fn board_to_screen(&self, bx: f64, by: f64) -> (f64, f64) {
        let t = self.transform();
        (bx * t.scale + t.offset_x, by * t.scale + t.offset_y)
    }

    pub fn screen_to_board(&self, sx: f64, sy: f64) -> (f64, f64) {
        let t = self.transform();
        ((sx - t.offset_x) / t.scale, (sy - t.offset_y) / t.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn controller() -> ViewportController {
        ViewportController::new(ViewBox::new(0.0, 0.0, 1000.0, 500.0), 800.0, 400.0)
    }

    fn center(vp: &ViewportController) -> (f64, f64) {
        let s = vp.state();
        (
            s.origin_x + s.visible_width / 2.0,
            s.origin_y + s.visible_height / 2.0,
        )
    }

    #[test]
    fn starts_showing_whole_view_box() {
        let vp = controller();
        assert_eq!(vp.state().zoom_level, 0);
        assert_eq!((vp.state().origin_x, vp.state().origin_y), (0.0, 0.0));
        assert_eq!(vp.state().visible_width, 1000.0);
        assert!(close(vp.transform().scale, 0.8));
    }

    #[test]
    fn zoom_is_bounded() {
        let mut vp = controller();
        vp.zoom_in(4);
        assert_eq!(vp.state().zoom_level, 4);
        assert!(close(vp.state().visible_width, 600.0));
        vp.zoom_in(20);
        assert_eq!(vp.state().zoom_level, MAX_ZOOM);
        assert!(vp.transform().scale > 0.0);
        vp.zoom_out(100);
        assert_eq!(vp.state().zoom_level, 0);
        assert_eq!(vp.state().visible_width, 1000.0);
    }

    #[test]
    fn zoom_holds_center() {
        let mut vp = controller();
        vp.zoom_in(5);
        vp.pan(-40.0, -20.0);
        let before = center(&vp);
        vp.zoom_in(2);
        let after = center(&vp);
        assert!(close(before.0, after.0) && close(before.1, after.1));
    }

    #[test]
    fn pan_is_clamped_to_view_box() {
        let mut vp = controller();
        vp.pan(100.0, 100.0);
        assert_eq!((vp.state().origin_x, vp.state().origin_y), (0.0, 0.0));

        vp.zoom_in(5);
        vp.pan(-1e6, -1e6);
        let s = *vp.state();
        assert!(close(s.origin_x + s.visible_width, 1000.0));
        assert!(close(s.origin_y + s.visible_height, 500.0));
    }

    #[test]
    fn pan_converts_pixels_to_board_units() {
        let mut vp = controller();
        vp.zoom_in(5);
        let start = vp.state().origin_x;
        let scale = vp.transform().scale;
        vp.pan(-16.0, 0.0);
        assert!(close(vp.state().origin_x - start, 16.0 / scale));
    }

    #[test]
    fn resize_keeps_zoom_and_origin() {
        let mut vp = controller();
        vp.zoom_in(3);
        vp.pan(-50.0, -30.0);
        let before = *vp.state();
        vp.resize(1920.0, 1080.0);
        assert_eq!(*vp.state(), before);
        assert_eq!(vp.container_size(), (1920.0, 1080.0));
        vp.resize(0.0, 300.0);
        assert_eq!(vp.container_size(), (1920.0, 1080.0));
    }

    #[test]
    fn disabled_gate_blocks_gestures_only() {
        let mut vp = controller();
        vp.disable();
        assert!(!vp.gesture_zoom(true));
        assert!(!vp.gesture_pan(-10.0, 0.0));
        assert_eq!(vp.state().zoom_level, 0);
        vp.zoom_in(1);
        assert_eq!(vp.state().zoom_level, 1);
        vp.enable();
        assert!(vp.gesture_zoom(false));
        assert_eq!(vp.state().zoom_level, 0);
    }

    #[test]
    fn screen_and_board_coordinates_invert() {
        let mut vp = controller();
        vp.zoom_in(6);
        vp.pan(-120.0, -45.0);
        let (sx, sy) = vp.board_to_screen(612.5, 233.0);
        let (bx, by) = vp.screen_to_board(sx, sy);
        assert!(close(bx, 612.5) && close(by, 233.0));
    }

    #[test]
    fn reset_returns_to_zoom_zero_and_keeps_gate() {
        let mut vp = controller();
        vp.zoom_in(3);
        vp.disable();
        vp.reset(ViewBox::new(-10.0, -10.0, 200.0, 200.0));
        assert_eq!(vp.state().zoom_level, 0);
        assert_eq!((vp.state().origin_x, vp.state().origin_y), (-10.0, -10.0));
        assert!(!vp.is_enabled());
        assert_eq!(vp.container_size(), (800.0, 400.0));
    }
}
