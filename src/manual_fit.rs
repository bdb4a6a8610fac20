//! Manual fitting: pointer/touch dragging and slider input.
//!
//! The drag state machine has two states, `Idle` and `Dragging`, stored in
//! [`TransformState`]'s drag fields. Slider input is independent of it.

use crate::config::SliderConfig;
use crate::transform::{Placement, TransformState, signed_degrees};

/// Input device behind a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Mouse,
    Touch,
}

/// Where the surface is displayed, in client (CSS) pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl SurfaceRect {
    /// Map client coordinates to surface pixels.
    ///
    /// The displayed size may differ from the surface's pixel size when the
    /// page scales it; a zero display size falls back to 1:1.
    pub fn to_surface(&self, client_x: f32, client_y: f32, surface: (u32, u32)) -> (f32, f32) {
        let ratio = |pixels: u32, displayed: f32| {
            if displayed > 0.0 && displayed.is_finite() {
                pixels as f32 / displayed
            } else {
                1.0
            }
        };
        (
            (client_x - self.left) * ratio(surface.0, self.width),
            (client_y - self.top) * ratio(surface.1, self.height),
        )
    }
}

/// What the host should do after an input event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventResponse {
    /// The composite must be redrawn
    pub redraw: bool,
    /// The platform's default handling (scrolling, text selection) must be
    /// suppressed
    pub prevent_default: bool,
}

impl EventResponse {
    pub const IGNORED: EventResponse = EventResponse {
        redraw: false,
        prevent_default: false,
    };
}

/// Drag state machine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragPhase {
    Idle,
    Dragging,
}

/// Raw slider readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliderValues {
    /// Scale slider, in percent
    pub scale_percent: f32,
    /// Rotation slider, in degrees
    pub rotation_degrees: f32,
}

impl SliderValues {
    pub fn new(scale_percent: f32, rotation_degrees: f32) -> Self {
        Self {
            scale_percent,
            rotation_degrees,
        }
    }

    /// Scale factor the slider stands for.
    pub fn scale(&self) -> f32 {
        self.scale_percent / 100.0
    }
}

/// Applies pointer and slider input to the transform.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ManualFitController {
    sliders: SliderConfig,
}

impl ManualFitController {
    pub fn new(sliders: SliderConfig) -> Self {
        Self { sliders }
    }

    pub fn phase(state: &TransformState) -> DragPhase {
        if state.dragging {
            DragPhase::Dragging
        } else {
            DragPhase::Idle
        }
    }

    /// Slider values shown before any photo is loaded.
    pub fn default_values(&self) -> SliderValues {
        SliderValues::new(self.sliders.scale_default, self.sliders.rotation_default)
    }

    /// Press: enter `Dragging` if a photo is loaded.
    pub fn pointer_down(
        &self,
        state: &mut TransformState,
        photo_loaded: bool,
        pos: (f32, f32),
        kind: PointerKind,
    ) -> EventResponse {
        if !photo_loaded {
            return EventResponse::IGNORED;
        }
        state.start_drag(pos);
        EventResponse {
            redraw: false,
            prevent_default: kind == PointerKind::Touch,
        }
    }

    /// Move: while dragging, move the anchor by the pointer delta.
    pub fn pointer_move(&self, state: &mut TransformState, pos: (f32, f32)) -> EventResponse {
        let Some((dx, dy)) = state.update_drag(pos) else {
            return EventResponse::IGNORED;
        };
        EventResponse {
            redraw: state.translate_by(dx, dy),
            prevent_default: true,
        }
    }

    /// Release, leave or cancel: back to `Idle`.
    pub fn pointer_up(&self, state: &mut TransformState) -> EventResponse {
        state.end_drag();
        EventResponse::IGNORED
    }

    /// Slider change: take scale and rotation from the sliders.
    pub fn apply_sliders(
        &self,
        state: &mut TransformState,
        photo_loaded: bool,
        values: SliderValues,
    ) -> EventResponse {
        if !photo_loaded {
            return EventResponse::IGNORED;
        }
        let placement = Placement {
            scale: values.scale(),
            rotation_degrees: values.rotation_degrees,
            ..state.placement()
        };
        EventResponse {
            redraw: state.apply(placement),
            prevent_default: false,
        }
    }

    /// Slider positions reflecting a placement. The scale is clamped to the
    /// slider's range for display only.
    pub fn display_values(&self, placement: &Placement) -> SliderValues {
        let s = &self.sliders;
        SliderValues::new(
            (placement.scale * 100.0).clamp(s.scale_min, s.scale_max),
            signed_degrees(placement.rotation_degrees).clamp(s.rotation_min, s.rotation_max),
        )
    }
}
