use geo::{AffineTransform, Coord, Rect};
use log::debug;

use crate::{components::bounds::ViewportSize, config::EngineConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Left,
    Middle,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cursor {
    #[default]
    Arrow,
    ClosedHand,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PanState {
    #[default]
    Idle,
    /// Dragging, `last` is the previous pointer position.
    Panning { last: Coord },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

/// Emitted whenever the scale changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleChanged {
    pub scale: f64,
}

impl ScaleChanged {
    /// Scale as a truncated percentage.
    pub fn percent(&self) -> i32 {
        (self.scale * 100.).trunc() as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    /// User zoom on top of the fit, kept within the configured bounds.
    pub scale: f64,
    /// View offset of the scene origin.
    pub translation: Coord,
    pub viewport: ViewportSize,
}

/// Zoom and pan over a composed scene.
///
/// Scene coordinates map to view coordinates as
/// `view = scene * fit * scale + translation`.
#[derive(Debug, Clone)]
pub struct ViewportController {
    state: ViewState,
    fit: f64,
    pan: PanState,
    cursor: Cursor,
    zoom_factor: f64,
    min_scale: f64,
    max_scale: f64,
}

impl ViewportController {
    pub fn new(viewport: ViewportSize, config: &EngineConfig) -> Self {
        Self {
            state: ViewState {
                scale: 1.,
                translation: Coord::zero(),
                viewport,
            },
            fit: 1.,
            pan: PanState::Idle,
            cursor: Cursor::Arrow,
            zoom_factor: config.zoom_factor,
            min_scale: config.min_scale,
            max_scale: config.max_scale,
        }
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn pan_state(&self) -> PanState {
        self.pan
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn resize(&mut self, viewport: ViewportSize) {
        self.state.viewport = viewport;
    }

    fn zoom_total(&self) -> f64 {
        self.fit * self.state.scale
    }

    pub fn view_transform(&self) -> AffineTransform {
        let zoom = self.zoom_total();
        let translation = self.state.translation;
        AffineTransform::new(zoom, 0., translation.x, 0., zoom, translation.y)
    }

    pub fn to_view(&self, scene: Coord) -> Coord {
        self.view_transform().apply(scene)
    }

    pub fn to_scene(&self, view: Coord) -> Coord {
        let zoom = self.zoom_total();
        (view - self.state.translation) / zoom
    }

    /// Fits `bounds` into the viewport keeping its aspect ratio, centered,
    /// and resets the scale to 1.
    pub fn fit(&mut self, bounds: Option<Rect<f64>>) -> ScaleChanged {
        let viewport = self.state.viewport;
        self.fit = bounds
            .map(|bounds| {
                [
                    (viewport.width, bounds.width()),
                    (viewport.height, bounds.height()),
                ]
                .into_iter()
                .filter(|(_, extent)| *extent > 0.)
                .map(|(size, extent)| size / extent)
                .fold(f64::INFINITY, f64::min)
            })
            .filter(|fit| fit.is_finite() && *fit > 0.)
            .unwrap_or(1.);
        let center = bounds.map(|bounds| bounds.center()).unwrap_or(Coord::zero());
        self.state.scale = 1.;
        self.state.translation = viewport.center() - center * self.fit;
        debug!("fit view at {} with origin {:?}", self.fit, self.state.translation);
        ScaleChanged { scale: 1. }
    }

    /// One zoom step about `anchor`, in view coordinates.
    ///
    /// Steps that would leave the scale bounds are ignored.
    pub fn zoom(&mut self, direction: ZoomDirection, anchor: Coord) -> Option<ScaleChanged> {
        let current = self.state.scale;
        let scale = match direction {
            ZoomDirection::In => current * self.zoom_factor,
            ZoomDirection::Out => current / self.zoom_factor,
        };
        if !(self.min_scale..=self.max_scale).contains(&scale) {
            debug!("zoom to {scale} out of bounds, ignored");
            return None;
        }
        let ratio = scale / current;
        self.state.translation = anchor - (anchor - self.state.translation) * ratio;
        self.state.scale = scale;
        Some(ScaleChanged { scale })
    }

    pub fn pointer_down(&mut self, button: PointerButton, position: Coord) {
        if button == PointerButton::Left {
            self.pan = PanState::Panning { last: position };
            self.cursor = Cursor::ClosedHand;
        }
    }

    /// Drags the scene along with the pointer while panning.
    ///
    /// Returns the applied delta, `None` when idle.
    pub fn pointer_move(&mut self, position: Coord) -> Option<Coord> {
        let PanState::Panning { last } = self.pan else {
            return None;
        };
        let delta = position - last;
        self.state.translation = self.state.translation + delta;
        self.pan = PanState::Panning { last: position };
        Some(delta)
    }

    pub fn pointer_up(&mut self, button: PointerButton) {
        if button == PointerButton::Left {
            self.pan = PanState::Idle;
            self.cursor = Cursor::Arrow;
        }
    }
}
