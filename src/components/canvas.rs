use geo::Coord;
use log::info;

use crate::{
    components::{
        backends::GeoBackend,
        bounds::ViewportSize,
        layers::LayerSnapshot,
        scene::{Scene, SceneComposer},
        viewport::{PointerButton, ScaleChanged, ViewportController, ZoomDirection},
    },
    config::EngineConfig,
};

/// Composed scene of the current layers and the view over it.
///
/// The scene is rebuilt from scratch on every [MapCanvas::update_layers].
pub struct MapCanvas<B: GeoBackend> {
    backend: B,
    config: EngineConfig,
    viewport: ViewportController,
    snapshot: LayerSnapshot,
    scene: Scene,
}

impl<B: GeoBackend> MapCanvas<B> {
    pub fn new(backend: B, config: EngineConfig, size: ViewportSize) -> Self {
        let viewport = ViewportController::new(size, &config);
        Self {
            backend,
            config,
            viewport,
            snapshot: LayerSnapshot::default(),
            scene: Scene::default(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn snapshot(&self) -> &LayerSnapshot {
        &self.snapshot
    }

    pub fn viewport(&self) -> &ViewportController {
        &self.viewport
    }

    /// Replaces the scene with one composed from `snapshot` and fits it.
    pub fn update_layers(&mut self, snapshot: &LayerSnapshot) -> ScaleChanged {
        let composer = SceneComposer::new(&self.backend, &self.config);
        self.scene = composer.compose(snapshot, self.viewport.state().viewport);
        self.snapshot = snapshot.clone();
        info!(
            "canvas shows {} items, {} layers failed",
            self.scene.items.len(),
            self.scene.failures.len()
        );
        self.viewport.fit(self.scene.bounds())
    }

    /// Resizing recomposes, vector shapes are mapped onto the viewport size.
    pub fn resize(&mut self, size: ViewportSize) -> ScaleChanged {
        self.viewport.resize(size);
        let snapshot = std::mem::take(&mut self.snapshot);
        self.update_layers(&snapshot)
    }

    pub fn zoom(&mut self, direction: ZoomDirection, anchor: Coord) -> Option<ScaleChanged> {
        self.viewport.zoom(direction, anchor)
    }

    pub fn pointer_down(&mut self, button: PointerButton, position: Coord) {
        self.viewport.pointer_down(button, position)
    }

    pub fn pointer_move(&mut self, position: Coord) -> Option<Coord> {
        self.viewport.pointer_move(position)
    }

    pub fn pointer_up(&mut self, button: PointerButton) {
        self.viewport.pointer_up(button)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{
        backends::{
            memory_backend::{MemoryBackend, MemoryRaster},
            DataType,
        },
        layers::LayerList,
    };
    use geo::coord;
    use ndarray::Array2;

    #[test]
    fn update_fits_scene_and_resets_zoom() {
        let backend = MemoryBackend::new();
        let raster = MemoryRaster::new(40, 20)
            .with_band(DataType::Byte, Array2::zeros((20, 40)))
            .unwrap();
        backend.insert_raster("base.tif", raster);
        let mut canvas = MapCanvas::new(
            backend,
            EngineConfig::default(),
            ViewportSize::new(80., 80.),
        );
        let list = LayerList::new();
        let snapshot = list.add(canvas.backend(), "base.tif");

        canvas.zoom(ZoomDirection::In, Coord::zero()).unwrap();
        let changed = canvas.update_layers(&snapshot);
        assert_eq!(changed.percent(), 100);
        assert_eq!(canvas.scene().items.len(), 1);
        assert_eq!(canvas.viewport().to_view(coord! { x: 0., y: 0. }), coord! { x: 0., y: 20. });
        assert_eq!(canvas.viewport().to_view(coord! { x: 40., y: 20. }), coord! { x: 80., y: 60. });

        canvas.resize(ViewportSize::new(40., 40.));
        assert_eq!(canvas.snapshot(), &snapshot);
        assert_eq!(canvas.viewport().to_view(coord! { x: 40., y: 20. }), coord! { x: 40., y: 30. });
    }
}
