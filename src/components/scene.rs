use geo::{coord, Coord, Rect};
use image::{DynamicImage, Rgba};
use itertools::{Itertools, MinMaxResult};
use log::{debug, info, warn};
use std::path::PathBuf;

use crate::{
    components::{
        backends::GeoBackend,
        bounds::{self, ViewportSize},
        layers::{LayerEntry, LayerKind, LayerSnapshot},
        mapper::CoordinateMapper,
        raster::RasterDecoder,
        vector::{Geometry, VectorReader},
    },
    config::EngineConfig,
    errors::Result,
};

/// Drawable item in scene coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    /// Decoded raster, its top left pixel at `origin`.
    Image { origin: Coord, image: DynamicImage },
    Ellipse {
        center: Coord,
        radius: f64,
        color: Option<Rgba<u8>>,
    },
    /// Open polyline.
    Path {
        points: Vec<Coord>,
        color: Option<Rgba<u8>>,
    },
    /// Closed ring, stroked with the layer color and filled translucent.
    Polygon {
        ring: Vec<Coord>,
        stroke: Option<Rgba<u8>>,
        fill: Option<Rgba<u8>>,
    },
}

impl Primitive {
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        match self {
            Primitive::Image { origin, image } => Some(Rect::new(
                *origin,
                coord! {
                    x: origin.x + image.width() as f64,
                    y: origin.y + image.height() as f64,
                },
            )),
            Primitive::Ellipse { center, radius, .. } => Some(Rect::new(
                coord! { x: center.x - radius, y: center.y - radius },
                coord! { x: center.x + radius, y: center.y + radius },
            )),
            Primitive::Path { points, .. } => points_rect(points),
            Primitive::Polygon { ring, .. } => points_rect(ring),
        }
    }
}

fn points_rect(points: &[Coord]) -> Option<Rect<f64>> {
    let span = |result: MinMaxResult<f64>| match result {
        MinMaxResult::NoElements => None,
        MinMaxResult::OneElement(value) => Some((value, value)),
        MinMaxResult::MinMax(min, max) => Some((min, max)),
    };
    let (min_x, max_x) = span(points.iter().map(|point| point.x).minmax_by(f64::total_cmp))?;
    let (min_y, max_y) = span(points.iter().map(|point| point.y).minmax_by(f64::total_cmp))?;
    Some(Rect::new(
        coord! { x: min_x, y: min_y },
        coord! { x: max_x, y: max_y },
    ))
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneItem {
    /// File the primitive was built from.
    pub source: PathBuf,
    pub primitive: Primitive,
}

/// Layer that could not be drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerFailure {
    pub source: PathBuf,
    pub message: String,
}

/// Primitives of every visible layer, bottom layer first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub items: Vec<SceneItem>,
    pub failures: Vec<LayerFailure>,
}

impl Scene {
    /// Bounding rectangle of every item, `None` for an empty scene.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.items
            .iter()
            .filter_map(|item| item.primitive.bounding_rect())
            .reduce(bounds::union)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Builds a [Scene] from scratch out of a [LayerSnapshot].
pub struct SceneComposer<'b, B: GeoBackend> {
    backend: &'b B,
    point_radius: f64,
    polygon_fill_alpha: u8,
}

impl<'b, B: GeoBackend> SceneComposer<'b, B> {
    pub fn new(backend: &'b B, config: &EngineConfig) -> Self {
        Self {
            backend,
            point_radius: config.point_radius,
            polygon_fill_alpha: config.polygon_fill_alpha,
        }
    }

    /// Hidden layers are left out entirely, a layer that fails is
    /// recorded in [Scene::failures] and the rest is still composed.
    pub fn compose(&self, snapshot: &LayerSnapshot, viewport: ViewportSize) -> Scene {
        let mut scene = Scene::default();
        for entry in snapshot.visible() {
            let composed = match entry.kind {
                LayerKind::Raster => self.raster_items(entry),
                LayerKind::Vector => self.vector_items(entry, viewport),
                LayerKind::Unknown => {
                    debug!("nothing to draw for {}", entry.path.display());
                    continue;
                }
            };
            match composed {
                Ok(mut items) => scene.items.append(&mut items),
                Err(error) => {
                    warn!("could not draw {}: {error}", entry.path.display());
                    scene.failures.push(LayerFailure {
                        source: entry.path.clone(),
                        message: error.to_string(),
                    });
                }
            }
        }
        info!(
            "composed {} items from {} layers",
            scene.items.len(),
            snapshot.len()
        );
        scene
    }

    fn raster_items(&self, entry: &LayerEntry) -> Result<Vec<SceneItem>> {
        let image = RasterDecoder::new(self.backend).decode(&entry.path)?;
        Ok(vec![SceneItem {
            source: entry.path.clone(),
            primitive: Primitive::Image {
                origin: Coord::zero(),
                image,
            },
        }])
    }

    fn vector_items(&self, entry: &LayerEntry, viewport: ViewportSize) -> Result<Vec<SceneItem>> {
        let (envelope, features) = VectorReader::new(self.backend).open(&entry.path)?;
        let mapper = CoordinateMapper::new(envelope, viewport);
        let mut items = Vec::new();
        for feature in features {
            let feature = match feature {
                Ok(feature) => feature,
                Err(error) => {
                    warn!("skipping unreadable feature of {}: {error}", entry.path.display());
                    continue;
                }
            };
            items.push(SceneItem {
                source: entry.path.clone(),
                primitive: self.primitive(&mapper, &feature.geometry, entry.color),
            });
        }
        Ok(items)
    }

    fn primitive(
        &self,
        mapper: &CoordinateMapper,
        geometry: &Geometry,
        color: Option<Rgba<u8>>,
    ) -> Primitive {
        match geometry {
            Geometry::Point(point) => Primitive::Ellipse {
                center: mapper.to_view(point.x, point.y),
                radius: self.point_radius,
                color,
            },
            Geometry::LineString(coords) => Primitive::Path {
                points: mapper.map_coords(coords).collect(),
                color,
            },
            Geometry::Polygon(ring) => Primitive::Polygon {
                ring: mapper.map_coords(ring).collect(),
                stroke: color,
                fill: color.map(|Rgba([r, g, b, _])| Rgba([r, g, b, self.polygon_fill_alpha])),
            },
        }
    }
}
