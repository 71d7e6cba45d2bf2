use geo::Coord;
use image::Rgba;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::{
    components::{
        backends::{collapse_single_part, GeoBackend, RawFeature, VectorFile},
        bounds::Envelope,
    },
    errors::Result,
};

/// Geometry as drawn on the canvas, polygons keep their exterior ring only.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Coord),
    LineString(Vec<Coord>),
    Polygon(Vec<Coord>),
}

impl Geometry {
    /// `None` for geometries the canvas does not draw.
    pub fn from_geo(geometry: geo::Geometry<f64>) -> Option<Self> {
        match collapse_single_part(geometry) {
            geo::Geometry::Point(point) => Some(Geometry::Point(point.0)),
            geo::Geometry::Line(line) => Some(Geometry::LineString(vec![line.start, line.end])),
            geo::Geometry::LineString(line) => Some(Geometry::LineString(line.0)),
            geo::Geometry::Polygon(polygon) => {
                let (exterior, _) = polygon.into_inner();
                Some(Geometry::Polygon(exterior.0))
            }
            _ => None,
        }
    }

    pub fn coords(&self) -> &[Coord] {
        match self {
            Geometry::Point(coord) => std::slice::from_ref(coord),
            Geometry::LineString(coords) | Geometry::Polygon(coords) => coords,
        }
    }
}

/// Geometry type of a vector layer, decides its display color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VectorKind {
    Point,
    LineString,
    Polygon,
    Other,
}

impl VectorKind {
    pub fn of(geometry: &geo::Geometry<f64>) -> Self {
        match geometry {
            geo::Geometry::Point(_) => VectorKind::Point,
            geo::Geometry::Line(_) | geo::Geometry::LineString(_) => VectorKind::LineString,
            geo::Geometry::Polygon(_) => VectorKind::Polygon,
            _ => VectorKind::Other,
        }
    }

    pub fn color(&self) -> Rgba<u8> {
        match self {
            VectorKind::Point => Rgba([255, 0, 0, 255]),
            VectorKind::LineString => Rgba([0, 0, 255, 255]),
            VectorKind::Polygon => Rgba([0, 255, 0, 255]),
            VectorKind::Other => Rgba([160, 160, 164, 255]),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Field values in schema order, unset values are empty.
    pub fields: Vec<(String, String)>,
    pub geometry: Geometry,
}

impl Feature {
    fn from_raw(raw: RawFeature) -> Option<Self> {
        let fid = raw.fid;
        let Some(geometry) = raw.geometry else {
            debug!("skipping feature {fid:?} without geometry");
            return None;
        };
        let Some(geometry) = Geometry::from_geo(geometry) else {
            debug!("skipping feature {fid:?} with an undrawable geometry");
            return None;
        };
        let fields = raw
            .fields
            .into_iter()
            .map(|(name, value)| (name, value.unwrap_or_default()))
            .collect();
        Some(Self { fields, geometry })
    }
}

/// Features of a layer, read one at a time.
///
/// Features without a drawable geometry are skipped. Once exhausted the
/// sequence cannot be restarted, open the dataset again instead.
pub struct Features<V: VectorFile> {
    file: V,
    path: PathBuf,
    done: bool,
}

impl<V: VectorFile> Iterator for Features<V> {
    type Item = Result<Feature>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.file.next_feature() {
                Ok(Some(raw)) => {
                    if let Some(feature) = Feature::from_raw(raw) {
                        return Some(Ok(feature));
                    }
                }
                Ok(None) => {
                    debug!("finished reading {}", self.path.display());
                    self.done = true;
                }
                Err(error) => return Some(Err(error)),
            }
        }
        None
    }
}

#[derive(Debug)]
pub struct VectorReader<'b, B: GeoBackend> {
    backend: &'b B,
}

impl<'b, B: GeoBackend> VectorReader<'b, B> {
    pub fn new(backend: &'b B) -> Self {
        Self { backend }
    }

    /// Extent of the first layer and its features.
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<(Envelope, Features<B::Vector>)> {
        let path = path.as_ref();
        let file = self.backend.open_vector(path)?;
        let envelope = file.extent()?;
        info!(
            "opened {} with {} features in {:?}",
            path.display(),
            file.feature_count(),
            envelope
        );
        let features = Features {
            file,
            path: path.to_path_buf(),
            done: false,
        };
        Ok((envelope, features))
    }

    /// Kind of the first feature's geometry.
    ///
    /// `None` when the layer is empty or its first feature has no geometry.
    pub fn classify<P: AsRef<Path>>(&self, path: P) -> Result<Option<VectorKind>> {
        let path = path.as_ref();
        let mut file = self.backend.open_vector(path)?;
        let kind = file
            .next_feature()?
            .and_then(|feature| feature.geometry)
            .map(|geometry| VectorKind::of(&collapse_single_part(geometry)));
        match kind {
            Some(kind) => debug!("{} classified as {kind:?}", path.display()),
            None => warn!("{} has no geometry to classify", path.display()),
        }
        Ok(kind)
    }
}
