//! Access to the geospatial data layer.
//!
//! Every handle is an owned value released on drop, so a failing
//! operation never leaks an open dataset.

#[cfg(feature = "gdal")]
pub mod gdal_backend;
pub mod memory_backend;

use ndarray::Array2;
use num_traits::{AsPrimitive, Bounded};
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path};

use crate::{
    components::{bounds::Envelope, transforms::GeoTransform},
    errors::Result,
};

/// Sample type of a raster band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Byte,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
    Other,
}

impl DataType {
    /// Representable range of integer types, `None` for floating point.
    fn integer_range(&self) -> Option<(f64, f64)> {
        match self {
            DataType::Byte => Some(range_of::<u8>()),
            DataType::UInt16 => Some(range_of::<u16>()),
            DataType::Int16 => Some(range_of::<i16>()),
            DataType::UInt32 => Some(range_of::<u32>()),
            DataType::Int32 => Some(range_of::<i32>()),
            DataType::Float32 | DataType::Float64 | DataType::Other => None,
        }
    }

    /// Value as it will be stored in a band of this type.
    ///
    /// Integer types round to nearest and saturate, `Float32` loses precision.
    pub fn quantize(&self, value: f64) -> f64 {
        match (self, self.integer_range()) {
            (_, Some((min, max))) if value.is_nan() => min.max(0.).min(max),
            (_, Some((min, max))) => value.round().clamp(min, max),
            (DataType::Float32, None) => value as f32 as f64,
            _ => value,
        }
    }
}

fn range_of<T: Bounded + AsPrimitive<f64>>() -> (f64, f64) {
    (T::min_value().as_(), T::max_value().as_())
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Byte => "Byte",
            DataType::UInt16 => "UInt16",
            DataType::Int16 => "Int16",
            DataType::UInt32 => "UInt32",
            DataType::Int32 => "Int32",
            DataType::Float32 => "Float32",
            DataType::Float64 => "Float64",
            DataType::Other => "Unknown",
        };
        f.write_str(name)
    }
}

/// Pixels of one band, shaped `(rows, cols)`.
///
/// Byte and UInt16 bands are read in their native type,
/// every other type is widened to `f64`.
#[derive(Debug, Clone, PartialEq)]
pub enum BandPixels {
    Byte(Array2<u8>),
    UInt16(Array2<u16>),
    Float(Array2<f64>),
}

impl BandPixels {
    pub fn to_f64(&self) -> Array2<f64> {
        match self {
            BandPixels::Byte(array) => array.mapv(f64::from),
            BandPixels::UInt16(array) => array.mapv(f64::from),
            BandPixels::Float(array) => array.clone(),
        }
    }
}

pub trait RasterFile {
    /// `(width, height)` in pixels.
    fn size(&self) -> (usize, usize);
    fn band_count(&self) -> usize;
    /// Bands are indexed from 1.
    fn band_type(&self, index: usize) -> Result<DataType>;
    fn read_band(&self, index: usize) -> Result<BandPixels>;
    /// `None` when the dataset carries no georeferencing.
    fn geo_transform(&self) -> Option<GeoTransform>;
    fn projection(&self) -> String;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RasterSpec {
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub data_type: DataType,
    pub options: Vec<(String, String)>,
}

pub trait RasterSink {
    fn set_geo_transform(&mut self, transform: &GeoTransform) -> Result<()>;
    fn set_projection(&mut self, projection: &str) -> Result<()>;
    /// Writes `rows` into band `index` starting at row `first_row`.
    fn write_rows(&mut self, index: usize, first_row: usize, rows: &Array2<f64>) -> Result<()>;
    fn finish(self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Integer,
    Integer64,
    Real,
    String,
    Date,
    DateTime,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub kind: FieldKind,
    pub width: i32,
    pub precision: i32,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            width: 0,
            precision: 0,
        }
    }
}

/// Feature as handed out by the data layer.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFeature {
    pub fid: Option<u64>,
    /// Field values in schema order, `None` when unset.
    pub fields: Vec<(String, Option<String>)>,
    pub geometry: Option<geo::Geometry<f64>>,
}

/// First layer of an opened vector dataset.
pub trait VectorFile {
    fn extent(&self) -> Result<Envelope>;
    fn fields(&self) -> &[FieldDefinition];
    /// Spatial reference as WKT.
    fn spatial_ref(&self) -> Option<String>;
    fn feature_count(&self) -> u64;
    /// Next feature of the layer, `None` once exhausted.
    fn next_feature(&mut self) -> Result<Option<RawFeature>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorSpec {
    pub layer_name: String,
    pub geometry_kind: GeometryKind,
    pub spatial_ref: Option<String>,
}

pub trait VectorSink {
    fn create_field(&mut self, field: &FieldDefinition) -> Result<()>;
    fn append(&mut self, feature: &RawFeature) -> Result<()>;
    fn finish(self) -> Result<()>;
}

/// First layer of a vector dataset opened for update.
pub trait VectorEditor {
    /// Removes feature `fid`, failing when the layer has no such feature.
    fn delete_feature(&mut self, fid: u64) -> Result<()>;
    fn finish(self) -> Result<()>;
}

pub trait GeoBackend {
    type Raster: RasterFile;
    type Vector: VectorFile;
    type RasterOut: RasterSink;
    type VectorOut: VectorSink;
    type VectorEdit: VectorEditor;

    fn open_raster<P: AsRef<Path>>(&self, path: P) -> Result<Self::Raster>;
    /// Opens the dataset and selects its first layer.
    fn open_vector<P: AsRef<Path>>(&self, path: P) -> Result<Self::Vector>;
    fn create_raster<P: AsRef<Path>>(&self, path: P, spec: &RasterSpec) -> Result<Self::RasterOut>;
    fn create_vector<P: AsRef<Path>>(&self, path: P, spec: &VectorSpec) -> Result<Self::VectorOut>;
    fn edit_vector<P: AsRef<Path>>(&self, path: P) -> Result<Self::VectorEdit>;
    /// Polygon covering every point within `distance` of `geometry`,
    /// `None` when the data layer yields no geometry.
    fn buffer(
        &self,
        geometry: &geo::Geometry<f64>,
        distance: f64,
        quadrant_segments: u32,
    ) -> Result<Option<geo::Geometry<f64>>>;
}

/// Single part multi geometries collapse into their only member.
pub(crate) fn collapse_single_part(geometry: geo::Geometry<f64>) -> geo::Geometry<f64> {
    match geometry {
        geo::Geometry::MultiPolygon(mut multi) if multi.0.len() == 1 => {
            geo::Geometry::Polygon(multi.0.remove(0))
        }
        geo::Geometry::MultiLineString(mut multi) if multi.0.len() == 1 => {
            geo::Geometry::LineString(multi.0.remove(0))
        }
        geo::Geometry::MultiPoint(mut multi) if multi.0.len() == 1 => {
            geo::Geometry::Point(multi.0.remove(0))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use rstest::rstest;

    #[rstest]
    #[case(DataType::Byte, 254.6, 255.)]
    #[case(DataType::Byte, 300., 255.)]
    #[case(DataType::Byte, -4., 0.)]
    #[case(DataType::UInt16, 70_000., 65_535.)]
    #[case(DataType::Int16, -40_000., -32_768.)]
    #[case(DataType::Float64, 0.125, 0.125)]
    fn quantize_rounds_and_saturates(
        #[case] data_type: DataType,
        #[case] value: f64,
        #[case] expected: f64,
    ) {
        assert_eq!(data_type.quantize(value), expected);
    }

    #[test]
    fn single_polygon_collapses() {
        let polygon = polygon![(x: 0., y: 0.), (x: 1., y: 0.), (x: 1., y: 1.)];
        let multi = geo::Geometry::MultiPolygon(geo::MultiPolygon(vec![polygon.clone()]));
        assert_eq!(collapse_single_part(multi), geo::Geometry::Polygon(polygon));
    }
}
