//! In-process datasets keyed by path.
//!
//! Mirrors the behaviour of the GDAL backend closely enough to drive
//! the engine without any file on disk.

use geo::{BoundingRect, Buffer};
use log::debug;
use ndarray::{s, Array2};
use std::{
    cell::RefCell,
    collections::HashMap,
    path::{Path, PathBuf},
    rc::Rc,
};

use super::*;
use crate::{components::bounds, errors::GeocanvasError};

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRaster {
    width: usize,
    height: usize,
    bands: Vec<(DataType, Array2<f64>)>,
    pub geo_transform: Option<GeoTransform>,
    pub projection: String,
}

impl MemoryRaster {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            bands: Vec::new(),
            geo_transform: None,
            projection: String::new(),
        }
    }

    /// Appends a band, `values` shaped `(height, width)`.
    pub fn with_band(mut self, data_type: DataType, values: Array2<f64>) -> Result<Self> {
        if values.dim() != (self.height, self.width) {
            return Err(GeocanvasError::InvalidParameter {
                name: "band shape",
                value: format!("{:?}", values.dim()),
            });
        }
        self.bands.push((data_type, values.mapv(|v| data_type.quantize(v))));
        Ok(self)
    }

    pub fn with_geo_transform(mut self, transform: GeoTransform) -> Self {
        self.geo_transform = Some(transform);
        self
    }

    pub fn with_projection(mut self, projection: impl Into<String>) -> Self {
        self.projection = projection.into();
        self
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Band values and type, indexed from 1.
    pub fn band(&self, index: usize) -> Option<(DataType, &Array2<f64>)> {
        index
            .checked_sub(1)
            .and_then(|idx| self.bands.get(idx))
            .map(|(data_type, values)| (*data_type, values))
    }
}

impl RasterFile for MemoryRaster {
    fn size(&self) -> (usize, usize) {
        MemoryRaster::size(self)
    }

    fn band_count(&self) -> usize {
        MemoryRaster::band_count(self)
    }

    fn band_type(&self, index: usize) -> Result<DataType> {
        self.band(index)
            .map(|(data_type, _)| data_type)
            .ok_or_else(|| missing_band(index))
    }

    fn read_band(&self, index: usize) -> Result<BandPixels> {
        let (data_type, values) = self.band(index).ok_or_else(|| missing_band(index))?;
        Ok(match data_type {
            DataType::Byte => BandPixels::Byte(values.mapv(|v| v as u8)),
            DataType::UInt16 => BandPixels::UInt16(values.mapv(|v| v as u16)),
            _ => BandPixels::Float(values.clone()),
        })
    }

    fn geo_transform(&self) -> Option<GeoTransform> {
        self.geo_transform
    }

    fn projection(&self) -> String {
        self.projection.clone()
    }
}

fn missing_band(index: usize) -> GeocanvasError {
    GeocanvasError::InvalidParameter {
        name: "band index",
        value: index.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryLayer {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
    pub features: Vec<RawFeature>,
    pub spatial_ref: Option<String>,
}

impl MemoryLayer {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDefinition>) -> Self {
        Self {
            name: name.into(),
            fields,
            features: Vec::new(),
            spatial_ref: None,
        }
    }

    pub fn with_spatial_ref(mut self, wkt: impl Into<String>) -> Self {
        self.spatial_ref = Some(wkt.into());
        self
    }

    /// Appends a feature, `values` in field order.
    pub fn with_feature(mut self, values: &[&str], geometry: Option<geo::Geometry<f64>>) -> Self {
        let fields = self
            .fields
            .iter()
            .zip(values.iter().map(|value| Some(value.to_string())))
            .map(|(field, value)| (field.name.clone(), value))
            .collect();
        let fid = Some(self.features.len() as u64);
        self.features.push(RawFeature {
            fid,
            fields,
            geometry,
        });
        self
    }

    fn extent(&self) -> Result<Envelope> {
        let rect = self
            .features
            .iter()
            .filter_map(|feature| feature.geometry.as_ref()?.bounding_rect())
            .reduce(bounds::union);
        match rect {
            Some(rect) => Envelope::from_rect(rect),
            None => Err(GeocanvasError::InvalidExtent {
                min_x: 0.,
                min_y: 0.,
                max_x: 0.,
                max_y: 0.,
            }),
        }
    }
}

/// Reading cursor over a [MemoryLayer].
#[derive(Debug)]
pub struct MemoryVectorFile {
    layer: MemoryLayer,
    cursor: usize,
}

impl VectorFile for MemoryVectorFile {
    fn extent(&self) -> Result<Envelope> {
        self.layer.extent()
    }

    fn fields(&self) -> &[FieldDefinition] {
        &self.layer.fields
    }

    fn spatial_ref(&self) -> Option<String> {
        self.layer.spatial_ref.clone()
    }

    fn feature_count(&self) -> u64 {
        self.layer.features.len() as u64
    }

    fn next_feature(&mut self) -> Result<Option<RawFeature>> {
        let feature = self.layer.features.get(self.cursor).cloned();
        self.cursor += 1;
        Ok(feature)
    }
}

#[derive(Debug, Default)]
struct Store {
    rasters: HashMap<PathBuf, MemoryRaster>,
    vectors: HashMap<PathBuf, Vec<MemoryLayer>>,
}

/// Shared handle on the in-process store, clones see the same datasets.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    store: Rc<RefCell<Store>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_raster<P: AsRef<Path>>(&self, path: P, raster: MemoryRaster) {
        let path = path.as_ref().to_path_buf();
        self.store.borrow_mut().rasters.insert(path, raster);
    }

    /// Registers a vector dataset, possibly without layers.
    pub fn insert_vector<P: AsRef<Path>>(&self, path: P, layers: Vec<MemoryLayer>) {
        let path = path.as_ref().to_path_buf();
        self.store.borrow_mut().vectors.insert(path, layers);
    }

    pub fn raster<P: AsRef<Path>>(&self, path: P) -> Option<MemoryRaster> {
        self.store.borrow().rasters.get(path.as_ref()).cloned()
    }

    /// First layer of the dataset at `path`.
    pub fn vector_layer<P: AsRef<Path>>(&self, path: P) -> Option<MemoryLayer> {
        self.store
            .borrow()
            .vectors
            .get(path.as_ref())
            .and_then(|layers| layers.first().cloned())
    }
}

impl GeoBackend for MemoryBackend {
    type Raster = MemoryRaster;
    type Vector = MemoryVectorFile;
    type RasterOut = MemoryRasterSink;
    type VectorOut = MemoryVectorSink;
    type VectorEdit = MemoryVectorEditor;

    fn open_raster<P: AsRef<Path>>(&self, path: P) -> Result<MemoryRaster> {
        let path = path.as_ref();
        self.raster(path)
            .ok_or_else(|| GeocanvasError::DatasetOpenFailure(path.to_path_buf()))
    }

    fn open_vector<P: AsRef<Path>>(&self, path: P) -> Result<MemoryVectorFile> {
        let path = path.as_ref();
        let store = self.store.borrow();
        let layers = store
            .vectors
            .get(path)
            .ok_or_else(|| GeocanvasError::DatasetOpenFailure(path.to_path_buf()))?;
        let layer = layers
            .first()
            .cloned()
            .ok_or_else(|| GeocanvasError::LayerUnavailable(path.to_path_buf()))?;
        Ok(MemoryVectorFile { layer, cursor: 0 })
    }

    fn create_raster<P: AsRef<Path>>(&self, path: P, spec: &RasterSpec) -> Result<MemoryRasterSink> {
        let bands = (0..spec.band_count)
            .map(|_| (spec.data_type, Array2::zeros((spec.height, spec.width))))
            .collect();
        let raster = MemoryRaster {
            width: spec.width,
            height: spec.height,
            bands,
            geo_transform: None,
            projection: String::new(),
        };
        Ok(MemoryRasterSink {
            store: Rc::clone(&self.store),
            path: path.as_ref().to_path_buf(),
            raster,
        })
    }

    fn create_vector<P: AsRef<Path>>(&self, path: P, spec: &VectorSpec) -> Result<MemoryVectorSink> {
        let mut layer = MemoryLayer::new(spec.layer_name.clone(), Vec::new());
        layer.spatial_ref = spec.spatial_ref.clone();
        Ok(MemoryVectorSink {
            store: Rc::clone(&self.store),
            path: path.as_ref().to_path_buf(),
            layer,
        })
    }

    fn edit_vector<P: AsRef<Path>>(&self, path: P) -> Result<MemoryVectorEditor> {
        let path = path.as_ref();
        let store = self.store.borrow();
        match store.vectors.get(path) {
            Some(layers) if !layers.is_empty() => Ok(MemoryVectorEditor {
                store: Rc::clone(&self.store),
                path: path.to_path_buf(),
            }),
            Some(_) => Err(GeocanvasError::LayerUnavailable(path.to_path_buf())),
            None => Err(GeocanvasError::DatasetOpenFailure(path.to_path_buf())),
        }
    }

    fn buffer(
        &self,
        geometry: &geo::Geometry<f64>,
        distance: f64,
        _quadrant_segments: u32,
    ) -> Result<Option<geo::Geometry<f64>>> {
        let buffered = geometry.buffer(distance);
        if buffered.0.is_empty() {
            return Ok(None);
        }
        Ok(Some(collapse_single_part(geo::Geometry::MultiPolygon(
            buffered,
        ))))
    }
}

/// Raster under construction, registered in the store on [RasterSink::finish].
#[derive(Debug)]
pub struct MemoryRasterSink {
    store: Rc<RefCell<Store>>,
    path: PathBuf,
    raster: MemoryRaster,
}

impl RasterSink for MemoryRasterSink {
    fn set_geo_transform(&mut self, transform: &GeoTransform) -> Result<()> {
        self.raster.geo_transform = Some(*transform);
        Ok(())
    }

    fn set_projection(&mut self, projection: &str) -> Result<()> {
        self.raster.projection = projection.to_string();
        Ok(())
    }

    fn write_rows(&mut self, index: usize, first_row: usize, rows: &Array2<f64>) -> Result<()> {
        let (data_type, band) = index
            .checked_sub(1)
            .and_then(|idx| self.raster.bands.get_mut(idx))
            .ok_or_else(|| missing_band(index))?;
        let data_type = *data_type;
        let last_row = first_row + rows.nrows();
        if last_row > band.nrows() || rows.ncols() != band.ncols() {
            return Err(GeocanvasError::InvalidParameter {
                name: "row window",
                value: format!("{first_row}..{last_row} x {}", rows.ncols()),
            });
        }
        band.slice_mut(s![first_row..last_row, ..])
            .assign(&rows.mapv(|v| data_type.quantize(v)));
        Ok(())
    }

    fn finish(self) -> Result<()> {
        debug!("registering raster {}", self.path.display());
        self.store.borrow_mut().rasters.insert(self.path, self.raster);
        Ok(())
    }
}

/// Layer under construction, registered in the store on [VectorSink::finish].
#[derive(Debug)]
pub struct MemoryVectorSink {
    store: Rc<RefCell<Store>>,
    path: PathBuf,
    layer: MemoryLayer,
}

impl VectorSink for MemoryVectorSink {
    fn create_field(&mut self, field: &FieldDefinition) -> Result<()> {
        if self.layer.fields.iter().any(|existing| existing.name == field.name) {
            return Err(GeocanvasError::FieldCreation(field.name.clone()));
        }
        self.layer.fields.push(field.clone());
        Ok(())
    }

    fn append(&mut self, feature: &RawFeature) -> Result<()> {
        let fields = self
            .layer
            .fields
            .iter()
            .map(|field| {
                let value = feature
                    .fields
                    .iter()
                    .find(|(name, _)| name == &field.name)
                    .and_then(|(_, value)| value.clone());
                (field.name.clone(), value)
            })
            .collect();
        let fid = Some(self.layer.features.len() as u64);
        self.layer.features.push(RawFeature {
            fid,
            fields,
            geometry: feature.geometry.clone(),
        });
        Ok(())
    }

    fn finish(self) -> Result<()> {
        debug!("registering vector {}", self.path.display());
        self.store
            .borrow_mut()
            .vectors
            .insert(self.path, vec![self.layer]);
        Ok(())
    }
}

/// Edits applied straight to the first layer in the store.
#[derive(Debug)]
pub struct MemoryVectorEditor {
    store: Rc<RefCell<Store>>,
    path: PathBuf,
}

impl VectorEditor for MemoryVectorEditor {
    fn delete_feature(&mut self, fid: u64) -> Result<()> {
        let mut store = self.store.borrow_mut();
        let layer = store
            .vectors
            .get_mut(&self.path)
            .and_then(|layers| layers.first_mut())
            .ok_or_else(|| GeocanvasError::LayerUnavailable(self.path.clone()))?;
        let position = layer
            .features
            .iter()
            .position(|feature| feature.fid == Some(fid))
            .ok_or(GeocanvasError::FeatureDeletion(fid))?;
        layer.features.remove(position);
        Ok(())
    }

    fn finish(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, polygon};

    #[test]
    fn missing_datasets_fail_to_open() {
        let backend = MemoryBackend::new();
        assert!(matches!(
            backend.open_raster("nowhere.tif"),
            Err(GeocanvasError::DatasetOpenFailure(_))
        ));
        assert!(matches!(
            backend.open_vector("nowhere.shp"),
            Err(GeocanvasError::DatasetOpenFailure(_))
        ));
    }

    #[test]
    fn vector_without_layers_is_unavailable() {
        let backend = MemoryBackend::new();
        backend.insert_vector("empty.shp", Vec::new());
        assert!(matches!(
            backend.open_vector("empty.shp"),
            Err(GeocanvasError::LayerUnavailable(_))
        ));
    }

    #[test]
    fn bands_are_stored_quantized() {
        let raster = MemoryRaster::new(2, 1)
            .with_band(DataType::Byte, Array2::from_shape_vec((1, 2), vec![12.4, 300.]).unwrap())
            .unwrap();
        assert_eq!(
            raster.read_band(1).unwrap(),
            BandPixels::Byte(Array2::from_shape_vec((1, 2), vec![12, 255]).unwrap())
        );
    }

    #[test]
    fn layer_extent_covers_all_geometries() {
        let layer = MemoryLayer::new("points", Vec::new())
            .with_feature(&[], Some(point!(x: 1., y: 5.).into()))
            .with_feature(&[], None)
            .with_feature(&[], Some(point!(x: 4., y: -2.).into()));
        let envelope = layer.extent().unwrap();
        assert_eq!(envelope.min(), geo::coord! { x: 1., y: -2. });
        assert_eq!(envelope.max(), geo::coord! { x: 4., y: 5. });
    }

    #[test]
    fn deleted_features_leave_the_layer() {
        let backend = MemoryBackend::new();
        let layer = MemoryLayer::new("points", Vec::new())
            .with_feature(&[], Some(point!(x: 0., y: 0.).into()))
            .with_feature(&[], Some(point!(x: 1., y: 1.).into()));
        backend.insert_vector("points.shp", vec![layer]);

        let mut editor = backend.edit_vector("points.shp").unwrap();
        editor.delete_feature(0).unwrap();
        assert!(matches!(
            editor.delete_feature(0),
            Err(GeocanvasError::FeatureDeletion(0))
        ));
        editor.finish().unwrap();
        let features = backend.vector_layer("points.shp").unwrap().features;
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].fid, Some(1));
        assert!(matches!(
            backend.edit_vector("nowhere.shp"),
            Err(GeocanvasError::DatasetOpenFailure(_))
        ));
    }

    #[test]
    fn sinks_register_on_finish() {
        let backend = MemoryBackend::new();
        let spec = VectorSpec {
            layer_name: "out".into(),
            geometry_kind: GeometryKind::Polygon,
            spatial_ref: None,
        };
        let mut sink = backend.create_vector("out.shp", &spec).unwrap();
        sink.create_field(&FieldDefinition::new("name", FieldKind::String))
            .unwrap();
        sink.append(&RawFeature {
            fid: None,
            fields: vec![("name".into(), Some("a".into()))],
            geometry: Some(polygon![(x: 0., y: 0.), (x: 1., y: 0.), (x: 1., y: 1.)].into()),
        })
        .unwrap();
        assert!(backend.vector_layer("out.shp").is_none());
        sink.finish().unwrap();
        assert_eq!(backend.vector_layer("out.shp").unwrap().features.len(), 1);
    }
}
