//! Implementations for gdal

use gdal::{
    cpl::CslStringList,
    raster::{Buffer as GdalBuffer, GdalDataType, GdalType},
    spatial_ref::SpatialRef,
    vector::{
        FieldDefn, FieldValue, LayerAccess, LayerOptions, OGRFieldType, OGRwkbGeometryType,
        OwnedFeatureIterator, ToGdal,
    },
    Dataset as GdalDataset, DatasetOptions, DriverManager, GdalOpenFlags,
};
use gdal_sys::OGRErr;
use log::{debug, warn};
use ndarray::Array2;
use std::path::{Path, PathBuf};

use super::*;
use crate::errors::GeocanvasError;

const RASTER_DRIVER: &str = "GTiff";
const VECTOR_DRIVER: &str = "ESRI Shapefile";

fn data_type_from_gdal(data_type: GdalDataType) -> DataType {
    match data_type {
        GdalDataType::UInt8 => DataType::Byte,
        GdalDataType::UInt16 => DataType::UInt16,
        GdalDataType::Int16 => DataType::Int16,
        GdalDataType::UInt32 => DataType::UInt32,
        GdalDataType::Int32 => DataType::Int32,
        GdalDataType::Float32 => DataType::Float32,
        GdalDataType::Float64 => DataType::Float64,
        _ => DataType::Other,
    }
}

fn field_kind_from_gdal(field_type: OGRFieldType::Type) -> FieldKind {
    match field_type {
        OGRFieldType::OFTInteger => FieldKind::Integer,
        OGRFieldType::OFTInteger64 => FieldKind::Integer64,
        OGRFieldType::OFTReal => FieldKind::Real,
        OGRFieldType::OFTString => FieldKind::String,
        OGRFieldType::OFTDate => FieldKind::Date,
        OGRFieldType::OFTDateTime => FieldKind::DateTime,
        _ => FieldKind::Other,
    }
}

fn field_kind_to_gdal(kind: FieldKind) -> OGRFieldType::Type {
    match kind {
        FieldKind::Integer => OGRFieldType::OFTInteger,
        FieldKind::Integer64 => OGRFieldType::OFTInteger64,
        FieldKind::Real => OGRFieldType::OFTReal,
        FieldKind::Date => OGRFieldType::OFTDate,
        FieldKind::DateTime => OGRFieldType::OFTDateTime,
        FieldKind::String | FieldKind::Other => OGRFieldType::OFTString,
    }
}

fn geometry_kind_to_gdal(kind: GeometryKind) -> OGRwkbGeometryType::Type {
    match kind {
        GeometryKind::Point => OGRwkbGeometryType::wkbPoint,
        GeometryKind::LineString => OGRwkbGeometryType::wkbLineString,
        GeometryKind::Polygon => OGRwkbGeometryType::wkbPolygon,
    }
}

fn open_failure(path: &Path, error: gdal::errors::GdalError) -> GeocanvasError {
    debug!("gdal could not open {}: {error}", path.display());
    GeocanvasError::DatasetOpenFailure(path.to_path_buf())
}

fn read_band_as<T: GdalType + Copy>(dataset: &GdalDataset, index: usize) -> Result<Array2<T>> {
    let (width, height) = dataset.raster_size();
    let buffer = dataset
        .rasterband(index)?
        .read_as::<T>((0, 0), (width, height), (width, height), None)?;
    Ok(Array2::from_shape_vec((height, width), buffer.data().to_vec())?)
}

#[derive(Debug)]
pub struct GdalRasterFile {
    dataset: GdalDataset,
}

impl RasterFile for GdalRasterFile {
    fn size(&self) -> (usize, usize) {
        self.dataset.raster_size()
    }

    fn band_count(&self) -> usize {
        self.dataset.raster_count()
    }

    fn band_type(&self, index: usize) -> Result<DataType> {
        Ok(data_type_from_gdal(self.dataset.rasterband(index)?.band_type()))
    }

    fn read_band(&self, index: usize) -> Result<BandPixels> {
        Ok(match self.band_type(index)? {
            DataType::Byte => BandPixels::Byte(read_band_as::<u8>(&self.dataset, index)?),
            DataType::UInt16 => BandPixels::UInt16(read_band_as::<u16>(&self.dataset, index)?),
            _ => BandPixels::Float(read_band_as::<f64>(&self.dataset, index)?),
        })
    }

    fn geo_transform(&self) -> Option<GeoTransform> {
        self.dataset.geo_transform().ok().map(GeoTransform::from_gdal)
    }

    fn projection(&self) -> String {
        self.dataset.projection()
    }
}

/// First layer of a vector dataset, consumed feature by feature.
pub struct GdalVectorFile {
    extent: Option<[f64; 4]>,
    fields: Vec<FieldDefinition>,
    spatial_ref: Option<String>,
    feature_count: u64,
    features: OwnedFeatureIterator,
}

impl VectorFile for GdalVectorFile {
    fn extent(&self) -> Result<Envelope> {
        let [min_x, min_y, max_x, max_y] = self.extent.unwrap_or([0.; 4]);
        Envelope::new(min_x, min_y, max_x, max_y)
    }

    fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    fn spatial_ref(&self) -> Option<String> {
        self.spatial_ref.clone()
    }

    fn feature_count(&self) -> u64 {
        self.feature_count
    }

    fn next_feature(&mut self) -> Result<Option<RawFeature>> {
        let Some(feature) = (&mut self.features).next() else {
            return Ok(None);
        };
        let mut fields = Vec::with_capacity(self.fields.len());
        for (index, field) in self.fields.iter().enumerate() {
            fields.push((field.name.clone(), feature.field_as_string(index)?));
        }
        let geometry = match feature.geometry() {
            Some(geometry) => Some(geometry.to_geo()?),
            None => None,
        };
        Ok(Some(RawFeature {
            fid: feature.fid(),
            fields,
            geometry,
        }))
    }
}

pub struct GdalRasterSink {
    dataset: GdalDataset,
}

impl RasterSink for GdalRasterSink {
    fn set_geo_transform(&mut self, transform: &GeoTransform) -> Result<()> {
        Ok(self.dataset.set_geo_transform(&transform.to_gdal())?)
    }

    fn set_projection(&mut self, projection: &str) -> Result<()> {
        Ok(self.dataset.set_projection(projection)?)
    }

    fn write_rows(&mut self, index: usize, first_row: usize, rows: &Array2<f64>) -> Result<()> {
        let (height, width) = rows.dim();
        let mut buffer = GdalBuffer::new((width, height), rows.iter().copied().collect());
        let mut band = self.dataset.rasterband(index)?;
        Ok(band.write((0, first_row as isize), (width, height), &mut buffer)?)
    }

    fn finish(mut self) -> Result<()> {
        self.dataset.flush_cache()?;
        Ok(())
    }
}

pub struct GdalVectorSink {
    dataset: GdalDataset,
}

impl VectorSink for GdalVectorSink {
    fn create_field(&mut self, field: &FieldDefinition) -> Result<()> {
        let layer = self.dataset.layer(0)?;
        let definition = FieldDefn::new(&field.name, field_kind_to_gdal(field.kind))?;
        if field.width > 0 {
            definition.set_width(field.width);
        }
        if field.precision > 0 {
            definition.set_precision(field.precision);
        }
        definition
            .add_to_layer(&layer)
            .map_err(|_| GeocanvasError::FieldCreation(field.name.clone()))
    }

    fn append(&mut self, feature: &RawFeature) -> Result<()> {
        let Some(geometry) = &feature.geometry else {
            return Ok(());
        };
        let (names, values): (Vec<&str>, Vec<FieldValue>) = feature
            .fields
            .iter()
            .filter_map(|(name, value)| {
                let value = value.as_ref()?;
                Some((name.as_str(), FieldValue::StringValue(value.clone())))
            })
            .unzip();
        let mut layer = self.dataset.layer(0)?;
        Ok(layer.create_feature_fields(geometry.to_gdal()?, &names, &values)?)
    }

    fn finish(mut self) -> Result<()> {
        self.dataset.flush_cache()?;
        Ok(())
    }
}

/// First layer of a dataset opened with `GDAL_OF_UPDATE`.
pub struct GdalVectorEditor {
    dataset: GdalDataset,
}

impl VectorEditor for GdalVectorEditor {
    fn delete_feature(&mut self, fid: u64) -> Result<()> {
        let id = i64::try_from(fid).map_err(|_| GeocanvasError::FeatureDeletion(fid))?;
        let layer = self.dataset.layer(0)?;
        let status = unsafe { gdal_sys::OGR_L_DeleteFeature(layer.c_layer(), id) };
        if status != OGRErr::OGRERR_NONE {
            debug!("OGR_L_DeleteFeature({fid}) returned {status}");
            return Err(GeocanvasError::FeatureDeletion(fid));
        }
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        self.dataset.flush_cache()?;
        Ok(())
    }
}

/// Data access through the GDAL C library.
#[derive(Debug, Clone, Copy, Default)]
pub struct GdalBackend;

impl GdalBackend {
    fn create_raster_typed<T: GdalType>(
        path: &Path,
        spec: &RasterSpec,
        options: &CslStringList,
    ) -> Result<GdalDataset> {
        let driver = DriverManager::get_driver_by_name(RASTER_DRIVER)?;
        Ok(driver.create_with_band_type_with_options::<T, _>(
            path,
            spec.width,
            spec.height,
            spec.band_count,
            options,
        )?)
    }
}

impl GeoBackend for GdalBackend {
    type Raster = GdalRasterFile;
    type Vector = GdalVectorFile;
    type RasterOut = GdalRasterSink;
    type VectorOut = GdalVectorSink;
    type VectorEdit = GdalVectorEditor;

    fn open_raster<P: AsRef<Path>>(&self, path: P) -> Result<GdalRasterFile> {
        let path = path.as_ref();
        let dataset = GdalDataset::open(path).map_err(|error| open_failure(path, error))?;
        Ok(GdalRasterFile { dataset })
    }

    fn open_vector<P: AsRef<Path>>(&self, path: P) -> Result<GdalVectorFile> {
        let path = path.as_ref();
        let options = DatasetOptions {
            open_flags: GdalOpenFlags::GDAL_OF_VECTOR,
            ..Default::default()
        };
        let dataset =
            GdalDataset::open_ex(path, options).map_err(|error| open_failure(path, error))?;
        let layer = dataset
            .into_layer(0)
            .map_err(|_| GeocanvasError::LayerUnavailable(PathBuf::from(path)))?;

        let extent = layer
            .get_extent()
            .map(|envelope| [envelope.MinX, envelope.MinY, envelope.MaxX, envelope.MaxY])
            .map_err(|error| warn!("extent of {} unavailable: {error}", path.display()))
            .ok();
        let fields = layer
            .defn()
            .fields()
            .map(|field| FieldDefinition {
                name: field.name(),
                kind: field_kind_from_gdal(field.field_type()),
                width: field.width(),
                precision: field.precision(),
            })
            .collect();
        let spatial_ref = layer.spatial_ref().and_then(|srs| srs.to_wkt().ok());
        let feature_count = layer.feature_count();

        Ok(GdalVectorFile {
            extent,
            fields,
            spatial_ref,
            feature_count,
            features: layer.owned_features(),
        })
    }

    fn create_raster<P: AsRef<Path>>(&self, path: P, spec: &RasterSpec) -> Result<GdalRasterSink> {
        let path = path.as_ref();
        let mut options = CslStringList::new();
        for (key, value) in &spec.options {
            options.set_name_value(key, value)?;
        }
        let dataset = match spec.data_type {
            DataType::Byte => Self::create_raster_typed::<u8>(path, spec, &options),
            DataType::UInt16 => Self::create_raster_typed::<u16>(path, spec, &options),
            DataType::Int16 => Self::create_raster_typed::<i16>(path, spec, &options),
            DataType::UInt32 => Self::create_raster_typed::<u32>(path, spec, &options),
            DataType::Int32 => Self::create_raster_typed::<i32>(path, spec, &options),
            DataType::Float32 => Self::create_raster_typed::<f32>(path, spec, &options),
            DataType::Float64 | DataType::Other => {
                Self::create_raster_typed::<f64>(path, spec, &options)
            }
        }?;
        Ok(GdalRasterSink { dataset })
    }

    fn create_vector<P: AsRef<Path>>(&self, path: P, spec: &VectorSpec) -> Result<GdalVectorSink> {
        let driver = DriverManager::get_driver_by_name(VECTOR_DRIVER)?;
        let mut dataset = driver.create_vector_only(path.as_ref())?;
        let srs = match &spec.spatial_ref {
            Some(wkt) => Some(SpatialRef::from_wkt(wkt)?),
            None => None,
        };
        dataset.create_layer(LayerOptions {
            name: &spec.layer_name,
            srs: srs.as_ref(),
            ty: geometry_kind_to_gdal(spec.geometry_kind),
            options: None,
        })?;
        Ok(GdalVectorSink { dataset })
    }

    fn edit_vector<P: AsRef<Path>>(&self, path: P) -> Result<GdalVectorEditor> {
        let path = path.as_ref();
        let options = DatasetOptions {
            open_flags: GdalOpenFlags::GDAL_OF_VECTOR | GdalOpenFlags::GDAL_OF_UPDATE,
            ..Default::default()
        };
        let dataset =
            GdalDataset::open_ex(path, options).map_err(|error| open_failure(path, error))?;
        if dataset.layer(0).is_err() {
            return Err(GeocanvasError::LayerUnavailable(path.to_path_buf()));
        }
        Ok(GdalVectorEditor { dataset })
    }

    fn buffer(
        &self,
        geometry: &geo::Geometry<f64>,
        distance: f64,
        quadrant_segments: u32,
    ) -> Result<Option<geo::Geometry<f64>>> {
        let buffered = geometry.to_gdal()?.buffer(distance, quadrant_segments)?;
        if buffered.is_empty() {
            return Ok(None);
        }
        Ok(Some(collapse_single_part(buffered.to_geo()?)))
    }
}
