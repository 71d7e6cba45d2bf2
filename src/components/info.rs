//! Property reports shown for a selected layer.

use log::debug;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::{
    components::backends::{DataType, GeoBackend, RasterFile, VectorFile},
    errors::Result,
    geoprocessing::statistics::{BandStatistics, StatisticsAccumulator},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RasterInfo {
    pub file_name: String,
    pub path: PathBuf,
    /// `(width, height)` in pixels.
    pub size: (usize, usize),
    /// Pixel size as `(x, |y|)`, `None` without georeferencing.
    pub resolution: Option<(f64, f64)>,
    pub projection: String,
    pub band_count: usize,
    /// Type of band 1, `None` when there are no bands.
    pub data_type: Option<DataType>,
    /// Mean and variance of each band, `None` for a band without finite samples.
    pub band_statistics: Vec<Option<BandStatistics>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorInfo {
    pub file_name: String,
    pub path: PathBuf,
    /// WKT of the first layer's spatial reference.
    pub spatial_ref: Option<String>,
    pub field_names: Vec<String>,
    pub feature_count: u64,
}

/// Field values of every feature, unset values as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttributeTable {
    pub field_names: Vec<String>,
    /// Feature id of each row, the key for deleting it.
    pub fids: Vec<Option<u64>>,
    pub rows: Vec<Vec<String>>,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn raster_info<B: GeoBackend, P: AsRef<Path>>(backend: &B, path: P) -> Result<RasterInfo> {
    let path = path.as_ref();
    let raster = backend.open_raster(path)?;
    let band_count = raster.band_count();
    let data_type = match band_count {
        0 => None,
        _ => Some(raster.band_type(1)?),
    };
    let band_statistics: Vec<_> = (1..=band_count)
        .map(|index| statistics_of(&raster, index))
        .collect::<Result<_>>()?;
    Ok(RasterInfo {
        file_name: file_name(path),
        path: path.to_path_buf(),
        size: raster.size(),
        resolution: raster.geo_transform().map(|transform| transform.resolution()),
        projection: raster.projection(),
        band_count,
        data_type,
        band_statistics,
    })
}

fn statistics_of<R: RasterFile>(raster: &R, index: usize) -> Result<Option<BandStatistics>> {
    let mut accumulator = StatisticsAccumulator::default();
    accumulator.extend(raster.read_band(index)?.to_f64().iter().copied());
    let statistics = accumulator.finish();
    debug!("band {index} statistics: {statistics:?}");
    Ok(statistics)
}

pub fn vector_info<B: GeoBackend, P: AsRef<Path>>(backend: &B, path: P) -> Result<VectorInfo> {
    let path = path.as_ref();
    let vector = backend.open_vector(path)?;
    Ok(VectorInfo {
        file_name: file_name(path),
        path: path.to_path_buf(),
        spatial_ref: vector.spatial_ref(),
        field_names: vector.fields().iter().map(|field| field.name.clone()).collect(),
        feature_count: vector.feature_count(),
    })
}

pub fn attribute_table<B: GeoBackend, P: AsRef<Path>>(
    backend: &B,
    path: P,
) -> Result<AttributeTable> {
    let path = path.as_ref();
    let mut vector = backend.open_vector(path)?;
    let field_names: Vec<String> = vector.fields().iter().map(|field| field.name.clone()).collect();
    let mut fids = Vec::new();
    let mut rows = Vec::new();
    while let Some(feature) = vector.next_feature()? {
        fids.push(feature.fid);
        let row = field_names
            .iter()
            .map(|name| {
                feature
                    .fields
                    .iter()
                    .find(|(field, _)| field == name)
                    .and_then(|(_, value)| value.clone())
                    .unwrap_or_default()
            })
            .collect();
        rows.push(row);
    }
    debug!("read {} attribute rows from {}", rows.len(), path.display());
    Ok(AttributeTable {
        field_names,
        fids,
        rows,
    })
}
