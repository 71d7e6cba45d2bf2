use geo::Coord;
use log::{debug, info, warn};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, path::PathBuf};

use crate::{
    components::{
        backends::{DataType, GeoBackend, RasterFile, RasterSink, RasterSpec},
        transforms::GridTransformer,
    },
    config::EngineConfig,
    errors::{GeocanvasError, Result},
    geoprocessing::statistics::{BandStatistics, StatisticsAccumulator},
};

/// Keys cubic convolution parameter.
const CUBIC_A: f64 = -0.5;

/// Interpolation kernel of a resample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResampleKernel {
    Nearest,
    Bilinear,
    Cubic,
}

impl fmt::Display for ResampleKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResampleKernel::Nearest => "nearest",
            ResampleKernel::Bilinear => "bilinear",
            ResampleKernel::Cubic => "cubic",
        };
        f.write_str(name)
    }
}

/// Band value at `(col, row)`, clamped onto the band edges.
fn clamped(band: &Array2<f64>, col: isize, row: isize) -> f64 {
    let (rows, cols) = band.dim();
    let row = row.clamp(0, rows as isize - 1) as usize;
    let col = col.clamp(0, cols as isize - 1) as usize;
    band[[row, col]]
}

fn cubic_weight(distance: f64) -> f64 {
    let t = distance.abs();
    if t <= 1. {
        ((CUBIC_A + 2.) * t - (CUBIC_A + 3.)) * t * t + 1.
    } else if t < 2. {
        ((CUBIC_A * t - 5. * CUBIC_A) * t + 8. * CUBIC_A) * t - 4. * CUBIC_A
    } else {
        0.
    }
}

impl ResampleKernel {
    /// Interpolated value at `position`, in source pixel coordinates
    /// where pixel `(i, j)` covers `[i, i + 1) x [j, j + 1)`.
    pub fn sample(&self, band: &Array2<f64>, position: Coord) -> f64 {
        match self {
            ResampleKernel::Nearest => clamped(
                band,
                position.x.floor() as isize,
                position.y.floor() as isize,
            ),
            ResampleKernel::Bilinear => {
                let (x, y) = (position.x - 0.5, position.y - 0.5);
                let (x0, y0) = (x.floor(), y.floor());
                let (tx, ty) = (x - x0, y - y0);
                let (col, row) = (x0 as isize, y0 as isize);
                let top = clamped(band, col, row) * (1. - tx) + clamped(band, col + 1, row) * tx;
                let bottom =
                    clamped(band, col, row + 1) * (1. - tx) + clamped(band, col + 1, row + 1) * tx;
                top * (1. - ty) + bottom * ty
            }
            ResampleKernel::Cubic => {
                let (x, y) = (position.x - 0.5, position.y - 0.5);
                let (x0, y0) = (x.floor(), y.floor());
                let (tx, ty) = (x - x0, y - y0);
                let (col, row) = (x0 as isize, y0 as isize);
                let mut value = 0.;
                for j in -1..=2 {
                    let weight_y = cubic_weight(ty - j as f64);
                    for i in -1..=2 {
                        value += weight_y
                            * cubic_weight(tx - i as f64)
                            * clamped(band, col + i, row + j);
                    }
                }
                value
            }
        }
    }
}

/// `floor(width * scale) x floor(height * scale)`.
pub fn target_size(width: usize, height: usize, scale_factor: f64) -> Result<(usize, usize)> {
    if !scale_factor.is_finite() || scale_factor <= 0. {
        return Err(GeocanvasError::InvalidParameter {
            name: "scale factor",
            value: scale_factor.to_string(),
        });
    }
    let size = (
        (width as f64 * scale_factor).floor() as usize,
        (height as f64 * scale_factor).floor() as usize,
    );
    if size.0 == 0 || size.1 == 0 {
        return Err(GeocanvasError::InvalidParameter {
            name: "target size",
            value: format!("{}x{}", size.0, size.1),
        });
    }
    Ok(size)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResampleReport {
    pub output: PathBuf,
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub data_type: DataType,
    /// Per band, `None` where no statistics could be computed.
    pub statistics: Vec<Option<BandStatistics>>,
}

pub(crate) fn resample<B: GeoBackend>(
    backend: &B,
    input: &Path,
    output: &Path,
    kernel: ResampleKernel,
    scale_factor: f64,
    config: &EngineConfig,
) -> Result<ResampleReport> {
    let source = backend.open_raster(input)?;
    let (source_width, source_height) = source.size();
    let (width, height) = target_size(source_width, source_height, scale_factor)?;
    let band_count = source.band_count();
    if band_count == 0 {
        return Err(GeocanvasError::UnsupportedRasterEncoding(format!(
            "{} has no bands",
            input.display()
        )));
    }
    let data_type = source.band_type(1)?;
    info!(
        "resampling {} from {source_width}x{source_height} to {width}x{height} {data_type} with {kernel}",
        input.display()
    );

    let source_transform = source.geo_transform();
    let grid = source_transform.unwrap_or_default();
    let destination_transform = grid.rescaled(scale_factor);
    let transformer = GridTransformer::new(&destination_transform, &grid)?;

    let bands = (1..=band_count)
        .map(|index| Ok(source.read_band(index)?.to_f64()))
        .collect::<Result<Vec<_>>>()?;

    let spec = RasterSpec {
        width,
        height,
        band_count,
        data_type,
        options: config.geotiff_options.clone(),
    };
    let mut sink = backend.create_raster(output, &spec)?;
    if source_transform.is_some() {
        sink.set_geo_transform(&destination_transform)?;
    }
    let projection = source.projection();
    if !projection.is_empty() {
        sink.set_projection(&projection)?;
    }

    let mut accumulators = vec![StatisticsAccumulator::default(); band_count];
    let chunk_rows = config.resample_chunk_rows.max(1);
    for first_row in (0..height).step_by(chunk_rows) {
        let rows = chunk_rows.min(height - first_row);
        for (idx, band) in bands.iter().enumerate() {
            let chunk = Array2::from_shape_fn((rows, width), |(row, col)| {
                let position = transformer.source_position(col, first_row + row);
                data_type.quantize(kernel.sample(band, position))
            });
            accumulators[idx].extend(chunk.iter().copied());
            sink.write_rows(idx + 1, first_row, &chunk)?;
        }
        debug!("resampled rows {first_row}..{}", first_row + rows);
    }
    sink.finish()?;

    let statistics = accumulators
        .iter()
        .enumerate()
        .map(|(idx, accumulator)| {
            let statistics = accumulator.finish();
            match &statistics {
                Some(statistics) => info!("band {} statistics {statistics:?}", idx + 1),
                None => warn!("{}", GeocanvasError::StatisticsFailure(idx + 1)),
            }
            statistics
        })
        .collect();

    info!("resampled raster written to {}", output.display());
    Ok(ResampleReport {
        output: output.to_path_buf(),
        width,
        height,
        band_count,
        data_type,
        statistics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{
        backends::memory_backend::{MemoryBackend, MemoryRaster},
        transforms::GeoTransform,
    };
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn gradient(width: usize, height: usize) -> Array2<f64> {
        Array2::from_shape_fn((height, width), |(row, col)| (row * width + col) as f64)
    }

    #[rstest]
    #[case(200, 100, 0.5, (100, 50))]
    #[case(7, 3, 1.5, (10, 4))]
    #[case(10, 10, 0.35, (3, 3))]
    fn target_size_is_floored(
        #[case] width: usize,
        #[case] height: usize,
        #[case] scale: f64,
        #[case] expected: (usize, usize),
    ) {
        assert_eq!(target_size(width, height, scale).unwrap(), expected);
    }

    #[rstest]
    #[case(0.)]
    #[case(-1.)]
    #[case(f64::NAN)]
    #[case(0.01)]
    fn invalid_scales_are_rejected(#[case] scale: f64) {
        assert!(matches!(
            target_size(10, 10, scale),
            Err(GeocanvasError::InvalidParameter { .. })
        ));
    }

    #[rstest]
    fn unit_scale_reproduces_source(
        #[values(ResampleKernel::Nearest, ResampleKernel::Bilinear, ResampleKernel::Cubic)]
        kernel: ResampleKernel,
    ) {
        let band = gradient(5, 4);
        for row in 0..4 {
            for col in 0..5 {
                let center = Coord {
                    x: col as f64 + 0.5,
                    y: row as f64 + 0.5,
                };
                assert_relative_eq!(kernel.sample(&band, center), band[[row, col]], epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn bilinear_interpolates_between_centers() {
        let band = Array2::from_shape_vec((1, 2), vec![0., 10.]).unwrap();
        let value = ResampleKernel::Bilinear.sample(&band, Coord { x: 1., y: 0.5 });
        assert_relative_eq!(value, 5.);
    }

    #[test]
    fn cubic_weights_sum_to_one() {
        for step in 0..10 {
            let t = step as f64 / 10.;
            let sum: f64 = (-1..=2).map(|i| cubic_weight(t - i as f64)).sum();
            assert_relative_eq!(sum, 1., epsilon = 1e-12);
        }
    }

    #[test_log::test]
    fn chunks_cover_every_row() {
        let backend = MemoryBackend::new();
        let raster = MemoryRaster::new(6, 9)
            .with_band(DataType::Float64, gradient(6, 9))
            .unwrap();
        backend.insert_raster("in.tif", raster);
        let config = EngineConfig {
            resample_chunk_rows: 4,
            ..Default::default()
        };

        let report = resample(
            &backend,
            Path::new("in.tif"),
            Path::new("out.tif"),
            ResampleKernel::Nearest,
            1.,
            &config,
        )
        .unwrap();
        let output = backend.raster("out.tif").unwrap();
        assert_eq!(output.band(1).unwrap().1, &gradient(6, 9));
        assert_eq!(output.geo_transform, None);

        let statistics = report.statistics[0].unwrap();
        assert_eq!((statistics.min, statistics.max), (0., 53.));
        assert_relative_eq!(statistics.mean, 26.5);
    }

    #[test]
    fn upsampled_bytes_stay_in_range() {
        let backend = MemoryBackend::new();
        let band = Array2::from_shape_vec((2, 2), vec![0., 255., 255., 0.]).unwrap();
        let raster = MemoryRaster::new(2, 2)
            .with_band(DataType::Byte, band)
            .unwrap()
            .with_geo_transform(GeoTransform::from_gdal([0., 1., 0., 2., 0., -1.]))
            .with_projection("EPSG:4326");
        backend.insert_raster("in.tif", raster);

        let report = resample(
            &backend,
            Path::new("in.tif"),
            Path::new("out.tif"),
            ResampleKernel::Cubic,
            4.,
            &EngineConfig::default(),
        )
        .unwrap();
        assert_eq!((report.width, report.height), (8, 8));
        let output = backend.raster("out.tif").unwrap();
        let (data_type, values) = output.band(1).unwrap();
        assert_eq!(data_type, DataType::Byte);
        assert!(values.iter().all(|v| (0. ..=255.).contains(v) && v.fract() == 0.));
        assert_eq!(
            output.geo_transform.unwrap().to_gdal(),
            [0., 0.25, 0., 2., 0., -0.25]
        );
        assert_eq!(output.projection, "EPSG:4326");
    }

    #[test]
    fn singular_transform_aborts_before_writing() {
        let backend = MemoryBackend::new();
        let raster = MemoryRaster::new(2, 2)
            .with_band(DataType::Byte, Array2::zeros((2, 2)))
            .unwrap()
            .with_geo_transform(GeoTransform::from_gdal([0., 0., 0., 0., 0., 0.]));
        backend.insert_raster("in.tif", raster);

        let result = resample(
            &backend,
            Path::new("in.tif"),
            Path::new("out.tif"),
            ResampleKernel::Nearest,
            0.5,
            &EngineConfig::default(),
        );
        assert!(matches!(
            result,
            Err(GeocanvasError::TransformerInitFailure(_))
        ));
        assert!(backend.raster("out.tif").is_none());
    }
}
