#![cfg(feature = "gdal")]

use geo::{polygon, BoundingRect};
use geocanvas::{
    components::{
        backends::{
            DataType, FieldDefinition, FieldKind, GeoBackend, GeometryKind, RasterFile,
            RasterSink, RasterSpec, RawFeature, VectorFile, VectorSink, VectorSpec,
        },
        delete_features, info, VectorKind,
    },
    EngineConfig, GdalBackend, GeocanvasError, GeoprocessingEngine, RasterDecoder,
    ResampleKernel, VectorReader,
};
use ndarray::Array2;
use std::path::Path;
use tempfile::tempdir;

fn write_raster(path: &Path, data_type: DataType, bands: &[Array2<f64>]) {
    let (height, width) = bands[0].dim();
    let spec = RasterSpec {
        width,
        height,
        band_count: bands.len(),
        data_type,
        options: EngineConfig::default().geotiff_options,
    };
    let mut sink = GdalBackend.create_raster(path, &spec).unwrap();
    sink.set_geo_transform(&geocanvas::components::transforms::GeoTransform::from_gdal([
        500_000., 10., 0., 4_600_000., 0., -10.,
    ]))
    .unwrap();
    for (idx, band) in bands.iter().enumerate() {
        sink.write_rows(idx + 1, 0, band).unwrap();
    }
    sink.finish().unwrap();
}

fn write_polygons(path: &Path) {
    let spec = VectorSpec {
        layer_name: "parcels".into(),
        geometry_kind: GeometryKind::Polygon,
        spatial_ref: None,
    };
    let mut sink = GdalBackend.create_vector(path, &spec).unwrap();
    sink.create_field(&FieldDefinition::new("parcel", FieldKind::String))
        .unwrap();
    sink.append(&RawFeature {
        fid: None,
        fields: vec![("parcel".into(), Some("P-17".into()))],
        geometry: Some(
            polygon![
                (x: 0., y: 0.),
                (x: 10_000., y: 0.),
                (x: 10_000., y: 10_000.),
                (x: 0., y: 10_000.),
            ]
            .into(),
        ),
    })
    .unwrap();
    sink.finish().unwrap();
}

#[test_log::test]
fn geotiff_round_trip_decodes_rgb() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rgb.tif");
    let bands: Vec<_> = (0..3)
        .map(|offset| Array2::from_shape_fn((20, 30), |(row, col)| ((row + col + offset) % 256) as f64))
        .collect();
    write_raster(&path, DataType::Byte, &bands);

    let image = RasterDecoder::new(&GdalBackend).decode(&path).unwrap();
    let rgb = image.as_rgb8().unwrap();
    assert_eq!(rgb.dimensions(), (30, 20));
    assert_eq!(rgb.get_pixel(4, 3).0, [7, 8, 9]);

    let info = info::raster_info(&GdalBackend, &path).unwrap();
    assert_eq!(info.band_count, 3);
    assert_eq!(info.data_type, Some(DataType::Byte));
    assert_eq!(info.resolution, Some((10., 10.)));
    let first = info.band_statistics[0].unwrap();
    assert_eq!((first.min, first.max), (0., 48.));
    assert!(info.band_statistics.iter().all(Option::is_some));
}

#[test_log::test]
fn geotiff_resample_halves_the_grid() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dem.tif");
    let band = Array2::from_shape_fn((40, 60), |(row, col)| (row * 60 + col) as f64);
    write_raster(&path, DataType::UInt16, &[band]);

    let engine = GeoprocessingEngine::new(GdalBackend, EngineConfig::default());
    let report = engine
        .resample(&path, ResampleKernel::Bilinear, 0.5)
        .unwrap();
    assert_eq!(report.output, dir.path().join("dem_bilinear_x0.5.tif"));

    let output = GdalBackend.open_raster(&report.output).unwrap();
    assert_eq!(output.size(), (30, 20));
    assert_eq!(output.band_type(1).unwrap(), DataType::UInt16);
    assert_eq!(
        output.geo_transform().unwrap().to_gdal(),
        [500_000., 20., 0., 4_600_000., 0., -20.]
    );
    assert!(report.statistics[0].is_some());
}

#[test_log::test]
fn shapefile_buffer_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("parcels.shp");
    write_polygons(&path);
    assert_eq!(
        VectorReader::new(&GdalBackend).classify(&path).unwrap(),
        Some(VectorKind::Polygon)
    );

    let engine = GeoprocessingEngine::new(GdalBackend, EngineConfig::default());
    let report = engine.buffer(&path, 1.).unwrap();
    assert_eq!(report.written, 1);
    assert!(report.field_warnings.is_empty());

    let mut output = GdalBackend.open_vector(&report.output).unwrap();
    assert_eq!(output.fields()[0].name, "parcel");
    let feature = output.next_feature().unwrap().unwrap();
    assert_eq!(feature.fields, vec![("parcel".to_string(), Some("P-17".to_string()))]);
    let rect = feature.geometry.unwrap().bounding_rect().unwrap();
    assert!((rect.min().x + 1000.).abs() < 1.);
    assert!((rect.max().y - 11_000.).abs() < 1.);
    assert!(output.next_feature().unwrap().is_none());

    let table = info::attribute_table(&GdalBackend, &report.output).unwrap();
    assert_eq!(table.rows, vec![vec!["P-17".to_string()]]);
}

#[test_log::test]
fn shapefile_features_are_deleted_by_id() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("parcels.shp");
    write_polygons(&path);
    assert_eq!(info::attribute_table(&GdalBackend, &path).unwrap().fids, vec![Some(0)]);

    let report = delete_features(&GdalBackend, &path, &[0, 5]).unwrap();
    assert_eq!(report.deleted, vec![0]);
    assert_eq!(report.failed, vec![5]);
    assert!(info::attribute_table(&GdalBackend, &path).unwrap().rows.is_empty());
}

#[test]
fn missing_files_fail_to_open() {
    assert!(matches!(
        RasterDecoder::new(&GdalBackend).decode("/nonexistent/scene.tif"),
        Err(GeocanvasError::DatasetOpenFailure(_))
    ));
    assert!(matches!(
        VectorReader::new(&GdalBackend).open("/nonexistent/parcels.shp"),
        Err(GeocanvasError::DatasetOpenFailure(_))
    ));
}
