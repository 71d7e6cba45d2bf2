use log::{debug, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::{
    components::backends::{
        GeoBackend, GeometryKind, RawFeature, VectorFile, VectorSink, VectorSpec,
    },
    errors::{GeocanvasError, Result},
};

const METERS_PER_KILOMETER: f64 = 1000.;

pub fn radius_in_meters(radius_km: f64) -> f64 {
    radius_km * METERS_PER_KILOMETER
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BufferReport {
    pub output: PathBuf,
    /// Buffer distance handed to the data layer.
    pub distance: f64,
    pub written: usize,
    /// Features without geometry or whose buffer could not be computed.
    pub skipped: usize,
    /// Fields of the input that could not be created on the output.
    pub field_warnings: Vec<String>,
}

pub(crate) fn buffer<B: GeoBackend>(
    backend: &B,
    input: &Path,
    output: &Path,
    radius_km: f64,
    quadrant_segments: u32,
) -> Result<BufferReport> {
    if !radius_km.is_finite() || radius_km <= 0. {
        return Err(GeocanvasError::InvalidParameter {
            name: "buffer radius",
            value: radius_km.to_string(),
        });
    }
    let distance = radius_in_meters(radius_km);
    let mut source = backend.open_vector(input)?;

    let layer_name = output
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "buffer".to_string());
    let spec = VectorSpec {
        layer_name,
        geometry_kind: GeometryKind::Polygon,
        spatial_ref: source.spatial_ref(),
    };
    let mut sink = backend.create_vector(output, &spec)?;

    let mut report = BufferReport {
        output: output.to_path_buf(),
        distance,
        ..Default::default()
    };
    let mut created = Vec::new();
    for field in source.fields() {
        match sink.create_field(field) {
            Ok(()) => created.push(field.name.clone()),
            Err(error) => {
                warn!("{error}, its values are dropped");
                report.field_warnings.push(field.name.clone());
            }
        }
    }

    info!(
        "buffering {} by {distance} m into {}",
        input.display(),
        output.display()
    );
    let mut idx = 0;
    loop {
        let feature = match source.next_feature() {
            Ok(Some(feature)) => feature,
            Ok(None) => break,
            Err(error) => {
                warn!("skipping unreadable feature {idx}: {error}");
                report.skipped += 1;
                idx += 1;
                continue;
            }
        };
        let Some(geometry) = &feature.geometry else {
            debug!("skipping feature {idx} without geometry");
            report.skipped += 1;
            idx += 1;
            continue;
        };
        match backend.buffer(geometry, distance, quadrant_segments) {
            Ok(Some(buffered)) => {
                let fields = feature
                    .fields
                    .into_iter()
                    .filter(|(name, _)| created.contains(name))
                    .collect();
                sink.append(&RawFeature {
                    fid: feature.fid,
                    fields,
                    geometry: Some(buffered),
                })?;
                report.written += 1;
            }
            Ok(None) => {
                warn!("{}", GeocanvasError::BufferComputationFailure(idx));
                report.skipped += 1;
            }
            Err(error) => {
                warn!("{}: {error}", GeocanvasError::BufferComputationFailure(idx));
                report.skipped += 1;
            }
        }
        idx += 1;
    }
    sink.finish()?;

    info!(
        "buffered {} features into {}, skipped {}",
        report.written,
        output.display(),
        report.skipped
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::backends::{
        memory_backend::{MemoryBackend, MemoryLayer},
        FieldDefinition, FieldKind,
    };
    use geo::{point, BoundingRect};
    use rstest::rstest;

    #[rstest]
    #[case(1., 1000.)]
    #[case(0.25, 250.)]
    #[case(2.5, 2500.)]
    #[case(12.345, 12345.)]
    fn kilometers_become_meters(#[case] radius_km: f64, #[case] meters: f64) {
        assert_eq!(radius_in_meters(radius_km), meters);
    }

    fn backend() -> MemoryBackend {
        let fields = vec![
            FieldDefinition::new("name", FieldKind::String),
            FieldDefinition::new("name", FieldKind::Integer),
        ];
        let layer = MemoryLayer::new("wells", fields)
            .with_spatial_ref("LOCAL_CS[\"grid\"]")
            .with_feature(&["a", "1"], Some(point!(x: 0., y: 0.).into()))
            .with_feature(&["b", "2"], None)
            .with_feature(&["c", "3"], Some(point!(x: 5000., y: 0.).into()));
        let backend = MemoryBackend::new();
        backend.insert_vector("wells.shp", vec![layer]);
        backend
    }

    #[test_log::test]
    fn null_geometries_are_skipped_and_field_failures_warned() {
        let backend = backend();
        let report = buffer(
            &backend,
            Path::new("wells.shp"),
            Path::new("out.shp"),
            0.5,
            30,
        )
        .unwrap();

        assert_eq!(report.distance, 500.);
        assert_eq!((report.written, report.skipped), (2, 1));
        assert_eq!(report.field_warnings, vec!["name".to_string()]);

        let output = backend.vector_layer("out.shp").unwrap();
        assert_eq!(output.spatial_ref.as_deref(), Some("LOCAL_CS[\"grid\"]"));
        assert_eq!(output.features.len(), 2);
        assert_eq!(output.features[1].fields, vec![("name".to_string(), Some("c".to_string()))]);
        let rect = output.features[1]
            .geometry
            .as_ref()
            .and_then(|geometry| geometry.bounding_rect())
            .unwrap();
        assert!(rect.min().x < 4600. && rect.max().x > 5400.);
        assert!(matches!(
            output.features[1].geometry,
            Some(geo::Geometry::Polygon(_))
        ));
    }

    #[rstest]
    #[case(0.)]
    #[case(-2.)]
    #[case(f64::INFINITY)]
    fn non_positive_radius_is_rejected(#[case] radius_km: f64) {
        let backend = backend();
        assert!(matches!(
            buffer(&backend, Path::new("wells.shp"), Path::new("out.shp"), radius_km, 30),
            Err(GeocanvasError::InvalidParameter { .. })
        ));
        assert!(backend.vector_layer("out.shp").is_none());
    }
}
