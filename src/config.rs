use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::errors::Result;

/// Tunables of the rendering and geoprocessing engine.
///
/// Every field has a default, so a partial JSON document is enough
/// to override a single value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Scale multiplier applied by one zoom step.
    pub zoom_factor: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    /// Radius, in view units, of the ellipse drawn for a point.
    pub point_radius: f64,
    /// Alpha of polygon fills, the stroke stays opaque.
    pub polygon_fill_alpha: u8,
    /// Arc resolution handed to the buffering primitive.
    pub buffer_quadrant_segments: u32,
    /// Destination rows resampled per chunk.
    pub resample_chunk_rows: usize,
    /// GTiff creation options as `(key, value)` pairs.
    pub geotiff_options: Vec<(String, String)>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            zoom_factor: 1.15,
            min_scale: 0.1,
            max_scale: 10.0,
            point_radius: 2.0,
            polygon_fill_alpha: 50,
            buffer_quadrant_segments: 30,
            resample_chunk_rows: 256,
            geotiff_options: [("TILED", "YES"), ("COMPRESS", "LZW"), ("BIGTIFF", "IF_NEEDED")]
                .into_iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_document_keeps_defaults() {
        let config = EngineConfig::from_json(r#"{ "zoom_factor": 1.5 }"#).unwrap();
        assert_eq!(config.zoom_factor, 1.5);
        assert_eq!(config.max_scale, 10.0);
        assert_eq!(config.geotiff_options.len(), 3);
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(EngineConfig::from_json("{ zoom").is_err());
    }
}
