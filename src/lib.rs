pub mod components;
pub mod config;
pub mod errors;
pub mod geoprocessing;

#[cfg(feature = "gdal")]
pub use components::backends::gdal_backend::GdalBackend;
pub use components::{
    backends::memory_backend::MemoryBackend, CoordinateMapper, Envelope, LayerList, MapCanvas,
    RasterDecoder, SceneComposer, VectorReader, ViewportController, ViewportSize,
};
pub use config::EngineConfig;
pub use errors::{GeocanvasError, Result};
pub use geoprocessing::{GeoprocessingEngine, ResampleKernel};
