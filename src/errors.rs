use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, GeocanvasError>;

#[derive(thiserror::Error, Debug)]
pub enum GeocanvasError {
    #[cfg(feature = "gdal")]
    #[error(transparent)]
    GdalError(#[from] gdal::errors::GdalError),
    #[error(transparent)]
    NdarrayError(#[from] ndarray::ShapeError),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    ConfigError(#[from] serde_json::Error),
    #[error("Could not open dataset {0}")]
    DatasetOpenFailure(PathBuf),
    #[error("Dataset {0} has no layer to read")]
    LayerUnavailable(PathBuf),
    #[error("Envelope [{min_x}, {min_y}, {max_x}, {max_y}] has no area")]
    InvalidExtent {
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    },
    #[error("Unsupported raster encoding: {0}")]
    UnsupportedRasterEncoding(String),
    #[error("Buffer of feature {0} could not be computed")]
    BufferComputationFailure(usize),
    #[error("Field {0} could not be created")]
    FieldCreation(String),
    #[error("Feature {0} could not be deleted")]
    FeatureDeletion(u64),
    #[error("Transformer could not be initialized: {0}")]
    TransformerInitFailure(String),
    #[error("Statistics of band {0} could not be computed")]
    StatisticsFailure(usize),
    #[error("Invalid parameter {name} = {value}")]
    InvalidParameter { name: &'static str, value: String },
}
