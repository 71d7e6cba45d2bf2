pub mod backends;
pub mod bounds;
pub mod canvas;
pub mod editing;
pub mod info;
pub mod layers;
pub mod mapper;
pub mod raster;
pub mod scene;
pub mod transforms;
pub mod vector;
pub mod viewport;

pub use backends::{DataType, GeoBackend};
pub use bounds::{Envelope, ViewportSize};
pub use canvas::MapCanvas;
pub use editing::{delete_features, DeletionReport};
pub use layers::{LayerEntry, LayerKind, LayerList, LayerSnapshot};
pub use mapper::CoordinateMapper;
pub use raster::RasterDecoder;
pub use scene::{Primitive, Scene, SceneComposer};
pub use vector::{VectorKind, VectorReader};
pub use viewport::{ScaleChanged, ViewportController};
