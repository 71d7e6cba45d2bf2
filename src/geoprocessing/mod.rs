//! Operations deriving new datasets from existing ones.
//!
//! Both run to completion on the calling thread and return a report
//! naming the written file, ready to be listed as a new layer.

pub mod buffer;
pub mod resample;
pub mod statistics;

pub use buffer::BufferReport;
pub use resample::{ResampleKernel, ResampleReport};
pub use statistics::BandStatistics;

use std::path::{Path, PathBuf};

use crate::{components::backends::GeoBackend, config::EngineConfig, errors::Result};

fn stem(input: &Path) -> String {
    input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}

/// `<stem>_buffer_<radius>km.shp` beside `input`.
pub fn buffer_output_path(input: &Path, radius_km: f64) -> PathBuf {
    input.with_file_name(format!("{}_buffer_{radius_km}km.shp", stem(input)))
}

/// `<stem>_<kernel>_x<scale>.tif` beside `input`.
pub fn resample_output_path(input: &Path, kernel: ResampleKernel, scale_factor: f64) -> PathBuf {
    input.with_file_name(format!("{}_{kernel}_x{scale_factor}.tif", stem(input)))
}

pub struct GeoprocessingEngine<B: GeoBackend> {
    backend: B,
    config: EngineConfig,
}

impl<B: GeoBackend> GeoprocessingEngine<B> {
    pub fn new(backend: B, config: EngineConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Buffers every feature of `input` by `radius_km` kilometers.
    pub fn buffer<P: AsRef<Path>>(&self, input: P, radius_km: f64) -> Result<BufferReport> {
        let input = input.as_ref();
        self.buffer_to(input, buffer_output_path(input, radius_km), radius_km)
    }

    pub fn buffer_to<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input: P,
        output: Q,
        radius_km: f64,
    ) -> Result<BufferReport> {
        buffer::buffer(
            &self.backend,
            input.as_ref(),
            output.as_ref(),
            radius_km,
            self.config.buffer_quadrant_segments,
        )
    }

    /// Resamples `input` onto a grid `scale_factor` times as fine.
    pub fn resample<P: AsRef<Path>>(
        &self,
        input: P,
        kernel: ResampleKernel,
        scale_factor: f64,
    ) -> Result<ResampleReport> {
        let input = input.as_ref();
        let output = resample_output_path(input, kernel, scale_factor);
        self.resample_to(input, output, kernel, scale_factor)
    }

    pub fn resample_to<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input: P,
        output: Q,
        kernel: ResampleKernel,
        scale_factor: f64,
    ) -> Result<ResampleReport> {
        resample::resample(
            &self.backend,
            input.as_ref(),
            output.as_ref(),
            kernel,
            scale_factor,
            &self.config,
        )
    }
}
