use image::{DynamicImage, GrayImage, RgbImage};
use log::{debug, info};
use ndarray::Array2;
use num_traits::AsPrimitive;
use std::path::Path;

use crate::{
    components::backends::{BandPixels, DataType, GeoBackend, RasterFile},
    errors::{GeocanvasError, Result},
};

/// Divisor bringing a UInt16 sample into 8 bits.
const UINT16_DOWNSCALE: u32 = 256;

/// Decodes raster datasets into display images.
///
/// Three or more bands sharing a Byte or UInt16 type are shown as RGB
/// from bands 1 to 3, anything else as grayscale from band 1.
/// The dataset is dropped before [RasterDecoder::decode] returns.
#[derive(Debug)]
pub struct RasterDecoder<'b, B: GeoBackend> {
    backend: &'b B,
}

impl<'b, B: GeoBackend> RasterDecoder<'b, B> {
    pub fn new(backend: &'b B) -> Self {
        Self { backend }
    }

    pub fn decode<P: AsRef<Path>>(&self, path: P) -> Result<DynamicImage> {
        let path = path.as_ref();
        let raster = self.backend.open_raster(path)?;

        let (width, height) = raster.size();
        if width == 0 || height == 0 {
            return Err(GeocanvasError::UnsupportedRasterEncoding(format!(
                "{} has an empty size {width}x{height}",
                path.display()
            )));
        }
        let band_count = raster.band_count();
        if band_count == 0 {
            return Err(GeocanvasError::UnsupportedRasterEncoding(format!(
                "{} has no bands",
                path.display()
            )));
        }
        let (width, height) = (image_dimension(width)?, image_dimension(height)?);

        if let Some(data_type) = shared_rgb_type(&raster)? {
            let [red, green, blue] = [1, 2, 3].map(|index| read_display_band(&raster, index));
            let (red, green, blue) = (red?, green?, blue?);
            info!("decoded {} as {data_type} RGB", path.display());
            let image = RgbImage::from_fn(width, height, |x, y| {
                let index = [y as usize, x as usize];
                image::Rgb([red[index], green[index], blue[index]])
            });
            return Ok(DynamicImage::ImageRgb8(image));
        }

        let data_type = raster.band_type(1)?;
        if !is_displayable(data_type) {
            return Err(GeocanvasError::UnsupportedRasterEncoding(format!(
                "{} band 1 is {data_type}",
                path.display()
            )));
        }
        let gray = read_display_band(&raster, 1)?;
        info!("decoded {} as {data_type} grayscale", path.display());
        let image = GrayImage::from_fn(width, height, |x, y| {
            image::Luma([gray[[y as usize, x as usize]]])
        });
        Ok(DynamicImage::ImageLuma8(image))
    }
}

fn image_dimension(size: usize) -> Result<u32> {
    u32::try_from(size).map_err(|_| {
        GeocanvasError::UnsupportedRasterEncoding(format!("dimension {size} exceeds image limits"))
    })
}

fn is_displayable(data_type: DataType) -> bool {
    matches!(data_type, DataType::Byte | DataType::UInt16)
}

/// Type shared by bands 1 to 3 when they qualify for RGB display.
fn shared_rgb_type<R: RasterFile>(raster: &R) -> Result<Option<DataType>> {
    if raster.band_count() < 3 {
        return Ok(None);
    }
    let data_type = raster.band_type(1)?;
    let shared = raster.band_type(2)? == data_type && raster.band_type(3)? == data_type;
    if shared && is_displayable(data_type) {
        Ok(Some(data_type))
    } else {
        debug!("bands 1-3 do not form an RGB triple, falling back to grayscale");
        Ok(None)
    }
}

fn read_display_band<R: RasterFile>(raster: &R, index: usize) -> Result<Array2<u8>> {
    match raster.read_band(index)? {
        BandPixels::Byte(pixels) => Ok(pixels),
        BandPixels::UInt16(pixels) => Ok(downscale(&pixels, UINT16_DOWNSCALE)),
        BandPixels::Float(_) => Err(GeocanvasError::UnsupportedRasterEncoding(format!(
            "band {index} is not an integer band"
        ))),
    }
}

/// Integer division of every sample, truncating into 8 bits.
fn downscale<T: AsPrimitive<u32>>(pixels: &Array2<T>, divisor: u32) -> Array2<u8> {
    pixels.mapv(|sample| (sample.as_() / divisor) as u8)
}
