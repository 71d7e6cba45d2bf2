use geo::{AffineTransform, Coord};
use shrinkwraprs::Shrinkwrap;

use crate::errors::{GeocanvasError, Result};

/// Affine mapping from pixel/line to geographic coordinates.
#[derive(Shrinkwrap, Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform(AffineTransform);

impl Default for GeoTransform {
    fn default() -> Self {
        Self(AffineTransform::identity())
    }
}

impl GeoTransform {
    pub fn new(a: f64, b: f64, xoff: f64, d: f64, e: f64, yoff: f64) -> Self {
        Self(AffineTransform::new(a, b, xoff, d, e, yoff))
    }

    /// From the `[xoff, a, b, yoff, d, e]` layout used by GDAL.
    pub fn from_gdal(gdal_transform: [f64; 6]) -> Self {
        Self::new(
            gdal_transform[1],
            gdal_transform[2],
            gdal_transform[0],
            gdal_transform[4],
            gdal_transform[5],
            gdal_transform[3],
        )
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.xoff(),
            self.a(),
            self.b(),
            self.yoff(),
            self.d(),
            self.e(),
        ]
    }

    /// Pixel size terms divided by `factor`, origin and rotation untouched.
    pub fn rescaled(&self, factor: f64) -> Self {
        Self::new(
            self.a() / factor,
            self.b(),
            self.xoff(),
            self.d(),
            self.e() / factor,
            self.yoff(),
        )
    }

    /// Pixel size as `(x, |y|)`.
    pub fn resolution(&self) -> (f64, f64) {
        (self.a(), self.e().abs())
    }

    pub fn inverse(&self) -> Result<PixelTransform> {
        self.0.inverse().map(PixelTransform).ok_or_else(|| {
            GeocanvasError::TransformerInitFailure(format!(
                "geo transform {:?} is not invertible",
                self.to_gdal()
            ))
        })
    }
}

/// Affine mapping from geographic to pixel/line coordinates.
#[derive(Shrinkwrap, Debug, Clone, Copy)]
pub struct PixelTransform(AffineTransform);

/// Maps destination grid pixels onto source grid pixels,
/// passing through geographic space.
#[derive(Debug, Clone, Copy)]
pub struct GridTransformer {
    destination: GeoTransform,
    source: PixelTransform,
}

impl GridTransformer {
    pub fn new(destination: &GeoTransform, source: &GeoTransform) -> Result<Self> {
        Ok(Self {
            destination: *destination,
            source: source.inverse()?,
        })
    }

    /// Source pixel coordinates of the center of destination pixel `(col, row)`.
    pub fn source_position(&self, col: usize, row: usize) -> Coord {
        let geo = self.destination.apply(Coord {
            x: col as f64 + 0.5,
            y: row as f64 + 0.5,
        });
        self.source.apply(geo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn gdal_layout_round_trips() {
        let layout = [500_000., 10., 0., 4_600_000., 0., -10.];
        assert_eq!(GeoTransform::from_gdal(layout).to_gdal(), layout);
    }

    #[test]
    fn rescaling_keeps_origin_and_negative_y() {
        let transform = GeoTransform::from_gdal([100., 2., 0., 50., 0., -2.]).rescaled(0.5);
        assert_eq!(transform.to_gdal(), [100., 4., 0., 50., 0., -4.]);
    }

    #[test]
    fn transformer_maps_half_grid_onto_double_pixels() {
        let source = GeoTransform::from_gdal([0., 1., 0., 100., 0., -1.]);
        let destination = source.rescaled(0.5);
        let transformer = GridTransformer::new(&destination, &source).unwrap();
        let position = transformer.source_position(3, 7);
        assert_relative_eq!(position.x, 7.);
        assert_relative_eq!(position.y, 15.);
    }

    #[test]
    fn singular_transform_cannot_be_inverted() {
        let singular = GeoTransform::from_gdal([0., 0., 0., 0., 0., 0.]);
        assert!(matches!(
            singular.inverse(),
            Err(GeocanvasError::TransformerInitFailure(_))
        ));
    }
}
