use geo::{coord, Coord, Rect};
use serde::{Deserialize, Serialize};
use shrinkwraprs::Shrinkwrap;

use crate::errors::{GeocanvasError, Result};

/// Axis aligned extent of a dataset in geographic coordinates.
///
/// Can only be built with a positive width and height,
/// degenerate extents are rejected at construction.
#[derive(Shrinkwrap, Debug, Clone, Copy, PartialEq)]
pub struct Envelope(Rect<f64>);

impl Envelope {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self> {
        let finite = [min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite());
        if !finite || max_x - min_x <= 0. || max_y - min_y <= 0. {
            return Err(GeocanvasError::InvalidExtent {
                min_x,
                min_y,
                max_x,
                max_y,
            });
        }
        Ok(Self(Rect::new(
            coord! { x: min_x, y: min_y },
            coord! { x: max_x, y: max_y },
        )))
    }

    pub fn from_rect(rect: Rect<f64>) -> Result<Self> {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

/// Size of the drawing surface in view units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: f64,
    pub height: f64,
}

impl ViewportSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Coord {
        coord! { x: self.width / 2., y: self.height / 2. }
    }
}

/// Smallest rectangle containing both.
pub fn union(lhs: Rect<f64>, rhs: Rect<f64>) -> Rect<f64> {
    Rect::new(
        coord! { x: lhs.min().x.min(rhs.min().x), y: lhs.min().y.min(rhs.min().y) },
        coord! { x: lhs.max().x.max(rhs.max().x), y: lhs.max().y.max(rhs.max().y) },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0., 0., 0., 10.)]
    #[case(0., 0., 10., 0.)]
    #[case(5., 5., 1., 10.)]
    #[case(f64::NAN, 0., 1., 1.)]
    fn degenerate_envelopes_are_rejected(
        #[case] min_x: f64,
        #[case] min_y: f64,
        #[case] max_x: f64,
        #[case] max_y: f64,
    ) {
        assert!(matches!(
            Envelope::new(min_x, min_y, max_x, max_y),
            Err(GeocanvasError::InvalidExtent { .. })
        ));
    }

    #[test]
    fn union_covers_both() {
        let lhs = Rect::new((0., 0.), (2., 2.));
        let rhs = Rect::new((1., -1.), (5., 1.));
        assert_eq!(union(lhs, rhs), Rect::new((0., -1.), (5., 2.)));
    }
}
