use geo::{coord, Coord};

use crate::components::bounds::{Envelope, ViewportSize};

/// Projects geographic coordinates inside an [Envelope] onto the viewport.
///
/// The envelope is stretched over the whole viewport, Y is flipped
/// since geographic Y grows upward and view Y grows downward.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateMapper {
    envelope: Envelope,
    viewport: ViewportSize,
}

impl CoordinateMapper {
    pub fn new(envelope: Envelope, viewport: ViewportSize) -> Self {
        Self { envelope, viewport }
    }

    pub fn to_view(&self, x: f64, y: f64) -> Coord {
        to_view(x, y, &self.envelope, self.viewport)
    }

    pub fn map_coords<'a>(
        &'a self,
        coords: impl IntoIterator<Item = &'a Coord> + 'a,
    ) -> impl Iterator<Item = Coord> + 'a {
        coords.into_iter().map(|c| self.to_view(c.x, c.y))
    }
}

pub fn to_view(x: f64, y: f64, envelope: &Envelope, viewport: ViewportSize) -> Coord {
    let (min, max) = (envelope.min(), envelope.max());
    let x_ratio = (x - min.x) / (max.x - min.x);
    let y_ratio = 1. - (y - min.y) / (max.y - min.y);
    coord! { x: x_ratio * viewport.width, y: y_ratio * viewport.height }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Envelope::new(0., 0., 10., 10.).unwrap(), ViewportSize::new(800., 600.))]
    #[case(Envelope::new(-180., -90., 180., 90.).unwrap(), ViewportSize::new(1024., 512.))]
    #[case(Envelope::new(483_210.7, 4_399_920.3, 512_980.1, 4_420_011.9).unwrap(), ViewportSize::new(333., 777.))]
    fn corners_map_to_flipped_viewport_corners(
        #[case] envelope: Envelope,
        #[case] viewport: ViewportSize,
    ) {
        let mapper = CoordinateMapper::new(envelope, viewport);
        let (min, max) = (envelope.min(), envelope.max());
        assert_eq!(mapper.to_view(min.x, min.y), coord! { x: 0., y: viewport.height });
        assert_eq!(mapper.to_view(max.x, max.y), coord! { x: viewport.width, y: 0. });
    }

    #[test]
    fn center_maps_to_viewport_center() {
        let mapper = CoordinateMapper::new(
            Envelope::new(10., 20., 30., 60.).unwrap(),
            ViewportSize::new(200., 100.),
        );
        assert_eq!(mapper.to_view(20., 40.), coord! { x: 100., y: 50. });
    }
}
