/**
 * Geographic bounds of the map raster and the lat/lon ↔ pixel projection.
 *
 * The map is a single equirectangular raster with fixed bounds; the
 * renderer places aircraft icons at the projected pixel positions.
 */
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapBounds {
    pub top_lat: f64,
    pub bottom_lat: f64,
    pub left_lon: f64,
    pub right_lon: f64,
}

impl Default for MapBounds {
    fn default() -> Self {
        // Vancouver area
        MapBounds {
            top_lat: 49.5,
            bottom_lat: 49.0,
            left_lon: -123.3,
            right_lon: -122.5,
        }
    }
}

impl MapBounds {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.bottom_lat..=self.top_lat).contains(&lat)
            && (self.left_lon..=self.right_lon).contains(&lon)
    }
}

/// Projection of geographic coordinates onto a raster of fixed pixel size
#[derive(Debug, Clone, Copy)]
pub struct MapProjection {
    pub bounds: MapBounds,
    pub width: u32,
    pub height: u32,
}

impl MapProjection {
    pub fn new(bounds: MapBounds, width: u32, height: u32) -> Self {
        MapProjection {
            bounds,
            width,
            height,
        }
    }

    pub fn latlon_to_pixel(&self, lat: f64, lon: f64) -> (f64, f64) {
        let b = &self.bounds;
        let x = (lon - b.left_lon) / (b.right_lon - b.left_lon)
            * f64::from(self.width);
        let y = (b.top_lat - lat) / (b.top_lat - b.bottom_lat)
            * f64::from(self.height);
        (x, y)
    }

    pub fn pixel_to_latlon(&self, x: f64, y: f64) -> (f64, f64) {
        let b = &self.bounds;
        let lon = b.left_lon
            + x / f64::from(self.width) * (b.right_lon - b.left_lon);
        let lat = b.top_lat
            - y / f64::from(self.height) * (b.top_lat - b.bottom_lat);
        (lat, lon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_corners() {
        let projection = MapProjection::new(MapBounds::default(), 750, 800);

        let (x, y) = projection.latlon_to_pixel(49.5, -123.3);
        assert_eq!((x, y), (0., 0.));

        let (x, y) = projection.latlon_to_pixel(49.0, -122.5);
        assert_eq!((x, y), (750., 800.));
    }

    #[test]
    fn test_round_trip() {
        let projection = MapProjection::new(MapBounds::default(), 750, 800);
        for (lat, lon) in [
            (49.5, -123.3),
            (49.0, -122.5),
            (49.25, -122.9),
            (49.123, -123.001),
        ] {
            let (x, y) = projection.latlon_to_pixel(lat, lon);
            let (rlat, rlon) = projection.pixel_to_latlon(x, y);
            assert_relative_eq!(rlat, lat, max_relative = 1e-12);
            assert_relative_eq!(rlon, lon, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_bounds_contain() {
        let bounds = MapBounds::default();
        assert!(bounds.contains(49.25, -122.9));
        assert!(!bounds.contains(48.9, -122.9));
        assert!(!bounds.contains(49.25, -121.0));
    }
}
