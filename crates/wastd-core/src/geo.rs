//! Minimal planar geometry over WGS84 coordinates.
//!
//! Sites are small enough (a few kilometres of beach) that treating
//! longitude/latitude as a plane is accurate for containment tests.

use serde::{Deserialize, Serialize};

/// A location in WGS84 decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
  pub longitude: f64,
  pub latitude:  f64,
}

impl Point {
  pub const fn new(longitude: f64, latitude: f64) -> Self {
    Self { longitude, latitude }
  }
}

/// A simple polygon described by its exterior ring.
///
/// The ring may or may not repeat its first vertex at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
  pub exterior: Vec<Point>,
}

impl Polygon {
  pub fn new(exterior: Vec<Point>) -> Self { Self { exterior } }

  /// Axis-aligned rectangle, handy for sites drawn as boxes.
  pub fn rectangle(west: f64, south: f64, east: f64, north: f64) -> Self {
    Self::new(vec![
      Point::new(west, south),
      Point::new(east, south),
      Point::new(east, north),
      Point::new(west, north),
    ])
  }

  /// Whether `point` lies inside the polygon or on its boundary.
  ///
  /// Matches the semantics of a PostGIS `coveredby` filter. Rings with fewer
  /// than three distinct vertices cover nothing.
  pub fn covers(&self, point: Point) -> bool {
    let ring = self.ring();
    if ring.len() < 3 {
      return false;
    }

    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
      let (a, b) = (ring[i], ring[j]);
      if on_segment(a, b, point) {
        return true;
      }
      let crosses = (a.latitude > point.latitude) != (b.latitude > point.latitude);
      if crosses {
        let x = (b.longitude - a.longitude) * (point.latitude - a.latitude)
          / (b.latitude - a.latitude)
          + a.longitude;
        if point.longitude < x {
          inside = !inside;
        }
      }
      j = i;
    }
    inside
  }

  fn ring(&self) -> &[Point] {
    match self.exterior.as_slice() {
      [first, .., last] if first == last => &self.exterior[..self.exterior.len() - 1],
      ring => ring,
    }
  }
}

fn on_segment(a: Point, b: Point, p: Point) -> bool {
  const EPS: f64 = 1e-12;
  let cross = (b.longitude - a.longitude) * (p.latitude - a.latitude)
    - (b.latitude - a.latitude) * (p.longitude - a.longitude);
  if cross.abs() > EPS {
    return false;
  }
  p.longitude >= a.longitude.min(b.longitude) - EPS
    && p.longitude <= a.longitude.max(b.longitude) + EPS
    && p.latitude >= a.latitude.min(b.latitude) - EPS
    && p.latitude <= a.latitude.max(b.latitude) + EPS
}
