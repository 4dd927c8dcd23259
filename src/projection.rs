use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/* Projections a map can be calibrated with. In `map.json` a projection is an
   object tagged by `projection_name`, e.g.
   `{"projection_name": "Universal Transverse Mercator", "zone": 40, "hemisphere": "S"}`.
*/

pub const MERCATOR_NAME: &str = "Pseudo-Mercator";
pub const UTM_NAME: &str = "Universal Transverse Mercator";

// WGS84
const EARTH_RADIUS: f64 = 6378137.0;
const FLATTENING: f64 = 1.0 / 298.257223563;
const UTM_SCALE_FACTOR: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10000000.0;

// Beyond this the spherical mercator is not defined in practice.
const MERCATOR_MAX_LATITUDE: f64 = 85.05112878;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hemisphere {
    #[serde(rename = "N")]
    North,
    #[serde(rename = "S")]
    South,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "projection_name")]
pub enum Projection {
    #[serde(rename = "Pseudo-Mercator")]
    Mercator,
    #[serde(rename = "Universal Transverse Mercator")]
    UniversalTransverseMercator { zone: u8, hemisphere: Hemisphere },
}

impl Projection {
    pub const NAMES: [&'static str; 2] = [MERCATOR_NAME, UTM_NAME];

    /// Builds a projection from its registered name. UTM starts with zone 31
    /// north, callers are expected to adjust it.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            MERCATOR_NAME => Some(Projection::Mercator),
            UTM_NAME => Some(Projection::UniversalTransverseMercator {
                zone: 31,
                hemisphere: Hemisphere::North,
            }),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Projection::Mercator => MERCATOR_NAME,
            Projection::UniversalTransverseMercator { .. } => UTM_NAME,
        }
    }

    /// Projects a WGS84 position (degrees). Returns `None` outside of the
    /// domain of the projection.
    pub fn do_projection(&self, latitude: f64, longitude: f64) -> Option<(f64, f64)> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return None;
        }
        match self {
            Projection::Mercator => mercator_forward(latitude, longitude),
            Projection::UniversalTransverseMercator { zone, hemisphere } => {
                utm_forward(latitude, longitude, *zone, *hemisphere)
            }
        }
    }

    /// Inverse projection, back to (latitude, longitude). Only available for
    /// mercator.
    pub fn undo_projection(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        match self {
            Projection::Mercator => {
                let longitude = (x / EARTH_RADIUS) * 180.0 / PI;
                let latitude = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0) * 180.0 / PI;
                Some((latitude, longitude))
            }
            Projection::UniversalTransverseMercator { .. } => None,
        }
    }
}

fn mercator_forward(latitude: f64, longitude: f64) -> Option<(f64, f64)> {
    if latitude.abs() > MERCATOR_MAX_LATITUDE || longitude.abs() > 180.0 {
        return None;
    }
    let x = EARTH_RADIUS * longitude.to_radians();
    let y = EARTH_RADIUS * (PI / 4.0 + latitude.to_radians() / 2.0).tan().ln();
    Some((x, y))
}

// Series expansion from Snyder, "Map Projections: A Working Manual", p. 61.
fn utm_forward(
    latitude: f64,
    longitude: f64,
    zone: u8,
    hemisphere: Hemisphere,
) -> Option<(f64, f64)> {
    if !(1..=60).contains(&zone) || !(-80.0..=84.0).contains(&latitude) {
        return None;
    }
    let e2 = FLATTENING * (2.0 - FLATTENING);
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    let ep2 = e2 / (1.0 - e2);

    let central_meridian = (zone as f64 - 1.0) * 6.0 - 180.0 + 3.0;
    let phi = latitude.to_radians();
    let (sin_phi, cos_phi) = phi.sin_cos();
    let tan_phi = phi.tan();

    let n = EARTH_RADIUS / (1.0 - e2 * sin_phi * sin_phi).sqrt();
    let t = tan_phi * tan_phi;
    let c = ep2 * cos_phi * cos_phi;
    let a = cos_phi * (longitude - central_meridian).to_radians();

    let m = EARTH_RADIUS
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin());

    let x = UTM_SCALE_FACTOR
        * n
        * (a + (1.0 - t + c) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
        + UTM_FALSE_EASTING;
    let mut y = UTM_SCALE_FACTOR
        * (m + n
            * tan_phi
            * (a * a / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));
    if hemisphere == Hemisphere::South {
        y += UTM_FALSE_NORTHING_SOUTH;
    }
    Some((x, y))
}
