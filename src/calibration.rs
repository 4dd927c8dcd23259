use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::projection::Projection;

// Two calibration points closer than this (relatively) can't be used.
const MIN_RELATIVE_DELTA: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CalibrationMethod {
    #[default]
    #[serde(rename = "SIMPLE_2_POINTS")]
    Simple2Points,
    #[serde(rename = "CALIBRATION_3_POINTS")]
    Calibration3Points,
    #[serde(rename = "CALIBRATION_4_POINTS")]
    Calibration4Points,
}

/// A known position on the map. `x` and `y` are relative to the map size
/// (0 is left/top, 1 is right/bottom), `proj_x` and `proj_y` are in the
/// projection's units, or in degrees (longitude, latitude) without projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub x: f64,
    pub y: f64,
    pub proj_x: f64,
    pub proj_y: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Calibration {
    #[serde(default)]
    pub projection: Option<Projection>,
    #[serde(default)]
    pub calibration_method: CalibrationMethod,
    #[serde(default)]
    pub calibration_points: Vec<CalibrationPoint>,
}

/// Projected coordinates of the top-left (`x0`, `y0`) and bottom-right
/// (`x1`, `y1`) corners of a map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapBounds {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl MapBounds {
    /// Relative position of a projected point, `None` for degenerate bounds.
    pub fn relative_position(&self, proj_x: f64, proj_y: f64) -> Option<(f64, f64)> {
        let width = self.x1 - self.x0;
        let height = self.y1 - self.y0;
        if width == 0.0 || height == 0.0 {
            return None;
        }
        Some(((proj_x - self.x0) / width, (proj_y - self.y0) / height))
    }
}

pub fn simple_2_points(p1: &CalibrationPoint, p2: &CalibrationPoint) -> Option<MapBounds> {
    let delta_x = p2.x - p1.x;
    let delta_y = p2.y - p1.y;
    if delta_x.abs() < MIN_RELATIVE_DELTA || delta_y.abs() < MIN_RELATIVE_DELTA {
        return None;
    }
    let scale_x = (p2.proj_x - p1.proj_x) / delta_x;
    let scale_y = (p2.proj_y - p1.proj_y) / delta_y;
    let x0 = p1.proj_x - p1.x * scale_x;
    let y0 = p1.proj_y - p1.y * scale_y;
    Some(MapBounds {
        x0,
        y0,
        x1: x0 + scale_x,
        y1: y0 + scale_y,
    })
}

impl Calibration {
    /// With more than two points, every usable pair gives an estimation and
    /// the bounds are their mean.
    pub fn compute_bounds(&self) -> Option<MapBounds> {
        let points = &self.calibration_points;
        match self.calibration_method {
            CalibrationMethod::Simple2Points => match points.as_slice() {
                [p1, p2, ..] => simple_2_points(p1, p2),
                _ => None,
            },
            CalibrationMethod::Calibration3Points | CalibrationMethod::Calibration4Points => {
                let estimations = points
                    .iter()
                    .tuple_combinations()
                    .filter_map(|(p1, p2)| simple_2_points(p1, p2))
                    .collect::<Vec<_>>();
                if estimations.is_empty() {
                    return None;
                }
                let n = estimations.len() as f64;
                let mean = |f: fn(&MapBounds) -> f64| estimations.iter().map(f).sum::<f64>() / n;
                Some(MapBounds {
                    x0: mean(|b| b.x0),
                    y0: mean(|b| b.y0),
                    x1: mean(|b| b.x1),
                    y1: mean(|b| b.y1),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: f64, y: f64, proj_x: f64, proj_y: f64) -> CalibrationPoint {
        CalibrationPoint {
            x,
            y,
            proj_x,
            proj_y,
        }
    }

    #[test]
    fn two_points() {
        let bounds = simple_2_points(
            &point(0.25, 0.25, 100.0, 1000.0),
            &point(0.75, 0.75, 200.0, 900.0),
        )
        .unwrap();
        assert_eq!(
            bounds,
            MapBounds {
                x0: 50.0,
                y0: 1050.0,
                x1: 250.0,
                y1: 850.0
            }
        );
        assert_eq!(bounds.relative_position(150.0, 950.0), Some((0.5, 0.5)));
    }

    #[test]
    fn degenerate() {
        assert_eq!(
            simple_2_points(&point(0.5, 0.1, 1.0, 1.0), &point(0.5, 0.9, 2.0, 2.0)),
            None
        );
        let calibration = Calibration {
            calibration_points: vec![point(0.1, 0.1, 0.0, 0.0)],
            ..Default::default()
        };
        assert_eq!(calibration.compute_bounds(), None);
    }

    #[test]
    fn more_points_agree() {
        let calibration = Calibration {
            projection: None,
            calibration_method: CalibrationMethod::Calibration3Points,
            calibration_points: vec![
                point(0.0, 0.0, 10.0, 20.0),
                point(1.0, 1.0, 20.0, 10.0),
                point(0.5, 0.25, 15.0, 17.5),
            ],
        };
        let bounds = calibration.compute_bounds().unwrap();
        assert!((bounds.x0 - 10.0).abs() < 1e-9);
        assert!((bounds.y0 - 20.0).abs() < 1e-9);
        assert!((bounds.x1 - 20.0).abs() < 1e-9);
        assert!((bounds.y1 - 10.0).abs() < 1e-9);
    }

    #[test]
    fn method_names() {
        let json = serde_json::to_string(&Calibration::default()).unwrap();
        assert_eq!(
            json,
            r#"{"projection":null,"calibration_method":"SIMPLE_2_POINTS","calibration_points":[]}"#
        );
    }
}
