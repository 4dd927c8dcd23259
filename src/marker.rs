use serde::{Deserialize, Serialize};

/// A user placed marker. Projected values are cached so that the map can be
/// drawn without reprojecting every marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub proj_x: Option<f64>,
    #[serde(default)]
    pub proj_y: Option<f64>,
}

impl Marker {
    pub fn new(lat: f64, lon: f64, name: String) -> Self {
        Self {
            lat,
            lon,
            name,
            comment: None,
            proj_x: None,
            proj_y: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub proj_x: Option<f64>,
    #[serde(default)]
    pub proj_y: Option<f64>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl Landmark {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            proj_x: None,
            proj_y: None,
            comment: None,
        }
    }
}

// on-disk wrappers for `markers.json` and `landmarks.json`
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct MarkerFile {
    #[serde(default)]
    pub markers: Vec<Marker>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct LandmarkFile {
    #[serde(default)]
    pub landmarks: Vec<Landmark>,
}
