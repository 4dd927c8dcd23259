use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calibration::{Calibration, MapBounds};
use crate::map_importer::MapProvider;
use crate::map_loader::MAP_FILE_NAME;
use crate::marker::{Landmark, Marker};
use crate::projection::Projection;

/* The content of `map.json`. Field names are part of the on-disk format and
   are shared with maps generated by other versions of the app, so they stay
   in snake_case and unknown fields are ignored.
*/
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    pub name: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    pub levels: Vec<Level>,
    pub provider: ProviderInfo,
    #[serde(default)]
    pub size: MapSize,
    #[serde(default)]
    pub calibration: Calibration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub level: u32,
    pub tile_size: TileSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileSize {
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MapSize {
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub generated_by: MapProvider,
    pub image_extension: String,
}

impl MapConfig {
    pub fn validate(&self) -> Result<()> {
        if self.levels.is_empty() {
            bail!("map `{}` has no level", self.name);
        }
        for (previous, level) in self.levels.iter().zip(self.levels.iter().skip(1)) {
            if previous.level >= level.level {
                bail!(
                    "levels of map `{}` are not strictly increasing: {} then {}",
                    self.name,
                    previous.level,
                    level.level
                );
            }
        }
        if let Some(level) = self
            .levels
            .iter()
            .find(|l| l.tile_size.x == 0 || l.tile_size.y == 0)
        {
            bail!("level {} of map `{}` has an empty tile size", level.level, self.name);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Map {
    id: Uuid,
    directory: PathBuf,
    config: MapConfig,
    image: Option<RgbaImage>,
    // `None` means not loaded yet
    markers: Option<Vec<Marker>>,
    landmarks: Option<Vec<Landmark>>,
}

impl Map {
    pub fn new(config: MapConfig, directory: PathBuf, image: Option<RgbaImage>) -> Self {
        Map {
            id: Uuid::new_v4(),
            directory,
            config,
            image,
            markers: None,
            landmarks: None,
        }
    }

    /// Loads a map from its `map.json`. The map directory is the folder
    /// containing that file.
    pub fn open(config_file: &Path) -> Result<Self> {
        let directory = config_file
            .parent()
            .ok_or_else(|| anyhow!("{:?} has no parent directory", config_file))?
            .to_path_buf();
        let content = fs::read_to_string(config_file)
            .with_context(|| format!("failed to read {:?}", config_file))?;
        let config: MapConfig = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {:?}", config_file))?;
        config.validate()?;
        let image = config
            .thumbnail
            .as_ref()
            .and_then(|name| load_thumbnail(&directory.join(name)));
        Ok(Map::new(config, directory, image))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    // Keeps the identity of `self`, everything else comes from `other`.
    pub(crate) fn replace_content(&mut self, other: Map) {
        let id = self.id;
        *self = other;
        self.id = id;
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn set_name(&mut self, name: String) {
        self.config.name = name;
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn set_directory(&mut self, directory: PathBuf) {
        self.directory = directory;
    }

    pub fn config_file(&self) -> PathBuf {
        self.directory.join(MAP_FILE_NAME)
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn levels(&self) -> &[Level] {
        &self.config.levels
    }

    pub fn image_extension(&self) -> &str {
        &self.config.provider.image_extension
    }

    pub fn image(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }

    pub fn projection(&self) -> Option<&Projection> {
        self.config.calibration.projection.as_ref()
    }

    pub fn set_projection(&mut self, projection: Option<Projection>) {
        self.config.calibration.projection = projection;
    }

    pub fn calibration_mut(&mut self) -> &mut Calibration {
        &mut self.config.calibration
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.config)?)
    }

    pub fn compute_bounds(&self) -> Option<MapBounds> {
        self.config.calibration.compute_bounds()
    }

    /// Relative (0..1) position of a WGS84 position on this map, if the map
    /// is calibrated. Without projection, calibration points are in degrees.
    pub fn relative_position(&self, latitude: f64, longitude: f64) -> Option<(f64, f64)> {
        let bounds = self.compute_bounds()?;
        let (proj_x, proj_y) = match self.projection() {
            Some(projection) => projection.do_projection(latitude, longitude)?,
            None => (longitude, latitude),
        };
        bounds.relative_position(proj_x, proj_y)
    }

    pub fn markers(&self) -> Option<&[Marker]> {
        self.markers.as_deref()
    }

    pub fn set_markers(&mut self, markers: Vec<Marker>) {
        self.markers = Some(markers);
    }

    pub fn add_marker(&mut self, mut marker: Marker) {
        if let Some((x, y)) = self
            .projection()
            .and_then(|p| p.do_projection(marker.lat, marker.lon))
        {
            marker.proj_x = Some(x);
            marker.proj_y = Some(y);
        }
        self.markers.get_or_insert_with(Vec::new).push(marker);
    }

    pub fn delete_marker(&mut self, marker: &Marker) -> bool {
        match self.markers.as_mut() {
            None => false,
            Some(markers) => {
                let len = markers.len();
                markers.retain(|m| m != marker);
                markers.len() != len
            }
        }
    }

    pub fn landmarks(&self) -> Option<&[Landmark]> {
        self.landmarks.as_deref()
    }

    pub fn set_landmarks(&mut self, landmarks: Vec<Landmark>) {
        self.landmarks = Some(landmarks);
    }

    pub fn add_landmark(&mut self, mut landmark: Landmark) {
        if let Some((x, y)) = self
            .projection()
            .and_then(|p| p.do_projection(landmark.lat, landmark.lon))
        {
            landmark.proj_x = Some(x);
            landmark.proj_y = Some(y);
        }
        self.landmarks.get_or_insert_with(Vec::new).push(landmark);
    }

    pub fn delete_landmark(&mut self, landmark: &Landmark) -> bool {
        match self.landmarks.as_mut() {
            None => false,
            Some(landmarks) => {
                let len = landmarks.len();
                landmarks.retain(|l| l != landmark);
                landmarks.len() != len
            }
        }
    }
}

pub const THUMBNAIL_SIZE: u32 = 256;

pub(crate) fn load_thumbnail(path: &Path) -> Option<RgbaImage> {
    match image::open(path) {
        Ok(image) => Some(image.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE).to_rgba8()),
        Err(e) => {
            warn!("[map] failed to load thumbnail {:?}: {}", path, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationPoint;

    fn config(levels: &[u32]) -> MapConfig {
        MapConfig {
            name: "test".to_owned(),
            thumbnail: None,
            levels: levels
                .iter()
                .map(|&level| Level {
                    level,
                    tile_size: TileSize { x: 256, y: 256 },
                })
                .collect(),
            provider: ProviderInfo {
                generated_by: MapProvider::Libvips,
                image_extension: ".jpg".to_owned(),
            },
            size: MapSize { x: 1024, y: 512 },
            calibration: Calibration::default(),
        }
    }

    #[test]
    fn validate() {
        assert!(config(&[0, 1, 2]).validate().is_ok());
        assert!(config(&[]).validate().is_err());
        assert!(config(&[0, 2, 1]).validate().is_err());
        assert!(config(&[1, 1]).validate().is_err());
    }

    #[test]
    fn parse_ignores_unknown_fields() {
        let json = r#"{
            "name": "Test",
            "thumbnail": null,
            "levels": [{"level": 0, "tile_size": {"x": 256, "y": 256}}],
            "provider": {"generated_by": "LIBVIPS", "image_extension": ".png"},
            "sizeInBytes": 12345
        }"#;
        let config: MapConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.name, "Test");
        assert_eq!(config.provider.generated_by, MapProvider::Libvips);
        assert_eq!(config.size, MapSize::default());
        assert_eq!(config.calibration, Calibration::default());
    }

    #[test]
    fn markers() {
        let mut map = Map::new(config(&[0]), PathBuf::from("/tmp/test"), None);
        assert_eq!(map.markers(), None);
        let marker = Marker::new(45.0, 6.0, "hut".to_owned());
        map.add_marker(marker.clone());
        assert_eq!(map.markers().unwrap().len(), 1);
        assert_eq!(map.markers().unwrap()[0].proj_x, None);
        assert!(map.delete_marker(&marker));
        assert!(!map.delete_marker(&marker));

        map.set_projection(Some(Projection::Mercator));
        map.add_marker(marker);
        assert!(map.markers().unwrap()[0].proj_x.is_some());
    }

    #[test]
    fn relative_position_without_projection() {
        let mut map = Map::new(config(&[0]), PathBuf::from("/tmp/test"), None);
        assert_eq!(map.relative_position(45.0, 6.0), None);
        map.calibration_mut().calibration_points = vec![
            CalibrationPoint {
                x: 0.0,
                y: 0.0,
                proj_x: 6.0,
                proj_y: 46.0,
            },
            CalibrationPoint {
                x: 1.0,
                y: 1.0,
                proj_x: 7.0,
                proj_y: 45.0,
            },
        ];
        assert_eq!(map.relative_position(45.5, 6.5), Some((0.5, 0.5)));
        assert_eq!(map.config_file(), PathBuf::from("/tmp/test/map.json"));
    }
}
