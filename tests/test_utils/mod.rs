#![allow(dead_code)]

use image::{Rgb, RgbImage};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use trek_maps_core::map::Map;
use trek_maps_core::map_importer::{
    MapImportListener, MapParseError, MapParseIssue, MapParserStatus,
};

pub const TILE_SIZE: u32 = 100;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn write_image(path: &Path, width: u32, height: u32) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbImage::from_pixel(width, height, Rgb([52, 120, 61]))
        .save(path)
        .unwrap();
}

/// Same layout as `vips dzsave --layout google`: `<level>/<row>/<column>.jpg`.
/// Level `n` has `2^n` columns and `2^(n-1)` rows, so the last level of a 4
/// levels pyramid is 8 x 4 tiles.
pub fn write_libvips_pyramid(root: &Path, level_count: u32) {
    for level in 0..level_count {
        let columns = 1 << level;
        let rows = if level == 0 { 1 } else { 1 << (level - 1) };
        for row in 0..rows {
            for column in 0..columns {
                let tile = root.join(format!("{level}/{row}/{column}.jpg"));
                write_image(&tile, TILE_SIZE, TILE_SIZE);
            }
        }
    }
    write_image(&root.join("blank.png"), TILE_SIZE, TILE_SIZE);
}

/// `<maps_dir>/libvips-no-json/mapname/...`, the map being one level below
/// the directory we import from. Returns the directory to import.
pub fn create_libvips_no_json(maps_dir: &Path) -> PathBuf {
    let dir = maps_dir.join("libvips-no-json");
    write_libvips_pyramid(&dir.join("mapname"), 4);
    dir
}

pub const LA_REUNION_EST: &str = "La Réunion - Est";

const LA_REUNION_EST_JSON: &str = r#"{
  "name": "La Réunion - Est",
  "thumbnail": null,
  "levels": [
    {"level": 0, "tile_size": {"x": 256, "y": 256}},
    {"level": 1, "tile_size": {"x": 256, "y": 256}},
    {"level": 2, "tile_size": {"x": 256, "y": 256}}
  ],
  "provider": {"generated_by": "LIBVIPS", "image_extension": ".jpg"},
  "size": {"x": 1024, "y": 768},
  "calibration": {
    "projection": {"projection_name": "Universal Transverse Mercator", "zone": 40, "hemisphere": "S"},
    "calibration_method": "SIMPLE_2_POINTS",
    "calibration_points": [
      {"x": 0.0, "y": 0.0, "proj_x": 340000.0, "proj_y": 7680000.0},
      {"x": 1.0, "y": 1.0, "proj_x": 370000.0, "proj_y": 7650000.0}
    ]
  }
}"#;

/// `<maps_dir>/libvips-with-json/la-reunion-est/` with its `map.json`.
pub fn create_libvips_with_json(maps_dir: &Path) -> PathBuf {
    let dir = maps_dir.join("libvips-with-json");
    let root = dir.join("la-reunion-est");
    write_libvips_pyramid(&root, 3);
    let mut file = File::create(root.join("map.json")).unwrap();
    file.write_all(LA_REUNION_EST_JSON.as_bytes()).unwrap();
    dir
}

/// Zips `dir` with entry names relative to `dir`, prefixed by `prefix`.
pub fn zip_dir(dir: &Path, prefix: &str, target: &Path) {
    let mut zip = zip::ZipWriter::new(File::create(target).unwrap());
    let options = zip::write::SimpleFileOptions::default();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in fs::read_dir(&current).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let relative = path.strip_prefix(dir).unwrap().to_str().unwrap();
                zip.start_file(format!("{prefix}{relative}"), options)
                    .unwrap();
                zip.write_all(&fs::read(&path).unwrap()).unwrap();
            }
        }
    }
    zip.finish().unwrap();
}

#[derive(Default)]
pub struct RecordingListener {
    pub imported: Mutex<Vec<(Map, MapParserStatus)>>,
    pub errors: Mutex<Vec<MapParseIssue>>,
}

impl RecordingListener {
    pub fn callback_count(&self) -> usize {
        self.imported.lock().unwrap().len() + self.errors.lock().unwrap().len()
    }
}

impl MapImportListener for RecordingListener {
    fn on_map_imported(&self, map: &Map, status: MapParserStatus) {
        self.imported.lock().unwrap().push((map.clone(), status));
    }

    fn on_map_import_error(&self, error: &MapParseError) {
        self.errors.lock().unwrap().push(error.issue);
    }
}
