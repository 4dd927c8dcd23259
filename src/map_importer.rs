use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;

use crate::calibration::Calibration;
use crate::map::{self, Level, Map, MapConfig, MapSize, ProviderInfo, TileSize};
use crate::map_loader::{MapLoader, MAP_FILE_NAME};
use crate::utils;

/* Importing a map means turning a directory produced by a tiling tool into a
   `Map` registered in the `MapLoader`.

   We don't control how that directory reaches us: maps are usually extracted
   from an archive and we can't know whether the map was zipped within a
   subdirectory or not. So the first step is always to find the map root by
   looking at the file structure.
*/

/// How far we follow single-subdirectory chains when looking for a map root.
pub const MAX_ROOT_SEARCH_DEPTH: usize = 3;

/// An image at the root of a map is used as thumbnail only if it is at most
/// this size, so that we never decode a full size export.
pub const THUMBNAIL_ACCEPT_SIZE: u32 = 512;

// Produced by `vips dzsave --layout google` to fill missing tiles.
const LIBVIPS_BLANK_TILE: &str = "blank";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum MapProvider {
    #[serde(rename = "LIBVIPS")]
    #[strum(serialize = "LIBVIPS")]
    Libvips,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapParserStatus {
    // metadata was generated from the tiles and written next to them
    NewMap,
    // the directory already had a `map.json`
    ExistingMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum MapParseIssue {
    NotADirectory,
    NoParentFolderFound,
    NoLevelFound,
    UnknownImageExtension,
    MapSizeIncorrect,
    InvalidMapFile,
    Io,
}

#[derive(Debug, Error)]
#[error("{issue}: {message}")]
pub struct MapParseError {
    pub issue: MapParseIssue,
    pub message: String,
}

impl MapParseError {
    pub fn new(issue: MapParseIssue, message: impl Into<String>) -> Self {
        MapParseError {
            issue,
            message: message.into(),
        }
    }

    fn io(error: anyhow::Error) -> Self {
        Self::new(MapParseIssue::Io, format!("{error:#}"))
    }
}

/// Exactly one of the two methods is called for each import.
pub trait MapImportListener {
    fn on_map_imported(&self, map: &Map, status: MapParserStatus);
    fn on_map_import_error(&self, error: &MapParseError);
}

/// Builds a `Map` from a map root laid out by a given tiling tool.
pub trait MapParser {
    fn parse(&self, root: &Path) -> Result<Map, MapParseError>;
}

fn parser_for(provider: MapProvider) -> &'static dyn MapParser {
    match provider {
        MapProvider::Libvips => &LibvipsMapParser,
    }
}

/// Imports into the process wide `MapLoader`.
pub fn import_from_dir(
    directory: &Path,
    provider: MapProvider,
    listener: Option<&dyn MapImportListener>,
) -> Result<(Map, MapParserStatus), MapParseError> {
    import_into(&MapLoader::get_instance(), directory, provider, listener)
}

pub fn import_into(
    loader: &MapLoader,
    directory: &Path,
    provider: MapProvider,
    listener: Option<&dyn MapImportListener>,
) -> Result<(Map, MapParserStatus), MapParseError> {
    let result = import_internal(loader, directory, provider);
    match &result {
        Ok((map, status)) => {
            info!(
                "[map_importer] imported `{}` from {:?} ({:?})",
                map.name(),
                map.directory(),
                status
            );
            if let Some(listener) = listener {
                listener.on_map_imported(map, *status);
            }
        }
        Err(e) => {
            warn!("[map_importer] failed to import {:?}: {}", directory, e);
            if let Some(listener) = listener {
                listener.on_map_import_error(e);
            }
        }
    }
    result
}

pub fn import_in_background(
    loader: Arc<MapLoader>,
    directory: PathBuf,
    provider: MapProvider,
    listener: Box<dyn MapImportListener + Send>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        // the outcome is reported to the listener
        let _ = import_into(&loader, &directory, provider, Some(listener.as_ref()));
    })
}

fn import_internal(
    loader: &MapLoader,
    directory: &Path,
    provider: MapProvider,
) -> Result<(Map, MapParserStatus), MapParseError> {
    let root = find_map_root(directory)?;
    debug!("[map_importer] map root of {:?} is {:?}", directory, root);

    let config_file = root.join(MAP_FILE_NAME);
    if config_file.is_file() {
        let map = Map::open(&config_file)
            .map_err(|e| MapParseError::new(MapParseIssue::InvalidMapFile, format!("{e:#}")))?;
        // the file may have changed since the map was registered
        let map = loader.register_map(map);
        return Ok((map, MapParserStatus::ExistingMap));
    }

    let map = parser_for(provider).parse(&root)?;
    let map = loader.add_map(map).map_err(MapParseError::io)?;
    Ok((map, MapParserStatus::NewMap))
}

fn is_map_root(dir: &Path) -> anyhow::Result<bool> {
    Ok(dir.join(MAP_FILE_NAME).is_file() || !utils::numbered_entries(dir, true)?.is_empty())
}

/// The directory holding `map.json` or the level directories. It is either
/// `directory` itself or found by following directories that contain a
/// single subdirectory.
pub fn find_map_root(directory: &Path) -> Result<PathBuf, MapParseError> {
    if !directory.is_dir() {
        return Err(MapParseError::new(
            MapParseIssue::NotADirectory,
            format!("{:?} is not a directory", directory),
        ));
    }
    let mut current = directory.to_path_buf();
    for _ in 0..=MAX_ROOT_SEARCH_DEPTH {
        if is_map_root(&current).map_err(MapParseError::io)? {
            return Ok(current);
        }
        let sub_dirs: Vec<PathBuf> = utils::list_dir_sorted(&current)
            .map_err(MapParseError::io)?
            .into_iter()
            .filter(|p| p.is_dir())
            .collect();
        match sub_dirs.as_slice() {
            [single] => current = single.clone(),
            _ => break,
        }
    }
    Err(MapParseError::new(
        MapParseIssue::NoParentFolderFound,
        format!("no map found in {:?}", directory),
    ))
}

/* `vips dzsave --layout google` writes `<level>/<row>/<column>.<ext>`. Levels
   are numbered from the most zoomed out one, the last level is the full
   resolution image.
*/
pub struct LibvipsMapParser;

impl LibvipsMapParser {
    fn first_tile(level_dir: &Path) -> anyhow::Result<Option<PathBuf>> {
        for (_, row_dir) in utils::numbered_entries(level_dir, true)? {
            if let Some((_, tile)) = utils::numbered_entries(&row_dir, false)?.into_iter().next()
            {
                return Ok(Some(tile));
            }
        }
        Ok(None)
    }

    // (columns, rows) of a level, the columns being counted in the first row
    fn grid_size(level_dir: &Path) -> anyhow::Result<(usize, usize)> {
        let rows = utils::numbered_entries(level_dir, true)?;
        let columns = match rows.first() {
            None => 0,
            Some((_, first_row)) => utils::numbered_entries(first_row, false)?.len(),
        };
        Ok((columns, rows.len()))
    }

    /// `None` for an empty grid, or a size that doesn't fit in `u32`.
    fn map_size(columns: usize, rows: usize, tile_size: TileSize) -> Option<MapSize> {
        if columns == 0 || rows == 0 {
            return None;
        }
        Some(MapSize {
            x: u32::try_from(columns).ok()?.checked_mul(tile_size.x)?,
            y: u32::try_from(rows).ok()?.checked_mul(tile_size.y)?,
        })
    }

    fn find_thumbnail(root: &Path) -> anyhow::Result<Option<(String, image::RgbaImage)>> {
        for path in utils::list_dir_sorted(root)? {
            if !path.is_file() || utils::image_extension(&path).is_none() {
                continue;
            }
            let name = match path.file_name().and_then(|x| x.to_str()) {
                Some(name) => name.to_owned(),
                None => continue,
            };
            if path.file_stem().and_then(|x| x.to_str()) == Some(LIBVIPS_BLANK_TILE) {
                continue;
            }
            match image::image_dimensions(&path) {
                Ok((w, h)) if w <= THUMBNAIL_ACCEPT_SIZE && h <= THUMBNAIL_ACCEPT_SIZE => {
                    if let Some(image) = map::load_thumbnail(&path) {
                        return Ok(Some((name, image)));
                    }
                }
                Ok(_) => debug!("[libvips] {:?} is too big for a thumbnail", path),
                Err(e) => debug!("[libvips] cannot read {:?}: {}", path, e),
            }
        }
        Ok(None)
    }
}

impl MapParser for LibvipsMapParser {
    fn parse(&self, root: &Path) -> Result<Map, MapParseError> {
        let mut levels = Vec::new();
        let mut image_extension: Option<String> = None;
        let mut last_level: Option<(PathBuf, TileSize)> = None;

        let level_dirs = utils::numbered_entries(root, true).map_err(MapParseError::io)?;
        for (level, level_dir) in level_dirs {
            let tile = match Self::first_tile(&level_dir).map_err(MapParseError::io)? {
                Some(tile) => tile,
                None => {
                    warn!("[libvips] level {:?} has no tile", level_dir);
                    continue;
                }
            };
            if image_extension.is_none() {
                image_extension = Some(utils::image_extension(&tile).ok_or_else(|| {
                    MapParseError::new(
                        MapParseIssue::UnknownImageExtension,
                        format!("{:?} is not a supported image", tile),
                    )
                })?);
            }
            let (x, y) = match image::image_dimensions(&tile) {
                Ok(dimensions) => dimensions,
                Err(e) => {
                    warn!("[libvips] cannot read tile {:?}: {}", tile, e);
                    continue;
                }
            };
            let tile_size = TileSize { x, y };
            levels.push(Level { level, tile_size });
            last_level = Some((level_dir, tile_size));
        }

        let (image_extension, (last_level_dir, last_tile_size)) =
            match (image_extension, last_level) {
                (Some(ext), Some(last_level)) => (ext, last_level),
                _ => {
                    return Err(MapParseError::new(
                        MapParseIssue::NoLevelFound,
                        format!("no readable level in {:?}", root),
                    ))
                }
            };

        let (columns, rows) = Self::grid_size(&last_level_dir).map_err(MapParseError::io)?;
        let size = Self::map_size(columns, rows, last_tile_size).ok_or_else(|| {
            MapParseError::new(
                MapParseIssue::MapSizeIncorrect,
                format!(
                    "cannot compute the size of {:?}: {} x {} tiles of {} x {}",
                    last_level_dir, columns, rows, last_tile_size.x, last_tile_size.y
                ),
            )
        })?;

        let (thumbnail, image) = match Self::find_thumbnail(root).map_err(MapParseError::io)? {
            Some((name, image)) => (Some(name), Some(image)),
            None => (None, None),
        };

        let name = root
            .file_name()
            .map(|x| x.to_string_lossy().into_owned())
            .unwrap_or_default();

        let config = MapConfig {
            name,
            thumbnail,
            levels,
            provider: ProviderInfo {
                generated_by: MapProvider::Libvips,
                image_extension,
            },
            size,
            calibration: Calibration::default(),
        };
        Ok(Map::new(config, root.to_path_buf(), image))
    }
}
