use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use flutter_rust_bridge::frb;

use crate::archive;
use crate::map::Map;
use crate::map_importer::{self, MapParserStatus, MapProvider};
use crate::map_loader::MapLoader;
use crate::settings::Setting;
use crate::utils;

use super::api::{self, MapInfo};

#[derive(Debug)]
#[frb(non_opaque)]
pub struct MapArchiveInfo {
    pub name: String,
    pub path: String,
}

pub fn list_map_archives(dirs: Vec<String>) -> Vec<MapArchiveInfo> {
    let dirs: Vec<PathBuf> = dirs.into_iter().map(PathBuf::from).collect();
    archive::list_map_archives(&dirs)
        .into_iter()
        .map(|x| MapArchiveInfo {
            name: x.name,
            path: x.path.to_string_lossy().into_owned(),
        })
        .collect()
}

/// Imports a map directory or a zip archive. Both end up in the maps folder,
/// the only place searched at startup.
pub fn import_map(path: String) -> Result<MapInfo> {
    let state = api::get();
    let path = Path::new(&path);
    let is_zip = path
        .extension()
        .and_then(|x| x.to_str())
        .map(|x| x.eq_ignore_ascii_case("zip"))
        .unwrap_or(false);

    let (map, status) = if is_zip {
        let result = archive::import_archive(
            &state.map_loader,
            path,
            &state.maps_dir(),
            MapProvider::Libvips,
            None,
        )?;
        let delete_archive = state
            .settings
            .lock()
            .unwrap()
            .get_setting_with_default(Setting::DeleteArchiveAfterImport, false);
        if delete_archive {
            if let Err(e) = fs::remove_file(path) {
                warn!("[import] failed to delete {:?}: {}", path, e);
            }
        }
        result
    } else if path.is_dir() && !path.starts_with(state.maps_dir()) {
        import_copy(&state.map_loader, path, &state.maps_dir())?
    } else {
        map_importer::import_into(&state.map_loader, path, MapProvider::Libvips, None)?
    };
    debug!("[import] {} imported: {:?}", map.name(), status);
    Ok(MapInfo::of_map(&map))
}

// The source directory is left untouched.
fn import_copy(
    map_loader: &MapLoader,
    source: &Path,
    maps_dir: &Path,
) -> Result<(Map, MapParserStatus)> {
    let name = source
        .file_name()
        .ok_or_else(|| anyhow!("invalid map directory: {:?}", source))?;
    let destination = maps_dir.join(name);
    if destination.exists() {
        bail!("{:?} already exists", destination);
    }
    utils::copy_dir_all(source, &destination)?;
    match map_importer::import_into(map_loader, &destination, MapProvider::Libvips, None) {
        Ok(result) => Ok(result),
        Err(e) => {
            utils::remove_dir_logged(&destination);
            Err(e.into())
        }
    }
}
