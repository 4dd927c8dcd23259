use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use anyhow::{Ok, Result};
use flutter_rust_bridge::frb;
use uuid::Uuid;

use crate::logs;
use crate::map::Map;
use crate::map_loader::MapLoader;
use crate::settings::{Setting, Settings};

pub const MAPS_FOLDER: &str = "maps";

pub(crate) struct MainState {
    pub support_dir: PathBuf,
    pub cache_dir: String,
    pub settings: Mutex<Settings>,
    pub map_loader: Arc<MapLoader>,
}

impl MainState {
    pub fn maps_dir(&self) -> PathBuf {
        self.support_dir.join(MAPS_FOLDER)
    }
}

static MAIN_STATE: OnceLock<MainState> = OnceLock::new();

/// Sets up logging, settings and loads the maps stored in
/// `support_dir/maps`. Calling it again is a no-op.
pub fn init(support_dir: String, cache_dir: String) -> Result<()> {
    if MAIN_STATE.get().is_some() {
        warn!("`init` is called multiple times");
        return Ok(());
    }

    if let Err(e) = logs::init(&cache_dir) {
        // most likely a logger was installed by someone else
        eprintln!("failed to initialize logging: {e:?}");
    }

    let support_dir = PathBuf::from(support_dir);
    let settings = Settings::open(&support_dir)?;
    let map_loader = MapLoader::get_instance();
    map_loader.set_search_depth(settings.map_search_depth());

    let state = MainState {
        support_dir,
        cache_dir,
        settings: Mutex::new(settings),
        map_loader,
    };
    std::fs::create_dir_all(state.maps_dir())?;
    let maps = state.map_loader.update_maps(&[state.maps_dir()]);
    info!("initialized, {} map(s) loaded", maps.len());

    if MAIN_STATE.set(state).is_err() {
        warn!("`init` is called concurrently");
    }
    Ok(())
}

pub(crate) fn get() -> &'static MainState {
    MAIN_STATE.get().expect("main state is not initialized")
}

#[derive(Debug, Clone)]
#[frb(non_opaque)]
pub struct MapInfo {
    pub id: String,
    pub name: String,
    pub directory: String,
    pub level_count: u32,
    pub image_extension: String,
    pub width: u32,
    pub height: u32,
    pub has_thumbnail: bool,
}

impl MapInfo {
    pub(crate) fn of_map(map: &Map) -> Self {
        let size = map.config().size;
        MapInfo {
            id: map.id().to_string(),
            name: map.name().to_owned(),
            directory: map.directory().to_string_lossy().into_owned(),
            level_count: map.levels().len() as u32,
            image_extension: map.image_extension().to_owned(),
            width: size.x,
            height: size.y,
            has_thumbnail: map.image().is_some(),
        }
    }
}

pub fn list_maps() -> Vec<MapInfo> {
    get()
        .map_loader
        .maps()
        .iter()
        .map(MapInfo::of_map)
        .collect()
}

/// Looks for maps added to the maps folder behind our back.
pub fn refresh_maps() -> Vec<MapInfo> {
    let state = get();
    state.map_loader.update_maps(&[state.maps_dir()]);
    list_maps()
}

pub fn delete_map(map_id: String) -> Result<()> {
    get().map_loader.delete_map(Uuid::parse_str(&map_id)?)
}

pub fn rename_map(map_id: String, new_name: String) -> Result<()> {
    let map_loader = &get().map_loader;
    let id = Uuid::parse_str(&map_id)?;
    if !map_loader.rename_map(id, &new_name)? {
        warn!("[api] map {} renamed but its directory was kept", id);
    }
    map_loader.save_map(id)
}

pub fn set_map_projection(map_id: String, projection_name: String) -> Result<bool> {
    let map_loader = &get().map_loader;
    let id = Uuid::parse_str(&map_id)?;
    if !map_loader.mutate_map_projection(id, &projection_name)? {
        return Ok(false);
    }
    map_loader.save_map(id)?;
    Ok(true)
}

#[frb(sync)]
pub fn get_delete_archive_after_import() -> bool {
    get()
        .settings
        .lock()
        .unwrap()
        .get_setting_with_default(Setting::DeleteArchiveAfterImport, false)
}

pub fn set_delete_archive_after_import(enable: bool) -> Result<()> {
    get()
        .settings
        .lock()
        .unwrap()
        .set_setting(Setting::DeleteArchiveAfterImport, enable)
}

pub fn export_logs(target_file_path: String) -> Result<()> {
    let state = get();
    if !Path::new(&state.cache_dir).join(logs::LOG_FOLDER).exists() {
        bail!("no log to export");
    }
    logs::export(&state.cache_dir, &target_file_path)
}
