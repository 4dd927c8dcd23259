use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::map::Map;
use crate::map_search;
use crate::marker::{Landmark, LandmarkFile, Marker, MarkerFile};
use crate::projection::Projection;
use crate::settings::DEFAULT_MAP_SEARCH_DEPTH;

pub const MAP_FILE_NAME: &str = "map.json";
pub const MAP_MARKER_FILE_NAME: &str = "markers.json";
pub const MAP_LANDMARK_FILE_NAME: &str = "landmarks.json";

pub trait MapListUpdateListener: Send + Sync {
    fn on_map_list_update(&self, maps_found: bool);
}

impl<F> MapListUpdateListener for F
where
    F: Fn(bool) + Send + Sync,
{
    fn on_map_list_update(&self, maps_found: bool) {
        self(maps_found)
    }
}

/* The central point for operations on the list of maps: registering maps
   (from a search or an import), persisting their json files, deleting and
   renaming them.

   Two maps are the same map if they live in the same directory.

   NOTE: listeners are always called without holding any lock, they are free
   to call back into the loader.
*/
pub struct MapLoader {
    maps: Mutex<Vec<Map>>,
    listeners: Mutex<Vec<Arc<dyn MapListUpdateListener>>>,
    search_depth: AtomicUsize,
}

lazy_static! {
    static ref INSTANCE: Arc<MapLoader> = Arc::new(MapLoader::new());
}

impl MapLoader {
    pub fn new() -> Self {
        MapLoader {
            maps: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            search_depth: AtomicUsize::new(DEFAULT_MAP_SEARCH_DEPTH),
        }
    }

    pub fn get_instance() -> Arc<MapLoader> {
        INSTANCE.clone()
    }

    pub fn set_search_depth(&self, depth: usize) {
        self.search_depth.store(depth, Ordering::Relaxed);
    }

    pub fn add_map_list_update_listener(&self, listener: Arc<dyn MapListUpdateListener>) {
        self.listeners.lock().unwrap().push(listener);
    }

    pub fn remove_map_list_update_listener(
        &self,
        listener: &Arc<dyn MapListUpdateListener>,
    ) -> bool {
        let mut listeners = self.listeners.lock().unwrap();
        let len = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != len
    }

    fn notify_map_list_update_listeners(&self) {
        let maps_found = !self.maps.lock().unwrap().is_empty();
        let listeners = self.listeners.lock().unwrap().clone();
        for listener in listeners {
            listener.on_map_list_update(maps_found);
        }
    }

    /// A snapshot of the current list.
    pub fn maps(&self) -> Vec<Map> {
        self.maps.lock().unwrap().clone()
    }

    pub fn clear_maps(&self) {
        self.maps.lock().unwrap().clear();
    }

    fn add_if_new(maps: &mut Vec<Map>, map: Map) -> Map {
        match maps.iter().find(|m| m.directory() == map.directory()) {
            Some(existing) => existing.clone(),
            None => {
                maps.push(map.clone());
                map
            }
        }
    }

    /// Searches the directories for maps and adds the new ones to the list.
    /// Returns the maps found, as registered in the list.
    pub fn update_maps(&self, dirs: &[PathBuf]) -> Vec<Map> {
        if dirs.is_empty() {
            return Vec::new();
        }
        let found = map_search::find_maps(dirs, self.search_depth.load(Ordering::Relaxed));
        debug!("[map_loader] {} map(s) found in {:?}", found.len(), dirs);

        let registered = {
            let mut maps = self.maps.lock().unwrap();
            found
                .into_iter()
                .map(|map| Self::add_if_new(&mut maps, map))
                .collect()
        };
        self.notify_map_list_update_listeners();
        registered
    }

    fn add_or_replace(maps: &mut Vec<Map>, map: Map) -> Map {
        match maps.iter_mut().find(|m| m.directory() == map.directory()) {
            Some(existing) => {
                existing.replace_content(map);
                existing.clone()
            }
            None => {
                maps.push(map.clone());
                map
            }
        }
    }

    /// Adds the map, or replaces the content of the one living in the same
    /// directory while keeping its id. Nothing is written to disk.
    pub fn register_map(&self, map: Map) -> Map {
        let registered = Self::add_or_replace(&mut self.maps.lock().unwrap(), map);
        self.notify_map_list_update_listeners();
        registered
    }

    /// Same as `register_map`, then writes the json file.
    pub fn add_map(&self, map: Map) -> Result<Map> {
        let registered = Self::add_or_replace(&mut self.maps.lock().unwrap(), map);
        self.save_map(registered.id())?;
        Ok(registered)
    }

    pub fn get_map(&self, name: &str) -> Option<Map> {
        self.maps
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.name() == name)
            .cloned()
    }

    pub fn get_map_by_id(&self, id: Uuid) -> Option<Map> {
        self.maps
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id() == id)
            .cloned()
    }

    /// Runs `f` on the registered map. Changes are in memory only.
    pub fn with_map_mut<F, R>(&self, id: Uuid, f: F) -> Result<R>
    where
        F: FnOnce(&mut Map) -> R,
    {
        let mut maps = self.maps.lock().unwrap();
        let map = maps
            .iter_mut()
            .find(|m| m.id() == id)
            .ok_or_else(|| anyhow!("unknown map: {}", id))?;
        Ok(f(map))
    }

    /// Writes the json file of the map so that changes survive a restart.
    pub fn save_map(&self, id: Uuid) -> Result<()> {
        let (config_file, json) =
            self.with_map_mut(id, |map| (map.config_file(), map.to_json()))?;
        let json = json?;
        fs::write(&config_file, json)
            .with_context(|| format!("failed to save map {:?}", config_file))?;
        debug!("[map_loader] saved {:?}", config_file);
        self.notify_map_list_update_listeners();
        Ok(())
    }

    /// Removes the map from the list and deletes its directory.
    pub fn delete_map(&self, id: Uuid) -> Result<()> {
        let map = {
            let mut maps = self.maps.lock().unwrap();
            let index = maps
                .iter()
                .position(|m| m.id() == id)
                .ok_or_else(|| anyhow!("unknown map: {}", id))?;
            maps.remove(index)
        };
        self.notify_map_list_update_listeners();

        info!("[map_loader] deleting {:?}", map.directory());
        fs::remove_dir_all(map.directory())
            .with_context(|| format!("failed to delete {:?}", map.directory()))?;
        Ok(())
    }

    /// The name is changed right away, then the directory is renamed to
    /// match. Returns whether the directory was renamed. Names that are not a
    /// plain file name are rejected. `map.json` is not updated, use
    /// `save_map` for that.
    pub fn rename_map(&self, id: Uuid, new_name: &str) -> Result<bool> {
        // the directory must stay next to the current one
        let mut components = Path::new(new_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => (),
            _ => bail!("invalid map name: {:?}", new_name),
        }
        self.with_map_mut(id, |map| {
            map.set_name(new_name.to_owned());
            let parent = match map.directory().parent() {
                Some(parent) => parent.to_path_buf(),
                None => return false,
            };
            let new_directory = parent.join(new_name);
            if new_directory.exists() {
                warn!("[map_loader] cannot rename, {:?} exists", new_directory);
                return false;
            }
            match fs::rename(map.directory(), &new_directory) {
                Ok(()) => {
                    map.set_directory(new_directory);
                    true
                }
                Err(e) => {
                    warn!("[map_loader] failed to rename {:?}: {}", map.directory(), e);
                    false
                }
            }
        })
    }

    /// Returns false if `projection_name` is not a known projection.
    pub fn mutate_map_projection(&self, id: Uuid, projection_name: &str) -> Result<bool> {
        let projection = match Projection::from_name(projection_name) {
            Some(projection) => projection,
            None => return Ok(false),
        };
        self.with_map_mut(id, |map| map.set_projection(Some(projection)))?;
        Ok(true)
    }

    fn map_file(&self, id: Uuid, file_name: &str) -> Result<PathBuf> {
        self.with_map_mut(id, |map| map.directory().join(file_name))
    }

    /// Reads `markers.json`. Returns whether markers were loaded.
    pub fn get_markers_for_map(&self, id: Uuid) -> Result<bool> {
        let marker_file = self.map_file(id, MAP_MARKER_FILE_NAME)?;
        match read_json_file::<MarkerFile>(&marker_file) {
            Ok(Some(content)) => {
                self.with_map_mut(id, |map| map.set_markers(content.markers))?;
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => {
                error!("[map_loader] {:#}", e);
                Ok(false)
            }
        }
    }

    pub fn save_markers(&self, id: Uuid) -> Result<()> {
        let (marker_file, content) = self.with_map_mut(id, |map| {
            (
                map.directory().join(MAP_MARKER_FILE_NAME),
                MarkerFile {
                    markers: map.markers().map(|x| x.to_vec()).unwrap_or_default(),
                },
            )
        })?;
        write_json_file(&marker_file, &content)
    }

    pub fn add_marker(&self, id: Uuid, marker: Marker) -> Result<()> {
        self.with_map_mut(id, |map| map.add_marker(marker))?;
        self.save_markers(id)
    }

    pub fn delete_marker(&self, id: Uuid, marker: &Marker) -> Result<bool> {
        let deleted = self.with_map_mut(id, |map| map.delete_marker(marker))?;
        if deleted {
            self.save_markers(id)?;
        }
        Ok(deleted)
    }

    /// Reads `landmarks.json`. Returns whether landmarks were loaded.
    pub fn get_landmarks_for_map(&self, id: Uuid) -> Result<bool> {
        let landmark_file = self.map_file(id, MAP_LANDMARK_FILE_NAME)?;
        match read_json_file::<LandmarkFile>(&landmark_file) {
            Ok(Some(content)) => {
                self.with_map_mut(id, |map| map.set_landmarks(content.landmarks))?;
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => {
                error!("[map_loader] {:#}", e);
                Ok(false)
            }
        }
    }

    pub fn save_landmarks(&self, id: Uuid) -> Result<()> {
        let (landmark_file, content) = self.with_map_mut(id, |map| {
            (
                map.directory().join(MAP_LANDMARK_FILE_NAME),
                LandmarkFile {
                    landmarks: map.landmarks().map(|x| x.to_vec()).unwrap_or_default(),
                },
            )
        })?;
        write_json_file(&landmark_file, &content)
    }

    pub fn add_landmark(&self, id: Uuid, landmark: Landmark) -> Result<()> {
        self.with_map_mut(id, |map| map.add_landmark(landmark))?;
        self.save_landmarks(id)
    }

    pub fn delete_landmark(&self, id: Uuid, landmark: &Landmark) -> Result<bool> {
        let deleted = self.with_map_mut(id, |map| map.delete_landmark(landmark))?;
        if deleted {
            self.save_landmarks(id)?;
        }
        Ok(deleted)
    }
}

fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value =
        serde_json::from_str(&content).with_context(|| format!("failed to parse {:?}", path))?;
    Ok(Some(value))
}

fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content).with_context(|| format!("failed to write {:?}", path))?;
    Ok(())
}
