use std::path::{Path, PathBuf};

use crate::map::Map;
use crate::map_loader::MAP_FILE_NAME;
use crate::utils;

/* Walks the given directories looking for `map.json` files. A directory
   holding a `map.json` is a map, so we don't look inside it. Everything here
   is best effort: unreadable directories and broken maps are logged and
   skipped.
*/

pub fn find_maps(dirs: &[PathBuf], max_depth: usize) -> Vec<Map> {
    let mut config_files = Vec::new();
    for dir in dirs {
        find_config_files(dir, max_depth, &mut config_files);
    }
    config_files
        .into_iter()
        .filter_map(|config_file| match Map::open(&config_file) {
            Ok(map) => Some(map),
            Err(e) => {
                warn!("[map_search] skipping {:?}: {:#}", config_file, e);
                None
            }
        })
        .collect()
}

fn find_config_files(dir: &Path, depth_left: usize, result: &mut Vec<PathBuf>) {
    let config_file = dir.join(MAP_FILE_NAME);
    if config_file.is_file() {
        result.push(config_file);
        return;
    }
    if depth_left == 0 {
        return;
    }
    let entries = match utils::list_dir_sorted(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("[map_search] cannot read {:?}: {}", dir, e);
            return;
        }
    };
    for entry in entries.into_iter().filter(|p| p.is_dir()) {
        // tile pyramids are big and never contain maps
        if utils::numeric_name(&entry).is_some() {
            continue;
        }
        find_config_files(&entry, depth_left - 1, result);
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempdir::TempDir;

    use super::find_config_files;

    #[test]
    fn depth_limit() {
        let temp_dir = TempDir::new("map_search-depth_limit").unwrap();
        let shallow = temp_dir.path().join("a");
        let deep = temp_dir.path().join("b/c/d");
        fs::create_dir_all(&shallow).unwrap();
        fs::create_dir_all(&deep).unwrap();
        fs::write(shallow.join("map.json"), "{}").unwrap();
        fs::write(deep.join("map.json"), "{}").unwrap();
        // maps nested in a map are ignored
        fs::create_dir_all(shallow.join("nested")).unwrap();
        fs::write(shallow.join("nested/map.json"), "{}").unwrap();

        let mut found = Vec::new();
        find_config_files(temp_dir.path(), 1, &mut found);
        assert_eq!(found, vec![shallow.join("map.json")]);

        let mut found = Vec::new();
        find_config_files(temp_dir.path(), 3, &mut found);
        assert_eq!(found, vec![shallow.join("map.json"), deep.join("map.json")]);
    }
}
