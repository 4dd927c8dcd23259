use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use strum_macros::{Display, EnumString};

pub const SETTINGS_FILE_NAME: &str = "settings.json";

pub const DEFAULT_MAP_SEARCH_DEPTH: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Setting {
    // How deep `update_maps` looks for `map.json` files.
    MapSearchDepth,
    // Whether the zip file is removed once a map archive is imported.
    DeleteArchiveAfterImport,
}

/* User settings, stored as a flat string map in `settings.json`. Values are
   converted with `FromStr`/`ToString` so the file stays readable and a value
   that no longer parses falls back to its default.
*/
pub struct Settings {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl Settings {
    pub fn open(support_dir: &Path) -> Result<Settings> {
        let path = support_dir.join(SETTINGS_FILE_NAME);
        let values = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)
                .with_context(|| format!("invalid settings file {:?}", path))?
        } else {
            BTreeMap::new()
        };
        Ok(Settings { path, values })
    }

    fn get_setting<T: FromStr>(&self, setting: Setting) -> Result<Option<T>>
    where
        <T as FromStr>::Err: Error + Send + Sync + 'static,
    {
        match self.values.get(&setting.to_string()) {
            None => Ok(None),
            Some(s) => Ok(Some(FromStr::from_str(s)?)),
        }
    }

    pub fn get_setting_with_default<T: FromStr>(&self, setting: Setting, default: T) -> T
    where
        <T as FromStr>::Err: Error + Send + Sync + 'static,
    {
        match self.get_setting(setting) {
            Ok(v) => v,
            Err(error) => {
                warn!(
                    "[settings.get_setting_with_default] setting:{:?}, error:{}",
                    setting, error
                );
                None
            }
        }
        .unwrap_or(default)
    }

    pub fn set_setting<T: ToString>(&mut self, setting: Setting, value: T) -> Result<()> {
        self.values.insert(setting.to_string(), value.to_string());
        let content = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn map_search_depth(&self) -> usize {
        self.get_setting_with_default(Setting::MapSearchDepth, DEFAULT_MAP_SEARCH_DEPTH)
    }
}
