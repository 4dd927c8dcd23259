use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::map::Map;
use crate::map_importer::{self, MapImportListener, MapParseError, MapParserStatus, MapProvider};
use crate::map_loader::MapLoader;
use crate::utils;

/* Maps are shared as zip archives of their directory. Whether the map was
   zipped within a subdirectory or not depends on the tool that made the
   archive, the importer takes care of finding the map root once extracted.
*/

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapArchive {
    pub name: String,
    pub path: PathBuf,
}

/// `.zip` files directly inside the given directories.
pub fn list_map_archives(dirs: &[PathBuf]) -> Vec<MapArchive> {
    let mut result = Vec::new();
    for dir in dirs {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("[archive] cannot read {:?}: {}", dir, e);
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let is_zip = path
                .extension()
                .and_then(|x| x.to_str())
                .map(|x| x.eq_ignore_ascii_case("zip"))
                .unwrap_or(false);
            if !is_zip || !path.is_file() {
                continue;
            }
            if let Some(name) = path.file_stem().and_then(|x| x.to_str()) {
                result.push(MapArchive {
                    name: name.to_owned(),
                    path: path.clone(),
                });
            }
        }
    }
    result.sort_by(|a, b| a.path.cmp(&b.path));
    result
}

/// Extracts the archive into `output_dir/<archive name>` and returns that
/// directory.
pub fn extract_archive(zip_file_path: &Path, output_dir: &Path) -> Result<PathBuf> {
    let stem = zip_file_path
        .file_stem()
        .and_then(|x| x.to_str())
        .ok_or_else(|| anyhow!("invalid archive name: {:?}", zip_file_path))?;
    let destination = output_dir.join(stem);
    if destination.exists() {
        bail!("{:?} already exists", destination);
    }

    let mut zip = zip::ZipArchive::new(
        File::open(zip_file_path).with_context(|| format!("cannot open {:?}", zip_file_path))?,
    )?;
    fs::create_dir_all(&destination)?;
    if let Err(e) = extract_entries(&mut zip, &destination) {
        // don't leave a half extracted map behind
        utils::remove_dir_logged(&destination);
        return Err(e);
    }
    info!(
        "[archive] extracted {} entries from {:?} into {:?}",
        zip.len(),
        zip_file_path,
        destination
    );
    Ok(destination)
}

fn extract_entries(zip: &mut zip::ZipArchive<File>, destination: &Path) -> Result<()> {
    for i in 0..zip.len() {
        let mut file = zip.by_index(i)?;
        // reject absolute paths and `..`
        let relative_path = match file.enclosed_name() {
            Some(path) => path,
            None => bail!("unsafe entry in archive: {}", file.name()),
        };
        let out_path = destination.join(relative_path);
        if file.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out_file = File::create(&out_path)?;
        io::copy(&mut file, &mut out_file)?;
    }
    Ok(())
}

/// Extracts then imports. Extraction failures are reported to the listener
/// as I/O issues. Nothing is left in `output_dir` when the import fails.
pub fn import_archive(
    loader: &MapLoader,
    zip_file_path: &Path,
    output_dir: &Path,
    provider: MapProvider,
    listener: Option<&dyn MapImportListener>,
) -> Result<(Map, MapParserStatus), MapParseError> {
    let extracted = match extract_archive(zip_file_path, output_dir) {
        Ok(extracted) => extracted,
        Err(e) => {
            let error =
                MapParseError::new(map_importer::MapParseIssue::Io, format!("{e:#}"));
            if let Some(listener) = listener {
                listener.on_map_import_error(&error);
            }
            return Err(error);
        }
    };
    let result = map_importer::import_into(loader, &extracted, provider, listener);
    if result.is_err() {
        // the archive name must stay available for a fixed archive
        utils::remove_dir_logged(&extracted);
    }
    result
}
