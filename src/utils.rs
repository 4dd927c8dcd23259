use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;

pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|x| x.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Visible entries of a directory, sorted by path so that the result does not
/// depend on the file system.
pub fn list_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !is_hidden(&path) {
            entries.push(path);
        }
    }
    entries.sort();
    Ok(entries)
}

/// Best effort removal of a directory we created, failures are only logged.
pub fn remove_dir_logged(dir: &Path) {
    if let Err(e) = fs::remove_dir_all(dir) {
        warn!("[utils] failed to clean {:?}: {}", dir, e);
    }
}

/// Copies the content of `source` into `destination`, created if needed.
pub fn copy_dir_all(source: &Path, destination: &Path) -> Result<()> {
    fs::create_dir_all(destination)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let target = destination.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_all(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Tile pyramids name levels, rows and columns with plain numbers.
pub fn numeric_name(path: &Path) -> Option<u32> {
    path.file_stem()?.to_str()?.parse().ok()
}

/// Directories and files named with a number, sorted by that number.
pub fn numbered_entries(dir: &Path, want_dirs: bool) -> Result<Vec<(u32, PathBuf)>> {
    let mut entries: Vec<(u32, PathBuf)> = list_dir_sorted(dir)?
        .into_iter()
        .filter(|p| p.is_dir() == want_dirs)
        .filter_map(|p| numeric_name(&p).map(|n| (n, p)))
        .collect();
    entries.sort_by_key(|(n, _)| *n);
    Ok(entries)
}

/// Lower-cased extension with its leading dot, for raster images we can read.
pub fn image_extension(path: &Path) -> Option<String> {
    let extension = path.extension()?.to_str()?.to_lowercase();
    if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        Some(format!(".{extension}"))
    } else {
        None
    }
}
