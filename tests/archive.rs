pub mod test_utils;
use std::fs::{self, File};
use std::io::Write;
use tempdir::TempDir;
use test_utils::*;
use trek_maps_core::archive::{self, MapArchive};
use trek_maps_core::map_importer::{MapParseIssue, MapParserStatus, MapProvider};
use trek_maps_core::map_loader::MapLoader;

#[test]
fn import_zipped_map() {
    init_logging();
    let temp_dir = TempDir::new("archive-import_zipped_map").unwrap();
    let source = temp_dir.path().join("source");
    write_libvips_pyramid(&source, 3);
    // zipped within a folder, the usual case for archives made by hand
    let zip_file = temp_dir.path().join("chamonix.zip");
    zip_dir(&source, "chamonix-map/", &zip_file);

    let maps_dir = temp_dir.path().join("maps");
    fs::create_dir(&maps_dir).unwrap();
    let loader = MapLoader::new();
    let listener = RecordingListener::default();
    let (map, status) = archive::import_archive(
        &loader,
        &zip_file,
        &maps_dir,
        MapProvider::Libvips,
        Some(&listener),
    )
    .unwrap();

    assert_eq!(status, MapParserStatus::NewMap);
    assert_eq!(listener.callback_count(), 1);
    assert_eq!(map.directory(), maps_dir.join("chamonix/chamonix-map"));
    assert_eq!(map.name(), "chamonix-map");
    assert_eq!(map.levels().len(), 3);
    assert!(map.config_file().is_file());

    // the destination exists now
    let listener = RecordingListener::default();
    let error = archive::import_archive(
        &loader,
        &zip_file,
        &maps_dir,
        MapProvider::Libvips,
        Some(&listener),
    )
    .unwrap_err();
    assert_eq!(error.issue, MapParseIssue::Io);
    assert_eq!(*listener.errors.lock().unwrap(), vec![MapParseIssue::Io]);
    assert_eq!(loader.maps().len(), 1);
}

#[test]
fn failed_import_leaves_nothing_behind() {
    let temp_dir = TempDir::new("archive-failed_import").unwrap();
    let maps_dir = temp_dir.path().join("maps");
    fs::create_dir(&maps_dir).unwrap();
    let zip_file = temp_dir.path().join("alps.zip");

    // no tiles at all
    let notes = temp_dir.path().join("notes");
    fs::create_dir(&notes).unwrap();
    fs::write(notes.join("README.txt"), "tiles coming soon").unwrap();
    zip_dir(&notes, "", &zip_file);

    let loader = MapLoader::new();
    let error =
        archive::import_archive(&loader, &zip_file, &maps_dir, MapProvider::Libvips, None)
            .unwrap_err();
    assert_eq!(error.issue, MapParseIssue::NoParentFolderFound);
    assert!(!maps_dir.join("alps").exists());

    // the fixed archive, same name
    let source = temp_dir.path().join("source");
    write_libvips_pyramid(&source, 2);
    zip_dir(&source, "", &zip_file);
    let (map, status) =
        archive::import_archive(&loader, &zip_file, &maps_dir, MapProvider::Libvips, None)
            .unwrap();
    assert_eq!(status, MapParserStatus::NewMap);
    assert_eq!(map.directory(), maps_dir.join("alps"));
}

#[test]
fn unsafe_entries_are_rejected() {
    let temp_dir = TempDir::new("archive-unsafe_entries").unwrap();
    let zip_file = temp_dir.path().join("evil.zip");
    {
        let mut zip = zip::ZipWriter::new(File::create(&zip_file).unwrap());
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("map/0/0/0.jpg", options).unwrap();
        zip.write_all(b"tile").unwrap();
        zip.start_file("../escaped.txt", options).unwrap();
        zip.write_all(b"hello").unwrap();
        zip.finish().unwrap();
    }

    let output_dir = temp_dir.path().join("out");
    fs::create_dir(&output_dir).unwrap();
    assert!(archive::extract_archive(&zip_file, &output_dir).is_err());
    assert!(!temp_dir.path().join("escaped.txt").exists());
    // nothing is left behind
    assert!(!output_dir.join("evil").exists());
}

#[test]
fn not_a_zip() {
    let temp_dir = TempDir::new("archive-not_a_zip").unwrap();
    let zip_file = temp_dir.path().join("fake.zip");
    fs::write(&zip_file, "definitely not a zip").unwrap();
    let loader = MapLoader::new();
    let listener = RecordingListener::default();

    let error = archive::import_archive(
        &loader,
        &zip_file,
        temp_dir.path(),
        MapProvider::Libvips,
        Some(&listener),
    )
    .unwrap_err();
    assert_eq!(error.issue, MapParseIssue::Io);
    assert_eq!(listener.callback_count(), 1);
}

#[test]
fn list_map_archives() {
    let temp_dir = TempDir::new("archive-list").unwrap();
    let downloads = temp_dir.path().join("downloads");
    fs::create_dir_all(downloads.join("nested")).unwrap();
    fs::write(downloads.join("b.zip"), "").unwrap();
    fs::write(downloads.join("A.ZIP"), "").unwrap();
    fs::write(downloads.join("notes.txt"), "").unwrap();
    fs::write(downloads.join("nested/c.zip"), "").unwrap();

    let archives = archive::list_map_archives(&[downloads.clone(), temp_dir.path().join("missing")]);
    assert_eq!(
        archives,
        vec![
            MapArchive {
                name: "A".to_owned(),
                path: downloads.join("A.ZIP"),
            },
            MapArchive {
                name: "b".to_owned(),
                path: downloads.join("b.zip"),
            },
        ]
    );
}
