//! Archive packing and extraction.
//!
//! Extraction is atomic: archives are unpacked into a sibling temp
//! directory that is renamed into place only once everything succeeded.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::debug;

use crate::platform::ArchiveFormat;
use crate::{Error, Result};

/// Write a gzip tarball at `dest` containing `entries`.
///
/// Each entry is `(name inside the archive, source path)`; directories are
/// added recursively, missing sources are skipped.
pub fn create_tar_gz(dest: &Path, entries: &[(String, PathBuf)]) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(dest)?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    builder.follow_symlinks(false);

    for (name, source) in entries {
        if source.is_dir() {
            builder.append_dir_all(name, source)?;
        } else if source.is_file() {
            builder.append_path_with_name(source, name)?;
        } else {
            debug!(path = %source.display(), "Skipping missing archive entry");
        }
    }

    builder.into_inner()?.finish()?;
    Ok(())
}

/// Extract `archive` into `dest` according to `format`.
pub fn extract(archive: &Path, format: ArchiveFormat, dest: &Path) -> Result<()> {
    match format {
        ArchiveFormat::TarGz => extract_tar_gz(archive, dest),
        ArchiveFormat::Zip => extract_zip(archive, dest),
    }
}

/// Extract a gzip tarball into `dest`, replacing it.
pub fn extract_tar_gz(archive: &Path, dest: &Path) -> Result<()> {
    atomically(dest, |temp_dir| {
        let file = File::open(archive)?;
        Archive::new(GzDecoder::new(file))
            .unpack(temp_dir)
            .map_err(|e| Error::extraction(archive, e.to_string()))
    })
}

/// Extract a zip archive into `dest`, replacing it.
pub fn extract_zip(archive: &Path, dest: &Path) -> Result<()> {
    atomically(dest, |temp_dir| {
        let file = File::open(archive)?;
        let mut zip = zip::ZipArchive::new(file)
            .map_err(|e| Error::extraction(archive, format!("Failed to open zip: {e}")))?;
        zip.extract(temp_dir)
            .map_err(|e| Error::extraction(archive, e.to_string()))
    })
}

fn atomically(dest: &Path, unpack: impl FnOnce(&Path) -> Result<()>) -> Result<()> {
    let temp_dir = dest.with_file_name(format!(
        ".{}.tmp",
        dest.file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("extract")
    ));

    // Clean up any previous failed extraction
    if temp_dir.exists() {
        std::fs::remove_dir_all(&temp_dir)?;
    }
    std::fs::create_dir_all(&temp_dir)?;

    if let Err(e) = unpack(&temp_dir) {
        let _ = std::fs::remove_dir_all(&temp_dir);
        return Err(e);
    }

    if dest.exists() {
        std::fs::remove_dir_all(dest)?;
    }
    std::fs::rename(&temp_dir, dest)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_tar_gz_round_trip_with_directory() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("caches");
        std::fs::create_dir_all(src.join("idea")).unwrap();
        std::fs::write(src.join("idea").join("index"), b"data").unwrap();

        let archive = dir.path().join("out").join("cache.tgz");
        create_tar_gz(&archive, &[("0".to_string(), src.clone())]).unwrap();

        let dest = dir.path().join("restored");
        extract_tar_gz(&archive, &dest).unwrap();
        assert_eq!(
            std::fs::read(dest.join("0").join("idea").join("index")).unwrap(),
            b"data"
        );
    }

    #[test]
    fn test_extract_replaces_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("qodana");
        std::fs::write(&file, b"bin").unwrap();
        let archive = dir.path().join("a.tar.gz");
        create_tar_gz(&archive, &[("qodana".to_string(), file)]).unwrap();

        let dest = dir.path().join("install");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("stale"), b"old").unwrap();

        extract(&archive, ArchiveFormat::TarGz, &dest).unwrap();
        assert!(dest.join("qodana").exists());
        assert!(!dest.join("stale").exists());
    }

    #[test]
    fn test_corrupt_archive_leaves_no_partial_state() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("broken.tar.gz");
        std::fs::write(&archive, b"definitely not gzip").unwrap();

        let dest = dir.path().join("install");
        assert!(extract_tar_gz(&archive, &dest).is_err());
        assert!(!dest.exists());
        assert!(!dir.path().join(".install.tmp").exists());
    }

    #[test]
    fn test_extract_zip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("q.zip");
        {
            let mut writer = zip::ZipWriter::new(File::create(&archive).unwrap());
            writer
                .start_file("qodana.exe", zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"MZ").unwrap();
            writer.finish().unwrap();
        }

        let dest = dir.path().join("install");
        extract(&archive, ArchiveFormat::Zip, &dest).unwrap();
        assert_eq!(std::fs::read(dest.join("qodana.exe")).unwrap(), b"MZ");
    }

    #[test]
    fn test_corrupt_zip_is_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("q.zip");
        std::fs::write(&archive, b"PK nope").unwrap();
        let err = extract_zip(&archive, &dir.path().join("x")).unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }));
    }
}
