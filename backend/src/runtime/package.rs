//! Handler package shipped to runtime containers
//!
//! The invocation server files are zipped to a transient archive, extracted
//! into the shared directory the container mounts, then the archive is removed.

use std::fs::File;
use std::io;
use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::Result;

/// Zip every file under `source_dir` into `zip_path`.
/// Fails if `entrypoint` is not a file at the root of `source_dir`.
pub fn create_handler_zip(source_dir: &Path, zip_path: &Path, entrypoint: &str) -> Result<()> {
    if !source_dir.join(entrypoint).is_file() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!(
                "handler entrypoint {} not found in {}",
                entrypoint,
                source_dir.display()
            ),
        )
        .into());
    }

    if let Some(parent) = zip_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if let Err(e) = write_handler_zip(source_dir, zip_path) {
        warn!(zip = %zip_path.display(), error = %e, "Handler packaging failed");
        if zip_path.exists() {
            remove_handler_zip(zip_path);
        }
        return Err(e);
    }

    debug!(zip = %zip_path.display(), "Handler package created");

    Ok(())
}

/// Write the archive. Symlinks are followed, so a dangling link fails the walk
fn write_handler_zip(source_dir: &Path, zip_path: &Path) -> Result<()> {
    let mut zip = ZipWriter::new(File::create(zip_path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(source_dir).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let path = entry.path();

        // The archive may live inside the directory being packaged
        if path == zip_path {
            continue;
        }

        let relative = match path.strip_prefix(source_dir) {
            Ok(r) if !r.as_os_str().is_empty() => r,
            _ => continue,
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            zip.add_directory(name, options)?;
        } else if entry.file_type().is_file() {
            zip.start_file(name, options)?;
            io::copy(&mut File::open(path)?, &mut zip)?;
        }
    }

    zip.finish()?;

    Ok(())
}

/// Extract the handler archive into `dest_dir`, creating it if needed
pub fn extract_handler_zip(zip_path: &Path, dest_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dest_dir)?;

    let mut archive = ZipArchive::new(File::open(zip_path)?)?;
    archive.extract(dest_dir)?;

    debug!(
        zip = %zip_path.display(),
        dest = %dest_dir.display(),
        files = archive.len(),
        "Handler package extracted"
    );

    Ok(())
}

/// Remove the transient archive. Failures are logged, never returned
pub fn remove_handler_zip(zip_path: &Path) {
    if let Err(e) = std::fs::remove_file(zip_path) {
        warn!(zip = %zip_path.display(), error = %e, "Failed to delete handler package");
    }
}
