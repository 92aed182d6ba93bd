use std::fs;
use std::io;
use std::path::Path;

use tracing::{error, info};
use zip::ZipArchive;

use crate::error::CladeError;

pub const DATA_REPORT_MARKER: &str = "data_report";
pub const GENOMIC_MARKER: &str = "genomic";

pub fn list_members(zip_path: &Path) -> Result<Vec<String>, CladeError> {
    let file = fs::File::open(zip_path)
        .map_err(|err| CladeError::Filesystem(format!("open zip {}: {err}", zip_path.display())))?;
    let archive = ZipArchive::new(file).map_err(|err| CladeError::Archive(err.to_string()))?;
    Ok(archive.file_names().map(str::to_string).collect())
}

// Member names are matched by substring; the upstream provider's naming
// convention is the only contract we have.
pub fn unpack_genome_package(zip_path: &Path, destination: &Path) -> Result<(), CladeError> {
    let members = list_members(zip_path)?;
    let has_report = members.iter().any(|name| name.contains(DATA_REPORT_MARKER));
    let has_sequence = members.iter().any(|name| name.contains(GENOMIC_MARKER));

    if !has_report || !has_sequence {
        error!(?members, "genome data package is missing expected files");
        return Err(CladeError::PackageIncomplete { members });
    }

    extract_zip(zip_path, destination)?;
    info!(
        members = members.len(),
        destination = %destination.display(),
        "genome data package extracted"
    );
    Ok(())
}

fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<(), CladeError> {
    let file = fs::File::open(zip_path)
        .map_err(|err| CladeError::Filesystem(format!("open zip {}: {err}", zip_path.display())))?;
    let mut archive = ZipArchive::new(file).map_err(|err| CladeError::Archive(err.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| CladeError::Archive(err.to_string()))?;
        let entry_path = match entry.enclosed_name() {
            Some(path) => target_dir.join(path),
            None => {
                return Err(CladeError::Archive(
                    "zip entry path traversal detected".to_string(),
                ));
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&entry_path)
                .map_err(|err| CladeError::Filesystem(err.to_string()))?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(|err| CladeError::Filesystem(err.to_string()))?;
        }
        let mut outfile = fs::File::create(&entry_path)
            .map_err(|err| CladeError::Filesystem(err.to_string()))?;
        io::copy(&mut entry, &mut outfile)
            .map_err(|err| CladeError::Filesystem(err.to_string()))?;
    }
    Ok(())
}
