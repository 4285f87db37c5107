use crate::{
    config::{ArchiveCompression, ArchiveConfig},
    error::{DepthcapError, Result},
};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Packs a sealed project directory into `<name>.zip` next to it
#[derive(Debug, Clone)]
pub struct ArchivePackager {
    compression: ArchiveCompression,
    remove_after_archive: bool,
}

/// Result of packaging a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveOutcome {
    pub archive_path: PathBuf,
    pub source_removed: bool,
}

impl ArchivePackager {
    pub fn new(config: &ArchiveConfig) -> Self {
        Self {
            compression: config.compression,
            remove_after_archive: config.remove_after_archive,
        }
    }

    /// Location of the archive produced for `project_dir`
    pub fn archive_path_for(project_dir: &Path) -> Result<PathBuf> {
        let name = project_dir
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                DepthcapError::component(
                    "archive",
                    format!("Invalid project directory: {}", project_dir.display()),
                )
            })?;
        Ok(project_dir.with_file_name(format!("{}.zip", name)))
    }

    /// Zip every file under `project_dir` into its sibling archive.
    ///
    /// Entry names are relative to the project directory. An existing archive
    /// at the destination is replaced.
    pub fn pack(&self, project_dir: &Path) -> Result<PathBuf> {
        let archive_path = Self::archive_path_for(project_dir)?;
        let entries = self.write_archive(project_dir, &archive_path)?;

        info!(
            "Archived {} files from {} to {}",
            entries,
            project_dir.display(),
            archive_path.display()
        );
        Ok(archive_path)
    }

    /// Remove a project directory once its archive exists
    pub fn cleanup(&self, project_dir: &Path) -> Result<()> {
        let archive_path = Self::archive_path_for(project_dir)?;
        if !archive_path.is_file() {
            return Err(DepthcapError::component(
                "archive",
                format!(
                    "Refusing to remove {} without archive {}",
                    project_dir.display(),
                    archive_path.display()
                ),
            ));
        }

        std::fs::remove_dir_all(project_dir)?;
        debug!("Removed project directory {}", project_dir.display());
        Ok(())
    }

    /// Pack the project, then remove the working directory if configured
    pub fn package(&self, project_dir: &Path) -> Result<ArchiveOutcome> {
        let archive_path = self.pack(project_dir)?;

        let source_removed = if self.remove_after_archive {
            self.cleanup(project_dir)?;
            true
        } else {
            false
        };

        Ok(ArchiveOutcome {
            archive_path,
            source_removed,
        })
    }

    fn write_archive(&self, project_dir: &Path, archive_path: &Path) -> Result<usize> {
        if !project_dir.is_dir() {
            return Err(DepthcapError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Project directory not found: {}", project_dir.display()),
            )));
        }

        let partial_path = archive_path.with_extension("zip.partial");
        let result = self
            .write_entries(project_dir, &partial_path)
            .and_then(|entries| {
                std::fs::rename(&partial_path, archive_path)?;
                Ok(entries)
            });

        match result {
            Ok(entries) => Ok(entries),
            Err(e) => {
                if let Err(remove_err) = std::fs::remove_file(&partial_path) {
                    if remove_err.kind() != io::ErrorKind::NotFound {
                        warn!(
                            "Failed to remove partial archive {}: {}",
                            partial_path.display(),
                            remove_err
                        );
                    }
                }
                Err(e)
            }
        }
    }

    fn write_entries(&self, project_dir: &Path, partial_path: &Path) -> Result<usize> {
        let file = File::create(partial_path)?;
        let mut zip = ZipWriter::new(BufWriter::new(file));
        let options = SimpleFileOptions::default()
            .compression_method(self.compression_method())
            .unix_permissions(0o644);

        let mut entries = 0;
        for entry in WalkDir::new(project_dir).sort_by_file_name().min_depth(1) {
            let entry = entry.map_err(io::Error::from)?;
            let relative = entry
                .path()
                .strip_prefix(project_dir)
                .map_err(|e| DepthcapError::component("archive", e.to_string()))?;
            let name = entry_name(relative);

            if entry.file_type().is_dir() {
                zip.add_directory(name, options)?;
            } else if entry.file_type().is_file() {
                zip.start_file(name, options)?;
                let mut source = File::open(entry.path())?;
                io::copy(&mut source, &mut zip)?;
                entries += 1;
            }
        }

        let mut writer = zip.finish()?;
        io::Write::flush(&mut writer)?;
        Ok(entries)
    }

    fn compression_method(&self) -> CompressionMethod {
        match self.compression {
            ArchiveCompression::Stored => CompressionMethod::Stored,
            ArchiveCompression::Deflated => CompressionMethod::Deflated,
        }
    }
}

/// Zip entry names always use forward slashes
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
