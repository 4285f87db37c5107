use crate::{
    archive::ArchivePackager,
    capture::{parse_project_name, resolve_timestamp_timezone},
    config::{ArchiveConfig, DepthcapConfig},
    error::{DepthcapError, Result},
    manifest::{Manifest, MANIFEST_FILE_NAME},
    raster::decode_color_thumbnail,
};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use image::RgbImage;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Edge length of catalog thumbnails in pixels
pub const THUMBNAIL_SIZE: u32 = 100;

/// Read-only view over finalized projects under a capture root
pub struct ProjectCatalog {
    root: PathBuf,
    timezone: Tz,
    packager: ArchivePackager,
}

/// Summary of one finalized project, recomputed on every listing
#[derive(Debug, Clone)]
pub struct CaptureSummary {
    pub name: String,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub frame_count: usize,
    pub total_size_bytes: u64,
    pub thumbnail: Option<RgbImage>,
}

impl CaptureSummary {
    pub fn human_size(&self) -> String {
        format_size(self.total_size_bytes)
    }
}

impl ProjectCatalog {
    pub fn new(root: impl Into<PathBuf>, timezone: &str, archive_config: &ArchiveConfig) -> Self {
        // Exporting never removes the project it was asked to export
        let archive_config = ArchiveConfig {
            remove_after_archive: false,
            ..archive_config.clone()
        };

        Self {
            root: root.into(),
            timezone: resolve_timestamp_timezone(timezone),
            packager: ArchivePackager::new(&archive_config),
        }
    }

    pub fn from_config(config: &DepthcapConfig) -> Self {
        Self::new(
            &config.capture.path,
            &config.capture.timestamp_timezone,
            &config.archive,
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the project `name` directly under the catalog root
    pub fn project_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// List projects that carry a readable manifest, newest first.
    ///
    /// Directories without a valid manifest are skipped.
    pub async fn list_projects(&self) -> Result<Vec<CaptureSummary>> {
        debug!("Scanning for projects in: {}", self.root.display());

        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Capture root {} does not exist yet", self.root.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut projects = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_dir() {
                continue;
            }

            match self.summarize(&path).await {
                Ok(summary) => projects.push(summary),
                Err(e) => debug!("Skipping {}: {}", path.display(), e),
            }
        }

        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.name.cmp(&a.name)));

        info!("Found {} projects in {}", projects.len(), self.root.display());
        Ok(projects)
    }

    /// Build the summary of a single project directory
    pub async fn summarize(&self, project_dir: &Path) -> Result<CaptureSummary> {
        let name = project_dir
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| DepthcapError::component("catalog", "Invalid directory name"))?
            .to_string();

        let manifest = Manifest::load(&project_dir.join(MANIFEST_FILE_NAME)).await?;

        let created_at = match parse_project_name(&name, &self.timezone) {
            Some(created_at) => created_at,
            None => {
                let metadata = fs::metadata(project_dir).await?;
                DateTime::<Utc>::from(metadata.modified()?)
            }
        };

        let total_size_bytes = calculate_directory_size(project_dir.to_path_buf()).await?;
        let thumbnail = load_thumbnail(project_dir, &manifest).await;

        Ok(CaptureSummary {
            name,
            path: project_dir.to_path_buf(),
            created_at,
            frame_count: manifest.frame_count(),
            total_size_bytes,
            thumbnail,
        })
    }

    /// Delete a project directory and everything in it. Returns bytes freed.
    ///
    /// Removal is not transactional; a failure part way leaves a partial project.
    pub async fn delete_project(&self, name: &str) -> Result<u64> {
        let path = self.project_path(name);
        self.validate_deletion_safety(&path)?;

        let size = calculate_directory_size(path.clone()).await?;
        fs::remove_dir_all(&path).await.map_err(|e| {
            warn!("Failed to delete project {}: {}", path.display(), e);
            DepthcapError::Io(e)
        })?;

        info!("Deleted project: {} ({} bytes)", name, size);
        Ok(size)
    }

    /// Archive a project next to its directory, replacing any earlier export
    pub async fn export_project(&self, name: &str) -> Result<PathBuf> {
        let path = self.project_path(name);
        if !path.join(MANIFEST_FILE_NAME).is_file() {
            return Err(DepthcapError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("No project manifest in {}", path.display()),
            )));
        }

        let packager = self.packager.clone();
        let archive_path = tokio::task::spawn_blocking(move || packager.pack(&path))
            .await
            .map_err(|e| DepthcapError::component("catalog", format!("Export task failed: {}", e)))??;

        info!("Exported project {} to {}", name, archive_path.display());
        Ok(archive_path)
    }

    /// Only finalized project directories directly under the root may be deleted
    fn validate_deletion_safety(&self, path: &Path) -> Result<()> {
        if path == self.root {
            return Err(DepthcapError::component(
                "catalog",
                "Cannot delete capture root directory",
            ));
        }

        let relative = path
            .strip_prefix(&self.root)
            .map_err(|_| DepthcapError::component("catalog", "Path is outside capture directory"))?;

        let mut components = relative.components();
        match (components.next(), components.next()) {
            (Some(std::path::Component::Normal(_)), None) => {}
            _ => {
                return Err(DepthcapError::component(
                    "catalog",
                    "Project directory must be directly under capture path",
                ))
            }
        }

        if !path.is_dir() {
            return Err(DepthcapError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Project not found: {}", path.display()),
            )));
        }

        if !path.join(MANIFEST_FILE_NAME).is_file() {
            return Err(DepthcapError::component(
                "catalog",
                format!("{} is not a finalized project", path.display()),
            ));
        }

        Ok(())
    }
}

/// Total size of all files below `dir`
async fn calculate_directory_size(dir: PathBuf) -> Result<u64> {
    tokio::task::spawn_blocking(move || -> Result<u64> {
        let mut total = 0u64;
        for entry in WalkDir::new(&dir) {
            let entry = entry.map_err(io::Error::from)?;
            if entry.file_type().is_file() {
                total += entry.metadata().map_err(io::Error::from)?.len();
            }
        }
        Ok(total)
    })
    .await
    .map_err(|e| DepthcapError::component("catalog", format!("Size task failed: {}", e)))?
}

/// Thumbnail of the first frame's color image, if it can be decoded
async fn load_thumbnail(project_dir: &Path, manifest: &Manifest) -> Option<RgbImage> {
    let first = manifest.frames.first()?;
    let path = project_dir.join(&first.file_path);

    let bytes = match fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("No thumbnail for {}: {}", project_dir.display(), e);
            return None;
        }
    };

    let decoded = tokio::task::spawn_blocking(move || {
        decode_color_thumbnail(&bytes, THUMBNAIL_SIZE, THUMBNAIL_SIZE)
    })
    .await;

    match decoded {
        Ok(Ok(thumbnail)) => Some(thumbnail),
        Ok(Err(e)) => {
            debug!("Failed to decode thumbnail {}: {}", path.display(), e);
            None
        }
        Err(e) => {
            warn!("Thumbnail task failed for {}: {}", path.display(), e);
            None
        }
    }
}

/// Format a byte count with binary units, e.g. `1.5 MB`
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArchiveCompression;
    use crate::frame::{ColorBuffer, PixelFormat, Transform};
    use crate::manifest::{CameraIntrinsics, FrameRecord};
    use crate::raster::encode_color_image;
    use tempfile::TempDir;

    fn create_catalog(root: &Path) -> ProjectCatalog {
        ProjectCatalog::new(
            root,
            "UTC",
            &ArchiveConfig {
                enabled: true,
                remove_after_archive: true,
                compression: ArchiveCompression::Deflated,
            },
        )
    }

    async fn write_project(root: &Path, name: &str, frames: usize) -> PathBuf {
        let project = root.join(name);
        std::fs::create_dir_all(project.join("images")).unwrap();

        let mut manifest = Manifest::new(CameraIntrinsics {
            fl_x: 100.0,
            fl_y: 100.0,
            cx: 16.0,
            cy: 12.0,
            w: 32,
            h: 24,
            ..Default::default()
        });

        let color = ColorBuffer::new(32, 24, PixelFormat::Rgb24, vec![200u8; 32 * 24 * 3]);
        let jpeg = encode_color_image(&color, 0.8).unwrap();
        for i in 0..frames {
            let record = FrameRecord::new(i, Transform::IDENTITY, i as f64);
            std::fs::write(project.join(&record.file_path), &jpeg).unwrap();
            std::fs::write(project.join(&record.depth_path), vec![0u8; 64]).unwrap();
            manifest.append_frame(record).unwrap();
        }
        manifest
            .save(&project.join(MANIFEST_FILE_NAME))
            .await
            .unwrap();
        project
    }

    #[tokio::test]
    async fn test_missing_root_lists_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = create_catalog(&temp_dir.path().join("absent"));
        assert!(catalog.list_projects().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_projects_newest_first() {
        let temp_dir = TempDir::new().unwrap();
        write_project(temp_dir.path(), "240101_120000", 1).await;
        write_project(temp_dir.path(), "241127_090503", 3).await;
        write_project(temp_dir.path(), "240615_080000", 0).await;

        // Not projects: no manifest, unreadable manifest, plain file
        std::fs::create_dir(temp_dir.path().join("notes")).unwrap();
        std::fs::create_dir(temp_dir.path().join("240301_000000")).unwrap();
        std::fs::write(
            temp_dir.path().join("240301_000000").join(MANIFEST_FILE_NAME),
            b"{ broken",
        )
        .unwrap();
        std::fs::write(temp_dir.path().join("readme.txt"), b"hi").unwrap();

        let catalog = create_catalog(temp_dir.path());
        let projects = catalog.list_projects().await.unwrap();

        let names: Vec<&str> = projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["241127_090503", "240615_080000", "240101_120000"]);
        assert_eq!(projects[0].frame_count, 3);
        assert_eq!(projects[1].frame_count, 0);
        assert!(projects[0].total_size_bytes > 0);
    }

    #[tokio::test]
    async fn test_summary_details() {
        let temp_dir = TempDir::new().unwrap();
        let project = write_project(temp_dir.path(), "241127_090503", 2).await;

        let catalog = create_catalog(temp_dir.path());
        let summary = catalog.summarize(&project).await.unwrap();

        assert_eq!(summary.created_at.to_rfc3339(), "2024-11-27T09:05:03+00:00");
        let thumbnail = summary.thumbnail.unwrap();
        assert_eq!(thumbnail.dimensions(), (THUMBNAIL_SIZE, THUMBNAIL_SIZE));

        let empty = write_project(temp_dir.path(), "241127_100000", 0).await;
        assert!(catalog.summarize(&empty).await.unwrap().thumbnail.is_none());
    }

    #[tokio::test]
    async fn test_unnamed_project_uses_modification_time() {
        let temp_dir = TempDir::new().unwrap();
        let project = write_project(temp_dir.path(), "garden-scan", 1).await;

        let catalog = create_catalog(temp_dir.path());
        let summary = catalog.summarize(&project).await.unwrap();
        let age = Utc::now() - summary.created_at;
        assert!(age.num_minutes() < 5);
    }

    #[tokio::test]
    async fn test_delete_project() {
        let temp_dir = TempDir::new().unwrap();
        let project = write_project(temp_dir.path(), "241127_090503", 2).await;

        let catalog = create_catalog(temp_dir.path());
        let freed = catalog.delete_project("241127_090503").await.unwrap();
        assert!(freed > 0);
        assert!(!project.exists());
        assert!(catalog.list_projects().await.unwrap().is_empty());

        assert!(matches!(
            catalog.delete_project("241127_090503").await,
            Err(DepthcapError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_deletion_safety() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = create_catalog(temp_dir.path());

        assert!(catalog.validate_deletion_safety(temp_dir.path()).is_err());
        assert!(catalog
            .validate_deletion_safety(Path::new("/tmp/not_capture"))
            .is_err());
        assert!(catalog.delete_project("../escape").await.is_err());

        write_project(temp_dir.path(), "241127_090503", 1).await;
        assert!(catalog
            .validate_deletion_safety(&temp_dir.path().join("241127_090503/images"))
            .is_err());

        std::fs::create_dir(temp_dir.path().join("notes")).unwrap();
        assert!(catalog.delete_project("notes").await.is_err());
        assert!(temp_dir.path().join("notes").exists());
    }

    #[tokio::test]
    async fn test_export_project_is_repeatable() {
        let temp_dir = TempDir::new().unwrap();
        let project = write_project(temp_dir.path(), "241127_090503", 2).await;

        let catalog = create_catalog(temp_dir.path());
        let first = catalog.export_project("241127_090503").await.unwrap();
        let second = catalog.export_project("241127_090503").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first, temp_dir.path().join("241127_090503.zip"));
        assert!(project.exists());

        let archive = zip::ZipArchive::new(std::fs::File::open(&first).unwrap()).unwrap();
        assert!(archive.file_names().any(|n| n == "images/1.depth.tiff"));

        assert!(catalog.export_project("missing").await.is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }
}
