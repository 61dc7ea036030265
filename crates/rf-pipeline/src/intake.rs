//! Upload acceptance: validation, stored naming and local import.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

use rf_core::config::Config;
use rf_core::{mime_for_path, Error, SourceAsset};

/// A declared upload, as received from the intake surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub path: PathBuf,
    pub original_name: String,
    pub size: u64,
    pub mime_type: String,
}

/// Gatekeeper in front of the pipeline. Rejected uploads never reach it.
#[derive(Debug, Clone)]
pub struct UploadIntake {
    upload_dir: PathBuf,
    max_file_size: u64,
}

impl UploadIntake {
    pub fn new(upload_dir: impl Into<PathBuf>, max_file_size: u64) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            max_file_size,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.storage.upload_dir.clone(), config.intake.max_file_size)
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Validate a declared upload and turn it into a [`SourceAsset`].
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for non-video MIME types, empty or oversized
    /// files, and paths that do not exist.
    pub fn accept(&self, request: UploadRequest) -> rf_core::Result<SourceAsset> {
        if !request.mime_type.starts_with("video/") {
            return Err(Error::Validation(format!(
                "only video files are allowed (got {})",
                request.mime_type
            )));
        }
        if request.size == 0 {
            return Err(Error::Validation(format!(
                "{} is empty",
                request.original_name
            )));
        }
        if request.size > self.max_file_size {
            return Err(Error::Validation(format!(
                "{} is {} bytes, limit is {}",
                request.original_name, request.size, self.max_file_size
            )));
        }
        if !request.path.is_file() {
            return Err(Error::Validation(format!(
                "upload not found: {}",
                request.path.display()
            )));
        }

        Ok(SourceAsset {
            path: request.path,
            original_name: request.original_name,
            size: request.size,
            mime_type: request.mime_type,
        })
    }

    /// Copy a local file into the upload directory under a generated name.
    pub async fn import(&self, path: &Path) -> rf_core::Result<SourceAsset> {
        let mime_type = mime_for_path(path)
            .ok_or_else(|| {
                Error::Validation(format!("unsupported video container: {}", path.display()))
            })?
            .to_string();
        let size = tokio::fs::metadata(path)
            .await
            .map_err(|_| Error::Validation(format!("upload not found: {}", path.display())))?
            .len();
        let original_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        // Validate before copying anything.
        self.accept(UploadRequest {
            path: path.to_path_buf(),
            original_name: original_name.clone(),
            size,
            mime_type: mime_type.clone(),
        })?;

        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let ext = path.extension().and_then(|e| e.to_str());
        let dest = self.upload_dir.join(stored_file_name(ext));
        tokio::fs::copy(path, &dest).await?;
        tracing::info!("Imported {} as {}", path.display(), dest.display());

        Ok(SourceAsset {
            path: dest,
            original_name,
            size,
            mime_type,
        })
    }
}

/// `video-{unix_millis}-{random}{.ext}`
pub fn stored_file_name(extension: Option<&str>) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    match extension {
        Some(ext) if !ext.is_empty() => format!("video-{millis}-{suffix}.{ext}"),
        _ => format!("video-{millis}-{suffix}"),
    }
}

/// Output stem for a source: its file name without extension.
pub fn base_name_for(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "video".to_string())
}

/// First supported video file in `dir`, by file name.
pub fn find_first_video(dir: &Path) -> rf_core::Result<Option<PathBuf>> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && mime_for_path(p).is_some())
        .collect();
    candidates.sort();
    Ok(candidates.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn request(path: &Path, size: u64, mime: &str) -> UploadRequest {
        UploadRequest {
            path: path.to_path_buf(),
            original_name: "interview.mp4".into(),
            size,
            mime_type: mime.into(),
        }
    }

    #[test]
    fn rejects_non_video_mime() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("interview.mp4");
        std::fs::write(&file, b"data").unwrap();
        let intake = UploadIntake::new(dir.path(), 1024);

        let err = intake.accept(request(&file, 4, "image/png")).unwrap_err();
        assert_matches!(err, Error::Validation(ref m) if m.contains("only video"));
    }

    #[test]
    fn rejects_bad_sizes_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("interview.mp4");
        std::fs::write(&file, b"data").unwrap();
        let intake = UploadIntake::new(dir.path(), 3);

        assert_matches!(intake.accept(request(&file, 0, "video/mp4")), Err(Error::Validation(_)));
        assert_matches!(intake.accept(request(&file, 4, "video/mp4")), Err(Error::Validation(_)));
        let missing = dir.path().join("gone.mp4");
        assert_matches!(intake.accept(request(&missing, 2, "video/mp4")), Err(Error::Validation(_)));
    }

    #[test]
    fn accepts_valid_upload() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("interview.mp4");
        std::fs::write(&file, b"data").unwrap();
        let intake = UploadIntake::new(dir.path(), 1024);

        let asset = intake.accept(request(&file, 4, "video/mp4")).unwrap();
        assert_eq!(asset.original_name, "interview.mp4");
        assert_eq!(asset.mime_type, "video/mp4");
    }

    #[tokio::test]
    async fn import_copies_under_generated_name() {
        let src_dir = tempfile::tempdir().unwrap();
        let uploads = tempfile::tempdir().unwrap();
        let file = src_dir.path().join("Interview.MOV");
        std::fs::write(&file, b"moov").unwrap();

        let intake = UploadIntake::new(uploads.path().join("incoming"), 1024);
        let asset = intake.import(&file).await.unwrap();

        assert!(asset.path.starts_with(uploads.path().join("incoming")));
        let name = asset.path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("video-") && name.ends_with(".MOV"), "{name}");
        assert_eq!(asset.original_name, "Interview.MOV");
        assert_eq!(asset.mime_type, "video/quicktime");
        assert_eq!(asset.size, 4);
        assert_eq!(std::fs::read(&asset.path).unwrap(), b"moov");
    }

    #[tokio::test]
    async fn import_rejects_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, b"hi").unwrap();
        let intake = UploadIntake::new(dir.path().join("uploads"), 1024);

        assert_matches!(intake.import(&file).await, Err(Error::Validation(_)));
        assert!(!dir.path().join("uploads").exists());
    }

    #[test]
    fn stored_names_are_distinct() {
        let a = stored_file_name(Some("mp4"));
        let b = stored_file_name(Some("mp4"));
        assert!(a.starts_with("video-") && a.ends_with(".mp4"));
        assert_ne!(a, b);
        assert!(!stored_file_name(None).contains('.'));
    }

    #[test]
    fn first_video_by_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"").unwrap();
        std::fs::write(dir.path().join("b.webm"), b"").unwrap();
        std::fs::write(dir.path().join("a.mkv"), b"").unwrap();
        std::fs::create_dir(dir.path().join("processed.mp4")).unwrap();

        let first = find_first_video(dir.path()).unwrap().unwrap();
        assert_eq!(first.file_name().unwrap(), "a.mkv");

        let empty = tempfile::tempdir().unwrap();
        assert!(find_first_video(empty.path()).unwrap().is_none());
    }

    #[test]
    fn base_name_strips_extension() {
        assert_eq!(base_name_for(Path::new("/u/video-1-2.mp4")), "video-1-2");
    }
}
