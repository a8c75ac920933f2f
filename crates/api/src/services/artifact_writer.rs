//! Export artifact storage.
//!
//! Artifacts are single JSON documents written in a streaming fashion: the
//! header goes out first, extraction pages are appended to the `entries`
//! array as they arrive, and the document is closed and renamed into place
//! only once complete. Readers never see a partial file under its final name.

use chrono::{DateTime, Utc};
use domain::models::{ArtifactHeader, ExportRecord};
use rand::Rng;
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, warn};

const FILE_PREFIX: &str = "user-";
const FILE_EXTENSION: &str = ".json";
const MAX_FILE_NAME_LEN: usize = 255;

/// Errors that can occur while storing or reading artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Invalid artifact file name: {0}")]
    InvalidName(String),

    #[error("Artifact I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Artifact serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Outcome of a finished artifact write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenArtifact {
    pub file_name: String,
    pub size_bytes: u64,
    pub entries: u64,
}

/// Builds a unique artifact file name.
///
/// `user-42_2024-01-01_to_2024-01-31_1706745600000-3f9a0c.json`, where the
/// range fragment comes from [`ExportRequest::file_label`].
///
/// [`ExportRequest::file_label`]: domain::models::ExportRequest::file_label
pub fn artifact_file_name(user_id: i64, range_label: &str, created_at: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..=0x00FF_FFFF);
    format!(
        "{}{}{}_{}-{:06x}{}",
        FILE_PREFIX,
        user_id,
        range_label,
        created_at.timestamp_millis(),
        suffix,
        FILE_EXTENSION
    )
}

/// Rejects anything that is not a plain artifact file name.
pub fn validate_file_name(name: &str) -> Result<(), ArtifactError> {
    let valid = name.len() <= MAX_FILE_NAME_LEN
        && name.starts_with(FILE_PREFIX)
        && name.ends_with(FILE_EXTENSION)
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(ArtifactError::InvalidName(name.to_string()))
    }
}

/// Directory-backed artifact store.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the artifact directory if it does not exist.
    pub async fn ensure_dir(&self) -> Result<(), ArtifactError> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Full path of a validated artifact name.
    pub fn path_for(&self, file_name: &str) -> Result<PathBuf, ArtifactError> {
        validate_file_name(file_name)?;
        Ok(self.dir.join(file_name))
    }

    /// Opens a streaming writer for a new artifact.
    ///
    /// The header is written immediately; the file stays hidden until
    /// [`ArtifactWriter::finish`] renames it.
    pub async fn begin(
        &self,
        file_name: &str,
        header: &ArtifactHeader,
    ) -> Result<ArtifactWriter, ArtifactError> {
        let final_path = self.path_for(file_name)?;
        self.ensure_dir().await?;

        let temp_path = self.dir.join(format!(".{}.tmp", file_name));
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await?;

        let mut writer = ArtifactWriter {
            out: BufWriter::new(file),
            temp_path,
            final_path,
            file_name: file_name.to_string(),
            entries: 0,
            finished: false,
        };

        // Reopen the header object so entries can be streamed into it.
        let mut head = serde_json::to_vec(header)?;
        head.pop();
        head.extend_from_slice(b",\"entries\":[");
        writer.out.write_all(&head).await?;

        Ok(writer)
    }

    /// Names of finished artifacts in the directory.
    ///
    /// Hidden in-progress temporaries are not listed.
    pub async fn list(&self) -> Result<Vec<String>, ArtifactError> {
        let mut names = Vec::new();
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with('.') || !name.ends_with(FILE_EXTENSION) {
                continue;
            }
            names.push(name);
        }

        names.sort();
        Ok(names)
    }

    /// Reads the artifact header without holding the entries in memory.
    pub async fn read_header(&self, file_name: &str) -> Result<ArtifactHeader, ArtifactError> {
        let path = self.path_for(file_name)?;
        tokio::task::spawn_blocking(move || {
            let file = std::fs::File::open(path)?;
            let header: ArtifactHeader = serde_json::from_reader(BufReader::new(file))?;
            Ok(header)
        })
        .await
        .map_err(|e| ArtifactError::Io(std::io::Error::new(ErrorKind::Other, e)))?
    }

    /// Opens a finished artifact for download.
    pub async fn open(&self, file_name: &str) -> Result<(File, u64), ArtifactError> {
        let path = self.path_for(file_name)?;
        let file = File::open(&path).await?;
        let len = file.metadata().await?.len();
        Ok((file, len))
    }

    /// Whether a finished artifact is present.
    pub async fn exists(&self, file_name: &str) -> Result<bool, ArtifactError> {
        let path = self.path_for(file_name)?;
        Ok(fs::try_exists(path).await?)
    }

    pub async fn remove(&self, file_name: &str) -> Result<(), ArtifactError> {
        let path = self.path_for(file_name)?;
        fs::remove_file(path).await?;
        debug!(file_name = %file_name, "Removed export artifact");
        Ok(())
    }
}

/// Streaming writer for one artifact.
///
/// Dropping an unfinished writer removes its temporary file.
pub struct ArtifactWriter {
    out: BufWriter<File>,
    temp_path: PathBuf,
    final_path: PathBuf,
    file_name: String,
    entries: u64,
    finished: bool,
}

impl ArtifactWriter {
    /// Appends one extraction page to the `entries` array.
    pub async fn append(&mut self, records: &[ExportRecord]) -> Result<(), ArtifactError> {
        for record in records {
            let bytes = serde_json::to_vec(record)?;
            if self.entries > 0 {
                self.out.write_all(b",").await?;
            }
            self.out.write_all(&bytes).await?;
            self.entries += 1;
        }
        Ok(())
    }

    /// Closes the document, flushes it to disk and moves it into place.
    pub async fn finish(mut self) -> Result<WrittenArtifact, ArtifactError> {
        self.out.write_all(b"]}").await?;
        self.out.flush().await?;
        self.out.get_ref().sync_all().await?;

        fs::rename(&self.temp_path, &self.final_path).await?;
        self.finished = true;

        let size_bytes = fs::metadata(&self.final_path).await?.len();
        Ok(WrittenArtifact {
            file_name: self.file_name.clone(),
            size_bytes,
            entries: self.entries,
        })
    }
}

impl Drop for ArtifactWriter {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match std::fs::remove_file(&self.temp_path) {
            Ok(()) => debug!(file_name = %self.file_name, "Discarded unfinished artifact"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                file_name = %self.file_name,
                error = %e,
                "Failed to remove unfinished artifact"
            ),
        }
    }
}
