//! File intake: decides which files may enter the pipeline.

use std::borrow::Cow;
use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PagescanError, ValidationError};
use crate::language::Language;

/// Largest accepted file, in bytes (25 MiB).
pub const MAX_FILE_SIZE: u64 = 25 * 1024 * 1024;

/// Media types accepted at intake.
pub const SUPPORTED_TYPES: &[&str] = &[
    "application/pdf",
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/tiff",
    "image/tif",
];

/// File extensions offered to the user when picking files.
pub const ACCEPTED_EXTENSIONS: &str = ".pdf,.jpg,.jpeg,.png,.tiff,.tif";

/// Supported formats as shown to the user.
pub const SUPPORTED_TYPES_DISPLAY: &str = "PDF, JPG, PNG, TIFF";

/// Kind of document the pipeline knows how to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Pdf,
    Jpeg,
    Png,
    Tiff,
}

impl MediaType {
    /// Map a declared media type onto a supported kind.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "application/pdf" => Some(MediaType::Pdf),
            "image/jpeg" | "image/jpg" => Some(MediaType::Jpeg),
            "image/png" => Some(MediaType::Png),
            "image/tiff" | "image/tif" => Some(MediaType::Tiff),
            _ => None,
        }
    }

    /// Canonical media type string.
    pub fn mime(&self) -> &'static str {
        match self {
            MediaType::Pdf => "application/pdf",
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Tiff => "image/tiff",
        }
    }

    /// Whether the format has pages that need rasterizing.
    pub fn is_paginated(&self) -> bool {
        matches!(self, MediaType::Pdf)
    }

    /// Preferred file extension (without the dot).
    pub fn extension(&self) -> &'static str {
        match self {
            MediaType::Pdf => "pdf",
            MediaType::Jpeg => "jpg",
            MediaType::Png => "png",
            MediaType::Tiff => "tiff",
        }
    }

    /// Guess the declared media type of a file name from its extension.
    pub fn guess_mime(name: &str) -> &'static str {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "pdf" => "application/pdf",
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "tif" | "tiff" => "image/tiff",
            _ => "application/octet-stream",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Where the bytes of a file live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    /// Already in memory.
    Memory(Vec<u8>),
    /// On disk; read only once the file is about to be processed.
    Disk(PathBuf),
}

/// A file as it arrives at the intake boundary, not yet checked.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    /// Original display name.
    pub name: String,
    /// Size as declared by whoever supplied the file.
    pub declared_size: u64,
    /// Media type as declared by whoever supplied the file.
    pub media_type: String,
    pub content: FileContent,
}

impl CandidateFile {
    /// Create a candidate whose declared size is the content length.
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            declared_size: data.len() as u64,
            media_type: media_type.into(),
            content: FileContent::Memory(data),
        }
    }

    /// Describe a file on disk from its metadata, without reading it.
    ///
    /// The media type is guessed from the extension.
    pub fn from_path(path: &Path) -> Result<Self, PagescanError> {
        let metadata = fs::metadata(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();
        let media_type = MediaType::guess_mime(&name);

        Ok(Self {
            name,
            declared_size: metadata.len(),
            media_type: media_type.to_string(),
            content: FileContent::Disk(path.to_path_buf()),
        })
    }
}

/// A file that passed intake. Only [`validate`] creates these.
#[derive(Debug, Clone)]
pub struct SubmittedFile {
    pub(crate) name: String,
    pub(crate) media_type: MediaType,
    pub(crate) size: u64,
    pub(crate) content: FileContent,
    pub(crate) language: Language,
}

impl SubmittedFile {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    /// Declared size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Path of the file on disk, when it came from one.
    pub fn path(&self) -> Option<&Path> {
        match &self.content {
            FileContent::Disk(path) => Some(path),
            FileContent::Memory(_) => None,
        }
    }

    /// The file's bytes, read from disk if needed.
    ///
    /// A file that grew past [`MAX_FILE_SIZE`] since intake is refused
    /// without reading more than one byte over the limit.
    pub fn load(&self) -> Result<Cow<'_, [u8]>, PagescanError> {
        match &self.content {
            FileContent::Memory(data) => Ok(Cow::Borrowed(data)),
            FileContent::Disk(path) => {
                let mut data = Vec::new();
                File::open(path)?
                    .take(MAX_FILE_SIZE + 1)
                    .read_to_end(&mut data)?;

                if data.len() as u64 > MAX_FILE_SIZE {
                    return Err(ValidationError::TooLarge {
                        size: fs::metadata(path)?.len(),
                    }
                    .into());
                }
                debug!("Read {} bytes from {}", data.len(), path.display());
                Ok(Cow::Owned(data))
            }
        }
    }
}

/// A file refused at intake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub name: String,
    pub reason: ValidationError,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.reason)
    }
}

/// Outcome of validating a batch: every input lands in exactly one list.
#[derive(Debug, Default)]
pub struct Intake {
    pub accepted: Vec<SubmittedFile>,
    pub rejected: Vec<Rejection>,
}

/// Check a single candidate. Checks run in order and stop at the first failure.
pub fn validate_file(file: &CandidateFile) -> Result<MediaType, ValidationError> {
    if file.declared_size > MAX_FILE_SIZE {
        return Err(ValidationError::TooLarge {
            size: file.declared_size,
        });
    }

    let media_type = MediaType::from_mime(&file.media_type)
        .ok_or_else(|| ValidationError::UnsupportedType(file.media_type.clone()))?;

    if file.declared_size == 0 {
        return Err(ValidationError::Empty);
    }

    Ok(media_type)
}

/// Partition a batch into accepted and rejected files, preserving input order.
pub fn validate(files: Vec<CandidateFile>, language: Language) -> Intake {
    let mut intake = Intake::default();

    for file in files {
        match validate_file(&file) {
            Ok(media_type) => intake.accepted.push(SubmittedFile {
                name: file.name,
                media_type,
                size: file.declared_size,
                content: file.content,
                language,
            }),
            Err(reason) => {
                debug!("Rejected {}: {}", file.name, reason);
                intake.rejected.push(Rejection {
                    name: file.name,
                    reason,
                });
            }
        }
    }

    debug!(
        "Intake: {} accepted, {} rejected",
        intake.accepted.len(),
        intake.rejected.len()
    );

    intake
}
