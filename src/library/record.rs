//! Media record data model
//!
//! A [`MediaRecord`] is one tracked file plus whatever metadata is known about
//! it so far. Fields arrive in stages (scanner, metadata store, signature pass)
//! and are applied to a library as [`FieldUpdate`]s.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Hamming distance below which two perceptual hashes are near-duplicates
pub const NEAR_DUPLICATE_THRESHOLD: u32 = 4;

/// Stable record identifier: the path relative to the library root, `/`-separated
pub type RecordId = String;

/// Best-known content creation time (never the filesystem mtime)
pub type CaptureDate = NaiveDateTime;

/// Image extensions that get a perceptual hash
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "tiff", "tif", "heic", "heif", "dng",
];

/// Video extensions (sync ids for these get the video prefix)
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "avi", "mkv", "m4v", "3gp", "wmv", "mts", "webm",
];

/// Physical storage identity of a file (device + inode, or volume + file index)
///
/// Hardlinked copies and files detected as moved share this identity
/// regardless of their content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SystemIdentity {
    pub device: u64,
    pub inode: u64,
}

impl SystemIdentity {
    pub fn new(device: u64, inode: u64) -> Self {
        Self { device, inode }
    }
}

impl fmt::Display for SystemIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device, self.inode)
    }
}

/// Kind of media, which decides the signature algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    #[default]
    Other,
}

impl MediaKind {
    /// Classify a file by its extension (case-insensitive)
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Image
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Video
        } else {
            MediaKind::Other
        }
    }

    pub fn is_media(self) -> bool {
        !matches!(self, MediaKind::Other)
    }
}

/// 64-bit perceptual hash of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PerceptualHash(pub u64);

impl PerceptualHash {
    /// Number of differing bits
    pub fn distance(self, other: PerceptualHash) -> u32 {
        (self.0 ^ other.0).count_ones()
    }
}

impl fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Comparable fingerprint of a media item
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Signature {
    /// Perceptual hash of the decoded image
    Perceptual(PerceptualHash),
    /// Byte size standing in for content (cheap default for non-images)
    SizeProxy(u64),
    /// Hex SHA-256 of the file content
    Content(String),
}

impl Signature {
    /// Distance to another signature, `None` when the two are not comparable
    ///
    /// Perceptual hashes compare bitwise. Size proxies and content hashes are
    /// either identical (distance 0) or unrelated.
    pub fn distance(&self, other: &Signature) -> Option<u32> {
        match (self, other) {
            (Signature::Perceptual(a), Signature::Perceptual(b)) => Some(a.distance(*b)),
            (Signature::SizeProxy(a), Signature::SizeProxy(b)) if a == b => Some(0),
            (Signature::Content(a), Signature::Content(b)) if a == b => Some(0),
            _ => None,
        }
    }

    /// Whether the two signatures are within the near-duplicate threshold
    pub fn is_near(&self, other: &Signature) -> bool {
        self.distance(other)
            .is_some_and(|d| d < NEAR_DUPLICATE_THRESHOLD)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signature::Perceptual(hash) => write!(f, "p:{}", hash),
            Signature::SizeProxy(size) => write!(f, "s:{}", size),
            Signature::Content(hex) => write!(f, "c:{}", hex),
        }
    }
}

/// One tracked file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: RecordId,
    pub capture_date: Option<CaptureDate>,
    pub file_size: Option<u64>,
    pub signature: Option<Signature>,
    pub system_identity: Option<SystemIdentity>,
    pub kind: MediaKind,
    pub camera_model: Option<String>,
}

impl MediaRecord {
    /// A record with nothing known but its id; kind is derived from the id's extension
    pub fn new(id: impl Into<RecordId>) -> Self {
        let id = id.into();
        let kind = MediaKind::from_path(Path::new(&id));
        Self {
            id,
            capture_date: None,
            file_size: None,
            signature: None,
            system_identity: None,
            kind,
            camera_model: None,
        }
    }

    /// File name component of the id, used for report ordering
    pub fn file_name(&self) -> &str {
        self.id.rsplit('/').next().unwrap_or(&self.id)
    }

    /// (date, size) key, present only when both are known
    pub fn size_key(&self) -> Option<(CaptureDate, u64)> {
        Some((self.capture_date?, self.file_size?))
    }

    /// (date, signature) key, present only when both are known
    pub fn signature_key(&self) -> Option<(CaptureDate, &Signature)> {
        Some((self.capture_date?, self.signature.as_ref()?))
    }
}

/// A single metadata field becoming known (or changing) for a record
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    SystemIdentity(Option<SystemIdentity>),
    CaptureDate(Option<CaptureDate>),
    FileSize(u64),
    Kind(MediaKind),
    Signature(Option<Signature>),
    CameraModel(Option<String>),
}
