//! Signature computation
//!
//! Images get a 64-bit perceptual hash that survives re-encoding and EXIF
//! stripping. Everything else gets its byte size as a cheap proxy, so bulk
//! scans never read whole video files; full SHA-256 content hashing of
//! non-images is available behind `signature.hash_non_images`.
//!
//! Failures never propagate: an unreadable or corrupt image falls back to the
//! size proxy and the outcome is flagged so the caller can count it.

use crate::core::config::{HashAlgorithm, SignatureConfig};
use crate::core::error::{LibraryError, Result};
use crate::library::record::{MediaKind, MediaRecord, PerceptualHash, Signature};
use image::{DynamicImage, ImageReader};
use image_hasher::{HashAlg, HasherConfig};
use log::trace;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Buffer size for streaming hash computation (64KB)
const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Hash grid edge; 8x8 gives 64 bits
const HASH_SIZE: u32 = 8;

/// Result of one signature computation
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedSignature {
    pub signature: Signature,
    /// The preferred algorithm failed and the size proxy was used instead
    pub fell_back: bool,
}

impl ComputedSignature {
    fn exact(signature: Signature) -> Self {
        Self {
            signature,
            fell_back: false,
        }
    }

    fn fallback(size: u64) -> Self {
        Self {
            signature: Signature::SizeProxy(size),
            fell_back: true,
        }
    }
}

/// Anything that can fingerprint a record of a library
///
/// Implementations must be callable from worker threads; results are merged
/// into the indexes by the caller on a single thread.
pub trait SignatureSource: Sync {
    fn signature_for(&self, root: Option<&Path>, record: &MediaRecord) -> ComputedSignature;
}

/// Default signature source backed by the filesystem
#[derive(Debug, Clone, Default)]
pub struct SignatureComputer {
    config: SignatureConfig,
}

impl SignatureComputer {
    pub fn new(config: SignatureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignatureConfig {
        &self.config
    }

    /// Fingerprint one file
    pub fn compute(&self, path: &Path, kind: MediaKind, size: u64) -> ComputedSignature {
        match kind {
            MediaKind::Image => match self.perceptual_hash(path) {
                Ok(hash) => ComputedSignature::exact(Signature::Perceptual(hash)),
                Err(e) => {
                    trace!("Perceptual hash failed, using size proxy: {}", e);
                    ComputedSignature::fallback(size)
                }
            },
            _ if self.config.hash_non_images => match compute_content_hash(path) {
                Ok(hex) => ComputedSignature::exact(Signature::Content(hex)),
                Err(e) => {
                    trace!("Content hash failed, using size proxy: {}", e);
                    ComputedSignature::fallback(size)
                }
            },
            _ => ComputedSignature::exact(Signature::SizeProxy(size)),
        }
    }

    /// Decode an image file and hash it
    pub fn perceptual_hash(&self, path: &Path) -> Result<PerceptualHash> {
        let image_error = |message: String| LibraryError::Image {
            path: path.to_path_buf(),
            message,
        };

        let image = ImageReader::open(path)?
            .with_guessed_format()?
            .decode()
            .map_err(|e| image_error(e.to_string()))?;

        Ok(self.hash_image(&image))
    }

    /// Hash an already decoded image
    pub fn hash_image(&self, image: &DynamicImage) -> PerceptualHash {
        let hasher = HasherConfig::new()
            .hash_alg(hash_alg(self.config.hash_algorithm))
            .hash_size(HASH_SIZE, HASH_SIZE)
            .to_hasher();

        let hash = hasher.hash_image(image);
        let mut bits = [0u8; 8];
        for (slot, byte) in bits.iter_mut().zip(hash.as_bytes()) {
            *slot = *byte;
        }
        PerceptualHash(u64::from_be_bytes(bits))
    }
}

impl SignatureSource for SignatureComputer {
    fn signature_for(&self, root: Option<&Path>, record: &MediaRecord) -> ComputedSignature {
        let size = record.file_size.unwrap_or(0);
        match root {
            Some(root) => self.compute(&root.join(&record.id), record.kind, size),
            None => ComputedSignature::fallback(size),
        }
    }
}

fn hash_alg(algorithm: HashAlgorithm) -> HashAlg {
    match algorithm {
        HashAlgorithm::Mean => HashAlg::Mean,
        HashAlgorithm::Gradient => HashAlg::Gradient,
        HashAlgorithm::DoubleGradient => HashAlg::DoubleGradient,
        HashAlgorithm::Blockhash => HashAlg::Blockhash,
    }
}

/// Compute the hex SHA-256 of a file using streaming (memory-efficient)
pub fn compute_content_hash(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(HASH_BUFFER_SIZE, file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect())
}
