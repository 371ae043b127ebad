//! Record builders shared by unit tests

use super::record::{CaptureDate, MediaKind, MediaRecord, PerceptualHash, Signature, SystemIdentity};
use chrono::NaiveDate;

/// Noon on the given day of May 2024
pub fn day(day: u32) -> CaptureDate {
    NaiveDate::from_ymd_opt(2024, 5, day)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

pub fn image(id: &str, date: Option<CaptureDate>, size: u64, phash: Option<u64>) -> MediaRecord {
    let mut record = MediaRecord::new(id);
    record.kind = MediaKind::Image;
    record.capture_date = date;
    record.file_size = Some(size);
    record.signature = phash.map(|bits| Signature::Perceptual(PerceptualHash(bits)));
    record
}

pub fn video(id: &str, date: Option<CaptureDate>, size: u64) -> MediaRecord {
    let mut record = MediaRecord::new(id);
    record.kind = MediaKind::Video;
    record.capture_date = date;
    record.file_size = Some(size);
    record
}

pub fn with_identity(mut record: MediaRecord, device: u64, inode: u64) -> MediaRecord {
    record.system_identity = Some(SystemIdentity::new(device, inode));
    record
}
