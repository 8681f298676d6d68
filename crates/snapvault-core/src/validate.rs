//! Upload validation: mime allow-list, per-context size limits, and
//! magic-byte sniffing against the declared type. Check order is fixed
//! (type, size, content) so error reporting is deterministic.

use snapvault_types::Error;
use snapvault_types::error::Result;

pub const PROFILE_PICTURE_MAX_BYTES: u64 = 5 * 1024 * 1024;
pub const GROUP_PHOTO_MAX_BYTES: u64 = 10 * 1024 * 1024;
/// Upfront cap on batch uploads; exceeding it rejects the whole batch
/// before any file is touched.
pub const MAX_BATCH_FILES: usize = 20;

/// What the upload is for, which decides the size limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadContext {
    ProfilePicture,
    GroupPhoto,
}

impl UploadContext {
    pub fn max_bytes(self) -> u64 {
        match self {
            UploadContext::ProfilePicture => PROFILE_PICTURE_MAX_BYTES,
            UploadContext::GroupPhoto => GROUP_PHOTO_MAX_BYTES,
        }
    }
}

/// An upload that passed every check. `mime_type` is the canonical form of
/// the declared type; `extension` is used when minting storage keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedFile {
    pub mime_type: &'static str,
    pub extension: &'static str,
    pub size: u64,
}

/// Canonicalize a declared mime type to the allow-list, or None.
fn canonical_mime(declared: &str) -> Option<(&'static str, &'static str)> {
    let declared = declared
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match declared.as_str() {
        "image/jpeg" | "image/jpg" => Some(("image/jpeg", "jpg")),
        "image/png" => Some(("image/png", "png")),
        "image/gif" => Some(("image/gif", "gif")),
        "image/webp" => Some(("image/webp", "webp")),
        _ => None,
    }
}

/// Identify the actual content from its leading bytes.
fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

/// Run the three checks in order. A caller never stores a file that fails
/// any of them.
pub fn validate_upload(
    declared_mime: &str,
    bytes: &[u8],
    context: UploadContext,
) -> Result<ValidatedFile> {
    let (mime_type, extension) = canonical_mime(declared_mime)
        .ok_or_else(|| Error::UnsupportedType(declared_mime.to_string()))?;

    let size = bytes.len() as u64;
    let limit = context.max_bytes();
    if size > limit {
        return Err(Error::TooLarge { size, limit });
    }

    // Disguised payloads (wrong magic bytes for the declared type) are
    // rejected even when the declared type is allowed.
    if sniff_mime(bytes) != Some(mime_type) {
        return Err(Error::ContentMismatch {
            declared: mime_type.to_string(),
        });
    }

    Ok(ValidatedFile {
        mime_type,
        extension,
        size,
    })
}
