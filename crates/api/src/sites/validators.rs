//! Site form validation

use devfaq_shared::{DESCRIPTION_MAX_LENGTH, SUBDOMAIN_MAX_LENGTH};
use image::ImageFormat;

use crate::forms::FormErrors;

pub const REQUIRED_MESSAGE: &str = "This field is required.";
pub const INVALID_SUBDOMAIN_MESSAGE: &str = "The requested subdomain is invalid, it must start and end with a letter and only contain letters numbers and hyphens";
pub const SUBDOMAIN_EXISTS_MESSAGE: &str = "The subdomain already exists";
pub const RESERVED_SUBDOMAIN_MESSAGE: &str = "This subdomain is reserved";
pub const INVALID_IMAGE_MESSAGE: &str = "Upload a valid image.";

/// Subdomains the service itself serves, never claimable by a site
pub const RESERVED_SUBDOMAINS: &[&str] = &["www", "api", "admin", "static", "media"];

/// First character a letter, last a letter or digit, letters digits and
/// hyphens in between. At least two characters.
pub fn is_valid_subdomain(subdomain: &str) -> bool {
    let bytes = subdomain.as_bytes();
    let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
        return false;
    };

    bytes.len() >= 2
        && first.is_ascii_alphabetic()
        && last.is_ascii_alphanumeric()
        && bytes[1..bytes.len() - 1]
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || *b == b'-')
}

pub fn is_reserved_subdomain(subdomain: &str) -> bool {
    RESERVED_SUBDOMAINS.contains(&subdomain.to_ascii_lowercase().as_str())
}

fn max_length_message(max: usize, actual: usize) -> String {
    format!(
        "Ensure this value has at most {} characters (it has {}).",
        max, actual
    )
}

/// Check format and length of a requested subdomain. Uniqueness is checked
/// against the database separately.
pub fn check_subdomain(subdomain: &str, errors: &mut FormErrors) {
    if subdomain.is_empty() {
        errors.add("subdomain", REQUIRED_MESSAGE);
        return;
    }

    let length = subdomain.chars().count();
    if length > SUBDOMAIN_MAX_LENGTH {
        errors.add("subdomain", max_length_message(SUBDOMAIN_MAX_LENGTH, length));
    }
    if !is_valid_subdomain(subdomain) {
        errors.add("subdomain", INVALID_SUBDOMAIN_MESSAGE);
    } else if is_reserved_subdomain(subdomain) {
        errors.add("subdomain", RESERVED_SUBDOMAIN_MESSAGE);
    }
}

pub fn check_description(description: &str, errors: &mut FormErrors) {
    if description.trim().is_empty() {
        errors.add("description", REQUIRED_MESSAGE);
        return;
    }

    let length = description.chars().count();
    if length > DESCRIPTION_MAX_LENGTH {
        errors.add(
            "description",
            max_length_message(DESCRIPTION_MAX_LENGTH, length),
        );
    }
}

/// An uploaded logo that decoded as an image
#[derive(Debug, Clone)]
pub struct LogoUpload {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl LogoUpload {
    /// File extension matching the detected image format
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("img")
    }

    /// Stored file name for `subdomain`, e.g. `acme.jpg`
    pub fn file_name(&self, subdomain: &str) -> String {
        format!("{}.{}", subdomain, self.extension())
    }
}

pub fn file_size_message(max_bytes: usize) -> String {
    format!(
        "Upload exceeds the maximum file size of {}MB",
        max_bytes / (1024 * 1024)
    )
}

/// Check an uploaded logo against the size limit and decode it.
pub fn check_logo(bytes: Vec<u8>, max_bytes: usize, errors: &mut FormErrors) -> Option<LogoUpload> {
    if bytes.len() > max_bytes {
        errors.add("logo", file_size_message(max_bytes));
        return None;
    }

    let format = match image::guess_format(&bytes) {
        Ok(format) => format,
        Err(_) => {
            errors.add("logo", INVALID_IMAGE_MESSAGE);
            return None;
        }
    };

    if let Err(e) = image::load_from_memory_with_format(&bytes, format) {
        tracing::warn!(error = %e, "Rejected logo upload");
        errors.add("logo", INVALID_IMAGE_MESSAGE);
        return None;
    }

    Some(LogoUpload { bytes, format })
}
