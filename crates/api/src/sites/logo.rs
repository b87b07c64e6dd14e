//! Site logo resizing
//!
//! Logos are downscaled once when a site is created. Scaling preserves the
//! aspect ratio and is applied in two sequential passes: the height bound is
//! enforced first, then the width bound is checked against the
//! height-adjusted size. Each pass truncates to whole pixels.

use image::imageops::FilterType;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

/// Maximum logo dimensions. `None` leaves a dimension unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResizeBounds {
    pub max_width: Option<NonZeroU32>,
    pub max_height: Option<NonZeroU32>,
}

impl ResizeBounds {
    pub fn new(max_width: Option<NonZeroU32>, max_height: Option<NonZeroU32>) -> Self {
        Self {
            max_width,
            max_height,
        }
    }
}

/// Compute the target size for an image of `width` x `height`.
///
/// Returns `None` when the image already fits.
pub fn scaled_dimensions(width: u32, height: u32, bounds: ResizeBounds) -> Option<(u32, u32)> {
    let max_width = bounds.max_width.map_or(width, NonZeroU32::get);
    let max_height = bounds.max_height.map_or(height, NonZeroU32::get);

    if height <= max_height && width <= max_width {
        return None;
    }

    let (mut new_width, mut new_height) = (width, height);

    if new_height > max_height {
        let ratio = f64::from(new_height) / f64::from(max_height);
        new_height = (f64::from(new_height) / ratio) as u32;
        new_width = (f64::from(new_width) / ratio) as u32;
    }

    if new_width > max_width {
        let ratio = f64::from(new_width) / f64::from(max_width);
        new_height = (f64::from(new_height) / ratio) as u32;
        new_width = (f64::from(new_width) / ratio) as u32;
    }

    // Extreme aspect ratios can truncate a side to nothing
    Some((new_width.max(1), new_height.max(1)))
}

/// Resize the image at `path` to fit `bounds`.
///
/// The result is written to `new_name` (in the same directory as `path`) or
/// over `path` itself. When a different file was written the original is
/// removed. An image that already fits is left untouched and its own path is
/// returned.
///
/// Performs blocking file I/O.
pub fn resize_logo(
    path: &Path,
    new_name: Option<&str>,
    bounds: ResizeBounds,
) -> Result<PathBuf, LogoError> {
    let target = match new_name.filter(|name| !name.is_empty()) {
        Some(name) => path.parent().unwrap_or_else(|| Path::new("")).join(name),
        None => path.to_path_buf(),
    };

    let source = image::open(path)?;
    let Some((width, height)) = scaled_dimensions(source.width(), source.height(), bounds) else {
        return Ok(path.to_path_buf());
    };

    let resized = source.resize_exact(width, height, FilterType::CatmullRom);
    resized.save(&target)?;

    if target != path {
        std::fs::remove_file(path)?;
    }

    tracing::info!(
        source = %path.display(),
        target = %target.display(),
        from_width = source.width(),
        from_height = source.height(),
        width,
        height,
        "Logo resized"
    );

    Ok(target)
}

/// Errors that can occur while resizing a logo
#[derive(Debug, thiserror::Error)]
pub enum LogoError {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("File error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    fn bounds(width: u32, height: u32) -> ResizeBounds {
        ResizeBounds::new(NonZeroU32::new(width), NonZeroU32::new(height))
    }

    fn write_png(path: &Path, width: u32, height: u32) {
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_fits_within_bounds() {
        assert_eq!(scaled_dimensions(500, 400, bounds(500, 400)), None);
        assert_eq!(scaled_dimensions(10, 10, bounds(500, 400)), None);
    }

    #[test]
    fn test_height_then_width() {
        // 1000x500 -> height pass 800x400 -> width pass 500x250
        assert_eq!(
            scaled_dimensions(1000, 500, bounds(500, 400)),
            Some((500, 250))
        );
    }

    #[test]
    fn test_height_only() {
        assert_eq!(scaled_dimensions(300, 800, bounds(500, 400)), Some((150, 400)));
    }

    #[test]
    fn test_width_only() {
        assert_eq!(scaled_dimensions(1200, 300, bounds(600, 400)), Some((600, 150)));
    }

    #[test]
    fn test_truncates_to_whole_pixels() {
        // 200x300 bounded to height 100: ratio 3 -> 66.67 wide
        assert_eq!(scaled_dimensions(200, 300, bounds(500, 100)), Some((66, 100)));
    }

    #[test]
    fn test_unbounded_dimensions() {
        let width_only = ResizeBounds::new(NonZeroU32::new(100), None);
        assert_eq!(scaled_dimensions(400, 2000, width_only), Some((100, 500)));

        let height_only = ResizeBounds::new(None, NonZeroU32::new(100));
        assert_eq!(scaled_dimensions(2000, 400, height_only), Some((500, 100)));

        assert_eq!(scaled_dimensions(4000, 4000, ResizeBounds::default()), None);
    }

    #[test]
    fn test_extreme_aspect_ratio_keeps_a_pixel() {
        assert_eq!(scaled_dimensions(10_000, 1, bounds(100, 100)), Some((100, 1)));
    }

    #[test]
    fn test_resize_to_new_name_removes_original() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("acme-upload.png");
        write_png(&source, 1000, 500);

        let written = resize_logo(&source, Some("acme.png"), bounds(500, 400)).unwrap();

        assert_eq!(written, dir.path().join("acme.png"));
        assert!(!source.exists());
        let resized = image::open(&written).unwrap();
        assert_eq!((resized.width(), resized.height()), (500, 250));
    }

    #[test]
    fn test_resize_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("acme.png");
        write_png(&source, 300, 800);

        let written = resize_logo(&source, None, bounds(500, 400)).unwrap();

        assert_eq!(written, source);
        let resized = image::open(&written).unwrap();
        assert_eq!((resized.width(), resized.height()), (150, 400));
    }

    #[test]
    fn test_small_image_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("small.png");
        write_png(&source, 50, 40);

        let written = resize_logo(&source, Some("renamed.png"), bounds(500, 400)).unwrap();

        assert_eq!(written, source);
        assert!(source.exists());
        assert!(!dir.path().join("renamed.png").exists());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = resize_logo(&dir.path().join("missing.png"), None, bounds(10, 10));
        assert!(result.is_err());
    }
}
