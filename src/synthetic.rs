//! Synthetic square mask/image pairs for smoke tests and demos
//!
//! The mask is a filled square (255 on 0). The candidate image repeats the
//! square shifted diagonally by a few pixels, filled with a flat gray, so the
//! metric sees a known systematic offset.

use crate::{
    error::{BoundaryError, Result},
    services::ImageIOService,
    types::{CandidateImage, LabelSurface},
};
use ndarray::{s, Array2, Array3};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticSquare {
    /// Side length of the square grid
    pub size: usize,
    /// First row/column of the mask square
    pub start: usize,
    /// One past the last row/column of the mask square
    pub end: usize,
    /// Diagonal shift of the image square
    pub offset: usize,
    pub mask_value: u8,
    pub image_value: u8,
    pub site_id: String,
    pub variant: String,
}

impl Default for SyntheticSquare {
    fn default() -> Self {
        Self {
            size: 1024,
            start: 256,
            end: 768,
            offset: 2,
            mask_value: 255,
            image_value: 200,
            site_id: "site_01".to_string(),
            variant: "v1".to_string(),
        }
    }
}

/// Files written by [`SyntheticSquare::write`]
#[derive(Debug, Clone)]
pub struct SyntheticPaths {
    pub mask: PathBuf,
    pub image: PathBuf,
}

impl SyntheticSquare {
    /// Grid of `size` with the square spanning its middle half
    #[must_use]
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self.start = size / 4;
        self.end = 3 * size / 4;
        self
    }

    #[must_use]
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    #[must_use]
    pub fn with_site_id<S: Into<String>>(mut self, site_id: S) -> Self {
        self.site_id = site_id.into();
        self
    }

    #[must_use]
    pub fn with_variant<S: Into<String>>(mut self, variant: S) -> Self {
        self.variant = variant.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.start >= self.end || self.end > self.size {
            return Err(BoundaryError::invalid_config(format!(
                "square [{}, {}) does not fit a {}x{} grid",
                self.start, self.end, self.size, self.size
            )));
        }
        if self.end + self.offset > self.size {
            return Err(BoundaryError::config_value_error(
                "square offset",
                self.offset,
                &format!("0-{}", self.size - self.end),
                Some(0),
            ));
        }
        Ok(())
    }

    /// Ground-truth raster, foreground `mask_value` on zero
    pub fn mask_array(&self) -> Result<Array2<u8>> {
        self.validate()?;
        let mut mask = Array2::zeros((self.size, self.size));
        mask.slice_mut(s![self.start..self.end, self.start..self.end])
            .fill(self.mask_value);
        Ok(mask)
    }

    /// RGB raster with the square shifted by `offset` along both axes
    pub fn image_array(&self) -> Result<Array3<u8>> {
        self.validate()?;
        let (lo, hi) = (self.start + self.offset, self.end + self.offset);
        let mut image = Array3::zeros((self.size, self.size, 3));
        image.slice_mut(s![lo..hi, lo..hi, ..]).fill(self.image_value);
        Ok(image)
    }

    pub fn label_surface(&self) -> Result<LabelSurface> {
        Ok(LabelSurface::from_labels(self.mask_array()?.view()))
    }

    pub fn candidate_image(&self) -> Result<CandidateImage> {
        Ok(CandidateImage::Color(
            self.image_array()?.mapv(|v| f64::from(v) / 255.0),
        ))
    }

    /// Write `<mask_dir>/<site_id>.tif` and `<image_dir>/<site_id>_<variant>.png`
    pub fn write(&self, mask_dir: &Path, image_dir: &Path) -> Result<SyntheticPaths> {
        let mask = self.mask_array()?;
        let image = self.image_array()?;

        let paths = SyntheticPaths {
            mask: mask_dir.join(format!("{}.tif", self.site_id)),
            image: image_dir.join(format!("{}_{}.png", self.site_id, self.variant)),
        };
        ImageIOService::save_luma8(mask.view(), &paths.mask)?;
        ImageIOService::save_rgb8(image.view(), &paths.image)?;

        tracing::info!(
            mask = %paths.mask.display(),
            image = %paths.image.display(),
            "synthetic pair written"
        );
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_geometry() {
        let square = SyntheticSquare::default();
        assert!(square.validate().is_ok());

        let mask = square.mask_array().unwrap();
        assert_eq!(mask.dim(), (1024, 1024));
        assert_eq!(mask[[256, 256]], 255);
        assert_eq!(mask[[767, 767]], 255);
        assert_eq!(mask[[768, 768]], 0);

        let image = square.image_array().unwrap();
        assert_eq!(image[[257, 257, 0]], 0);
        assert_eq!(image[[258, 258, 1]], 200);
        assert_eq!(image[[769, 769, 2]], 200);
    }

    #[test]
    fn test_offset_must_fit() {
        let square = SyntheticSquare::default().with_size(16).with_offset(5);
        assert!(square.validate().is_err());
        assert!(SyntheticSquare::default().with_size(16).with_offset(4).validate().is_ok());
    }

    #[test]
    fn test_invalid_geometry_is_an_error() {
        let square = SyntheticSquare::default().with_size(4).with_offset(2);
        assert!(square.validate().is_err());
        assert!(square.mask_array().is_err());
        assert!(matches!(square.image_array(), Err(BoundaryError::InvalidConfig(_))));
        assert!(square.candidate_image().is_err());
        assert!(square.label_surface().is_err());

        let dir = tempdir().unwrap();
        assert!(square.write(dir.path(), dir.path()).is_err());
        assert!(!dir.path().join("site_01.tif").exists());
    }

    #[test]
    fn test_write_pair() {
        let dir = tempdir().unwrap();
        let square = SyntheticSquare::default().with_size(32).with_site_id("site_09");
        let paths = square
            .write(&dir.path().join("rasters"), &dir.path().join("images"))
            .unwrap();

        assert!(paths.mask.ends_with("rasters/site_09.tif"));
        assert!(paths.image.ends_with("images/site_09_v1.png"));

        let mask = ImageIOService::load_mask(&paths.mask).unwrap();
        assert_eq!(mask, square.label_surface().unwrap());
        let image = ImageIOService::load_image(&paths.image).unwrap();
        assert_eq!(image.spatial_dim(), (32, 32));
    }
}
