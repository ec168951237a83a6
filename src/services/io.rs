//! Raster I/O for ground-truth masks and candidate images
//!
//! Decoding goes through the `image` crate; pixels are copied into ndarray
//! grids indexed `(row, column)` so the metric core never sees file formats.

use crate::{
    error::{BoundaryError, Result},
    types::{CandidateImage, LabelSurface},
};
use image::{DynamicImage, GenericImageView, GrayImage, RgbImage};
use ndarray::{Array2, Array3, ArrayView2, ArrayView3};
use std::path::Path;

/// Service for reading and writing evaluation rasters
pub struct ImageIOService;

impl ImageIOService {
    /// Decode a raster, falling back to content sniffing when the extension lies
    pub fn open<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(BoundaryError::file_io_error(
                "read raster",
                path_ref,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                tracing::debug!(
                    path = %path_ref.display(),
                    error = %e,
                    "extension-based decoding failed, trying content-based detection"
                );
                let data = std::fs::read(path_ref)
                    .map_err(|io_err| BoundaryError::file_io_error("read raster data", path_ref, &io_err))?;

                image::load_from_memory(&data).map_err(|content_err| {
                    BoundaryError::processing_stage_error(
                        "raster decoding",
                        &format!("extension error: {}; content error: {}", e, content_err),
                        Some(&format!("path: {}, size: {} bytes", path_ref.display(), data.len())),
                    )
                })
            },
        }
    }

    /// Load a ground-truth mask from the first band of a raster
    ///
    /// 8- and 16-bit rasters become discrete labels; 32-bit float rasters go
    /// through [`LabelSurface::from_float`].
    pub fn load_mask<P: AsRef<Path>>(path: P) -> Result<LabelSurface> {
        let img = Self::open(path)?;
        Ok(Self::mask_from_dynamic(&img))
    }

    /// Convert a decoded raster to a label surface using its first channel
    #[must_use]
    #[allow(clippy::indexing_slicing)]
    pub fn mask_from_dynamic(img: &DynamicImage) -> LabelSurface {
        let (w, h) = img.dimensions();
        let (h, w) = (h as usize, w as usize);

        match img {
            DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
                let raw = img.to_rgba32f().into_raw();
                LabelSurface::from_float(Array2::from_shape_fn((h, w), |(i, j)| {
                    f64::from(raw[(i * w + j) * 4])
                }))
            },
            DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA16(_)
            | DynamicImage::ImageRgb16(_)
            | DynamicImage::ImageRgba16(_) => {
                let raw = img.to_rgba16().into_raw();
                LabelSurface::DiscreteLabels(Array2::from_shape_fn((h, w), |(i, j)| {
                    i64::from(raw[(i * w + j) * 4])
                }))
            },
            _ => {
                let raw = img.to_rgba8().into_raw();
                LabelSurface::DiscreteLabels(Array2::from_shape_fn((h, w), |(i, j)| {
                    i64::from(raw[(i * w + j) * 4])
                }))
            },
        }
    }

    /// Load a candidate image as RGB intensities on `[0, 1]`
    ///
    /// Alpha is dropped and grayscale is replicated to three channels, which
    /// leaves its luminance unchanged.
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<CandidateImage> {
        let img = Self::open(path)?;
        Self::image_from_dynamic(&img)
    }

    /// Convert a decoded raster to a color candidate image
    pub fn image_from_dynamic(img: &DynamicImage) -> Result<CandidateImage> {
        let (w, h) = img.dimensions();
        let raw: Vec<f64> = img
            .to_rgb32f()
            .into_raw()
            .into_iter()
            .map(f64::from)
            .collect();

        Array3::from_shape_vec((h as usize, w as usize, 3), raw)
            .map(CandidateImage::Color)
            .map_err(|e| BoundaryError::internal(format!("RGB buffer layout: {}", e)))
    }

    /// Write an 8-bit single-band raster, creating parent directories
    #[allow(clippy::indexing_slicing)]
    pub fn save_luma8<P: AsRef<Path>>(values: ArrayView2<'_, u8>, path: P) -> Result<()> {
        let path_ref = path.as_ref();
        Self::ensure_parent(path_ref)?;

        let (h, w) = values.dim();
        let buffer = GrayImage::from_fn(w as u32, h as u32, |x, y| {
            image::Luma([values[[y as usize, x as usize]]])
        });
        buffer.save(path_ref)?;
        Ok(())
    }

    /// Write an 8-bit RGB raster laid out `(height, width, 3)`
    #[allow(clippy::indexing_slicing)]
    pub fn save_rgb8<P: AsRef<Path>>(values: ArrayView3<'_, u8>, path: P) -> Result<()> {
        let path_ref = path.as_ref();
        Self::ensure_parent(path_ref)?;

        let (h, w, channels) = values.dim();
        if channels != 3 {
            return Err(BoundaryError::shape(format!(
                "RGB output needs 3 channels; got {}",
                channels
            )));
        }
        let buffer = RgbImage::from_fn(w as u32, h as u32, |x, y| {
            let (i, j) = (y as usize, x as usize);
            image::Rgb([values[[i, j, 0]], values[[i, j, 1]], values[[i, j, 2]]])
        });
        buffer.save(path_ref)?;
        Ok(())
    }

    /// Whether the file extension is one this crate can decode
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(Self::is_supported_extension)
    }

    /// Whether a bare extension (no dot, any case) names a decodable format
    #[must_use]
    pub fn is_supported_extension(extension: &str) -> bool {
        matches!(
            extension.to_ascii_lowercase().as_str(),
            "png" | "jpg" | "jpeg" | "tif" | "tiff"
        )
    }

    fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| BoundaryError::file_io_error("create output directory", parent, &e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma, Rgba};
    use tempfile::tempdir;

    #[test]
    fn test_is_supported_format() {
        assert!(ImageIOService::is_supported_format("site_01.tif"));
        assert!(ImageIOService::is_supported_format("site_01_v1.PNG"));
        assert!(ImageIOService::is_supported_format("a.jpeg"));
        assert!(!ImageIOService::is_supported_format("notes.txt"));
        assert!(!ImageIOService::is_supported_format("site_01"));

        assert!(ImageIOService::is_supported_extension("TIFF"));
        assert!(!ImageIOService::is_supported_extension("webp"));
        assert!(!ImageIOService::is_supported_extension(".png"));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let err = ImageIOService::load_mask("does/not/exist.tif").unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_mask_round_trip_through_tiff() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rasters").join("site_07.tif");

        let mut values = Array2::<u8>::zeros((6, 5));
        values[[2, 3]] = 255;
        ImageIOService::save_luma8(values.view(), &path).unwrap();

        let mask = ImageIOService::load_mask(&path).unwrap();
        assert_eq!(mask.dim(), (6, 5));
        let labels = mask.labels();
        assert_eq!(labels[[2, 3]], 255);
        assert_eq!(labels.iter().filter(|&&v| v != 0).count(), 1);
    }

    #[test]
    fn test_mask_uses_first_channel() {
        let img = ImageBuffer::from_fn(3, 2, |x, _| Rgba([x as u8, 9, 9, 255]));
        let mask = ImageIOService::mask_from_dynamic(&DynamicImage::ImageRgba8(img));
        assert_eq!(mask.labels(), ndarray::array![[0, 1, 2], [0, 1, 2]]);
    }

    #[test]
    fn test_sixteen_bit_mask_keeps_range() {
        let img: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::from_fn(2, 2, |x, y| Luma([(x + 2 * y) as u16 * 1000]));
        let mask = ImageIOService::mask_from_dynamic(&DynamicImage::ImageLuma16(img));
        assert_eq!(mask.labels(), ndarray::array![[0, 1000], [2000, 3000]]);
    }

    #[test]
    fn test_image_scaled_to_unit_range() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("site_01_v1.png");

        let mut values = Array3::<u8>::zeros((4, 4, 3));
        values[[1, 2, 0]] = 255;
        values[[1, 2, 1]] = 255;
        values[[1, 2, 2]] = 255;
        ImageIOService::save_rgb8(values.view(), &path).unwrap();

        let image = ImageIOService::load_image(&path).unwrap();
        assert_eq!(image.shape(), vec![4, 4, 3]);
        let luminance = image.luminance().unwrap();
        assert!((luminance[[1, 2]] - 1.0).abs() < 1e-6);
        assert_eq!(luminance[[0, 0]], 0.0);
    }

    #[test]
    fn test_save_rgb_requires_three_channels() {
        let dir = tempdir().unwrap();
        let values = Array3::<u8>::zeros((2, 2, 4));
        let err = ImageIOService::save_rgb8(values.view(), dir.path().join("x.png")).unwrap_err();
        assert!(err.is_shape_error());
    }

    #[test]
    fn test_content_sniffing_fallback() {
        let dir = tempdir().unwrap();
        let png_path = dir.path().join("real.png");
        ImageIOService::save_luma8(Array2::<u8>::from_elem((3, 3), 7).view(), &png_path).unwrap();

        let disguised = dir.path().join("disguised.tif");
        std::fs::copy(&png_path, &disguised).unwrap();
        let mask = ImageIOService::load_mask(&disguised).unwrap();
        assert_eq!(mask.labels()[[1, 1]], 7);
    }
}
