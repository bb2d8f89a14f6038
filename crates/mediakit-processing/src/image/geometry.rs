use anyhow::{anyhow, Result};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};

use crate::asset::color_space_of;
use crate::image::filters::into_layout;

/// Geometric image operations
pub struct ImageGeometry;

impl ImageGeometry {
    /// Select appropriate filter type based on resize ratio
    pub fn select_filter(
        orig_width: u32,
        orig_height: u32,
        new_width: u32,
        new_height: u32,
    ) -> FilterType {
        let width_ratio = orig_width as f32 / new_width as f32;
        let height_ratio = orig_height as f32 / new_height as f32;
        let max_ratio = width_ratio.max(height_ratio);

        if max_ratio > 2.0 {
            FilterType::Triangle
        } else if max_ratio > 1.5 {
            FilterType::CatmullRom
        } else {
            FilterType::Lanczos3
        }
    }

    /// Resize to exact dimensions, ignoring aspect ratio
    pub fn resize(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        let (orig_width, orig_height) = img.dimensions();
        if (orig_width, orig_height) == (width, height) {
            return img.clone();
        }
        let filter = Self::select_filter(orig_width, orig_height, width, height);
        img.resize_exact(width, height, filter)
    }

    /// Cubic upscale by an integer factor
    pub fn upscale(img: &DynamicImage, factor: u32) -> Result<DynamicImage> {
        if factor <= 1 {
            return Ok(img.clone());
        }
        let (width, height) = img.dimensions();
        let (new_width, new_height) = width
            .checked_mul(factor)
            .zip(height.checked_mul(factor))
            .ok_or_else(|| {
                anyhow!("Upscaled size overflows for {}x{} x{}", width, height, factor)
            })?;
        Ok(img.resize_exact(new_width, new_height, FilterType::CatmullRom))
    }

    /// Canvas size that holds the image rotated by `degrees`
    pub fn rotated_bounds(width: u32, height: u32, degrees: f32) -> (u32, u32) {
        let theta = degrees.to_radians();
        let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
        let w = width as f32;
        let h = height as f32;
        // small epsilon keeps exact fits from rounding up a pixel
        let new_width = (w * cos + h * sin - 1e-3).ceil().max(1.0) as u32;
        let new_height = (w * sin + h * cos - 1e-3).ceil().max(1.0) as u32;
        (new_width, new_height)
    }

    /// Rotate counter-clockwise by `degrees`, expanding the canvas to fit.
    /// Uncovered corners are transparent, or black when the input has no alpha.
    pub fn rotate(img: &DynamicImage, degrees: u32) -> DynamicImage {
        match degrees % 360 {
            0 => img.clone(),
            90 => img.rotate270(),
            180 => img.rotate180(),
            270 => img.rotate90(),
            angle => Self::rotate_free(img, angle as f32),
        }
    }

    fn rotate_free(img: &DynamicImage, degrees: f32) -> DynamicImage {
        let (width, height) = img.dimensions();
        let (new_width, new_height) = Self::rotated_bounds(width, height, degrees);
        let transparent = Rgba([0, 0, 0, 0]);

        let projection = Projection::translate(-(width as f32) / 2.0, -(height as f32) / 2.0)
            .and_then(Projection::rotate(-degrees.to_radians()))
            .and_then(Projection::translate(
                new_width as f32 / 2.0,
                new_height as f32 / 2.0,
            ));

        let source = img.to_rgba8();
        let mut canvas = RgbaImage::from_pixel(new_width, new_height, transparent);
        warp_into(
            &source,
            &projection,
            Interpolation::Bilinear,
            transparent,
            &mut canvas,
        );
        into_layout(canvas, color_space_of(img))
    }

    /// Crop to the half-open region `[x1, x2) x [y1, y2)`
    pub fn crop(img: &DynamicImage, x1: u32, y1: u32, x2: u32, y2: u32) -> Result<DynamicImage> {
        let (width, height) = img.dimensions();
        if x2 <= x1 || y2 <= y1 {
            return Err(anyhow!("Crop region ({}, {})-({}, {}) is empty", x1, y1, x2, y2));
        }
        if x2 > width || y2 > height {
            return Err(anyhow!(
                "Crop region ({}, {})-({}, {}) exceeds image bounds {}x{}",
                x1,
                y1,
                x2,
                y2,
                width,
                height
            ));
        }
        Ok(img.crop_imm(x1, y1, x2 - x1, y2 - y1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn sample(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([x as u8, y as u8, 0])
        }))
    }

    #[test]
    fn test_select_filter() {
        assert_eq!(ImageGeometry::select_filter(1000, 1000, 400, 400), FilterType::Triangle);
        assert_eq!(ImageGeometry::select_filter(1000, 1000, 600, 600), FilterType::CatmullRom);
        assert_eq!(ImageGeometry::select_filter(1000, 1000, 900, 900), FilterType::Lanczos3);
    }

    #[test]
    fn test_resize_exact() {
        let out = ImageGeometry::resize(&sample(40, 30), 17, 90);
        assert_eq!(out.dimensions(), (17, 90));
    }

    #[test]
    fn test_upscale() {
        let img = sample(10, 7);
        assert_eq!(ImageGeometry::upscale(&img, 3).unwrap().dimensions(), (30, 21));
        assert_eq!(ImageGeometry::upscale(&img, 1).unwrap(), img);
    }

    #[test]
    fn test_rotate_quarter_turn_is_counter_clockwise() {
        let img = sample(4, 2);
        let out = ImageGeometry::rotate(&img, 90).to_rgb8();
        assert_eq!(out.dimensions(), (2, 4));
        // the top-right corner moves to the top-left
        assert_eq!(out.get_pixel(0, 0), &Rgb([3, 0, 0]));
    }

    #[test]
    fn test_rotate_full_turn_is_identity() {
        let img = sample(5, 3);
        assert_eq!(ImageGeometry::rotate(&img, 0), img);
        assert_eq!(ImageGeometry::rotate(&img, 360), img);
    }

    #[test]
    fn test_rotate_free_angle_expands_canvas() {
        let img = sample(100, 50);
        let out = ImageGeometry::rotate(&img, 45);
        let (w, h) = out.dimensions();
        assert_eq!((w, h), ImageGeometry::rotated_bounds(100, 50, 45.0));
        assert!(w > 100 && h > 50);
        assert_eq!(color_space_of(&out), color_space_of(&img));
    }

    #[test]
    fn test_rotated_bounds_for_right_angle() {
        assert_eq!(ImageGeometry::rotated_bounds(100, 50, 90.0), (50, 100));
        assert_eq!(ImageGeometry::rotated_bounds(100, 50, 180.0), (100, 50));
    }

    #[test]
    fn test_crop_within_bounds() {
        let img = sample(20, 20);
        let out = ImageGeometry::crop(&img, 2, 3, 12, 8).unwrap();
        assert_eq!(out.dimensions(), (10, 5));
        assert_eq!(out.to_rgb8().get_pixel(0, 0), &Rgb([2, 3, 0]));
    }

    #[test]
    fn test_crop_out_of_bounds_is_error() {
        let img = sample(20, 20);
        let err = ImageGeometry::crop(&img, 0, 0, 21, 10).unwrap_err();
        assert!(err.to_string().contains("exceeds image bounds"));
        assert!(ImageGeometry::crop(&img, 5, 5, 5, 10).is_err());
    }
}
