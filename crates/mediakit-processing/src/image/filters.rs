use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};
use imageproc::filter::median_filter;
use mediakit_core::ColorSpace;

use crate::asset::color_space_of;

/// Tone filters selectable through `color-filter`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorFilter {
    Sepia,
    Invert,
    Brightness,
}

impl ColorFilter {
    pub const OPTIONS: [&'static str; 3] = ["sepia", "invert", "brightness"];

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "sepia" => Ok(ColorFilter::Sepia),
            "invert" => Ok(ColorFilter::Invert),
            "brightness" => Ok(ColorFilter::Brightness),
            other => Err(anyhow::anyhow!("Unknown color filter: {}", other)),
        }
    }
}

/// Pixel-level filters on decoded images
pub struct ImageFilters;

impl ImageFilters {
    /// Single-channel luma
    pub fn grayscale(img: &DynamicImage) -> DynamicImage {
        DynamicImage::ImageLuma8(img.to_luma8())
    }

    /// Gaussian sigma for an odd kernel size, as used by common imaging libraries
    pub fn sigma_for_kernel(kernel_size: u32) -> f32 {
        0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
    }

    /// Gaussian blur. A kernel of 1 leaves the image untouched.
    pub fn gaussian_blur(img: &DynamicImage, kernel_size: u32) -> DynamicImage {
        if kernel_size <= 1 {
            return img.clone();
        }
        img.blur(Self::sigma_for_kernel(kernel_size))
    }

    /// Canny edges on the luma channel
    pub fn edge_detect(img: &DynamicImage, low: f32, high: f32) -> DynamicImage {
        let (low, high) = if low <= high { (low, high) } else { (high, low) };
        DynamicImage::ImageLuma8(imageproc::edges::canny(&img.to_luma8(), low, high))
    }

    /// `saturate(|alpha * v + beta|)` on every colour channel; alpha is kept
    pub fn brightness_contrast(img: &DynamicImage, alpha: f32, beta: f32) -> DynamicImage {
        let scale = |v: u8| (alpha * v as f32 + beta).abs().round().min(255.0) as u8;
        Self::map_color(img, color_space_of(img), |[r, g, b]| {
            [scale(r), scale(g), scale(b)]
        })
    }

    /// Median filter; the neighbourhood radius grows with `strength` (1..=10)
    pub fn denoise(img: &DynamicImage, strength: u32) -> DynamicImage {
        let radius = Self::denoise_radius(strength);
        match color_space_of(img) {
            ColorSpace::Grayscale => {
                DynamicImage::ImageLuma8(median_filter(&img.to_luma8(), radius, radius))
            }
            ColorSpace::GrayscaleAlpha => {
                DynamicImage::ImageLumaA8(median_filter(&img.to_luma_alpha8(), radius, radius))
            }
            ColorSpace::Rgb => {
                DynamicImage::ImageRgb8(median_filter(&img.to_rgb8(), radius, radius))
            }
            ColorSpace::Rgba => {
                DynamicImage::ImageRgba8(median_filter(&img.to_rgba8(), radius, radius))
            }
        }
    }

    pub fn denoise_radius(strength: u32) -> u32 {
        1 + strength.saturating_sub(1) / 4
    }

    /// Pencil sketch: luma dodge-blended with its blurred negative
    pub fn sketch(img: &DynamicImage) -> DynamicImage {
        let gray = img.to_luma8();
        let mut negative = gray.clone();
        image::imageops::invert(&mut negative);
        let blurred = image::imageops::blur(&negative, Self::sigma_for_kernel(21));

        let sketch = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
            let base = gray.get_pixel(x, y)[0] as u32;
            let denominator = 255 - blurred.get_pixel(x, y)[0] as u32;
            let value = if denominator == 0 {
                if base == 0 {
                    0
                } else {
                    255
                }
            } else {
                (base * 256 / denominator).min(255)
            };
            Luma([value as u8])
        });
        DynamicImage::ImageLuma8(sketch)
    }

    pub fn color_filter(img: &DynamicImage, filter: ColorFilter, factor: f32) -> DynamicImage {
        match filter {
            ColorFilter::Sepia => Self::sepia(img),
            ColorFilter::Invert => Self::invert(img),
            ColorFilter::Brightness => Self::brightness(img, factor),
        }
    }

    /// Sepia tone; grayscale input becomes colour
    pub fn sepia(img: &DynamicImage) -> DynamicImage {
        let layout = match color_space_of(img) {
            ColorSpace::Grayscale | ColorSpace::Rgb => ColorSpace::Rgb,
            ColorSpace::GrayscaleAlpha | ColorSpace::Rgba => ColorSpace::Rgba,
        };
        Self::map_color(img, layout, |[r, g, b]| {
            let (r, g, b) = (r as f32, g as f32, b as f32);
            [
                (0.393 * r + 0.769 * g + 0.189 * b).min(255.0) as u8,
                (0.349 * r + 0.686 * g + 0.168 * b).min(255.0) as u8,
                (0.272 * r + 0.534 * g + 0.131 * b).min(255.0) as u8,
            ]
        })
    }

    pub fn invert(img: &DynamicImage) -> DynamicImage {
        let mut inverted = img.clone();
        inverted.invert();
        inverted
    }

    /// Multiply every colour channel by `factor`
    pub fn brightness(img: &DynamicImage, factor: f32) -> DynamicImage {
        let scale = |v: u8| (v as f32 * factor).clamp(0.0, 255.0) as u8;
        Self::map_color(img, color_space_of(img), |[r, g, b]| {
            [scale(r), scale(g), scale(b)]
        })
    }

    /// Apply `f` to the RGB part of every pixel and return the result in `layout`
    fn map_color<F>(img: &DynamicImage, layout: ColorSpace, f: F) -> DynamicImage
    where
        F: Fn([u8; 3]) -> [u8; 3],
    {
        let mut rgba: RgbaImage = img.to_rgba8();
        for pixel in rgba.pixels_mut() {
            let Rgba([r, g, b, a]) = *pixel;
            let [r, g, b] = f([r, g, b]);
            *pixel = Rgba([r, g, b, a]);
        }
        into_layout(rgba, layout)
    }
}

/// Convert an RGBA working buffer back into the channel layout of `layout`
pub(crate) fn into_layout(rgba: RgbaImage, layout: ColorSpace) -> DynamicImage {
    let img = DynamicImage::ImageRgba8(rgba);
    match layout {
        ColorSpace::Rgba => img,
        ColorSpace::Rgb => DynamicImage::ImageRgb8(img.to_rgb8()),
        ColorSpace::Grayscale => DynamicImage::ImageLuma8(img.to_luma8()),
        ColorSpace::GrayscaleAlpha => DynamicImage::ImageLumaA8(img.to_luma_alpha8()),
    }
}
